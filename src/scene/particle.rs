//! Particle data types

use glam::Vec3;

/// Position, Euler rotation (XYZ, radians) and uniform-or-not scale
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Pose {
    /// Pose at a position with no rotation and unit scale
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

/// Mesh a particle is drawn with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    Box,
    Sphere,
    Candy,
    Photo,
}

/// Category a particle belongs to, fixed at creation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParticleGroup {
    /// Ornaments forming the tree spiral
    Tree,
    /// Small glowing motes around the tree
    Dust,
    /// Framed pictures
    Photo,
}

/// sRGB hex color to linear RGB
pub fn hex_color(hex: u32) -> Vec3 {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec3::new(channel(16), channel(8), channel(0))
}

pub const CHAMPAGNE_GOLD: u32 = 0xd4af37;
pub const DEEP_GREEN: u32 = 0x0b3d16;
pub const CHRISTMAS_RED: u32 = 0xaf111c;
pub const DUST_CREAM: u32 = 0xfceea7;

/// Surface description
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Linear RGB tint
    pub color: Vec3,
    pub metalness: f32,
    pub roughness: f32,
    /// Extra glossy layer on top
    pub clearcoat: f32,
    /// Ignore lighting
    pub unlit: bool,
    pub opacity: f32,
    /// Index into the renderer's texture table
    pub texture: Option<usize>,
}

impl Material {
    fn lit(hex: u32, metalness: f32, roughness: f32) -> Self {
        Self {
            color: hex_color(hex),
            metalness,
            roughness,
            clearcoat: 0.0,
            unlit: false,
            opacity: 1.0,
            texture: None,
        }
    }

    /// Champagne gold
    pub fn gold() -> Self {
        Self::lit(CHAMPAGNE_GOLD, 0.9, 0.1)
    }

    /// Deep green
    pub fn green() -> Self {
        Self::lit(DEEP_GREEN, 0.5, 0.3)
    }

    /// Glossy red
    pub fn red() -> Self {
        Self {
            clearcoat: 1.0,
            ..Self::lit(CHRISTMAS_RED, 0.3, 0.1)
        }
    }

    /// Striped candy cane; plain white when the stripe texture is missing
    pub fn candy(texture: Option<usize>) -> Self {
        Self {
            texture,
            ..Self::lit(0xffffff, 0.1, 0.4)
        }
    }

    /// Unlit translucent dust
    pub fn dust() -> Self {
        Self {
            unlit: true,
            opacity: 0.6,
            ..Self::lit(DUST_CREAM, 0.0, 1.0)
        }
    }

    /// Gold frame around a picture
    pub fn photo(texture: usize) -> Self {
        Self {
            texture: Some(texture),
            ..Self::gold()
        }
    }
}

/// One animated object
#[derive(Clone, Debug)]
pub struct Particle {
    pub id: u64,
    pub kind: ParticleKind,
    pub group: ParticleGroup,
    /// What is drawn; only the interpolation step writes this
    pub live: Pose,
    /// Where it is heading; only placement writes this
    pub target: Pose,
    /// Free-spin rate in scatter mode (radians per frame)
    pub velocity: Vec3,
    /// Tint, same as `material.color`
    pub base_color: Vec3,
    pub material: Material,
}

impl Particle {
    pub fn new(
        id: u64,
        kind: ParticleKind,
        group: ParticleGroup,
        position: Vec3,
        velocity: Vec3,
        material: Material,
    ) -> Self {
        let pose = Pose::at(position);
        Self {
            id,
            kind,
            group,
            live: pose,
            target: pose,
            velocity,
            base_color: material.color,
            material,
        }
    }
}
