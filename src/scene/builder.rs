//! Initial scene population

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::particle::{Material, Particle, ParticleGroup, ParticleKind};
use super::registry::ParticleRegistry;
use crate::settings::SceneSettings;

pub const TREE_SPIN: f32 = 0.05;
pub const DUST_SPIN: f32 = 0.01;
pub const PHOTO_SPIN: f32 = 0.02;

/// Texture slots the builder hands to materials
#[derive(Clone, Copy, Debug, Default)]
pub struct SceneTextures {
    /// Candy stripes; candy falls back to plain white without it
    pub candy: Option<usize>,
    /// Default photo card; no default photo without it
    pub default_photo: Option<usize>,
}

/// Random velocity in [-0.5, 0.5)^3 scaled by `scale`
pub fn random_velocity(rng: &mut impl Rng, scale: f32) -> Vec3 {
    Vec3::new(
        rng.random::<f32>() - 0.5,
        rng.random::<f32>() - 0.5,
        rng.random::<f32>() - 0.5,
    ) * scale
}

/// Pick the ornament kind and material for one tree particle
fn tree_ornament(rng: &mut impl Rng, candy_texture: Option<usize>) -> (ParticleKind, Material) {
    let roll: f32 = rng.random();
    let coin = rng.random_bool(0.5);
    if roll < 0.4 {
        (ParticleKind::Box, if coin { Material::gold() } else { Material::green() })
    } else if roll < 0.8 {
        (ParticleKind::Sphere, if coin { Material::gold() } else { Material::red() })
    } else {
        (ParticleKind::Candy, Material::candy(candy_texture))
    }
}

/// Builds the registry: tree particles, then dust, then the default photo
pub struct SceneBuilder {
    tree_particles: usize,
    dust_particles: usize,
    rng: StdRng,
}

impl SceneBuilder {
    pub fn new(settings: &SceneSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            tree_particles: settings.tree_particles,
            dust_particles: settings.dust_particles,
            rng,
        }
    }

    /// Populate a registry. The RNG is handed back for later photo velocities.
    pub fn build(mut self, textures: SceneTextures) -> (ParticleRegistry, StdRng) {
        let mut registry = ParticleRegistry::new();

        for _ in 0..self.tree_particles {
            let (kind, material) = tree_ornament(&mut self.rng, textures.candy);
            let velocity = random_velocity(&mut self.rng, TREE_SPIN);
            registry.push(Particle::new(0, kind, ParticleGroup::Tree, Vec3::ZERO, velocity, material));
        }

        for _ in 0..self.dust_particles {
            let velocity = random_velocity(&mut self.rng, DUST_SPIN);
            registry.push(Particle::new(
                0,
                ParticleKind::Sphere,
                ParticleGroup::Dust,
                Vec3::ZERO,
                velocity,
                Material::dust(),
            ));
        }

        match textures.default_photo {
            Some(texture) => {
                let velocity = random_velocity(&mut self.rng, PHOTO_SPIN);
                registry.append_photo(texture, Vec3::ZERO, velocity);
            }
            None => log::warn!("Default photo texture unavailable, starting without a photo"),
        }

        log::info!(
            "Scene built: {} tree, {} dust, {} total particles",
            self.tree_particles,
            self.dust_particles,
            registry.len()
        );

        (registry, self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(seed: u64) -> SceneSettings {
        SceneSettings {
            tree_particles: 200,
            dust_particles: 50,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_layout() {
        let textures = SceneTextures {
            candy: Some(0),
            default_photo: Some(1),
        };
        let (registry, _) = SceneBuilder::new(&settings(1)).build(textures);

        assert_eq!(registry.len(), 251);
        assert_eq!(registry.tree_count(), 200);
        assert!(registry.iter().take(200).all(|p| p.group == ParticleGroup::Tree));
        assert!(registry
            .iter()
            .skip(200)
            .take(50)
            .all(|p| p.group == ParticleGroup::Dust && p.material.unlit));

        let photo = registry.get(250).unwrap();
        assert_eq!(photo.kind, ParticleKind::Photo);
        assert_eq!(photo.material.texture, Some(1));
        assert_eq!(registry.focus_target(), Some(250));
    }

    #[test]
    fn test_velocity_ranges() {
        let (registry, _) = SceneBuilder::new(&settings(2)).build(SceneTextures::default());
        for p in registry.iter() {
            let limit = match p.group {
                ParticleGroup::Tree => TREE_SPIN * 0.5,
                ParticleGroup::Dust => DUST_SPIN * 0.5,
                ParticleGroup::Photo => PHOTO_SPIN * 0.5,
            };
            assert!(p.velocity.abs().max_element() <= limit);
        }
    }

    #[test]
    fn test_tree_mix() {
        let mut s = settings(3);
        s.tree_particles = 5000;
        s.dust_particles = 0;
        let (registry, _) = SceneBuilder::new(&s).build(SceneTextures::default());

        let count = |kind| registry.iter().filter(|p| p.kind == kind).count() as f32 / 5000.0;
        assert!((count(ParticleKind::Box) - 0.4).abs() < 0.05);
        assert!((count(ParticleKind::Sphere) - 0.4).abs() < 0.05);
        assert!((count(ParticleKind::Candy) - 0.2).abs() < 0.05);
    }

    #[test]
    fn test_missing_textures() {
        let (registry, _) = SceneBuilder::new(&settings(4)).build(SceneTextures::default());
        assert_eq!(registry.len(), 250);
        assert_eq!(registry.focus_target(), None);
        assert!(registry
            .iter()
            .filter(|p| p.kind == ParticleKind::Candy)
            .all(|p| p.material.texture.is_none()));
    }

    #[test]
    fn test_same_seed_same_scene() {
        let (a, _) = SceneBuilder::new(&settings(9)).build(SceneTextures::default());
        let (b, _) = SceneBuilder::new(&settings(9)).build(SceneTextures::default());
        let kinds = |r: &ParticleRegistry| r.iter().map(|p| (p.kind, p.velocity)).collect::<Vec<_>>();
        assert_eq!(kinds(&a), kinds(&b));
    }
}
