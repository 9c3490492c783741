//! Target poses per display mode
//!
//! Everything here is a pure function of the particle, its registry index,
//! the elapsed time and the mode. Fields a rule doesn't set keep the
//! particle's previous target.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec3;

use super::particle::{Particle, ParticleGroup, Pose};
use crate::gesture::AppMode;

/// Where the focused photo is parked, just in front of the camera
pub const FOCUS_POSITION: Vec3 = Vec3::new(0.0, 2.0, 35.0);
pub const FOCUS_SCALE: f32 = 4.5;
/// Distance non-focused particles are pushed out to
pub const PUSH_RADIUS: f32 = 50.0;
pub const PUSH_SCALE: f32 = 0.2;

/// Golden angle in radians
const GOLDEN_ANGLE: f32 = 2.399_963;
/// Fractional part of the golden ratio
const GOLDEN_FRACTION: f32 = 0.618_034;

/// Inputs shared by every particle in a frame
#[derive(Clone, Copy, Debug)]
pub struct PlacementContext {
    pub mode: AppMode,
    /// Seconds since start
    pub time: f32,
    /// Size of the tree group, used to spread the spiral
    pub tree_count: usize,
    /// Registry index of the focused photo
    pub focus: Option<usize>,
}

/// Compute the target pose for the particle at `index`
pub fn target_pose(particle: &Particle, index: usize, ctx: &PlacementContext) -> Pose {
    let mut target = particle.target;
    let i = index as f32;

    match ctx.mode {
        AppMode::Tree => match particle.group {
            ParticleGroup::Tree => {
                let t = i / ctx.tree_count.max(1) as f32;
                let radius = 12.0 * (1.0 - t);
                let angle = t * 50.0 * PI;
                target.position = Vec3::new(radius * angle.cos(), 25.0 * t - 10.0, radius * angle.sin());
                target.rotation = Vec3::new(0.0, angle, 0.0);
                target.scale = Vec3::ONE;
            }
            ParticleGroup::Dust => {
                let angle = i * 0.1 + ctx.time * 0.2;
                let r = 15.0 + 5.0 * i.sin();
                target.position = Vec3::new(r * angle.cos(), 20.0 * (0.5 * i).sin(), r * angle.sin());
            }
            ParticleGroup::Photo => {
                let slot = (index % 10) as f32;
                let angle = slot * TAU / 10.0 + ctx.time * 0.1;
                target.position = Vec3::new(18.0 * angle.cos(), 10.0 * i.sin(), 18.0 * angle.sin());
                target.rotation.y = angle + FRAC_PI_2;
                target.scale = Vec3::ONE;
            }
        },
        AppMode::Scatter => {
            let angle = i + 0.1 * ctx.time;
            let r = 10.0 + (index % 15) as f32;
            target.position = Vec3::new(r * angle.cos(), r * (0.7 * i).sin(), r * angle.sin());
            target.scale = Vec3::ONE;
        }
        AppMode::Focus => {
            if ctx.focus == Some(index) {
                target.position = FOCUS_POSITION;
                target.rotation = Vec3::ZERO;
                target.scale = Vec3::splat(FOCUS_SCALE);
            } else {
                let direction = particle
                    .live
                    .position
                    .try_normalize()
                    .unwrap_or_else(|| fallback_direction(index));
                target.position = direction * PUSH_RADIUS;
                target.scale = Vec3::splat(PUSH_SCALE);
            }
        }
    }

    target
}

/// Unit direction for a particle sitting on the origin. Consecutive indices
/// spiral over the sphere so pushed-out particles don't pile up on one point.
pub fn fallback_direction(index: usize) -> Vec3 {
    let i = index as f32;
    let y = 1.0 - 2.0 * (i * GOLDEN_FRACTION + 0.5).fract();
    let ring = (1.0 - y * y).max(0.0).sqrt();
    let theta = i * GOLDEN_ANGLE;
    Vec3::new(ring * theta.cos(), y, ring * theta.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::particle::{Material, ParticleKind};

    fn particle(group: ParticleGroup, position: Vec3) -> Particle {
        let kind = match group {
            ParticleGroup::Photo => ParticleKind::Photo,
            _ => ParticleKind::Sphere,
        };
        Particle::new(0, kind, group, position, Vec3::ZERO, Material::gold())
    }

    fn ctx(mode: AppMode) -> PlacementContext {
        PlacementContext {
            mode,
            time: 0.0,
            tree_count: 1500,
            focus: None,
        }
    }

    #[test]
    fn test_tree_spiral_ends() {
        let p = particle(ParticleGroup::Tree, Vec3::ZERO);

        let bottom = target_pose(&p, 0, &ctx(AppMode::Tree));
        assert!(bottom.position.abs_diff_eq(Vec3::new(12.0, -10.0, 0.0), 1e-5));
        assert_eq!(bottom.scale, Vec3::ONE);

        let top = target_pose(&p, 1499, &ctx(AppMode::Tree));
        assert!(top.position.abs_diff_eq(Vec3::new(0.0, 15.0, 0.0), 0.05));
    }

    #[test]
    fn test_tree_rotation_follows_spiral() {
        let p = particle(ParticleGroup::Tree, Vec3::ZERO);
        let pose = target_pose(&p, 300, &ctx(AppMode::Tree));
        let angle = (300.0 / 1500.0) * 50.0 * PI;
        assert!((pose.rotation.y - angle).abs() < 1e-4);
        assert_eq!(pose.rotation.x, 0.0);
    }

    #[test]
    fn test_dust_orbits_and_keeps_rotation() {
        let mut p = particle(ParticleGroup::Dust, Vec3::ZERO);
        p.target.rotation = Vec3::new(0.1, 0.2, 0.3);
        p.target.scale = Vec3::splat(0.2);

        let mut context = ctx(AppMode::Tree);
        context.time = 2.0;
        let pose = target_pose(&p, 1600, &context);

        let angle = 1600.0f32 * 0.1 + 0.4;
        let r = 15.0 + 5.0 * 1600.0f32.sin();
        assert!((pose.position.x - r * angle.cos()).abs() < 1e-3);
        assert!((pose.position.y - 20.0 * 800.0f32.sin()).abs() < 1e-3);
        assert_eq!(pose.rotation, Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(pose.scale, Vec3::splat(0.2));
    }

    #[test]
    fn test_photo_ring_faces_outward() {
        let mut p = particle(ParticleGroup::Photo, Vec3::ZERO);
        p.target.rotation = Vec3::new(0.5, 0.0, -0.5);

        let pose = target_pose(&p, 4000, &ctx(AppMode::Tree));
        // 4000 % 10 == 0
        assert!(pose.position.abs_diff_eq(Vec3::new(18.0, 10.0 * 4000.0f32.sin(), 0.0), 1e-3));
        assert!((pose.rotation.y - FRAC_PI_2).abs() < 1e-6);
        assert_eq!(pose.rotation.x, 0.5);
        assert_eq!(pose.rotation.z, -0.5);
    }

    #[test]
    fn test_scatter_shell() {
        let mut p = particle(ParticleGroup::Tree, Vec3::ZERO);
        p.target.rotation = Vec3::new(1.0, 2.0, 3.0);
        let pose = target_pose(&p, 17, &ctx(AppMode::Scatter));

        let r = 10.0 + 2.0;
        let angle = 17.0f32;
        assert!(pose.position.abs_diff_eq(
            Vec3::new(r * angle.cos(), r * (0.7 * 17.0f32).sin(), r * angle.sin()),
            1e-4
        ));
        assert_eq!(pose.rotation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(pose.scale, Vec3::ONE);
    }

    #[test]
    fn test_focus_brings_photo_forward() {
        let p = particle(ParticleGroup::Photo, Vec3::new(5.0, 5.0, 5.0));
        let mut context = ctx(AppMode::Focus);
        context.focus = Some(4000);

        let pose = target_pose(&p, 4000, &context);
        assert_eq!(pose.position, FOCUS_POSITION);
        assert_eq!(pose.rotation, Vec3::ZERO);
        assert_eq!(pose.scale, Vec3::splat(FOCUS_SCALE));
    }

    #[test]
    fn test_focus_pushes_others_out() {
        let mut context = ctx(AppMode::Focus);
        context.focus = Some(4000);

        let p = particle(ParticleGroup::Tree, Vec3::new(3.0, 0.0, 4.0));
        let pose = target_pose(&p, 10, &context);
        assert!(pose.position.abs_diff_eq(Vec3::new(30.0, 0.0, 40.0), 1e-4));
        assert_eq!(pose.scale, Vec3::splat(PUSH_SCALE));

        // A second photo is pushed out like everything else
        let other = particle(ParticleGroup::Photo, Vec3::new(0.0, -2.0, 0.0));
        let pose = target_pose(&other, 4001, &context);
        assert!(pose.position.abs_diff_eq(Vec3::new(0.0, -50.0, 0.0), 1e-4));
    }

    #[test]
    fn test_focus_origin_spreads_by_index() {
        let context = ctx(AppMode::Focus);
        let p = particle(ParticleGroup::Dust, Vec3::ZERO);

        let positions: Vec<Vec3> = (1500..1600)
            .map(|index| target_pose(&p, index, &context).position)
            .collect();

        for position in &positions {
            assert!((position.length() - PUSH_RADIUS).abs() < 1e-3);
        }
        // No two particles share a target
        for (a, pa) in positions.iter().enumerate() {
            for pb in &positions[a + 1..] {
                assert!(pa.distance(*pb) > 0.2);
            }
        }
        // Stable for the same index
        assert_eq!(target_pose(&p, 1500, &context), target_pose(&p, 1500, &context));
    }

    #[test]
    fn test_fallback_direction_is_unit() {
        for index in [0, 1, 7, 1499, 4000] {
            assert!((fallback_direction(index).length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_placement_is_deterministic() {
        let p = particle(ParticleGroup::Dust, Vec3::ONE);
        let mut context = ctx(AppMode::Tree);
        context.time = 12.5;
        assert_eq!(target_pose(&p, 2000, &context), target_pose(&p, 2000, &context));
    }
}
