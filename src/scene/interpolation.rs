//! Easing live poses toward their targets

use super::particle::Particle;
use crate::gesture::AppMode;

/// Fraction of the remaining distance covered each frame
pub const DEFAULT_EASING: f32 = 0.05;

/// Advance one particle by one frame
pub fn ease_particle(particle: &mut Particle, mode: AppMode, factor: f32) {
    let live = &mut particle.live;
    let target = &particle.target;

    live.position += (target.position - live.position) * factor;
    live.scale += (target.scale - live.scale) * factor;

    if mode == AppMode::Scatter {
        live.rotation += particle.velocity;
    } else {
        live.rotation += (target.rotation - live.rotation) * factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::particle::{Material, ParticleGroup, ParticleKind, Pose};
    use glam::Vec3;

    fn particle() -> Particle {
        let mut p = Particle::new(
            0,
            ParticleKind::Box,
            ParticleGroup::Tree,
            Vec3::ZERO,
            Vec3::new(0.01, -0.02, 0.03),
            Material::green(),
        );
        p.target = Pose {
            position: Vec3::new(10.0, -4.0, 2.0),
            rotation: Vec3::new(0.0, 3.0, 0.0),
            scale: Vec3::splat(4.5),
        };
        p
    }

    #[test]
    fn test_single_step() {
        let mut p = particle();
        ease_particle(&mut p, AppMode::Tree, DEFAULT_EASING);
        assert!(p.live.position.abs_diff_eq(Vec3::new(0.5, -0.2, 0.1), 1e-6));
        assert!((p.live.rotation.y - 0.15).abs() < 1e-6);
        assert!((p.live.scale.x - (1.0 + 3.5 * 0.05)).abs() < 1e-6);
    }

    #[test]
    fn test_converges_monotonically() {
        let mut p = particle();
        let mut previous = (p.target.position - p.live.position).length();
        for _ in 0..200 {
            ease_particle(&mut p, AppMode::Focus, DEFAULT_EASING);
            let remaining = (p.target.position - p.live.position).length();
            assert!(remaining < previous);
            previous = remaining;
        }
        assert!(previous < 10.8 * 0.95f32.powi(199));
    }

    #[test]
    fn test_scatter_spins_by_velocity() {
        let mut p = particle();
        for _ in 0..10 {
            ease_particle(&mut p, AppMode::Scatter, DEFAULT_EASING);
        }
        assert!(p.live.rotation.abs_diff_eq(Vec3::new(0.1, -0.2, 0.3), 1e-5));
        // Position still eases
        assert!(p.live.position.x > 0.0);
    }
}
