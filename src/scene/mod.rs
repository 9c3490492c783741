//! Particle scene
//!
//! Owns the particle registry and runs the per-frame update: placement
//! computes every target pose for the current mode, then interpolation eases
//! live poses toward them. Only the event-loop thread touches it.

pub mod builder;
pub mod interpolation;
pub mod particle;
pub mod placement;
pub mod registry;

pub use builder::{SceneBuilder, SceneTextures};
pub use particle::{Material, Particle, ParticleGroup, ParticleKind, Pose};
pub use placement::PlacementContext;
pub use registry::ParticleRegistry;

use glam::Vec3;
use rand::rngs::StdRng;

use crate::gesture::AppMode;
use crate::settings::SceneSettings;

/// The animated particle scene
pub struct Scene {
    registry: ParticleRegistry,
    easing: f32,
    rng: StdRng,
}

impl Scene {
    /// Populate a new scene
    pub fn new(settings: &SceneSettings, textures: SceneTextures) -> Self {
        let (registry, rng) = SceneBuilder::new(settings).build(textures);
        Self {
            registry,
            easing: settings.easing_factor,
            rng,
        }
    }

    /// Append a photo showing `texture`. Returns its id.
    pub fn add_photo(&mut self, texture: usize) -> u64 {
        let velocity = builder::random_velocity(&mut self.rng, builder::PHOTO_SPIN);
        self.registry.append_photo(texture, Vec3::ZERO, velocity)
    }

    /// Advance one frame: place targets for `mode`, then ease toward them
    pub fn step(&mut self, mode: AppMode, time: f32) {
        let ctx = PlacementContext {
            mode,
            time,
            tree_count: self.registry.tree_count(),
            focus: self.registry.focus_target(),
        };

        for (index, particle) in self.registry.iter_mut().enumerate() {
            particle.target = placement::target_pose(particle, index, &ctx);
            interpolation::ease_particle(particle, mode, self.easing);
        }
    }

    pub fn registry(&self) -> &ParticleRegistry {
        &self.registry
    }

    pub fn particle_count(&self) -> usize {
        self.registry.len()
    }

    pub fn photo_count(&self) -> usize {
        self.registry.iter().filter(|p| p.kind == ParticleKind::Photo).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> Scene {
        let settings = SceneSettings {
            tree_particles: 100,
            dust_particles: 20,
            seed: Some(42),
            ..Default::default()
        };
        Scene::new(
            &settings,
            SceneTextures {
                candy: Some(0),
                default_photo: Some(1),
            },
        )
    }

    #[test]
    fn test_tree_mode_gathers_spiral() {
        let mut scene = scene();
        for frame in 0..400 {
            scene.step(AppMode::Tree, frame as f32 / 60.0);
        }
        let first = scene.registry().get(0).unwrap();
        assert!(first.live.position.abs_diff_eq(Vec3::new(12.0, -10.0, 0.0), 1e-3));
    }

    #[test]
    fn test_focus_mode_brings_first_photo_forward() {
        let mut scene = scene();
        let second = scene.add_photo(2);
        assert_eq!(scene.photo_count(), 2);

        for frame in 0..400 {
            scene.step(AppMode::Focus, frame as f32 / 60.0);
        }

        let focus = scene.registry().focus_target().unwrap();
        assert_eq!(focus, 120);
        let focused = scene.registry().get(focus).unwrap();
        assert!(focused.live.position.abs_diff_eq(placement::FOCUS_POSITION, 1e-3));
        assert!((focused.live.scale.x - placement::FOCUS_SCALE).abs() < 1e-3);

        let other = scene.registry().iter().find(|p| p.id == second).unwrap();
        assert!((other.live.position.length() - placement::PUSH_RADIUS).abs() < 0.5);
    }

    #[test]
    fn test_scatter_spins_live_rotation() {
        let mut scene = scene();
        let before: Vec<Vec3> = scene.registry().iter().map(|p| p.live.rotation).collect();
        scene.step(AppMode::Scatter, 0.0);
        for (p, rotation) in scene.registry().iter().zip(before) {
            assert!((p.live.rotation - (rotation + p.velocity)).length() < 1e-6);
        }
    }

    #[test]
    fn test_add_photo_appends_one() {
        let mut scene = scene();
        let count = scene.particle_count();
        scene.add_photo(3);
        assert_eq!(scene.particle_count(), count + 1);
        let last = scene.registry().get(count).unwrap();
        assert_eq!(last.kind, ParticleKind::Photo);
        assert_eq!(last.material.texture, Some(3));
    }
}
