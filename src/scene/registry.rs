//! Append-only particle storage

use std::time::{SystemTime, UNIX_EPOCH};

use glam::Vec3;

use super::particle::{Material, Particle, ParticleGroup, ParticleKind};

/// Ordered list of particles. Order is stable and nothing is ever removed.
#[derive(Default)]
pub struct ParticleRegistry {
    particles: Vec<Particle>,
    tree_count: usize,
    /// Highest id handed out so far
    last_id: Option<u64>,
}

impl ParticleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tree or dust particle. Its id is its index.
    pub fn push(&mut self, mut particle: Particle) -> u64 {
        let id = self.particles.len() as u64;
        particle.id = id;
        if particle.group == ParticleGroup::Tree {
            self.tree_count += 1;
        }
        self.last_id = Some(self.last_id.map_or(id, |last| last.max(id)));
        self.particles.push(particle);
        id
    }

    /// Append a photo particle at `position`, id taken from the wall clock
    pub fn append_photo(&mut self, texture: usize, position: Vec3, velocity: Vec3) -> u64 {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.append_photo_with_id(now_ms, texture, position, velocity)
    }

    /// Append a photo particle with a requested id, bumped past any id in use
    pub fn append_photo_with_id(
        &mut self,
        requested: u64,
        texture: usize,
        position: Vec3,
        velocity: Vec3,
    ) -> u64 {
        let id = match self.last_id {
            Some(last) if requested <= last => last + 1,
            _ => requested,
        };
        self.last_id = Some(id);

        self.particles.push(Particle::new(
            id,
            ParticleKind::Photo,
            ParticleGroup::Photo,
            position,
            velocity,
            Material::photo(texture),
        ));
        log::info!("Photo {} added ({} particles)", id, self.particles.len());
        id
    }

    /// Index of the photo brought forward in focus mode
    pub fn focus_target(&self) -> Option<usize> {
        self.particles.iter().position(|p| p.kind == ParticleKind::Photo)
    }

    /// Number of tree-group particles
    pub fn tree_count(&self) -> usize {
        self.tree_count
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Particle> {
        self.particles.iter_mut()
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ornament(group: ParticleGroup) -> Particle {
        Particle::new(0, ParticleKind::Box, group, Vec3::ZERO, Vec3::ZERO, Material::gold())
    }

    fn small_registry() -> ParticleRegistry {
        let mut registry = ParticleRegistry::new();
        for _ in 0..3 {
            registry.push(ornament(ParticleGroup::Tree));
        }
        for _ in 0..2 {
            registry.push(ornament(ParticleGroup::Dust));
        }
        registry
    }

    #[test]
    fn test_push_assigns_index_ids() {
        let registry = small_registry();
        let ids: Vec<u64> = registry.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(registry.tree_count(), 3);
    }

    #[test]
    fn test_append_photo_keeps_existing() {
        let mut registry = small_registry();
        let before: Vec<(u64, ParticleKind)> = registry.iter().map(|p| (p.id, p.kind)).collect();

        registry.append_photo(0, Vec3::ZERO, Vec3::ZERO);

        assert_eq!(registry.len(), before.len() + 1);
        let last = registry.get(registry.len() - 1).unwrap();
        assert_eq!(last.kind, ParticleKind::Photo);
        assert_eq!(last.group, ParticleGroup::Photo);
        let after: Vec<(u64, ParticleKind)> =
            registry.iter().take(before.len()).map(|p| (p.id, p.kind)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_photo_ids_strictly_increase() {
        let mut registry = small_registry();
        let a = registry.append_photo_with_id(1_000, 0, Vec3::ZERO, Vec3::ZERO);
        // Same millisecond, then a clock step backwards
        let b = registry.append_photo_with_id(1_000, 1, Vec3::ZERO, Vec3::ZERO);
        let c = registry.append_photo_with_id(500, 2, Vec3::ZERO, Vec3::ZERO);
        assert_eq!(a, 1_000);
        assert_eq!(b, 1_001);
        assert_eq!(c, 1_002);

        // Never collides with index ids either
        let mut registry = small_registry();
        let id = registry.append_photo_with_id(2, 0, Vec3::ZERO, Vec3::ZERO);
        assert_eq!(id, 5);
    }

    #[test]
    fn test_focus_target_is_first_photo() {
        let mut registry = small_registry();
        assert_eq!(registry.focus_target(), None);

        registry.append_photo_with_id(10, 0, Vec3::ZERO, Vec3::ZERO);
        registry.append_photo_with_id(20, 1, Vec3::ZERO, Vec3::ZERO);
        assert_eq!(registry.focus_target(), Some(5));
        assert_eq!(registry.focus_target(), Some(5));

        registry.append_photo_with_id(30, 2, Vec3::ZERO, Vec3::ZERO);
        assert_eq!(registry.focus_target(), Some(5));
    }
}
