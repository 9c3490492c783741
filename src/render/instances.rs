//! Per-frame instance data
//!
//! Particles are grouped into draw batches by mesh, texture and blending so
//! each batch is one instanced draw call. Opaque batches come first.

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::scene::{Particle, ParticleGroup, ParticleKind, Pose};

/// Picture plane offset in front of the frame
pub const PICTURE_OFFSET: f32 = 0.11;

/// Meshes the renderer keeps on the GPU
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeshId {
    Box,
    Sphere,
    Candy,
    Dust,
    Frame,
    Picture,
}

impl MeshId {
    /// All meshes, in buffer order
    pub const ALL: [MeshId; 6] = [
        MeshId::Box,
        MeshId::Sphere,
        MeshId::Candy,
        MeshId::Dust,
        MeshId::Frame,
        MeshId::Picture,
    ];
}

/// Instance attributes
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InstanceRaw {
    /// Model matrix columns
    pub model: [[f32; 4]; 4],
    /// Linear RGB tint and opacity
    pub color: [f32; 4],
    /// Metalness, roughness, clearcoat, unlit
    pub material: [f32; 4],
}

impl InstanceRaw {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Instance buffer layout, locations 3 to 8
    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
            3 => Float32x4,
            4 => Float32x4,
            5 => Float32x4,
            6 => Float32x4,
            7 => Float32x4,
            8 => Float32x4
        ];
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

/// One instanced draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Batch {
    pub mesh: MeshId,
    /// Texture table slot
    pub texture: usize,
    /// Alpha blended, drawn without depth writes
    pub blended: bool,
    /// First instance in the buffer
    pub start: u32,
    pub count: u32,
}

/// Instances for a frame, contiguous per batch
#[derive(Default)]
pub struct FrameInstances {
    pub instances: Vec<InstanceRaw>,
    pub batches: Vec<Batch>,
}

/// Model matrix for a pose
pub fn pose_matrix(pose: &Pose) -> Mat4 {
    let rotation = Quat::from_euler(EulerRot::XYZ, pose.rotation.x, pose.rotation.y, pose.rotation.z);
    Mat4::from_scale_rotation_translation(pose.scale, rotation, pose.position)
}

/// Build the instance list for all particles, transformed by `group`
pub fn collect_instances(particles: &[Particle], group: Mat4, white_texture: usize) -> FrameInstances {
    let mut buckets: BTreeMap<(bool, MeshId, usize), Vec<InstanceRaw>> = BTreeMap::new();

    for particle in particles {
        let model = group * pose_matrix(&particle.live);
        let material = &particle.material;
        let params = [
            material.metalness,
            material.roughness,
            material.clearcoat,
            if material.unlit { 1.0 } else { 0.0 },
        ];
        let color = particle.base_color.extend(material.opacity).to_array();

        match particle.kind {
            ParticleKind::Photo => {
                buckets
                    .entry((false, MeshId::Frame, white_texture))
                    .or_default()
                    .push(InstanceRaw {
                        model: model.to_cols_array_2d(),
                        color,
                        material: params,
                    });

                let picture = model * Mat4::from_translation(Vec3::new(0.0, 0.0, PICTURE_OFFSET));
                buckets
                    .entry((false, MeshId::Picture, material.texture.unwrap_or(white_texture)))
                    .or_default()
                    .push(InstanceRaw {
                        model: picture.to_cols_array_2d(),
                        color: [1.0, 1.0, 1.0, 1.0],
                        material: [0.0, 1.0, 0.0, 1.0],
                    });
            }
            kind => {
                let mesh = match (kind, particle.group) {
                    (ParticleKind::Box, _) => MeshId::Box,
                    (ParticleKind::Candy, _) => MeshId::Candy,
                    (_, ParticleGroup::Dust) => MeshId::Dust,
                    _ => MeshId::Sphere,
                };
                let blended = material.opacity < 1.0;
                let texture = material.texture.unwrap_or(white_texture);
                buckets.entry((blended, mesh, texture)).or_default().push(InstanceRaw {
                    model: model.to_cols_array_2d(),
                    color,
                    material: params,
                });
            }
        }
    }

    let mut frame = FrameInstances::default();
    for ((blended, mesh, texture), instances) in buckets {
        frame.batches.push(Batch {
            mesh,
            texture,
            blended,
            start: frame.instances.len() as u32,
            count: instances.len() as u32,
        });
        frame.instances.extend(instances);
    }
    frame
}
