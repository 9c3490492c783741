//! Mesh generation for particle shapes
//!
//! Boxes, UV spheres, the candy-cane tube and the flat picture plane. All
//! meshes are centered on their local origin except the tube, which starts
//! at the first curve point.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::f32::consts::{PI, TAU};

/// Vertex for particle meshes
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshVertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Unit normal
    pub normal: [f32; 3],
    /// Texture coordinates, v = 0 at the top
    pub uv: [f32; 2],
}

impl MeshVertex {
    /// Size of vertex in bytes
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Vertex buffer layout for wgpu
    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // normal
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // uv
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Generated mesh data
#[derive(Default)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Axis-aligned box
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let half = Vec3::new(width, height, depth) * 0.5;
        let mut mesh = Self::default();

        // (normal, u axis, v axis) per face; v points down the face
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::NEG_Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::NEG_Y),
            (Vec3::Y, Vec3::X, Vec3::Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::Z, Vec3::X, Vec3::NEG_Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::NEG_Y),
        ];

        for (normal, u_axis, v_axis) in faces {
            let base = mesh.vertices.len() as u32;
            for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let local = normal + u_axis * (u * 2.0 - 1.0) + v_axis * (v * 2.0 - 1.0);
                mesh.vertices.push(MeshVertex {
                    position: (local * half).into(),
                    normal: normal.into(),
                    uv: [u, v],
                });
            }
            // Corners go counter-clockwise seen from outside
            mesh.indices.extend_from_slice(&[base, base + 3, base + 2, base, base + 2, base + 1]);
        }

        mesh
    }

    /// UV sphere
    pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);
        let mut mesh = Self::default();

        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            let theta = v * PI;
            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let phi = u * TAU;
                let normal = Vec3::new(-phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin());
                mesh.vertices.push(MeshVertex {
                    position: (normal * radius).into(),
                    normal: normal.into(),
                    uv: [u, v],
                });
            }
        }

        let row = width_segments + 1;
        for iy in 0..height_segments {
            for ix in 0..width_segments {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                // Poles collapse to a single triangle
                if iy != 0 {
                    mesh.indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height_segments - 1 {
                    mesh.indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        mesh
    }

    /// Flat rectangle in the XY plane facing +Z
    pub fn plane(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        let corner = |x: f32, y: f32, u: f32, v: f32| MeshVertex {
            position: [x, y, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [u, v],
        };
        Self {
            vertices: vec![
                corner(-hw, hh, 0.0, 0.0),
                corner(hw, hh, 1.0, 0.0),
                corner(hw, -hh, 1.0, 1.0),
                corner(-hw, -hh, 0.0, 1.0),
            ],
            indices: vec![0, 3, 2, 0, 2, 1],
        }
    }

    /// Tube of constant radius along a Catmull-Rom curve through `points`
    pub fn tube(points: &[Vec3], tubular_segments: u32, radius: f32, radial_segments: u32) -> Self {
        let tubular_segments = tubular_segments.max(1);
        let radial_segments = radial_segments.max(3);
        let mut mesh = Self::default();
        if points.len() < 2 {
            return mesh;
        }

        let samples: Vec<Vec3> = (0..=tubular_segments)
            .map(|i| catmull_rom(points, i as f32 / tubular_segments as f32))
            .collect();

        // Tangents by finite differences, frames by parallel transport
        let tangents: Vec<Vec3> = (0..samples.len())
            .map(|i| {
                let prev = samples[i.saturating_sub(1)];
                let next = samples[(i + 1).min(samples.len() - 1)];
                (next - prev).try_normalize().unwrap_or(Vec3::Y)
            })
            .collect();

        let mut normal = tangents[0].any_orthonormal_vector();
        let mut frames = Vec::with_capacity(samples.len());
        for (i, &tangent) in tangents.iter().enumerate() {
            if i > 0 {
                let axis = tangents[i - 1].cross(tangent);
                if axis.length_squared() > 1e-12 {
                    let angle = tangents[i - 1].dot(tangent).clamp(-1.0, 1.0).acos();
                    normal = glam::Quat::from_axis_angle(axis.normalize(), angle) * normal;
                }
            }
            let binormal = tangent.cross(normal).normalize();
            frames.push((normal, binormal));
        }

        for (i, (&center, &(n, b))) in samples.iter().zip(&frames).enumerate() {
            for j in 0..=radial_segments {
                let angle = j as f32 / radial_segments as f32 * TAU;
                let dir = (n * angle.cos() + b * angle.sin()).normalize();
                mesh.vertices.push(MeshVertex {
                    position: (center + dir * radius).into(),
                    normal: dir.into(),
                    uv: [i as f32 / tubular_segments as f32, j as f32 / radial_segments as f32],
                });
            }
        }

        let row = radial_segments + 1;
        for i in 1..=tubular_segments {
            for j in 1..=radial_segments {
                let a = row * (i - 1) + (j - 1);
                let b = row * i + (j - 1);
                let c = row * i + j;
                let d = row * (i - 1) + j;
                mesh.indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        mesh
    }

    /// The candy-cane hook
    pub fn candy_cane() -> Self {
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::new(0.0, 0.8, 0.0),
            Vec3::new(0.1, 0.95, 0.0),
            Vec3::new(0.3, 0.9, 0.0),
            Vec3::new(0.35, 0.7, 0.0),
        ];
        Self::tube(&points, 20, 0.05, 8)
    }
}

/// Point on an open uniform Catmull-Rom spline at `t` in [0, 1]
pub fn catmull_rom(points: &[Vec3], t: f32) -> Vec3 {
    let n = points.len();
    match n {
        0 => return Vec3::ZERO,
        1 => return points[0],
        _ => {}
    }

    let scaled = t.clamp(0.0, 1.0) * (n - 1) as f32;
    let i = (scaled.floor() as usize).min(n - 2);
    let w = scaled - i as f32;

    let p1 = points[i];
    let p2 = points[i + 1];
    // Endpoints are extended by reflection
    let p0 = if i == 0 { p1 * 2.0 - p2 } else { points[i - 1] };
    let p3 = if i + 2 < n { points[i + 2] } else { p2 * 2.0 - p1 };

    let w2 = w * w;
    let w3 = w2 * w;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * w
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * w2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * w3)
}
