//! Scene renderer
//!
//! Draws every particle as an instanced mesh into an HDR target with a depth
//! buffer, then hands off to [`post::PostProcess`] for bloom and tone mapping.

pub mod camera;
pub mod instances;
pub mod mesh;
pub mod post;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use camera::SceneCamera;
use instances::{collect_instances, InstanceRaw, MeshId};
use mesh::{Mesh, MeshVertex};
use post::{PostProcess, HDR_FORMAT};

use crate::scene::particle::hex_color;
use crate::scene::Particle;
use crate::settings::RenderSettings;

/// Slot of the 1x1 white texture used by untextured materials
pub const WHITE_TEXTURE: usize = 0;

/// Light in the scene uniform block
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct LightRaw {
    /// xyz position, w = 1 for a spot light aimed at the origin
    position: [f32; 4],
    /// rgb * intensity
    color: [f32; 4],
}

impl LightRaw {
    fn new(position: Vec3, hex: u32, intensity: f32, spot: bool) -> Self {
        Self {
            position: position.extend(if spot { 1.0 } else { 0.0 }).to_array(),
            color: (hex_color(hex) * intensity).extend(1.0).to_array(),
        }
    }
}

/// Scene uniform buffer data
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SceneUniforms {
    view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    ambient: [f32; 4],
    lights: [LightRaw; 3],
}

/// Warm point light in the tree and two spot lights (gold, blue)
fn scene_lights() -> [LightRaw; 3] {
    [
        LightRaw::new(Vec3::new(0.0, 5.0, 0.0), 0xffaa44, 2.0, false),
        LightRaw::new(Vec3::new(30.0, 40.0, 40.0), 0xd4af37, 1200.0, true),
        LightRaw::new(Vec3::new(-30.0, 20.0, -30.0), 0x4488ff, 600.0, true),
    ]
}

/// Mesh uploaded to the GPU
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, label: &str, mesh: &Mesh) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", label)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", label)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }
}

/// Mesh geometry for each [`MeshId`]
fn build_mesh(id: MeshId) -> Mesh {
    match id {
        MeshId::Box => Mesh::cuboid(0.5, 0.5, 0.5),
        MeshId::Sphere => Mesh::uv_sphere(0.3, 16, 16),
        MeshId::Candy => Mesh::candy_cane(),
        MeshId::Dust => Mesh::uv_sphere(0.02, 4, 4),
        MeshId::Frame => Mesh::cuboid(4.2, 4.2, 0.2),
        MeshId::Picture => Mesh::plane(4.0, 4.0),
    }
}

/// Texture with its bind group
struct TextureSlot {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// GPU renderer for the particle scene
pub struct Renderer {
    opaque_pipeline: wgpu::RenderPipeline,
    blended_pipeline: wgpu::RenderPipeline,
    scene_bind_group: wgpu::BindGroup,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,

    meshes: Vec<GpuMesh>,
    textures: Vec<TextureSlot>,

    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,

    camera: SceneCamera,
    post: PostProcess,
}

impl Renderer {
    /// Create a renderer for a surface of the given format and size
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        settings: &RenderSettings,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/scene.wgsl").into()),
        });

        // Group 0: scene uniforms
        let scene_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        // Group 1: [0] base texture, [1] sampler
        let texture_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&scene_bind_group_layout, &texture_bind_group_layout],
            push_constant_ranges: &[],
        });

        let scene_pipeline = |label: &str, blend: wgpu::BlendState, depth_write: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[MeshVertex::buffer_layout(), InstanceRaw::buffer_layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: HDR_FORMAT,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // The picture plane and tube ends are seen from both sides
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: wgpu::TextureFormat::Depth32Float,
                    depth_write_enabled: depth_write,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let opaque_pipeline = scene_pipeline("Opaque Scene Pipeline", wgpu::BlendState::REPLACE, true);
        let blended_pipeline = scene_pipeline("Blended Scene Pipeline", wgpu::BlendState::ALPHA_BLENDING, false);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniform Buffer"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &scene_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Scene Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let meshes = MeshId::ALL
            .iter()
            .map(|&id| GpuMesh::upload(device, &format!("{:?}", id), &build_mesh(id)))
            .collect();

        let instance_capacity = 4096;
        let instance_buffer = Self::create_instance_buffer(device, instance_capacity);

        let camera = SceneCamera::new(
            Vec3::from(settings.camera_position),
            settings.fov_degrees,
            width.max(1) as f32 / height.max(1) as f32,
        );
        let post = PostProcess::new(device, surface_format, width, height, *settings);

        let mut renderer = Self {
            opaque_pipeline,
            blended_pipeline,
            scene_bind_group,
            texture_bind_group_layout,
            uniform_buffer,
            sampler,
            meshes,
            textures: Vec::new(),
            instance_buffer,
            instance_capacity,
            camera,
            post,
        };

        let white = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        let slot = renderer.add_texture(device, queue, &white, "White");
        debug_assert_eq!(slot, WHITE_TEXTURE);

        renderer
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: capacity as u64 * InstanceRaw::SIZE,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Upload an sRGB image and return its texture slot
    pub fn add_texture(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, image: &RgbaImage, label: &str) -> usize {
        let (width, height) = image.dimensions();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        self.textures.push(TextureSlot {
            _texture: texture,
            bind_group,
        });
        log::debug!("Texture '{}' uploaded ({}x{}) to slot {}", label, width, height, self.textures.len() - 1);
        self.textures.len() - 1
    }

    /// Update projection and size-dependent targets
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.camera.set_aspect(width, height);
        self.post.resize(device, width, height);
    }

    /// Draw the particles, transformed by `group`, then post-process into `output`
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        particles: &[Particle],
        group: Mat4,
    ) {
        let uniforms = SceneUniforms {
            view_proj: self.camera.view_projection_matrix().to_cols_array_2d(),
            camera_pos: self.camera.position.extend(1.0).to_array(),
            ambient: [0.6, 0.6, 0.6, 1.0],
            lights: scene_lights(),
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let frame = collect_instances(particles, group, WHITE_TEXTURE);
        if frame.instances.len() > self.instance_capacity {
            self.instance_capacity = frame.instances.len().next_power_of_two();
            self.instance_buffer = Self::create_instance_buffer(device, self.instance_capacity);
            log::debug!("Instance buffer grown to {}", self.instance_capacity);
        }
        if !frame.instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&frame.instances));
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.post.hdr_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.post.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.scene_bind_group, &[]);
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));

            for batch in &frame.batches {
                let Some(texture) = self.textures.get(batch.texture) else {
                    continue;
                };
                let mesh = &self.meshes[batch.mesh as usize];

                render_pass.set_pipeline(if batch.blended {
                    &self.blended_pipeline
                } else {
                    &self.opaque_pipeline
                });
                render_pass.set_bind_group(1, &texture.bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, batch.start..batch.start + batch.count);
            }
        }

        self.post.run(encoder, queue, output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout() {
        // mat4 + 2 vec4 + 3 lights of 2 vec4
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 64 + 32 + 96);
    }

    #[test]
    fn test_mesh_table_order() {
        for (i, id) in MeshId::ALL.iter().enumerate() {
            assert_eq!(*id as usize, i);
        }
    }

    #[test]
    fn test_lights() {
        let lights = scene_lights();
        assert_eq!(lights[0].position, [0.0, 5.0, 0.0, 0.0]);
        assert_eq!(lights[1].position[3], 1.0);
        assert_eq!(lights[2].position, [-30.0, 20.0, -30.0, 1.0]);
    }
}
