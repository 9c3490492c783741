//! Bloom and tone mapping
//!
//! The scene is drawn into an HDR texture. A bright pass and a separable blur
//! run at half resolution, then the composite pass adds the bloom, applies
//! exposure and Reinhard tone mapping, and writes to the surface.

use bytemuck::{Pod, Zeroable};

use crate::settings::RenderSettings;

/// Format of the HDR scene target and bloom textures
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Post-process uniform block
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PostParams {
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
    pub exposure: f32,
    pub direction: [f32; 2],
    pub texel_size: [f32; 2],
}

impl PostParams {
    /// Parameters for one pass at the given target size
    pub fn for_pass(settings: &RenderSettings, direction: [f32; 2], width: u32, height: u32) -> Self {
        Self {
            threshold: settings.bloom_threshold,
            strength: settings.bloom_strength,
            radius: settings.bloom_radius,
            exposure: settings.exposure,
            direction,
            texel_size: [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32],
        }
    }
}

/// Half-resolution bloom size for a surface size
pub fn bloom_size(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// Render targets that depend on the surface size
struct Targets {
    hdr_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    bloom_a: wgpu::TextureView,
    bloom_b: wgpu::TextureView,
    threshold_group: wgpu::BindGroup,
    blur_h_group: wgpu::BindGroup,
    blur_v_group: wgpu::BindGroup,
    composite_group: wgpu::BindGroup,
}

/// Post-processing chain
pub struct PostProcess {
    threshold_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    // One uniform buffer per pass: threshold, blur h, blur v, composite
    params_buffers: [wgpu::Buffer; 4],
    settings: RenderSettings,
    targets: Targets,
    width: u32,
    height: u32,
}

impl PostProcess {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        settings: RenderSettings,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Post Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/post.wgsl").into()),
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        // Bind group layout: [0] source, [1] bloom, [2] sampler, [3] params
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post Bind Group Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let fullscreen = |label: &str, entry_point: &str, format: wgpu::TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry_point),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let threshold_pipeline = fullscreen("Bloom Threshold Pipeline", "fs_threshold", HDR_FORMAT);
        let blur_pipeline = fullscreen("Bloom Blur Pipeline", "fs_blur", HDR_FORMAT);
        let composite_pipeline = fullscreen("Composite Pipeline", "fs_composite", surface_format);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let params_buffer = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: std::mem::size_of::<PostParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let params_buffers = [
            params_buffer("Threshold Params"),
            params_buffer("Blur H Params"),
            params_buffer("Blur V Params"),
            params_buffer("Composite Params"),
        ];

        let width = width.max(1);
        let height = height.max(1);
        let targets = Self::create_targets(device, &bind_group_layout, &sampler, &params_buffers, width, height);

        Self {
            threshold_pipeline,
            blur_pipeline,
            composite_pipeline,
            bind_group_layout,
            sampler,
            params_buffers,
            settings,
            targets,
            width,
            height,
        }
    }

    fn create_targets(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        params: &[wgpu::Buffer; 4],
        width: u32,
        height: u32,
    ) -> Targets {
        let texture = |label, width, height, format, usage| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };

        let sampled = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let hdr_view = texture("HDR Scene Texture", width, height, HDR_FORMAT, sampled);
        let depth_view = texture(
            "Scene Depth Texture",
            width,
            height,
            wgpu::TextureFormat::Depth32Float,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        let (bw, bh) = bloom_size(width, height);
        let bloom_a = texture("Bloom Texture A", bw, bh, HDR_FORMAT, sampled);
        let bloom_b = texture("Bloom Texture B", bw, bh, HDR_FORMAT, sampled);

        let group = |label, source: &wgpu::TextureView, bloom: &wgpu::TextureView, buffer: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(source),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(bloom),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: buffer.as_entire_binding(),
                    },
                ],
            })
        };

        // The unused bloom slot is bound to a texture not written by that pass
        let threshold_group = group("Threshold Bind Group", &hdr_view, &bloom_b, &params[0]);
        let blur_h_group = group("Blur H Bind Group", &bloom_a, &hdr_view, &params[1]);
        let blur_v_group = group("Blur V Bind Group", &bloom_b, &hdr_view, &params[2]);
        let composite_group = group("Composite Bind Group", &hdr_view, &bloom_a, &params[3]);

        Targets {
            hdr_view,
            depth_view,
            bloom_a,
            bloom_b,
            threshold_group,
            blur_h_group,
            blur_v_group,
            composite_group,
        }
    }

    /// Recreate size-dependent targets
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.width && height == self.height {
            return;
        }
        self.targets = Self::create_targets(
            device,
            &self.bind_group_layout,
            &self.sampler,
            &self.params_buffers,
            width,
            height,
        );
        self.width = width;
        self.height = height;
    }

    /// HDR color target the scene renders into
    pub fn hdr_view(&self) -> &wgpu::TextureView {
        &self.targets.hdr_view
    }

    /// Depth target matching the HDR target
    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.targets.depth_view
    }

    /// Run bloom and tone mapping into `output`
    pub fn run(&self, encoder: &mut wgpu::CommandEncoder, queue: &wgpu::Queue, output: &wgpu::TextureView) {
        let (bw, bh) = bloom_size(self.width, self.height);
        let passes = [
            PostParams::for_pass(&self.settings, [0.0, 0.0], self.width, self.height),
            PostParams::for_pass(&self.settings, [1.0, 0.0], bw, bh),
            PostParams::for_pass(&self.settings, [0.0, 1.0], bw, bh),
            PostParams::for_pass(&self.settings, [0.0, 0.0], self.width, self.height),
        ];
        for (buffer, params) in self.params_buffers.iter().zip(passes.iter()) {
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(params));
        }

        let t = &self.targets;
        Self::fullscreen_pass(encoder, "Bloom Threshold Pass", &t.bloom_a, &self.threshold_pipeline, &t.threshold_group);
        Self::fullscreen_pass(encoder, "Bloom Blur H Pass", &t.bloom_b, &self.blur_pipeline, &t.blur_h_group);
        Self::fullscreen_pass(encoder, "Bloom Blur V Pass", &t.bloom_a, &self.blur_pipeline, &t.blur_v_group);
        Self::fullscreen_pass(encoder, "Composite Pass", output, &self.composite_pipeline, &t.composite_group);
    }

    fn fullscreen_pass(
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        target: &wgpu::TextureView,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<PostParams>(), 32);
    }

    #[test]
    fn test_params_for_pass() {
        let settings = RenderSettings::default();
        let params = PostParams::for_pass(&settings, [1.0, 0.0], 640, 360);
        assert_eq!(params.threshold, 0.7);
        assert_eq!(params.strength, 0.45);
        assert_eq!(params.radius, 0.4);
        assert_eq!(params.exposure, 2.2);
        assert_eq!(params.texel_size, [1.0 / 640.0, 1.0 / 360.0]);
    }

    #[test]
    fn test_bloom_size_never_zero() {
        assert_eq!(bloom_size(1280, 720), (640, 360));
        assert_eq!(bloom_size(1, 1), (1, 1));
    }
}
