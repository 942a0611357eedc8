//! WebGPU render pipelines
//!
//! Meshes are uploaded once per shape and drawn instanced. Particles are
//! instanced billboards, the trail is rebuilt as a triangle list every
//! frame, and a fullscreen triangle draws the bomb flash.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::shapes::{TRAIL_WIDTH, trail_ribbon};
use super::vertex::{MeshInstanceRaw, MeshVertex, Vertex, colors, particle_instance_desc};
use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::sim::{FrameView, ParticleInstance, Renderer, ResourcePool, Shape};

/// Mesh instances drawn per frame
const MAX_MESH_INSTANCES: usize = 1024;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4], // offset 0
    flash: f32,               // offset 64
    _pad: [f32; 3],           // offset 68, struct padded to 80
}

/// Per-frame buffer sizes, in elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferCaps {
    mesh_instances: usize,
    particles: usize,
    trail_vertices: usize,
}

impl BufferCaps {
    fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            mesh_instances: MAX_MESH_INSTANCES,
            particles: settings.max_particles().max(1),
            // Six vertices per segment between consecutive nodes
            trail_vertices: settings.trail_capacity.saturating_sub(1).max(1) * 6,
        }
    }
}

fn vertex_buffer<T>(device: &wgpu::Device, label: &str, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (std::mem::size_of::<T>() * capacity) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// GPU copy of one shared mesh
struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

/// Main render state
pub struct GpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    mesh_pipeline: wgpu::RenderPipeline,
    particle_pipeline: wgpu::RenderPipeline,
    trail_pipeline: wgpu::RenderPipeline,
    flash_pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    caps: BufferCaps,
    instance_buffer: wgpu::Buffer,
    particle_buffer: wgpu::Buffer,
    trail_buffer: wgpu::Buffer,
    /// Indexed by `Shape::index`
    meshes: Vec<GpuMesh>,
    /// Viewport size in pixels
    pub size: (u32, u32),
}

fn upload_meshes(device: &wgpu::Device, pool: &ResourcePool) -> Vec<GpuMesh> {
    Shape::ALL
        .iter()
        .map(|&shape| {
            let mesh = pool.mesh(shape);
            let vertices: Vec<MeshVertex> = mesh
                .positions
                .iter()
                .zip(&mesh.normals)
                .map(|(p, n)| MeshVertex {
                    position: p.to_array(),
                    normal: n.to_array(),
                })
                .collect();
            GpuMesh {
                vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("mesh_vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("mesh_indices"),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                index_count: mesh.indices.len() as u32,
            }
        })
        .collect()
}

/// Additive blending for glowing sparks
const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent::OVER,
};

#[allow(clippy::too_many_arguments)]
fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    label: &str,
    vs: &str,
    fs: &str,
    buffers: &[wgpu::VertexBufferLayout<'_>],
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
    cull_mode: Option<wgpu::Face>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(vs),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fs),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

impl GpuRenderer {
    pub async fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
        pool: &ResourcePool,
        settings: &EngineSettings,
    ) -> Result<Self, EngineError> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("shard-slash-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        let surface_caps = surface.get_capabilities(adapter);
        log::info!("Surface formats: {:?}", surface_caps.formats);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(EngineError::SurfaceUnavailable)?;
        log::info!("Using surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("globals"),
            contents: bytemuck::bytes_of(&Globals {
                view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
                flash: 0.0,
                _pad: [0.0; 3],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let format = config.format;
        let mesh_pipeline = create_pipeline(
            &device,
            &layout,
            &shader,
            "mesh_pipeline",
            "vs_mesh",
            "fs_mesh",
            &[MeshVertex::desc(), MeshInstanceRaw::desc()],
            format,
            wgpu::BlendState::ALPHA_BLENDING,
            Some(wgpu::Face::Back),
        );
        let particle_pipeline = create_pipeline(
            &device,
            &layout,
            &shader,
            "particle_pipeline",
            "vs_particle",
            "fs_particle",
            &[particle_instance_desc()],
            format,
            ADDITIVE,
            None,
        );
        let trail_pipeline = create_pipeline(
            &device,
            &layout,
            &shader,
            "trail_pipeline",
            "vs_trail",
            "fs_trail",
            &[Vertex::desc()],
            format,
            wgpu::BlendState::ALPHA_BLENDING,
            None,
        );
        let flash_pipeline = create_pipeline(
            &device,
            &layout,
            &shader,
            "flash_pipeline",
            "vs_flash",
            "fs_flash",
            &[],
            format,
            wgpu::BlendState::ALPHA_BLENDING,
            None,
        );

        let meshes = upload_meshes(&device, pool);

        let caps = BufferCaps::from_settings(settings);
        let instance_buffer =
            vertex_buffer::<MeshInstanceRaw>(&device, "mesh_instances", caps.mesh_instances);
        let particle_buffer =
            vertex_buffer::<ParticleInstance>(&device, "particle_instances", caps.particles);
        let trail_buffer = vertex_buffer::<Vertex>(&device, "trail_vertices", caps.trail_vertices);
        log::info!(
            "Renderer ready ({}x{}, {} meshes, {:?})",
            width,
            height,
            meshes.len(),
            caps
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            mesh_pipeline,
            particle_pipeline,
            trail_pipeline,
            flash_pipeline,
            globals_buffer,
            bind_group,
            caps,
            instance_buffer,
            particle_buffer,
            trail_buffer,
            meshes,
            size: (width, height),
        })
    }

    /// Instance data grouped by shape: opaque runs first, then translucent
    /// ones, at most `cap` instances. Returns (shape, instance range) per
    /// draw call.
    fn build_instances(
        frame: &FrameView<'_>,
        cap: usize,
    ) -> (Vec<MeshInstanceRaw>, Vec<(Shape, std::ops::Range<u32>)>) {
        let mut sorted: Vec<_> = frame
            .meshes
            .iter()
            .map(|m| (frame.resources.get_material(m.material).transparent, m))
            .collect();
        // Opaque before translucent; translucent far to near
        sorted.sort_by(|(ta, a), (tb, b)| {
            ta.cmp(tb).then_with(|| {
                if *ta {
                    a.model.w_axis.z.total_cmp(&b.model.w_axis.z)
                } else {
                    a.shape.cmp(&b.shape)
                }
            })
        });

        let mut raw = Vec::with_capacity(sorted.len());
        let mut draws: Vec<(Shape, std::ops::Range<u32>)> = Vec::new();
        for (_, inst) in sorted.into_iter().take(cap) {
            let material = frame.resources.get_material(inst.material);
            let idx = raw.len() as u32;
            raw.push(MeshInstanceRaw {
                model: inst.model.to_cols_array_2d(),
                color: material.base_color,
                params: [material.emissive, material.roughness, material.metalness, 0.0],
            });
            match draws.last_mut() {
                Some((shape, range)) if *shape == inst.shape && range.end == idx => {
                    range.end = idx + 1;
                }
                _ => draws.push((inst.shape, idx..idx + 1)),
            }
        }
        (raw, draws)
    }
}

impl Renderer for GpuRenderer {
    fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            self.size = (new_width, new_height);
            self.config.width = new_width;
            self.config.height = new_height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn render(&mut self, frame: &FrameView<'_>) -> Result<(), EngineError> {
        self.queue.write_buffer(
            &self.globals_buffer,
            0,
            bytemuck::bytes_of(&Globals {
                view_proj: frame.view_proj.to_cols_array_2d(),
                flash: frame.flash,
                _pad: [0.0; 3],
            }),
        );

        let (instances, draws) = Self::build_instances(frame, self.caps.mesh_instances);
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        let particles = &frame.particles[..frame.particles.len().min(self.caps.particles)];
        if !particles.is_empty() {
            self.queue
                .write_buffer(&self.particle_buffer, 0, bytemuck::cast_slice(particles));
        }

        let mut ribbon = trail_ribbon(frame.trail.nodes(), TRAIL_WIDTH);
        ribbon.truncate(self.caps.trail_vertices);
        if !ribbon.is_empty() {
            self.queue
                .write_buffer(&self.trail_buffer, 0, bytemuck::cast_slice(&ribbon));
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(EngineError::SurfaceLost);
            }
            Err(e) => {
                log::warn!("Surface unavailable: {:?}", e);
                return Err(EngineError::SurfaceUnavailable);
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene_encoder"),
            });

        {
            let [r, g, b, a] = colors::BACKGROUND;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            render_pass.set_bind_group(0, &self.bind_group, &[]);

            if !instances.is_empty() {
                render_pass.set_pipeline(&self.mesh_pipeline);
                render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                for (shape, range) in draws {
                    let mesh = &self.meshes[shape.index()];
                    render_pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                    render_pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint16);
                    render_pass.draw_indexed(0..mesh.index_count, 0, range);
                }
            }

            if !ribbon.is_empty() {
                render_pass.set_pipeline(&self.trail_pipeline);
                render_pass.set_vertex_buffer(0, self.trail_buffer.slice(..));
                render_pass.draw(0..ribbon.len() as u32, 0..1);
            }

            if !particles.is_empty() {
                render_pass.set_pipeline(&self.particle_pipeline);
                render_pass.set_vertex_buffer(0, self.particle_buffer.slice(..));
                render_pass.draw(0..6, 0..particles.len() as u32);
            }

            if frame.flash > 0.0 {
                render_pass.set_pipeline(&self.flash_pipeline);
                render_pass.draw(0..3, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    fn release(&mut self) {
        log::info!("Releasing render surface");
        self.device.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityPreset;

    #[test]
    fn test_buffer_caps_follow_settings() {
        let caps = BufferCaps::from_settings(&EngineSettings::from_preset(QualityPreset::High));
        assert_eq!(caps.mesh_instances, MAX_MESH_INSTANCES);
        assert_eq!(caps.particles, QualityPreset::High.max_particles());

        let settings = EngineSettings::default();
        let caps = BufferCaps::from_settings(&settings);
        assert_eq!(caps.trail_vertices, (settings.trail_capacity - 1) * 6);
    }

    #[test]
    fn test_buffer_caps_never_zero() {
        let settings = EngineSettings {
            trail_capacity: 0,
            ..Default::default()
        };
        let caps = BufferCaps::from_settings(&settings);
        assert!(caps.trail_vertices > 0);
        assert!(caps.particles > 0);
    }
}
