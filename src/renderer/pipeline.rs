//! WebGPU scene pipeline
//!
//! Two pipelines share one render pass: a fullscreen background triangle and an
//! instanced, depth-tested mesh pass. Every object becomes one instance; runs of
//! consecutive instances that share a mesh are drawn with a single call, in the
//! scene's draw-group order.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;
use wgpu::util::DeviceExt;

use super::mesh::MeshData;
use super::shapes;
use super::vertex::{Instance, Vertex, colors};
use crate::settings::{QualityPreset, Settings};
use crate::sim::{DrawGroup, GameObject, ObjectKind, Scene};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const INITIAL_INSTANCE_CAPACITY: usize = 256;
const SHININESS: f32 = 15.0;

/// Errors raised while bringing up the renderer
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
}

// ============================================================================
// MESH SELECTION AND BATCHING
// ============================================================================

/// Mesh used to draw an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    Chassis,
    Wheel,
    Sphere,
    Road,
    Spark,
}

impl MeshKind {
    pub const ALL: [MeshKind; 5] = [
        MeshKind::Chassis,
        MeshKind::Wheel,
        MeshKind::Sphere,
        MeshKind::Road,
        MeshKind::Spark,
    ];

    pub fn for_object(kind: &ObjectKind) -> Self {
        match kind {
            ObjectKind::Chassis => MeshKind::Chassis,
            ObjectKind::Wheel { .. } => MeshKind::Wheel,
            ObjectKind::Sphere => MeshKind::Sphere,
            ObjectKind::Road => MeshKind::Road,
            ObjectKind::Spark { .. } => MeshKind::Spark,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// CPU meshes for every [`MeshKind`]
#[derive(Debug, Clone)]
pub struct MeshLibrary {
    meshes: [MeshData; 5],
}

impl MeshLibrary {
    /// Procedural meshes at the given quality
    pub fn procedural(quality: QualityPreset) -> Self {
        let (segments, rings) = quality.sphere_tessellation();
        Self {
            meshes: [
                shapes::chassis(),
                shapes::wheel(quality.wheel_segments()),
                shapes::uv_sphere(segments, rings),
                shapes::road_quad(),
                shapes::spark(),
            ],
        }
    }

    pub fn get(&self, kind: MeshKind) -> &MeshData {
        &self.meshes[kind.index()]
    }

    pub fn set(&mut self, kind: MeshKind, mesh: MeshData) {
        self.meshes[kind.index()] = mesh;
    }
}

/// Material color for an object in a draw group
pub fn object_color(obj: &GameObject, group: DrawGroup) -> [f32; 4] {
    match (obj.kind, group) {
        (ObjectKind::Chassis, _) => colors::CHASSIS,
        (ObjectKind::Wheel { .. }, _) => colors::WHEEL,
        (ObjectKind::Sphere, DrawGroup::PushedSpheres) => colors::PUSHED_SPHERE,
        (ObjectKind::Sphere, _) => colors::SPHERE,
        (ObjectKind::Road, _) => colors::ROAD,
        (ObjectKind::Spark { ttl }, _) => {
            let mut color = colors::SPARK;
            color[1] *= (ttl * 2.0).clamp(0.3, 1.0);
            color
        }
    }
}

/// Consecutive instances that share a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub mesh: MeshKind,
    pub instances: Range<u32>,
}

/// Flatten the scene into instances and draw batches, preserving draw order
pub fn batch_instances(scene: &Scene, sparks: bool) -> (Vec<Instance>, Vec<Batch>) {
    let mut instances = Vec::new();
    let mut batches: Vec<Batch> = Vec::new();

    for (group, members) in scene.draw_groups() {
        for obj in members {
            if !sparks && matches!(obj.kind, ObjectKind::Spark { .. }) {
                continue;
            }
            let mesh = MeshKind::for_object(&obj.kind);
            let index = instances.len() as u32;
            instances.push(Instance::new(&obj.model, object_color(obj, group)));

            match batches.last_mut() {
                Some(batch) if batch.mesh == mesh => batch.instances.end = index + 1,
                _ => batches.push(Batch {
                    mesh,
                    instances: index..index + 1,
                }),
            }
        }
    }

    (instances, batches)
}

// ============================================================================
// GPU DATA STRUCTURES (must match shader)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4], // offset 0
    camera_pos: [f32; 4],     // offset 64
    light_pos: [f32; 4],      // offset 80
    light_power: [f32; 4],    // offset 96 - rgb power, a shininess
    clear_color: [f32; 4],    // offset 112
    resolution: [f32; 2],     // offset 128
    time: f32,                // offset 136
    sky: f32,                 // offset 140
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, kind: MeshKind, mesh: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?}_vertices", kind)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?}_indices", kind)),
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

// ============================================================================
// SCENE RENDER STATE
// ============================================================================

pub struct SceneRenderState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,

    background_pipeline: wgpu::RenderPipeline,
    mesh_pipeline: wgpu::RenderPipeline,

    globals_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,

    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,

    meshes: Vec<GpuMesh>,
    depth_view: wgpu::TextureView,

    pub size: (u32, u32),
}

impl SceneRenderState {
    pub async fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
        library: &MeshLibrary,
    ) -> Result<Self, RenderError> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("chase-drive-device"),
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
            .ok_or(RenderError::NoSurfaceFormat)?;
        log::info!("Using surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
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
            source: wgpu::ShaderSource::Wgsl(include_str!("scene_shader.wgsl").into()),
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_bind_group_layout"),
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

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let background_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("background_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_background"),
                buffers: &[], // Fullscreen triangle
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_background"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let mesh_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mesh_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc(), Instance::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Imported meshes have mixed winding
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let instance_buffer = create_instance_buffer(&device, INITIAL_INSTANCE_CAPACITY);
        let meshes = MeshKind::ALL
            .iter()
            .map(|&kind| GpuMesh::upload(&device, kind, library.get(kind)))
            .collect();
        let depth_view = create_depth_view(&device, width, height);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            background_pipeline,
            mesh_pipeline,
            globals_buffer,
            bind_group,
            instance_buffer,
            instance_capacity: INITIAL_INSTANCE_CAPACITY,
            meshes,
            depth_view,
            size: (width, height),
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            self.size = (new_width, new_height);
            self.config.width = new_width;
            self.config.height = new_height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, new_width, new_height);
        }
    }

    /// Reconfigure the surface after it was lost or went stale
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.size.0 as f32 / self.size.1.max(1) as f32
    }

    /// Update GPU buffers from the scene and render
    pub fn render(
        &mut self,
        scene: &Scene,
        settings: &Settings,
        time: f32,
    ) -> Result<(), wgpu::SurfaceError> {
        let camera = &scene.camera;
        let light = &scene.light;
        let globals = Globals {
            view_proj: camera.view_proj().to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            light_pos: light.position.to_array(),
            light_power: light.power_density.extend(SHININESS).to_array(),
            clear_color: colors::BACKGROUND,
            resolution: [self.size.0 as f32, self.size.1 as f32],
            time,
            sky: if settings.quality.sky_gradient() { 1.0 } else { 0.0 },
        };
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let (instances, batches) = batch_instances(scene, settings.sparks);
        if instances.len() > self.instance_capacity {
            self.instance_capacity = instances.len().next_power_of_two();
            self.instance_buffer = create_instance_buffer(&self.device, self.instance_capacity);
            log::debug!("Instance buffer grown to {}", self.instance_capacity);
        }
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene_encoder"),
            });

        {
            let [r, g, b, a] = colors::BACKGROUND.map(f64::from);
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            render_pass.set_bind_group(0, &self.bind_group, &[]);

            render_pass.set_pipeline(&self.background_pipeline);
            render_pass.draw(0..3, 0..1);

            render_pass.set_pipeline(&self.mesh_pipeline);
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for batch in &batches {
                let mesh = &self.meshes[batch.mesh.index()];
                if mesh.index_count == 0 {
                    continue;
                }
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, batch.instances.clone());
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("instances"),
        size: (std::mem::size_of::<Instance>() * capacity) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::Tuning;
    use glam::Vec3;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn scene() -> Scene {
        Scene::new(Tuning::default(), &mut Pcg32::seed_from_u64(3))
    }

    #[test]
    fn test_globals_size_matches_shader() {
        assert_eq!(std::mem::size_of::<Globals>(), 144);
    }

    #[test]
    fn test_batches_follow_draw_groups() {
        let mut scene = scene();
        let id = scene.spheres.remove(0);
        scene.push_directions.insert(id, Vec3::Z);

        let (instances, batches) = batch_instances(&scene, true);
        assert_eq!(instances.len(), 5 + 20 + 20);

        let meshes: Vec<MeshKind> = batches.iter().map(|b| b.mesh).collect();
        assert_eq!(
            meshes,
            vec![
                MeshKind::Chassis,
                MeshKind::Wheel,
                MeshKind::Sphere,
                MeshKind::Road,
                MeshKind::Sphere
            ]
        );
        assert_eq!(batches[1].instances, 1..5);
        assert_eq!(batches[2].instances, 5..24);
        assert_eq!(batches[4].instances, 44..45);
        assert_eq!(instances[44].color, colors::PUSHED_SPHERE);

        // Batches tile the instance list with no gaps
        let mut next = 0;
        for batch in &batches {
            assert_eq!(batch.instances.start, next);
            next = batch.instances.end;
        }
        assert_eq!(next as usize, instances.len());
    }

    #[test]
    fn test_sparks_can_be_hidden() {
        let mut scene = scene();
        let id = scene.next_entity_id();
        scene
            .objects
            .push(GameObject::new(id, ObjectKind::Spark { ttl: 0.5 }, Vec3::ZERO));

        let (with, _) = batch_instances(&scene, true);
        let (without, _) = batch_instances(&scene, false);
        assert_eq!(with.len(), without.len() + 1);
    }

    #[test]
    fn test_mesh_library_covers_all_kinds() {
        let mut library = MeshLibrary::procedural(QualityPreset::Low);
        for kind in MeshKind::ALL {
            assert!(library.get(kind).triangle_count() > 0);
        }
        library.set(MeshKind::Chassis, shapes::spark());
        assert_eq!(library.get(MeshKind::Chassis).vertices.len(), 24);
    }
}
