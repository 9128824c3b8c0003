use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::compile::{create_fragment_module, create_vertex_module, wrap_fragment, CustomUniform};
use crate::error::{RenderError, Result};

use super::channels::ChannelResources;
use super::target::TARGET_FORMAT;

/// Stable index of a compiled program inside a surface's [`ProgramCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(usize);

/// Layouts and stages every program shares.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub vertex_module: wgpu::ShaderModule,
    pub pipeline_layout: wgpu::PipelineLayout,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device, channels: &ChannelResources) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
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
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("program pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &channels.layout],
            push_constant_ranges: &[],
        });

        Self {
            uniform_layout,
            vertex_module: create_vertex_module(device),
            pipeline_layout,
        }
    }
}

/// A compiled fragment program bound to the shared quad vertex stage.
pub struct ShaderProgram {
    pub(crate) pipeline: wgpu::RenderPipeline,
    custom_uniforms: Vec<CustomUniform>,
    source_path: PathBuf,
}

impl ShaderProgram {
    /// Reads, wraps, and compiles the shader at `path`.
    ///
    /// Compilation and pipeline creation run inside a validation error scope
    /// so a rejected shader surfaces as [`RenderError::ShaderCompile`] with the
    /// compiler's diagnostic instead of reaching the device's error handler.
    pub(crate) fn compile(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        path: &Path,
        vertex_source: Option<&str>,
    ) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                RenderError::ResourceNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                RenderError::ShaderCompile {
                    path: path.to_path_buf(),
                    diagnostic: format!("failed to read shader source: {err}"),
                }
            }
        })?;
        let wrapped = wrap_fragment(&source).map_err(|diagnostic| RenderError::ShaderCompile {
            path: path.to_path_buf(),
            diagnostic,
        })?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let label = path.display().to_string();
        let fragment_module = create_fragment_module(device, &label, &wrapped);
        let custom_vertex = vertex_source.map(|source| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("custom vertex"),
                source: wgpu::ShaderSource::Glsl {
                    shader: std::borrow::Cow::Owned(source.to_string()),
                    stage: wgpu::naga::ShaderStage::Vertex,
                    defines: &[],
                },
            })
        });
        let vertex_module = custom_vertex.as_ref().unwrap_or(&layouts.vertex_module);
        let pipeline = create_render_pipeline(device, layouts, vertex_module, &fragment_module);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ShaderCompile {
                path: path.to_path_buf(),
                diagnostic: error.to_string(),
            });
        }

        tracing::debug!(
            shader = %path.display(),
            custom_uniforms = wrapped.custom_uniforms.len(),
            "compiled shader program"
        );
        Ok(Self {
            pipeline,
            custom_uniforms: wrapped.custom_uniforms,
            source_path: path.to_path_buf(),
        })
    }

    pub fn custom_uniforms(&self) -> &[CustomUniform] {
        &self.custom_uniforms
    }

    pub fn declares(&self, name: &str) -> bool {
        self.custom_uniforms.iter().any(|uniform| uniform.name == name)
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

fn create_render_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("shader program"),
        layout: Some(&layouts.pipeline_layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x2],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

/// Programs keyed by source path; each path compiles at most once.
#[derive(Default)]
pub(crate) struct ProgramCache {
    programs: Vec<ShaderProgram>,
    by_path: HashMap<PathBuf, ProgramId>,
}

impl ProgramCache {
    pub fn lookup(&self, path: &Path) -> Option<ProgramId> {
        self.by_path.get(path).copied()
    }

    pub fn insert(&mut self, program: ShaderProgram) -> ProgramId {
        let id = ProgramId(self.programs.len());
        self.by_path.insert(program.source_path.clone(), id);
        self.programs.push(program);
        id
    }

    pub fn get(&self, id: ProgramId) -> Option<&ShaderProgram> {
        self.programs.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }
}
