use std::path::Path;

use wgpu::util::DeviceExt;

use crate::error::{RenderError, Result};
use crate::types::{ContextMode, SurfaceConfig, UniformSet, CHANNEL_COUNT};

use super::channels::ChannelResources;
use super::context::GpuContext;
use super::pipeline::{PipelineLayouts, ProgramCache, ProgramId, ShaderProgram};
use super::target::Framebuffer;
use super::uniforms::EffectUniforms;

/// Two triangles covering clip space.
const QUAD_VERTICES: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

/// Offscreen rendering surface: one context, one primary framebuffer, a
/// fullscreen quad, and a program cache keyed by shader path.
///
/// Dropping the surface releases everything; [`GpuSurface::release`] does the
/// same eagerly and is safe to call more than once.
pub struct GpuSurface {
    inner: Option<SurfaceResources>,
}

struct SurfaceResources {
    // Field order is drop order: buffers and targets go before the context.
    quad: wgpu::Buffer,
    primary: Framebuffer,
    programs: ProgramCache,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    channels: ChannelResources,
    layouts: PipelineLayouts,
    context: GpuContext,
}

impl GpuSurface {
    /// Acquires a context per `config.mode` and allocates the primary target.
    pub fn init(config: &SurfaceConfig) -> Result<Self> {
        let context = match &config.mode {
            ContextMode::Headless => GpuContext::headless(config.power)?,
            ContextMode::Shared(context) => context.clone(),
        };
        Self::with_context(context, config.width, config.height)
    }

    /// Builds a surface on an already acquired context.
    pub fn with_context(context: GpuContext, width: u32, height: u32) -> Result<Self> {
        context.check_dimensions(width, height)?;
        let device = &context.device;

        let channels = ChannelResources::new(device, &context.queue);
        let layouts = PipelineLayouts::new(device, &channels);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform buffer"),
            size: std::mem::size_of::<EffectUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fullscreen quad"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let primary = Framebuffer::new(device, "primary effect output", width, height);

        tracing::debug!(width, height, "initialised GPU surface");
        Ok(Self {
            inner: Some(SurfaceResources {
                quad,
                primary,
                programs: ProgramCache::default(),
                uniform_buffer,
                uniform_bind_group,
                channels,
                layouts,
                context,
            }),
        })
    }

    fn resources(&self) -> Result<&SurfaceResources> {
        self.inner.as_ref().ok_or(RenderError::Released)
    }

    fn resources_mut(&mut self) -> Result<&mut SurfaceResources> {
        self.inner.as_mut().ok_or(RenderError::Released)
    }

    pub fn context(&self) -> Result<&GpuContext> {
        Ok(&self.resources()?.context)
    }

    /// Current primary framebuffer size.
    pub fn size(&self) -> Result<(u32, u32)> {
        let primary = &self.resources()?.primary;
        Ok((primary.width, primary.height))
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Returns the cached program for `path`, compiling it on first use.
    pub fn load_shader(&mut self, path: impl AsRef<Path>) -> Result<ProgramId> {
        self.load_program(path.as_ref(), None)
    }

    /// Like [`GpuSurface::load_shader`] with a replacement vertex stage.
    ///
    /// The cache is still keyed by the fragment path alone.
    pub fn load_shader_with_vertex(
        &mut self,
        path: impl AsRef<Path>,
        vertex_source: &str,
    ) -> Result<ProgramId> {
        self.load_program(path.as_ref(), Some(vertex_source))
    }

    fn load_program(&mut self, path: &Path, vertex_source: Option<&str>) -> Result<ProgramId> {
        let resources = self.resources_mut()?;
        if let Some(id) = resources.programs.lookup(path) {
            tracing::trace!(shader = %path.display(), "program cache hit");
            return Ok(id);
        }
        let program = ShaderProgram::compile(
            &resources.context.device,
            &resources.layouts,
            path,
            vertex_source,
        )?;
        Ok(resources.programs.insert(program))
    }

    pub fn program(&self, id: ProgramId) -> Option<&ShaderProgram> {
        self.inner.as_ref()?.programs.get(id)
    }

    pub fn program_count(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |resources| resources.programs.len())
    }

    /// Draws `program` into the primary framebuffer and returns RGBA8 pixels,
    /// top row first.
    pub fn render(&mut self, program: ProgramId, uniforms: &UniformSet) -> Result<Vec<u8>> {
        let mut encoder = self.create_encoder("surface render")?;
        let resources = self.resources()?;
        resources.encode_draw(
            &mut encoder,
            program,
            uniforms,
            &resources.primary,
            [None, None],
        )?;
        resources.primary.read_pixels(
            &resources.context.device,
            &resources.context.queue,
            encoder,
        )
    }

    /// Reallocates the primary framebuffer when the size changes.
    ///
    /// Framebuffers owned by a pass chain are untouched.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let resources = self.resources_mut()?;
        if resources.primary.width == width && resources.primary.height == height {
            return Ok(());
        }
        resources.context.check_dimensions(width, height)?;
        resources.primary = Framebuffer::new(
            &resources.context.device,
            "primary effect output",
            width,
            height,
        );
        tracing::debug!(width, height, "resized primary framebuffer");
        Ok(())
    }

    /// Tears down programs, buffers, and the context. Idempotent.
    pub fn release(&mut self) {
        if let Some(resources) = self.inner.take() {
            resources.quad.destroy();
            resources.uniform_buffer.destroy();
            drop(resources);
            tracing::debug!("released GPU surface");
        }
    }

    pub(crate) fn create_encoder(&self, label: &str) -> Result<wgpu::CommandEncoder> {
        let device = &self.resources()?.context.device;
        Ok(device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) }))
    }

    pub(crate) fn primary(&self) -> Result<&Framebuffer> {
        Ok(&self.resources()?.primary)
    }

    /// Records one quad draw of `program` into `target`.
    pub(crate) fn encode_draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        program: ProgramId,
        uniforms: &UniformSet,
        target: &Framebuffer,
        inputs: [Option<&wgpu::TextureView>; CHANNEL_COUNT],
    ) -> Result<()> {
        self.resources()?
            .encode_draw(encoder, program, uniforms, target, inputs)
    }

    /// Submits `encoder` and reads `target` back.
    pub(crate) fn read_back(
        &self,
        target: &Framebuffer,
        encoder: wgpu::CommandEncoder,
    ) -> Result<Vec<u8>> {
        let resources = self.resources()?;
        target.read_pixels(&resources.context.device, &resources.context.queue, encoder)
    }

    /// Submits `encoder` without readback and waits for completion.
    pub(crate) fn submit(&self, encoder: wgpu::CommandEncoder) -> Result<()> {
        let resources = self.resources()?;
        resources
            .context
            .queue
            .submit(std::iter::once(encoder.finish()));
        resources.context.wait_idle()
    }
}

impl SurfaceResources {
    fn encode_draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        program: ProgramId,
        uniforms: &UniformSet,
        target: &Framebuffer,
        inputs: [Option<&wgpu::TextureView>; CHANNEL_COUNT],
    ) -> Result<()> {
        let program = self.programs.get(program).ok_or_else(|| {
            RenderError::InvalidConfig("program handle does not belong to this surface".into())
        })?;
        let device = &self.context.device;

        let packed = EffectUniforms::pack(
            target.width,
            target.height,
            uniforms,
            program.custom_uniforms(),
        );
        // Stage through the encoder so every draw in one submission sees its own values.
        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniform staging"),
            contents: bytemuck::bytes_of(&packed),
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        encoder.copy_buffer_to_buffer(
            &staging,
            0,
            &self.uniform_buffer,
            0,
            std::mem::size_of::<EffectUniforms>() as u64,
        );
        let channel_bind_group = self.channels.bind_group(device, inputs);

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("quad pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&program.pipeline);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &channel_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.quad.slice(..));
        render_pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
        Ok(())
    }
}

impl Drop for GpuSurface {
    fn drop(&mut self) {
        self.release();
    }
}
