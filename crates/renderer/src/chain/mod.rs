//! Post-process pass chain layered over a [`GpuSurface`].
mod pass;
mod pingpong;

use std::path::{Path, PathBuf};

use effects::{FamilyPreset, PassFamily};

use crate::error::{RenderError, Result};
use crate::gpu::{GpuSurface, ProgramId};
use crate::types::{ReservedUniform, SurfaceConfig, UniformSet, UniformValue};

pub use pass::{PassId, PassInfo, PassKind};
pub use pingpong::PingPongState;

use pass::{preset_uniforms, RenderPass};
use pingpong::PingPongBuffer;

pub struct PassChain {
    // Drop order follows release order: passes, surface, ping-pong pair.
    passes: Vec<RenderPass>,
    surface: GpuSurface,
    ping_pong: Option<PingPongBuffer>,
    shader_root: PathBuf,
    width: u32,
    height: u32,
}

impl PassChain {
    pub fn new(surface: GpuSurface, shader_root: impl Into<PathBuf>) -> Result<Self> {
        let (width, height) = surface.size()?;
        Ok(Self {
            passes: Vec::new(),
            surface,
            ping_pong: None,
            shader_root: shader_root.into(),
            width,
            height,
        })
    }

    pub fn init(config: &SurfaceConfig, shader_root: impl Into<PathBuf>) -> Result<Self> {
        Self::new(GpuSurface::init(config)?, shader_root)
    }

    pub fn surface(&self) -> &GpuSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut GpuSurface {
        &mut self.surface
    }

    pub fn shader_root(&self) -> &Path {
        &self.shader_root
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn passes(&self) -> impl Iterator<Item = PassInfo> + '_ {
        self.passes
            .iter()
            .enumerate()
            .map(|(index, pass)| pass.info(PassId(index)))
    }

    pub fn pass(&self, id: PassId) -> Option<PassInfo> {
        self.passes.get(id.0).map(|pass| pass.info(id))
    }

    pub fn feedback_state(&self) -> Option<PingPongState> {
        self.ping_pong.as_ref().map(PingPongBuffer::state)
    }

    pub fn add_pass(
        &mut self,
        shader_path: impl AsRef<Path>,
        initial_uniforms: UniformSet,
    ) -> Result<PassId> {
        self.push_pass(PassKind::Custom, shader_path.as_ref(), initial_uniforms)
    }

    pub fn add_family_pass(&mut self, family: PassFamily, preset_name: &str) -> Result<PassId> {
        let preset = FamilyPreset::parse(family, preset_name)?;
        if family.is_feedback() && self.passes.iter().any(|pass| pass.kind.is_feedback()) {
            return Err(RenderError::InvalidConfig(format!(
                "chain already has a feedback pass; cannot add a second {family} pass"
            )));
        }
        let shader_path = self.shader_root.join(family.shader_path());
        self.push_pass(preset.into(), &shader_path, preset_uniforms(preset))
    }

    pub fn add_crt_pass(&mut self, preset_name: &str) -> Result<PassId> {
        self.add_family_pass(PassFamily::Crt, preset_name)
    }

    pub fn add_palette_pass(&mut self, preset_name: &str) -> Result<PassId> {
        self.add_family_pass(PassFamily::Palette, preset_name)
    }

    pub fn add_ascii_pass(&mut self, preset_name: &str) -> Result<PassId> {
        self.add_family_pass(PassFamily::Ascii, preset_name)
    }

    pub fn add_phosphor_pass(&mut self, preset_name: &str) -> Result<PassId> {
        self.add_family_pass(PassFamily::Phosphor, preset_name)
    }

    fn push_pass(
        &mut self,
        kind: PassKind,
        shader_path: &Path,
        uniforms: UniformSet,
    ) -> Result<PassId> {
        // Compile first: a bad shader must leave the chain untouched.
        let program = self.surface.load_shader(shader_path)?;
        let device = self.surface.context()?.device.clone();
        if kind.is_feedback() && self.ping_pong.is_none() {
            self.ping_pong = Some(PingPongBuffer::new(&device, self.width, self.height));
        }

        let id = PassId(self.passes.len());
        self.passes.push(RenderPass::new(
            &device,
            kind,
            program,
            shader_path,
            uniforms,
            self.width,
            self.height,
        ));
        tracing::debug!(
            pass = id.0,
            ?kind,
            shader = %shader_path.display(),
            "registered render pass"
        );
        Ok(id)
    }

    /// Switches the first pass of `family` to `preset_name`.
    pub fn set_preset(&mut self, family: PassFamily, preset_name: &str) -> Result<()> {
        let preset = FamilyPreset::parse(family, preset_name)?;
        let pass = self
            .passes
            .iter_mut()
            .find(|pass| pass.kind.family() == Some(family))
            .ok_or_else(|| {
                RenderError::InvalidConfig(format!("no {family} pass has been added"))
            })?;
        pass.apply_preset(preset);
        tracing::debug!(%family, preset = preset_name, "updated pass preset");
        Ok(())
    }

    pub fn set_crt_preset(&mut self, preset_name: &str) -> Result<()> {
        self.set_preset(PassFamily::Crt, preset_name)
    }

    pub fn set_palette_preset(&mut self, preset_name: &str) -> Result<()> {
        self.set_preset(PassFamily::Palette, preset_name)
    }

    pub fn set_ascii_preset(&mut self, preset_name: &str) -> Result<()> {
        self.set_preset(PassFamily::Ascii, preset_name)
    }

    pub fn set_phosphor_preset(&mut self, preset_name: &str) -> Result<()> {
        self.set_preset(PassFamily::Phosphor, preset_name)
    }

    pub fn set_pass_uniform(
        &mut self,
        id: PassId,
        name: impl Into<String>,
        value: impl Into<UniformValue>,
    ) -> Result<()> {
        let pass = self
            .passes
            .get_mut(id.0)
            .ok_or_else(|| RenderError::InvalidConfig(format!("no pass with index {}", id.0)))?;
        pass.uniforms.insert(name, value);
        Ok(())
    }

    /// Renders one frame of `effect` through every pass and returns RGBA8
    /// pixels, top row first.
    pub fn render(
        &mut self,
        effect: ProgramId,
        effect_uniforms: &UniformSet,
        time: f32,
    ) -> Result<Vec<u8>> {
        let Self {
            passes,
            surface,
            ping_pong,
            width,
            height,
            ..
        } = self;

        let mut encoder = surface.create_encoder("pass chain")?;
        let mut effect_values = effect_uniforms.clone();
        effect_values.insert(ReservedUniform::Time.name(), time);
        let primary = surface.primary()?;
        surface.encode_draw(&mut encoder, effect, &effect_values, primary, [None, None])?;
        if passes.is_empty() {
            return surface.read_back(primary, encoder);
        }

        let globals = UniformSet::new()
            .with(ReservedUniform::Time.name(), time)
            .with(
                ReservedUniform::Resolution.name(),
                [*width as f32, *height as f32],
            );
        let mut input = primary;
        for pass in passes.iter() {
            let mut values = globals.clone();
            values.merge(&pass.uniforms);

            match ping_pong.as_mut().filter(|_| pass.kind.is_feedback()) {
                Some(buffer) => {
                    surface.encode_draw(
                        &mut encoder,
                        pass.program,
                        &values,
                        buffer.write_target(),
                        [Some(&input.view), Some(&buffer.history_target().view)],
                    )?;
                    buffer
                        .write_target()
                        .encode_copy_to(&mut encoder, &pass.framebuffer);
                    buffer.advance();
                }
                None => {
                    surface.encode_draw(
                        &mut encoder,
                        pass.program,
                        &values,
                        &pass.framebuffer,
                        [Some(&input.view), None],
                    )?;
                }
            }
            input = &pass.framebuffer;
        }

        surface.read_back(input, encoder)
    }

    /// Reallocates every target. Feedback history is cleared.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.surface.resize(width, height)?;
        let device = self.surface.context()?.device.clone();
        for pass in &mut self.passes {
            pass.resize(&device, width, height);
        }
        if let Some(buffer) = self.ping_pong.as_mut() {
            buffer.reallocate(&device, width, height);
        }
        // Every target now has the new size, even if the clear below fails.
        self.width = width;
        self.height = height;

        if let Some(buffer) = self.ping_pong.as_mut() {
            let mut encoder = self.surface.create_encoder("ping-pong clear")?;
            buffer.encode_clear(&mut encoder);
            self.surface.submit(encoder)?;
        }
        tracing::debug!(width, height, passes = self.passes.len(), "resized pass chain");
        Ok(())
    }

    /// Idempotent; later renders fail with [`RenderError::Released`].
    pub fn release(&mut self) {
        if self.surface.is_released() {
            return;
        }
        self.passes.clear();
        self.surface.release();
        self.ping_pong = None;
        tracing::debug!("released pass chain");
    }

    pub fn is_released(&self) -> bool {
        self.surface.is_released()
    }
}

impl Drop for PassChain {
    fn drop(&mut self) {
        self.release();
    }
}
