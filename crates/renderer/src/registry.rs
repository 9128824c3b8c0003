//! Renders single frames of the named effects in the static effect table.
//!
//! Each effect compiles once into its own surface at the registry's default
//! size and stays cached for later frames. Requests at any other size get a
//! throwaway surface on the same GPU context, so odd sizes never evict or
//! recompile the cached entries.
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use effects::{EffectConfig, PARAM_COUNT};

use crate::error::{RenderError, Result};
use crate::gpu::{GpuContext, GpuSurface, ProgramId};
use crate::types::{GpuPowerPreference, UniformSet};

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    /// Directory effect shader paths are resolved against.
    pub shader_root: PathBuf,
    /// Size of cached surfaces, in pixels.
    pub default_size: (u32, u32),
    pub power: GpuPowerPreference,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            shader_root: PathBuf::from("shaders"),
            default_size: (640, 360),
            power: GpuPowerPreference::default(),
        }
    }
}

struct CachedEffect {
    surface: GpuSurface,
    program: ProgramId,
}

impl CachedEffect {
    fn compile(context: GpuContext, path: &Path, width: u32, height: u32) -> Result<Self> {
        let mut surface = GpuSurface::with_context(context, width, height)?;
        let program = surface.load_shader(path)?;
        Ok(Self { surface, program })
    }
}

pub struct EffectRegistry {
    cache: HashMap<&'static str, CachedEffect>,
    context: Option<GpuContext>,
    config: RegistryConfig,
}

impl EffectRegistry {
    /// Acquires a headless context for `config`.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let context = GpuContext::headless(config.power)?;
        Ok(Self::with_context(context, config))
    }

    pub fn with_context(context: GpuContext, config: RegistryConfig) -> Self {
        tracing::debug!(
            shader_root = %config.shader_root.display(),
            width = config.default_size.0,
            height = config.default_size.1,
            "created effect registry"
        );
        Self {
            cache: HashMap::new(),
            context: Some(context),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The shared context, for callers building their own surfaces or chains.
    pub fn context(&self) -> Result<&GpuContext> {
        self.context.as_ref().ok_or(RenderError::Released)
    }

    pub fn effect(&self, name: &str) -> Result<&'static EffectConfig> {
        Ok(effects::effect(name)?)
    }

    pub fn shader_path(&self, effect: &EffectConfig) -> PathBuf {
        self.config.shader_root.join(effect.shader_path)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Compiles `name` into the cache without rendering.
    pub fn preload(&mut self, name: &str) -> Result<()> {
        let effect = self.effect(name)?;
        self.cached(effect).map(|_| ())
    }

    fn cached(&mut self, effect: &'static EffectConfig) -> Result<&mut CachedEffect> {
        let context = self.context.as_ref().ok_or(RenderError::Released)?;
        match self.cache.entry(effect.name) {
            Entry::Occupied(entry) => {
                tracing::trace!(effect = effect.name, "effect cache hit");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let (width, height) = self.config.default_size;
                let path = self.config.shader_root.join(effect.shader_path);
                let cached = CachedEffect::compile(context.clone(), &path, width, height)?;
                tracing::debug!(effect = effect.name, "cached effect program");
                Ok(entry.insert(cached))
            }
        }
    }

    /// Renders one frame of `name` and returns RGBA8 pixels, top row first.
    ///
    /// Missing `params`/`color_mode` fall back to the effect's defaults and a
    /// missing dimension falls back to the registry's default size.
    pub fn render_frame(
        &mut self,
        name: &str,
        time: f32,
        params: Option<[f32; PARAM_COUNT]>,
        color_mode: Option<i32>,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<Vec<u8>> {
        let effect = self.effect(name)?;
        let uniforms = effect_uniforms(effect, time, params, color_mode);
        let (default_width, default_height) = self.config.default_size;
        let size = (
            width.unwrap_or(default_width),
            height.unwrap_or(default_height),
        );

        if size == self.config.default_size {
            let cached = self.cached(effect)?;
            return cached.surface.render(cached.program, &uniforms);
        }

        tracing::debug!(
            effect = name,
            width = size.0,
            height = size.1,
            "rendering on throwaway surface"
        );
        let context = self.context()?.clone();
        let mut throwaway = CachedEffect::compile(context, &self.shader_path(effect), size.0, size.1)?;
        throwaway.surface.render(throwaway.program, &uniforms)
    }

    /// Drops every cached surface and the context. Idempotent.
    pub fn release(&mut self) {
        for (_, mut cached) in self.cache.drain() {
            cached.surface.release();
        }
        if self.context.take().is_some() {
            tracing::debug!("released effect registry");
        }
    }
}

impl Drop for EffectRegistry {
    fn drop(&mut self) {
        self.release();
    }
}

/// Standard uniforms for one frame of `effect`, falling back to its defaults.
pub fn effect_uniforms(
    effect: &EffectConfig,
    time: f32,
    params: Option<[f32; PARAM_COUNT]>,
    color_mode: Option<i32>,
) -> UniformSet {
    UniformSet::for_effect(
        time,
        params.unwrap_or(effect.default_params),
        color_mode.unwrap_or(effect.default_color_mode),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UniformValue;

    #[test]
    fn uniforms_fall_back_to_effect_defaults() {
        let plasma = effects::effect("plasma").unwrap();
        let uniforms = effect_uniforms(plasma, 1.0, None, None);
        assert_eq!(
            uniforms.get("iParams"),
            Some(UniformValue::Vec4(plasma.default_params))
        );
        assert_eq!(
            uniforms.get("iColorMode"),
            Some(UniformValue::Int(plasma.default_color_mode))
        );
    }

    #[test]
    fn explicit_values_win_over_defaults() {
        let tunnel = effects::effect("tunnel").unwrap();
        let uniforms = effect_uniforms(tunnel, 2.5, Some([9.0, 8.0, 7.0, 6.0]), Some(4));
        assert_eq!(uniforms.get("iTime"), Some(UniformValue::Float(2.5)));
        assert_eq!(
            uniforms.get("iParams"),
            Some(UniformValue::Vec4([9.0, 8.0, 7.0, 6.0]))
        );
        assert_eq!(uniforms.get("iColorMode"), Some(UniformValue::Int(4)));
    }

    #[test]
    fn default_config_targets_shader_dir() {
        let config = RegistryConfig::default();
        assert_eq!(config.shader_root, PathBuf::from("shaders"));
        assert_eq!(config.default_size, (640, 360));
    }
}
