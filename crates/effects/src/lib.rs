//! Static catalogue of the shader effects and post-process pass families the
//! renderer knows how to drive.
//!
//! Nothing in here touches the GPU. `renderer` resolves shader paths against a
//! root directory and compiles them, while `timeline` consults the same table
//! to validate storyboards and to fall back to an effect's default parameters.
//!
//! Types:
//!
//! - `EffectConfig` captures one effect: its fragment shader, four opaque
//!   parameters (names, ranges, defaults), a recommended duration, and the
//!   default color-mode selector.
//! - `PassFamily` / `FamilyPreset` describe the built-in post-process passes
//!   and their named uniform presets (see [`presets`]).
use serde::Serialize;

pub mod presets;

pub use presets::{
    AsciiPreset, CrtPreset, FamilyPreset, PalettePreset, PassFamily, PhosphorPreset,
    PresetUniform,
};

/// Every shader-driven effect carries exactly four float parameters.
pub const PARAM_COUNT: usize = 4;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EffectError {
    #[error("unknown effect '{0}'")]
    UnknownEffect(String),
    #[error("unknown {family} preset '{name}'")]
    UnknownPreset { family: PassFamily, name: String },
    #[error("unknown pass family '{0}'")]
    UnknownFamily(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectConfig {
    pub name: &'static str,
    /// Fragment shader path relative to the shader root.
    pub shader_path: &'static str,
    pub default_params: [f32; PARAM_COUNT],
    pub param_names: [&'static str; PARAM_COUNT],
    pub param_ranges: [(f32, f32); PARAM_COUNT],
    /// Seconds.
    pub recommended_duration: f32,
    pub default_color_mode: i32,
}

impl EffectConfig {
    /// Clamps each parameter into its declared range.
    pub fn clamp_params(&self, params: [f32; PARAM_COUNT]) -> [f32; PARAM_COUNT] {
        let mut clamped = params;
        for (value, (min, max)) in clamped.iter_mut().zip(self.param_ranges.iter()) {
            *value = value.clamp(*min, *max);
        }
        clamped
    }
}

pub static EFFECTS: &[EffectConfig] = &[
    EffectConfig {
        name: "plasma",
        shader_path: "effects/plasma.frag",
        default_params: [1.0, 0.5, 3.0, 0.0],
        param_names: ["speed", "scale", "bands", "hue_shift"],
        param_ranges: [(0.0, 4.0), (0.1, 2.0), (1.0, 8.0), (0.0, 1.0)],
        recommended_duration: 8.0,
        default_color_mode: 0,
    },
    EffectConfig {
        name: "tunnel",
        shader_path: "effects/tunnel.frag",
        default_params: [1.0, 0.3, 6.0, 0.5],
        param_names: ["speed", "twist", "rings", "glow"],
        param_ranges: [(0.0, 5.0), (0.0, 2.0), (1.0, 16.0), (0.0, 1.0)],
        recommended_duration: 10.0,
        default_color_mode: 1,
    },
    EffectConfig {
        name: "starfield",
        shader_path: "effects/starfield.frag",
        default_params: [0.6, 200.0, 0.8, 0.0],
        param_names: ["speed", "density", "brightness", "drift"],
        param_ranges: [(0.0, 4.0), (10.0, 800.0), (0.0, 1.0), (-1.0, 1.0)],
        recommended_duration: 12.0,
        default_color_mode: 2,
    },
    EffectConfig {
        name: "waves",
        shader_path: "effects/waves.frag",
        default_params: [0.8, 4.0, 0.25, 0.5],
        param_names: ["speed", "frequency", "amplitude", "softness"],
        param_ranges: [(0.0, 4.0), (0.5, 16.0), (0.0, 1.0), (0.0, 1.0)],
        recommended_duration: 8.0,
        default_color_mode: 0,
    },
    EffectConfig {
        name: "metaballs",
        shader_path: "effects/metaballs.frag",
        default_params: [0.7, 5.0, 0.12, 0.6],
        param_names: ["speed", "count", "radius", "threshold"],
        param_ranges: [(0.0, 3.0), (1.0, 8.0), (0.02, 0.4), (0.1, 2.0)],
        recommended_duration: 10.0,
        default_color_mode: 3,
    },
];

/// Looks up an effect by name.
pub fn find_effect(name: &str) -> Option<&'static EffectConfig> {
    EFFECTS.iter().find(|effect| effect.name == name)
}

pub fn effect(name: &str) -> Result<&'static EffectConfig, EffectError> {
    find_effect(name).ok_or_else(|| EffectError::UnknownEffect(name.to_string()))
}

pub fn effect_names() -> impl Iterator<Item = &'static str> {
    EFFECTS.iter().map(|effect| effect.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_names_are_unique() {
        let mut names: Vec<_> = effect_names().collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn defaults_sit_inside_declared_ranges() {
        for effect in EFFECTS {
            assert_eq!(effect.clamp_params(effect.default_params), effect.default_params);
        }
    }

    #[test]
    fn unknown_effect_is_reported_by_name() {
        assert_eq!(
            effect("nope").unwrap_err(),
            EffectError::UnknownEffect("nope".into())
        );
        assert_eq!(effect("plasma").unwrap().shader_path, "effects/plasma.frag");
    }
}
