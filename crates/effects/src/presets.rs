//! Named uniform presets for the built-in post-process pass families.
//!
//! Each family carries its own preset enum so a pass's kind is an explicit
//! tag rather than something inferred from the uniform names it happens to
//! use. Only [`PassFamily::Phosphor`] reads its own previous frame.
use std::fmt;

use serde::Serialize;

use crate::EffectError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PresetUniform {
    Float(f32),
    Int(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassFamily {
    Crt,
    Palette,
    Ascii,
    Phosphor,
}

impl PassFamily {
    pub const ALL: [PassFamily; 4] = [
        PassFamily::Crt,
        PassFamily::Palette,
        PassFamily::Ascii,
        PassFamily::Phosphor,
    ];

    pub fn from_name(name: &str) -> Result<Self, EffectError> {
        match name.to_ascii_lowercase().as_str() {
            "crt" => Ok(Self::Crt),
            "palette" => Ok(Self::Palette),
            "ascii" => Ok(Self::Ascii),
            "phosphor" => Ok(Self::Phosphor),
            _ => Err(EffectError::UnknownFamily(name.to_string())),
        }
    }

    /// Pass shader path relative to the shader root.
    pub fn shader_path(self) -> &'static str {
        match self {
            PassFamily::Crt => "passes/crt.frag",
            PassFamily::Palette => "passes/palette.frag",
            PassFamily::Ascii => "passes/ascii.frag",
            PassFamily::Phosphor => "passes/phosphor.frag",
        }
    }

    /// True when the pass samples its own previous output through `iChannel1`.
    pub fn is_feedback(self) -> bool {
        matches!(self, PassFamily::Phosphor)
    }

    pub fn preset_names(self) -> &'static [&'static str] {
        match self {
            PassFamily::Crt => CrtPreset::NAMES,
            PassFamily::Palette => PalettePreset::NAMES,
            PassFamily::Ascii => AsciiPreset::NAMES,
            PassFamily::Phosphor => PhosphorPreset::NAMES,
        }
    }
}

impl fmt::Display for PassFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassFamily::Crt => f.write_str("crt"),
            PassFamily::Palette => f.write_str("palette"),
            PassFamily::Ascii => f.write_str("ascii"),
            PassFamily::Phosphor => f.write_str("phosphor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrtPreset {
    Subtle,
    Classic,
    Heavy,
}

impl CrtPreset {
    pub const NAMES: &'static [&'static str] = &["subtle", "classic", "heavy"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "subtle" => Some(Self::Subtle),
            "classic" => Some(Self::Classic),
            "heavy" => Some(Self::Heavy),
            _ => None,
        }
    }

    pub fn uniforms(self) -> Vec<(&'static str, PresetUniform)> {
        let (scanlines, curvature, vignette, aberration) = match self {
            CrtPreset::Subtle => (0.15, 0.02, 0.2, 0.0005),
            CrtPreset::Classic => (0.35, 0.08, 0.45, 0.0015),
            CrtPreset::Heavy => (0.6, 0.18, 0.7, 0.004),
        };
        vec![
            ("scanline_intensity", PresetUniform::Float(scanlines)),
            ("curvature", PresetUniform::Float(curvature)),
            ("vignette", PresetUniform::Float(vignette)),
            ("aberration", PresetUniform::Float(aberration)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalettePreset {
    Gameboy,
    Cga,
    Amber,
    Green,
}

impl PalettePreset {
    pub const NAMES: &'static [&'static str] = &["gameboy", "cga", "amber", "green"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "gameboy" => Some(Self::Gameboy),
            "cga" => Some(Self::Cga),
            "amber" => Some(Self::Amber),
            "green" => Some(Self::Green),
            _ => None,
        }
    }

    pub fn uniforms(self) -> Vec<(&'static str, PresetUniform)> {
        let (index, dither) = match self {
            PalettePreset::Gameboy => (0, 0.5),
            PalettePreset::Cga => (1, 0.25),
            PalettePreset::Amber => (2, 0.0),
            PalettePreset::Green => (3, 0.0),
        };
        vec![
            ("palette_index", PresetUniform::Int(index)),
            ("dither", PresetUniform::Float(dither)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsciiPreset {
    Fine,
    Coarse,
    Blocky,
}

impl AsciiPreset {
    pub const NAMES: &'static [&'static str] = &["fine", "coarse", "blocky"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "fine" => Some(Self::Fine),
            "coarse" => Some(Self::Coarse),
            "blocky" => Some(Self::Blocky),
            _ => None,
        }
    }

    pub fn uniforms(self) -> Vec<(&'static str, PresetUniform)> {
        let (cell, contrast) = match self {
            AsciiPreset::Fine => (6.0, 1.0),
            AsciiPreset::Coarse => (12.0, 1.2),
            AsciiPreset::Blocky => (20.0, 1.5),
        };
        vec![
            ("cell_size", PresetUniform::Float(cell)),
            ("contrast", PresetUniform::Float(contrast)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhosphorPreset {
    Short,
    Medium,
    Long,
}

impl PhosphorPreset {
    pub const NAMES: &'static [&'static str] = &["short", "medium", "long"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "short" => Some(Self::Short),
            "medium" => Some(Self::Medium),
            "long" => Some(Self::Long),
            _ => None,
        }
    }

    pub fn uniforms(self) -> Vec<(&'static str, PresetUniform)> {
        let (persistence, glow) = match self {
            PhosphorPreset::Short => (0.55, 0.1),
            PhosphorPreset::Medium => (0.75, 0.2),
            PhosphorPreset::Long => (0.9, 0.3),
        };
        vec![
            ("persistence", PresetUniform::Float(persistence)),
            ("glow", PresetUniform::Float(glow)),
        ]
    }
}

/// A resolved preset, tagged by the family it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyPreset {
    Crt(CrtPreset),
    Palette(PalettePreset),
    Ascii(AsciiPreset),
    Phosphor(PhosphorPreset),
}

impl FamilyPreset {
    /// Resolves `name` within `family`, rejecting names the family does not define.
    pub fn parse(family: PassFamily, name: &str) -> Result<Self, EffectError> {
        let normalized = name.trim().to_ascii_lowercase();
        let preset = match family {
            PassFamily::Crt => CrtPreset::from_name(&normalized).map(Self::Crt),
            PassFamily::Palette => PalettePreset::from_name(&normalized).map(Self::Palette),
            PassFamily::Ascii => AsciiPreset::from_name(&normalized).map(Self::Ascii),
            PassFamily::Phosphor => PhosphorPreset::from_name(&normalized).map(Self::Phosphor),
        };
        preset.ok_or_else(|| EffectError::UnknownPreset {
            family,
            name: name.to_string(),
        })
    }

    pub fn family(self) -> PassFamily {
        match self {
            FamilyPreset::Crt(_) => PassFamily::Crt,
            FamilyPreset::Palette(_) => PassFamily::Palette,
            FamilyPreset::Ascii(_) => PassFamily::Ascii,
            FamilyPreset::Phosphor(_) => PassFamily::Phosphor,
        }
    }

    pub fn uniforms(self) -> Vec<(&'static str, PresetUniform)> {
        match self {
            FamilyPreset::Crt(preset) => preset.uniforms(),
            FamilyPreset::Palette(preset) => preset.uniforms(),
            FamilyPreset::Ascii(preset) => preset.uniforms(),
            FamilyPreset::Phosphor(preset) => preset.uniforms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_preset_parses() {
        for family in PassFamily::ALL {
            for name in family.preset_names() {
                let preset = FamilyPreset::parse(family, name).expect("listed preset");
                assert_eq!(preset.family(), family);
                assert!(!preset.uniforms().is_empty());
            }
        }
    }

    #[test]
    fn preset_lookup_is_scoped_to_family() {
        let err = FamilyPreset::parse(PassFamily::Crt, "long").unwrap_err();
        assert_eq!(
            err,
            EffectError::UnknownPreset {
                family: PassFamily::Crt,
                name: "long".into()
            }
        );
        assert!(FamilyPreset::parse(PassFamily::Phosphor, " Long ").is_ok());
    }

    #[test]
    fn only_phosphor_is_feedback() {
        let feedback: Vec<_> = PassFamily::ALL
            .into_iter()
            .filter(|family| family.is_feedback())
            .collect();
        assert_eq!(feedback, vec![PassFamily::Phosphor]);
    }
}
