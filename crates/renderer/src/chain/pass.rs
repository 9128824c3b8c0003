use std::path::{Path, PathBuf};

use effects::{AsciiPreset, CrtPreset, FamilyPreset, PalettePreset, PassFamily, PhosphorPreset};

use crate::gpu::{Framebuffer, ProgramId};
use crate::types::UniformSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) usize);

impl PassId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Custom,
    Crt(CrtPreset),
    Palette(PalettePreset),
    Ascii(AsciiPreset),
    Phosphor(PhosphorPreset),
}

impl PassKind {
    pub fn family(self) -> Option<PassFamily> {
        self.preset().map(FamilyPreset::family)
    }

    pub fn preset(self) -> Option<FamilyPreset> {
        match self {
            PassKind::Custom => None,
            PassKind::Crt(preset) => Some(FamilyPreset::Crt(preset)),
            PassKind::Palette(preset) => Some(FamilyPreset::Palette(preset)),
            PassKind::Ascii(preset) => Some(FamilyPreset::Ascii(preset)),
            PassKind::Phosphor(preset) => Some(FamilyPreset::Phosphor(preset)),
        }
    }

    pub fn is_feedback(self) -> bool {
        self.family().is_some_and(PassFamily::is_feedback)
    }
}

impl From<FamilyPreset> for PassKind {
    fn from(preset: FamilyPreset) -> Self {
        match preset {
            FamilyPreset::Crt(preset) => PassKind::Crt(preset),
            FamilyPreset::Palette(preset) => PassKind::Palette(preset),
            FamilyPreset::Ascii(preset) => PassKind::Ascii(preset),
            FamilyPreset::Phosphor(preset) => PassKind::Phosphor(preset),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassInfo {
    pub id: PassId,
    pub kind: PassKind,
    pub shader_path: PathBuf,
    pub uniforms: UniformSet,
}

pub(crate) struct RenderPass {
    pub kind: PassKind,
    pub program: ProgramId,
    pub shader_path: PathBuf,
    pub uniforms: UniformSet,
    pub framebuffer: Framebuffer,
}

impl RenderPass {
    pub fn new(
        device: &wgpu::Device,
        kind: PassKind,
        program: ProgramId,
        shader_path: &Path,
        uniforms: UniformSet,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            kind,
            program,
            shader_path: shader_path.to_path_buf(),
            uniforms,
            framebuffer: Framebuffer::new(device, "pass output", width, height),
        }
    }

    pub fn apply_preset(&mut self, preset: FamilyPreset) {
        for (name, value) in preset.uniforms() {
            self.uniforms.insert(name, value);
        }
        self.kind = preset.into();
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.framebuffer = Framebuffer::new(device, "pass output", width, height);
    }

    pub fn info(&self, id: PassId) -> PassInfo {
        PassInfo {
            id,
            kind: self.kind,
            shader_path: self.shader_path.clone(),
            uniforms: self.uniforms.clone(),
        }
    }
}

pub(crate) fn preset_uniforms(preset: FamilyPreset) -> UniformSet {
    preset.uniforms().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_family_preset() {
        for family in PassFamily::ALL {
            for name in family.preset_names() {
                let preset = FamilyPreset::parse(family, name).unwrap();
                let kind = PassKind::from(preset);
                assert_eq!(kind.preset(), Some(preset));
                assert_eq!(kind.family(), Some(family));
            }
        }
    }

    #[test]
    fn only_phosphor_kind_is_feedback() {
        assert!(!PassKind::Custom.is_feedback());
        assert!(!PassKind::Crt(CrtPreset::Heavy).is_feedback());
        assert!(PassKind::Phosphor(PhosphorPreset::Short).is_feedback());
    }

    #[test]
    fn preset_uniforms_convert_to_uniform_values() {
        let set = preset_uniforms(FamilyPreset::Palette(PalettePreset::Cga));
        assert_eq!(set.get("palette_index"), Some(crate::UniformValue::Int(1)));
        assert_eq!(set.get("dither"), Some(crate::UniformValue::Float(0.25)));
    }
}
