use bytemuck::{Pod, Zeroable};

use crate::compile::{CustomUniform, MAX_CUSTOM_UNIFORMS};
use crate::types::{ReservedUniform, UniformSet, UniformValue};

/// CPU mirror of the `EffectBlock` declared in the shader header.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectUniforms {
    pub i_resolution: [f32; 2],
    pub i_time: f32,
    pub i_color_mode: i32,
    pub i_params: [f32; 4],
    pub i_custom: [[f32; 4]; MAX_CUSTOM_UNIFORMS],
}

unsafe impl Zeroable for EffectUniforms {}
unsafe impl Pod for EffectUniforms {}

impl EffectUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            i_resolution: [width as f32, height as f32],
            i_time: 0.0,
            i_color_mode: 0,
            i_params: [0.0; 4],
            i_custom: [[0.0; 4]; MAX_CUSTOM_UNIFORMS],
        }
    }

    /// Packs `values` for a program declaring `custom`.
    ///
    /// `iResolution` defaults to the target size; entries the program does not
    /// declare are skipped and declared names absent from `values` stay zero.
    pub(crate) fn pack(
        width: u32,
        height: u32,
        values: &UniformSet,
        custom: &[CustomUniform],
    ) -> Self {
        let mut uniforms = Self::new(width, height);
        for (name, value) in values.iter() {
            match reserved(name) {
                Some(ReservedUniform::Time) => match value.as_float() {
                    Some(time) => uniforms.i_time = time,
                    None => mismatched(name, value),
                },
                Some(ReservedUniform::Resolution) => match value {
                    UniformValue::Vec2(resolution) => uniforms.i_resolution = resolution,
                    _ => mismatched(name, value),
                },
                Some(ReservedUniform::Params) => match value {
                    UniformValue::Vec4(params) => uniforms.i_params = params,
                    _ => mismatched(name, value),
                },
                Some(ReservedUniform::ColorMode) => match value {
                    UniformValue::Int(mode) => uniforms.i_color_mode = mode,
                    UniformValue::Float(mode) => uniforms.i_color_mode = color_mode_from_float(mode),
                    _ => mismatched(name, value),
                },
                None => match custom.iter().find(|uniform| uniform.name == name) {
                    Some(uniform) if uniform.kind.accepts(value) => {
                        uniforms.i_custom[uniform.slot] = value.to_slot();
                    }
                    Some(_) => mismatched(name, value),
                    None => {
                        tracing::trace!(uniform = name, "program does not declare uniform; skipping");
                    }
                },
            }
        }
        uniforms
    }
}

fn reserved(name: &str) -> Option<ReservedUniform> {
    ReservedUniform::ALL
        .into_iter()
        .find(|reserved| reserved.name() == name)
}

/// Color modes are integral; fractional floats are rounded with a warning.
fn color_mode_from_float(mode: f32) -> i32 {
    let rounded = mode.round();
    if rounded != mode {
        tracing::warn!(value = mode, rounded, "iColorMode is not integral; rounding");
    }
    rounded as i32
}

fn mismatched(name: &str, value: UniformValue) {
    tracing::warn!(uniform = name, ?value, "uniform value does not match declared type; skipping");
}
