use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::types::{ReservedUniform, UniformValue};

/// Size of the `vec4` array backing custom (non-reserved) uniforms.
pub const MAX_CUSTOM_UNIFORMS: usize = 16;

/// GLSL type of a custom uniform declared by a user shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
}

impl UniformKind {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "float" => Some(Self::Float),
            "int" => Some(Self::Int),
            "vec2" => Some(Self::Vec2),
            "vec3" => Some(Self::Vec3),
            "vec4" => Some(Self::Vec4),
            _ => None,
        }
    }

    fn accessor(self, slot: usize) -> String {
        match self {
            UniformKind::Float => format!("ubo._iCustom[{slot}].x"),
            UniformKind::Int => format!("int(ubo._iCustom[{slot}].x)"),
            UniformKind::Vec2 => format!("ubo._iCustom[{slot}].xy"),
            UniformKind::Vec3 => format!("ubo._iCustom[{slot}].xyz"),
            UniformKind::Vec4 => format!("ubo._iCustom[{slot}]"),
        }
    }

    /// Whether a bound value has the shape the shader declared.
    pub(crate) fn accepts(self, value: UniformValue) -> bool {
        matches!(
            (self, value),
            (UniformKind::Float, UniformValue::Float(_))
                | (UniformKind::Float, UniformValue::Int(_))
                | (UniformKind::Int, UniformValue::Int(_))
                | (UniformKind::Int, UniformValue::Float(_))
                | (UniformKind::Vec2, UniformValue::Vec2(_))
                | (UniformKind::Vec3, UniformValue::Vec3(_))
                | (UniformKind::Vec4, UniformValue::Vec4(_))
        )
    }
}

/// A `uniform <type> <name>;` declaration lifted out of the user shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomUniform {
    pub name: String,
    pub kind: UniformKind,
    pub slot: usize,
}

/// Result of [`wrap_fragment`]: compilable GLSL plus the custom uniform slots.
#[derive(Debug, Clone)]
pub(crate) struct WrappedFragment {
    pub source: String,
    pub custom_uniforms: Vec<CustomUniform>,
}

const CHANNEL_NAMES: [&str; 2] = ["iChannel0", "iChannel1"];

/// Compiles the fixed quad vertex stage.
pub(crate) fn create_vertex_module(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Hands wrapped GLSL to the device. Errors surface through the caller's error scope.
pub(crate) fn create_fragment_module(
    device: &wgpu::Device,
    label: &str,
    wrapped: &WrappedFragment,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrapped.source.clone()),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Produces a self-contained GLSL fragment shader from `mainImage`-style code.
///
/// 1. Strip `#version` and declarations of the reserved uniforms/channels so
///    the header can own them.
/// 2. Lift every other scalar/vector `uniform` declaration into a slot of the
///    `_iCustom` array and alias it with a `#define`.
/// 3. Prepend [`HEADER`] and append [`FOOTER`].
///
/// Fails with the offending count when more than [`MAX_CUSTOM_UNIFORMS`] are declared.
pub(crate) fn wrap_fragment(source: &str) -> Result<WrappedFragment, String> {
    let mut sanitized = String::with_capacity(source.len());
    let mut custom_uniforms: Vec<CustomUniform> = Vec::new();
    let mut skipped_version = false;

    for line in source.lines() {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
            sanitized.push('\n');
            continue;
        }
        if let Some(declaration) = parse_uniform_declaration(trimmed) {
            if is_reserved(&declaration.1) {
                sanitized.push('\n');
                continue;
            }
            if let Some(kind) = declaration.0 {
                if custom_uniforms.iter().all(|u| u.name != declaration.1) {
                    let slot = custom_uniforms.len();
                    custom_uniforms.push(CustomUniform {
                        name: declaration.1,
                        kind,
                        slot,
                    });
                }
                // Keep line numbers aligned with the author's file for diagnostics.
                sanitized.push('\n');
                continue;
            }
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }

    if custom_uniforms.len() > MAX_CUSTOM_UNIFORMS {
        return Err(format!(
            "shader declares {} custom uniforms; at most {} are supported",
            custom_uniforms.len(),
            MAX_CUSTOM_UNIFORMS
        ));
    }

    let mut defines = String::new();
    for uniform in &custom_uniforms {
        defines.push_str(&format!(
            "#define {} {}\n",
            uniform.name,
            uniform.kind.accessor(uniform.slot)
        ));
    }

    Ok(WrappedFragment {
        source: format!("{HEADER}{defines}\n#line 1\n{sanitized}{FOOTER}"),
        custom_uniforms,
    })
}

/// Splits `uniform <type> <name>[ = ...];` into its type (if scalar/vector) and name.
fn parse_uniform_declaration(line: &str) -> Option<(Option<UniformKind>, String)> {
    let rest = line.strip_prefix("uniform ")?;
    let rest = rest.split(';').next()?;
    let rest = rest.split('=').next()?;
    let mut tokens = rest.split_whitespace().filter(|token| {
        !matches!(*token, "lowp" | "mediump" | "highp")
    });
    let ty = tokens.next()?;
    let name = tokens.next()?;
    if tokens.next().is_some() || name.contains('[') {
        return None;
    }
    Some((UniformKind::parse(ty), name.to_string()))
}

fn is_reserved(name: &str) -> bool {
    ReservedUniform::ALL
        .iter()
        .any(|reserved| reserved.name() == name)
        || CHANNEL_NAMES.contains(&name)
}

/// GLSL prologue injected ahead of every fragment shader.
///
/// The block layout must match [`EffectUniforms`](crate::gpu::EffectUniforms).
const HEADER: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform EffectBlock {
    vec2 _iResolution;
    float _iTime;
    int _iColorMode;
    vec4 _iParams;
    vec4 _iCustom[16];
} ubo;

#define iResolution ubo._iResolution
#define iTime ubo._iTime
#define iColorMode ubo._iColorMode
#define iParams ubo._iParams

layout(set = 1, binding = 0) uniform texture2D reel_channel0_texture;
layout(set = 1, binding = 1) uniform sampler reel_channel0_sampler;
layout(set = 1, binding = 2) uniform texture2D reel_channel1_texture;
layout(set = 1, binding = 3) uniform sampler reel_channel1_sampler;

#define iChannel0 sampler2D(reel_channel0_texture, reel_channel0_sampler)
#define iChannel1 sampler2D(reel_channel1_texture, reel_channel1_sampler)
";

/// Calls `mainImage` with a bottom-left-origin pixel coordinate.
const FOOTER: &str = r"
void main() {
    vec2 fragCoord = v_uv * iResolution;
    vec4 color = vec4(0.0);
    mainImage(color, fragCoord);
    outColor = color;
}
";

/// Maps the [-1, 1] quad to [0, 1] UVs.
///
/// Clip-space Y is inverted so framebuffer row 0 holds the bottom of the
/// image; channel sampling at `fragCoord / iResolution` then lines up without
/// per-shader flips, and readback flips once for top-left consumers.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = a_position * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(a_position.x, -a_position.y, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_strips_reserved_uniforms() {
        let source = r#"
            #version 300 es
            uniform float iTime;
            uniform vec2 iResolution;
            uniform sampler2D iChannel0;
            void mainImage(out vec4 fragColor, in vec2 fragCoord) {
                fragColor = vec4(fragCoord, 0.0, 1.0);
            }
        "#;

        let wrapped = wrap_fragment(source).unwrap();
        assert!(!wrapped.source.contains("uniform float iTime"));
        assert!(!wrapped.source.contains("uniform vec2 iResolution"));
        assert!(!wrapped.source.contains("uniform sampler2D iChannel0"));
        assert!(!wrapped.source.contains("#version 300 es"));
        assert!(wrapped.source.contains("mainImage(color, fragCoord)"));
        assert!(wrapped.custom_uniforms.is_empty());
    }

    #[test]
    fn custom_uniforms_get_sequential_slots() {
        let source = "uniform float persistence;\nuniform highp vec3 tint;\nuniform int palette_index;\n";
        let wrapped = wrap_fragment(source).unwrap();
        let names: Vec<_> = wrapped
            .custom_uniforms
            .iter()
            .map(|u| (u.name.as_str(), u.kind, u.slot))
            .collect();
        assert_eq!(
            names,
            vec![
                ("persistence", UniformKind::Float, 0),
                ("tint", UniformKind::Vec3, 1),
                ("palette_index", UniformKind::Int, 2),
            ]
        );
        assert!(wrapped
            .source
            .contains("#define palette_index int(ubo._iCustom[2].x)"));
    }

    #[test]
    fn too_many_custom_uniforms_is_rejected() {
        let source: String = (0..=MAX_CUSTOM_UNIFORMS)
            .map(|i| format!("uniform float u{i};\n"))
            .collect();
        let err = wrap_fragment(&source).unwrap_err();
        assert!(err.contains("17 custom uniforms"));
    }

    #[test]
    fn array_and_sampler_uniforms_are_left_alone() {
        assert_eq!(parse_uniform_declaration("uniform float weights[4];"), None);
        assert_eq!(
            parse_uniform_declaration("uniform sampler2D noise;"),
            Some((None, "noise".to_string()))
        );
        let wrapped = wrap_fragment("uniform sampler2D noise;\n").unwrap();
        assert!(wrapped.source.contains("uniform sampler2D noise;"));
    }

    #[test]
    fn kinds_accept_matching_values() {
        assert!(UniformKind::Float.accepts(UniformValue::Int(2)));
        assert!(UniformKind::Vec4.accepts(UniformValue::Vec4([0.0; 4])));
        assert!(!UniformKind::Vec2.accepts(UniformValue::Float(1.0)));
    }
}
