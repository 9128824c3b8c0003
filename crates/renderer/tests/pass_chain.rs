//! GPU-backed checks for the surface and pass chain. Each test returns early
//! when the machine has no usable adapter.
use std::fs;
use std::path::{Path, PathBuf};

use renderer::{GpuSurface, PassChain, RenderError, SurfaceConfig, UniformSet, UniformValue};
use tempfile::TempDir;

const SIZE: u32 = 8;

const SOLID_EFFECT: &str = r"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = vec4(iParams.xyz, 1.0);
}
";

const INVERT_PASS: &str = r"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec3 src = texture(iChannel0, fragCoord / iResolution).rgb;
    fragColor = vec4(vec3(1.0) - src, 1.0);
}
";

const GAIN_PASS: &str = r"
uniform float gain;
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec3 src = texture(iChannel0, fragCoord / iResolution).rgb;
    fragColor = vec4(src * gain, 1.0);
}
";

// Accumulates a quarter step per frame on top of its own history.
const ACCUMULATE_PASS: &str = r"
uniform float persistence;
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec3 history = texture(iChannel1, fragCoord / iResolution).rgb;
    fragColor = vec4(history + vec3(0.25), 1.0);
}
";

const GRADIENT_EFFECT: &str = r"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = vec4(fragCoord / iResolution, 0.5, 1.0);
}
";

// Same mapping as the built-in quad stage, written differently.
const MIRRORED_QUAD_VERTEX: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = (a_position + vec2(1.0)) * 0.5;
    gl_Position = vec4(a_position * vec2(1.0, -1.0), 0.0, 1.0);
}
";

const BROKEN_VERTEX: &str = r"#version 450
layout(location = 0) in vec2 a_position;
void main() {
    gl_Position = vec4(no_such_value, 0.0, 1.0);
}
";

fn write_shader(root: &Path, relative: &str, source: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, source).unwrap();
    path
}

fn chain_or_skip(root: &Path) -> Option<PassChain> {
    match PassChain::init(&SurfaceConfig::new(SIZE, SIZE), root) {
        Ok(chain) => Some(chain),
        Err(RenderError::Context(reason)) => {
            eprintln!("skipping GPU test: {reason}");
            None
        }
        Err(other) => panic!("unexpected init failure: {other}"),
    }
}

fn effect_uniforms(rgb: [f32; 3]) -> UniformSet {
    UniformSet::for_effect(0.0, [rgb[0], rgb[1], rgb[2], 0.0], 0)
}

fn first_pixel(frame: &[u8]) -> [u8; 4] {
    [frame[0], frame[1], frame[2], frame[3]]
}

fn assert_close(actual: [u8; 4], expected: [u8; 3]) {
    for (channel, (got, want)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (i16::from(*got) - i16::from(*want)).abs() <= 2,
            "channel {channel}: got {got}, expected {want} (pixel {actual:?})"
        );
    }
}

#[test]
fn chain_without_passes_returns_effect_output() {
    let dir = TempDir::new().unwrap();
    let effect_path = write_shader(dir.path(), "effect.frag", SOLID_EFFECT);
    let Some(mut chain) = chain_or_skip(dir.path()) else {
        return;
    };

    let effect = chain.surface_mut().load_shader(&effect_path).unwrap();
    let program = chain.surface().program(effect).unwrap();
    assert_eq!(program.source_path(), effect_path.as_path());
    assert!(program.custom_uniforms().is_empty());
    let frame = chain.render(effect, &effect_uniforms([1.0, 0.0, 0.0]), 0.0).unwrap();
    assert_eq!(frame.len(), (SIZE * SIZE * 4) as usize);
    assert_close(first_pixel(&frame), [255, 0, 0]);
}

#[test]
fn chained_passes_compose_in_registration_order() {
    let dir = TempDir::new().unwrap();
    let effect_path = write_shader(dir.path(), "effect.frag", SOLID_EFFECT);
    let invert_path = write_shader(dir.path(), "invert.frag", INVERT_PASS);
    let gain_path = write_shader(dir.path(), "gain.frag", GAIN_PASS);
    let Some(mut chained) = chain_or_skip(dir.path()) else {
        return;
    };
    let uniforms = effect_uniforms([0.2, 0.4, 0.6]);

    let effect = chained.surface_mut().load_shader(&effect_path).unwrap();
    chained.add_pass(&invert_path, UniformSet::new()).unwrap();
    chained
        .add_pass(&gain_path, UniformSet::new().with("gain", 0.5f32))
        .unwrap();
    let combined = chained.render(effect, &uniforms, 0.0).unwrap();
    assert_eq!(chained.surface().program_count(), 3);
    let gain = chained.surface_mut().load_shader(&gain_path).unwrap();
    assert!(chained.surface().program(gain).unwrap().declares("gain"));
    assert_close(first_pixel(&combined), [102, 77, 51]);

    // Same stages, one pass at a time: the second step starts from the first
    // step's output expressed as an effect color.
    let Some(mut single) = chain_or_skip(dir.path()) else {
        return;
    };
    let effect = single.surface_mut().load_shader(&effect_path).unwrap();
    single.add_pass(&invert_path, UniformSet::new()).unwrap();
    let inverted = single.render(effect, &uniforms, 0.0).unwrap();
    let rgb = [inverted[0], inverted[1], inverted[2]].map(|c| f32::from(c) / 255.0);

    let Some(mut second) = chain_or_skip(dir.path()) else {
        return;
    };
    let effect = second.surface_mut().load_shader(&effect_path).unwrap();
    second
        .add_pass(&gain_path, UniformSet::new().with("gain", 0.5f32))
        .unwrap();
    let stepwise = second.render(effect, &effect_uniforms(rgb), 0.0).unwrap();

    assert_close(first_pixel(&combined), [stepwise[0], stepwise[1], stepwise[2]]);
}

#[test]
fn feedback_pass_reads_previous_frame_and_resize_clears_history() {
    let dir = TempDir::new().unwrap();
    let effect_path = write_shader(dir.path(), "effect.frag", SOLID_EFFECT);
    write_shader(dir.path(), "passes/phosphor.frag", ACCUMULATE_PASS);
    let Some(mut chain) = chain_or_skip(dir.path()) else {
        return;
    };
    let effect = chain.surface_mut().load_shader(&effect_path).unwrap();
    chain.add_phosphor_pass("medium").unwrap();
    let uniforms = effect_uniforms([0.0, 0.0, 0.0]);

    let first = chain.render(effect, &uniforms, 0.0).unwrap();
    assert_close(first_pixel(&first), [64, 64, 64]);
    let second = chain.render(effect, &uniforms, 0.1).unwrap();
    assert_close(first_pixel(&second), [128, 128, 128]);
    assert_eq!(chain.feedback_state().map(|state| state.frame()), Some(2));

    assert!(matches!(
        chain.resize(0, SIZE),
        Err(RenderError::InvalidConfig(_))
    ));
    assert_eq!(chain.dimensions(), (SIZE, SIZE));

    chain.resize(SIZE * 2, SIZE).unwrap();
    assert_eq!(chain.dimensions(), (SIZE * 2, SIZE));
    assert_eq!(chain.surface().size().unwrap(), (SIZE * 2, SIZE));
    assert_eq!(chain.feedback_state().map(|state| state.frame()), Some(0));
    let after_resize = chain.render(effect, &uniforms, 0.2).unwrap();
    assert_eq!(after_resize.len(), (SIZE * 2 * SIZE * 4) as usize);
    assert_close(first_pixel(&after_resize), [64, 64, 64]);
}

#[test]
fn second_feedback_pass_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_shader(dir.path(), "passes/phosphor.frag", ACCUMULATE_PASS);
    let Some(mut chain) = chain_or_skip(dir.path()) else {
        return;
    };
    chain.add_phosphor_pass("short").unwrap();
    let err = chain.add_phosphor_pass("long").unwrap_err();
    assert!(matches!(err, RenderError::InvalidConfig(_)), "{err}");
    assert_eq!(chain.pass_count(), 1);
}

#[test]
fn preset_changes_are_validated_before_mutation() {
    let dir = TempDir::new().unwrap();
    write_shader(dir.path(), "passes/phosphor.frag", ACCUMULATE_PASS);
    let Some(mut chain) = chain_or_skip(dir.path()) else {
        return;
    };

    assert!(matches!(
        chain.set_crt_preset("classic"),
        Err(RenderError::InvalidConfig(_))
    ));

    let id = chain.add_phosphor_pass("short").unwrap();
    let before = chain.pass(id).unwrap();
    assert!(matches!(
        chain.set_phosphor_preset("blinding"),
        Err(RenderError::InvalidConfig(_))
    ));
    assert_eq!(chain.pass(id).unwrap(), before);

    chain.set_phosphor_preset("long").unwrap();
    let after = chain.pass(id).unwrap();
    assert_eq!(after.uniforms.get("persistence"), Some(UniformValue::Float(0.9)));
}

#[test]
fn shader_load_failures_are_typed() {
    let dir = TempDir::new().unwrap();
    let broken = write_shader(
        dir.path(),
        "broken.frag",
        "void mainImage(out vec4 c, in vec2 p) { c = undefined_symbol; }\n",
    );
    let mut surface = match GpuSurface::init(&SurfaceConfig::new(SIZE, SIZE)) {
        Ok(surface) => surface,
        Err(RenderError::Context(reason)) => {
            eprintln!("skipping GPU test: {reason}");
            return;
        }
        Err(other) => panic!("unexpected init failure: {other}"),
    };

    let missing = surface.load_shader(dir.path().join("missing.frag"));
    assert!(matches!(missing, Err(RenderError::ResourceNotFound { .. })));

    match surface.load_shader(&broken) {
        Err(RenderError::ShaderCompile { diagnostic, .. }) => assert!(!diagnostic.is_empty()),
        other => panic!("expected compile error, got {:?}", other.err()),
    }
    assert_eq!(surface.program_count(), 0);
}

fn surface_or_skip() -> Option<GpuSurface> {
    match GpuSurface::init(&SurfaceConfig::new(SIZE, SIZE)) {
        Ok(surface) => Some(surface),
        Err(RenderError::Context(reason)) => {
            eprintln!("skipping GPU test: {reason}");
            None
        }
        Err(other) => panic!("unexpected init failure: {other}"),
    }
}

#[test]
fn custom_vertex_stage_matches_default_quad() {
    let dir = TempDir::new().unwrap();
    let default_path = write_shader(dir.path(), "default.frag", GRADIENT_EFFECT);
    let custom_path = write_shader(dir.path(), "custom.frag", GRADIENT_EFFECT);
    let broken_path = write_shader(dir.path(), "broken_vertex.frag", GRADIENT_EFFECT);
    let Some(mut surface) = surface_or_skip() else {
        return;
    };

    match surface.load_shader_with_vertex(&broken_path, BROKEN_VERTEX) {
        Err(RenderError::ShaderCompile { path, diagnostic }) => {
            assert_eq!(path, broken_path);
            assert!(!diagnostic.is_empty());
        }
        other => panic!("expected compile error, got {:?}", other.err()),
    }
    assert_eq!(surface.program_count(), 0);

    let uniforms = UniformSet::new();
    let default = surface.load_shader(&default_path).unwrap();
    let custom = surface
        .load_shader_with_vertex(&custom_path, MIRRORED_QUAD_VERTEX)
        .unwrap();
    assert_ne!(default, custom);

    let expected = surface.render(default, &uniforms).unwrap();
    let actual = surface.render(custom, &uniforms).unwrap();
    assert_eq!(expected.len(), actual.len());
    for (pixel, (want, got)) in expected.chunks(4).zip(actual.chunks(4)).enumerate() {
        assert_close([got[0], got[1], got[2], got[3]], [want[0], want[1], want[2]]);
        assert_eq!(got[3], want[3], "alpha differs at pixel {pixel}");
    }
}

#[test]
fn pass_uniform_overrides_one_preset_value() {
    let dir = TempDir::new().unwrap();
    let effect_path = write_shader(dir.path(), "effect.frag", SOLID_EFFECT);
    write_shader(dir.path(), "passes/crt.frag", GAIN_PASS);
    let Some(mut chain) = chain_or_skip(dir.path()) else {
        return;
    };
    let effect = chain.surface_mut().load_shader(&effect_path).unwrap();
    let id = chain.add_crt_pass("classic").unwrap();
    let preset = chain.pass(id).unwrap().uniforms;

    chain.set_pass_uniform(id, "gain", 0.5f32).unwrap();
    let info = chain.pass(id).unwrap();
    assert_eq!(info.uniforms.get("gain"), Some(UniformValue::Float(0.5)));
    for (name, value) in preset.iter() {
        assert_eq!(info.uniforms.get(name), Some(value), "{name} changed");
    }

    let frame = chain.render(effect, &effect_uniforms([0.8, 0.4, 0.2]), 0.0).unwrap();
    assert_close(first_pixel(&frame), [102, 51, 26]);
}

#[test]
fn released_chain_refuses_to_render() {
    let dir = TempDir::new().unwrap();
    let effect_path = write_shader(dir.path(), "effect.frag", SOLID_EFFECT);
    let Some(mut chain) = chain_or_skip(dir.path()) else {
        return;
    };
    let effect = chain.surface_mut().load_shader(&effect_path).unwrap();
    chain.release();
    chain.release();
    assert!(chain.is_released());
    assert!(matches!(
        chain.render(effect, &UniformSet::new(), 0.0),
        Err(RenderError::Released)
    ));
}
