use std::collections::BTreeMap;

use effects::PresetUniform;

use crate::gpu::GpuContext;

/// Post-process shaders read from `iChannel0` and, for feedback passes, `iChannel1`.
pub const CHANNEL_COUNT: usize = 2;

/// How a surface obtains its rendering context.
#[derive(Clone, Default)]
pub enum ContextMode {
    /// Request a fresh adapter/device with no presentation surface.
    #[default]
    Headless,
    /// Reuse a device that another surface already acquired.
    Shared(GpuContext),
}

impl std::fmt::Debug for ContextMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextMode::Headless => f.write_str("Headless"),
            ContextMode::Shared(_) => f.write_str("Shared"),
        }
    }
}

/// Adapter preference used when acquiring a headless context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// Start-up configuration for a [`GpuSurface`](crate::GpuSurface).
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// Offscreen framebuffer size in pixels.
    pub width: u32,
    pub height: u32,
    pub mode: ContextMode,
    pub power: GpuPowerPreference,
}

impl SurfaceConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            mode: ContextMode::Headless,
            power: GpuPowerPreference::default(),
        }
    }
}

/// A single uniform value bound by name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    /// Widens the value into one std140 `vec4` slot.
    pub(crate) fn to_slot(self) -> [f32; 4] {
        match self {
            UniformValue::Float(value) => [value, 0.0, 0.0, 0.0],
            UniformValue::Int(value) => [value as f32, 0.0, 0.0, 0.0],
            UniformValue::Vec2([x, y]) => [x, y, 0.0, 0.0],
            UniformValue::Vec3([x, y, z]) => [x, y, z, 0.0],
            UniformValue::Vec4(value) => value,
        }
    }

    pub fn as_float(self) -> Option<f32> {
        match self {
            UniformValue::Float(value) => Some(value),
            UniformValue::Int(value) => Some(value as f32),
            _ => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<PresetUniform> for UniformValue {
    fn from(value: PresetUniform) -> Self {
        match value {
            PresetUniform::Float(value) => UniformValue::Float(value),
            PresetUniform::Int(value) => UniformValue::Int(value),
        }
    }
}

/// Name → value map handed to [`GpuSurface::render`](crate::GpuSurface::render).
///
/// The reserved names `iTime`, `iResolution`, `iParams`, and `iColorMode` feed
/// the fixed uniform block; every other entry is matched against the custom
/// uniforms the program declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformSet {
    values: BTreeMap<String, UniformValue>,
}

impl UniformSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the standard effect uniforms for one frame.
    pub fn for_effect(time: f32, params: [f32; 4], color_mode: i32) -> Self {
        let mut set = Self::new();
        set.insert(ReservedUniform::Time.name(), time);
        set.insert(ReservedUniform::Params.name(), params);
        set.insert(ReservedUniform::ColorMode.name(), color_mode);
        set
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Overwrites entries present in `other`, keeping the rest.
    pub fn merge(&mut self, other: &UniformSet) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), *value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, UniformValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<N: Into<String>, V: Into<UniformValue>> FromIterator<(N, V)> for UniformSet {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

/// Uniform names owned by the fixed block layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedUniform {
    Time,
    Resolution,
    Params,
    ColorMode,
}

impl ReservedUniform {
    pub const ALL: [ReservedUniform; 4] = [
        ReservedUniform::Time,
        ReservedUniform::Resolution,
        ReservedUniform::Params,
        ReservedUniform::ColorMode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReservedUniform::Time => "iTime",
            ReservedUniform::Resolution => "iResolution",
            ReservedUniform::Params => "iParams",
            ReservedUniform::ColorMode => "iColorMode",
        }
    }
}
