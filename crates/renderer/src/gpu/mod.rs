//! Offscreen GPU plumbing.
//!
//! - `context` acquires a headless wgpu adapter/device (or shares one).
//! - `channels` owns the sampler, placeholder texture, and bind group layout
//!   for `iChannel0`/`iChannel1`.
//! - `pipeline` compiles wrapped GLSL into render pipelines and caches them
//!   by source path.
//! - `uniforms` mirrors the std140 block the shader header declares.
//! - `target` owns framebuffers and RGBA8 readback.
//! - `surface` glues everything together behind [`GpuSurface`].

mod channels;
mod context;
mod pipeline;
mod surface;
mod target;
mod uniforms;

pub use context::{AdapterProfile, GpuContext};
pub use pipeline::{ProgramId, ShaderProgram};
pub use surface::GpuSurface;
pub use uniforms::EffectUniforms;

pub(crate) use target::Framebuffer;
