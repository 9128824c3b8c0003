//! Offscreen shader renderer for reel capture.
//!
//! Effects are ShaderToy-style fragment shaders driven by a fixed uniform
//! contract (`iTime`, `iResolution`, `iParams`, `iColorMode`). They can be
//! rendered directly through an [`EffectRegistry`], or through a
//! [`PassChain`] that feeds the effect output into post-process passes:
//!
//! ```text
//!   effect program ──▶ primary framebuffer
//!                            │ iChannel0
//!                            ▼
//!                      pass 0 (crt) ──▶ pass 1 (phosphor) ──▶ readback (RGBA8)
//!                                            ▲      │
//!                                  iChannel1 └──────┘ ping-pong pair
//! ```
//!
//! Every call blocks until the GPU readback finishes. Surfaces, chains, and
//! registries own their GPU resources exclusively and release them on drop;
//! `release()` does so eagerly and leaves the value unusable.

mod chain;
mod compile;
mod error;
mod gpu;
mod registry;
mod types;

pub use chain::{PassChain, PassId, PassInfo, PassKind, PingPongState};
pub use compile::{CustomUniform, UniformKind, MAX_CUSTOM_UNIFORMS};
pub use error::{RenderError, Result};
pub use gpu::{AdapterProfile, EffectUniforms, GpuContext, GpuSurface, ProgramId, ShaderProgram};
pub use registry::{effect_uniforms, EffectRegistry, RegistryConfig};
pub use types::{
    ContextMode, GpuPowerPreference, ReservedUniform, SurfaceConfig, UniformSet, UniformValue,
    CHANNEL_COUNT,
};
