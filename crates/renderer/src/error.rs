use std::path::PathBuf;

use effects::EffectError;

pub type Result<T, E = RenderError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("shader not found at {}", path.display())]
    ResourceNotFound { path: PathBuf },
    #[error("failed to compile shader {}:\n{diagnostic}", path.display())]
    ShaderCompile { path: PathBuf, diagnostic: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to acquire GPU context: {0}")]
    Context(String),
    #[error("failed to read back rendered pixels: {0}")]
    Readback(String),
    #[error("renderer resources have already been released")]
    Released,
}

impl From<EffectError> for RenderError {
    fn from(value: EffectError) -> Self {
        RenderError::InvalidConfig(value.to_string())
    }
}
