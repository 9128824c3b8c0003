use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

/// Path reported for documents parsed from a string rather than a file.
pub(crate) const INLINE_SOURCE: &str = "<inline>";

pub type Result<T, E = TimelineError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("file not found: {}", path.display())]
    ResourceNotFound { path: PathBuf },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TimelineError {
    /// Maps a read failure, treating a missing file as [`TimelineError::ResourceNotFound`].
    pub(crate) fn from_read(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            TimelineError::ResourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            TimelineError::Io(err)
        }
    }
}

/// Deserializes a JSON document, tagging failures with `path`.
pub(crate) fn parse_json<T: DeserializeOwned>(source: &str, path: &Path) -> Result<T> {
    serde_json::from_str(source).map_err(|source| TimelineError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
