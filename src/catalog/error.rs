use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read music library at {}: {source}", dir.to_string_lossy())]
    LoadFailure {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("media {0} is unreachable")]
    MediaUnreachable(String),

    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}
