use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KustomapError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML error in document {index} of {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid reference {reference:?} in {}: {reason}", .origin.display())]
    InvalidReference {
        origin: PathBuf,
        reference: String,
        reason: String,
    },
    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, KustomapError>;
