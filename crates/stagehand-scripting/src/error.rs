use std::path::PathBuf;
use thiserror::Error;

use crate::driver::BuildError;
use crate::executor::LoadError;

#[derive(Debug, Error)]
pub enum ScriptingError {
    #[error("Asset event is missing required field: {field}")]
    MalformedEvent { field: &'static str },

    #[error("Cannot derive a file URL from path: {path}")]
    InvalidPath { path: PathBuf },

    #[error("Script manager has not been initialized")]
    NotInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

pub type Result<T> = std::result::Result<T, ScriptingError>;
