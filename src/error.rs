use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("configuration file {} not found", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("bad value for '{option}' in section [{section}]: {message}")]
    Interpolation {
        section: String,
        option: String,
        message: String,
    },

    #[error("mandatory section [{0}] missing from configuration")]
    MissingSection(String),

    #[error("section [{section}] must define '{key}'")]
    MissingKey { section: String, key: String },

    #[error("failed to write inventory {}: {source}", path.display())]
    InventoryWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "provisioning runner '{runner}' missing on PATH. Install it or choose --runner / AUTOINSTALLER_RUNNER."
    )]
    RunnerMissing { runner: String },

    #[error("failed to launch provisioning runner: {0}")]
    Launch(#[source] io::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml_bw::Error),
}

pub type Result<T> = std::result::Result<T, DeployerError>;
