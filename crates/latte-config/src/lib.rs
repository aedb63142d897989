//! Latte Configuration System
//!
//! Provides configuration management for latte module builds:
//! - Workspace configuration (`xlatte.json` in the working directory)
//! - Module manifests (`module.json` at each module root)
//!
//! Both files are optional. When one is absent its defaults are substituted
//! and a warning is logged; a file that exists but does not parse is an error.
//!
//! # Example
//!
//! ```no_run
//! use latte_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let workspace = loader.load_workspace(Path::new(".")).unwrap();
//! let manifest = loader.load_manifest(&workspace.modules_dir(Path::new(".")).join("_core")).unwrap();
//! ```

pub mod loader;
pub mod manifest;
pub mod workspace;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid JSON in {file}: {error}")]
    JsonParseError {
        file: PathBuf,
        error: serde_json::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::ConfigLoader;
pub use manifest::ModuleManifest;
pub use workspace::WorkspaceConfig;
