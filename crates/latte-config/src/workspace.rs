//! Workspace Configuration (xlatte.json)
//!
//! Locates the modules directory and the output directory, both relative to
//! the directory the build is invoked from.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the workspace configuration
pub const WORKSPACE_CONFIG_FILE: &str = "xlatte.json";

/// Workspace configuration from xlatte.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// Directory holding one sub-directory per module
    #[serde(default = "default_modules")]
    pub modules: PathBuf,

    /// Directory receiving releases and the published configuration
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_modules() -> PathBuf {
    PathBuf::from("datalatte")
}

fn default_output() -> PathBuf {
    PathBuf::from("html/datalatte-files")
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            modules: default_modules(),
            output: default_output(),
        }
    }
}

impl WorkspaceConfig {
    /// Load workspace configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::JsonParseError {
                file: path.to_path_buf(),
                error: e,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.modules.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "modules".to_string(),
                reason: "modules directory cannot be empty".to_string(),
            });
        }

        if self.output.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "output".to_string(),
                reason: "output directory cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Serialize to the JSON published alongside releases
    pub fn to_json(&self) -> ConfigResult<String> {
        serde_json::to_string(self).map_err(|e| ConfigError::JsonParseError {
            file: PathBuf::from(WORKSPACE_CONFIG_FILE),
            error: e,
        })
    }

    /// Absolute modules directory for the given working directory
    pub fn modules_dir(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.modules)
    }

    /// Absolute output directory for the given working directory
    pub fn output_dir(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.output)
    }

    /// Directory holding one release directory per module
    pub fn releases_dir(&self, cwd: &Path) -> PathBuf {
        self.output_dir(cwd).join("releases")
    }
}
