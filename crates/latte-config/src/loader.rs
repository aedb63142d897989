//! Configuration Loader
//!
//! Loads the workspace configuration and module manifests, substituting
//! defaults for files that do not exist.

use crate::manifest::{ModuleManifest, MANIFEST_FILE};
use crate::workspace::{WorkspaceConfig, WORKSPACE_CONFIG_FILE};
use crate::{ConfigError, ConfigResult};
use std::path::Path;

/// Configuration loader
///
/// A missing file is not an error: the loader logs a warning and returns the
/// defaults. Malformed files are reported as errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigLoader {
    _private: (),
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Load `xlatte.json` from the given working directory
    pub fn load_workspace(&self, cwd: &Path) -> ConfigResult<WorkspaceConfig> {
        let path = cwd.join(WORKSPACE_CONFIG_FILE);

        match WorkspaceConfig::load_from_file(&path) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => {
                tracing::warn!(
                    "No {} present. Using default configuration.",
                    WORKSPACE_CONFIG_FILE
                );
                Ok(WorkspaceConfig::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Load `module.json` from the given module directory
    pub fn load_manifest(&self, module_dir: &Path) -> ConfigResult<ModuleManifest> {
        let path = module_dir.join(MANIFEST_FILE);

        match ModuleManifest::load_from_file(&path) {
            Ok(manifest) => Ok(manifest),
            Err(ConfigError::NotFound(_)) => {
                tracing::warn!(
                    "{} not found. Defaults for manifest will be used",
                    path.display()
                );
                Ok(ModuleManifest::default())
            }
            Err(e) => Err(e),
        }
    }
}
