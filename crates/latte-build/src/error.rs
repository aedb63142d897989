//! Build system error types
use latte_config::ConfigError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Graph in which a cycle was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// `module-include` edges between modules
    Inclusion,
    /// `extends` edges between classes of one module
    Inheritance,
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inclusion => write!(f, "module inclusion"),
            Self::Inheritance => write!(f, "class inheritance"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Module {module} does not exist: {path}")]
    ModuleNotFound { module: String, path: PathBuf },

    #[error("Cycle detected in {kind}: {cycle}")]
    CycleDetected { kind: CycleKind, cycle: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to spawn {program}: {error}")]
    ToolSpawn {
        program: String,
        error: std::io::Error,
    },

    #[error("{program} exited with code {exit_code}: {output}")]
    ToolFailed {
        program: String,
        exit_code: i32,
        output: String,
    },

    #[error("Hook script '{name}' not found at {path}")]
    HookNotFound { name: String, path: PathBuf },

    #[error("Hook script '{name}' failed with exit code {exit_code}:\n{output}")]
    HookFailed {
        name: String,
        exit_code: i32,
        output: String,
    },

    #[error("Stage '{stage}' failed: {error}")]
    StageFailed { stage: String, error: String },
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a module not found error
    pub fn module_not_found(module: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::ModuleNotFound {
            module: module.into(),
            path: path.into(),
        }
    }

    /// Create a cycle error from the names along the cycle
    pub fn cycle(kind: CycleKind, names: &[impl AsRef<str>]) -> Self {
        Self::CycleDetected {
            kind,
            cycle: names
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(" -> "),
        }
    }

    /// Create a stage failure raised by a collaborator
    pub fn stage(stage: impl Into<String>, error: impl ToString) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message() {
        let err = BuildError::cycle(CycleKind::Inclusion, &["a", "b", "a"]);
        assert_eq!(
            err.to_string(),
            "Cycle detected in module inclusion: a -> b -> a"
        );
    }

    #[test]
    fn test_error_messages() {
        let err = BuildError::module_not_found("forms", "/srv/datalatte/forms");
        assert_eq!(
            err.to_string(),
            "Module forms does not exist: /srv/datalatte/forms"
        );
        assert_eq!(
            BuildError::stage("CSS", "boom").to_string(),
            "Stage 'CSS' failed: boom"
        );
    }
}
