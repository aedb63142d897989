//! Before/after make hook scripts
//!
//! Hooks are listed in the module manifest (`before-make`, `after-make`) as
//! paths relative to the module's `support/` directory. They run in that
//! directory with the build context exported as environment variables.

use crate::error::{BuildError, BuildResult};
use crate::flags::Profile;
use crate::fsutil;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Default program used for `.js` hooks
pub const DEFAULT_NODE: &str = "node";

/// Hook execution phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HookPhase {
    /// Before any code generation
    BeforeMake,
    /// After the release is assembled
    AfterMake,
}

impl HookPhase {
    /// Manifest key listing the hooks of this phase
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeforeMake => "before-make",
            Self::AfterMake => "after-make",
        }
    }
}

/// How a hook file is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// `.js`, run through the node interpreter
    Node,
    /// `.sh`, run through `sh`
    Shell,
    /// Anything else, executed directly
    Executable,
}

impl HookKind {
    /// Pick the kind from the file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("js") => Self::Node,
            Some("sh") => Self::Shell,
            _ => Self::Executable,
        }
    }
}

/// Build context exported to hooks
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Module name
    pub module: String,
    /// Module root directory
    pub module_dir: PathBuf,
    /// Module `support/` directory, the working directory of every hook
    pub support_dir: PathBuf,
    /// Module release directory
    pub release_dir: PathBuf,
    /// Build profile
    pub profile: Profile,
}

impl HookContext {
    /// Create a hook context
    pub fn new(
        module: impl Into<String>,
        module_dir: impl Into<PathBuf>,
        release_dir: impl Into<PathBuf>,
        profile: Profile,
    ) -> Self {
        let module_dir = module_dir.into();
        Self {
            module: module.into(),
            support_dir: module_dir.join("support"),
            module_dir,
            release_dir: release_dir.into(),
            profile,
        }
    }

    /// Get environment variables for hook execution
    pub fn environment(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();

        env.insert("LATTE_MODULE".to_string(), self.module.clone());
        env.insert(
            "LATTE_MODULE_DIR".to_string(),
            self.module_dir.display().to_string(),
        );
        env.insert(
            "LATTE_RELEASE_DIR".to_string(),
            self.release_dir.display().to_string(),
        );
        env.insert("LATTE_PROFILE".to_string(), self.profile.name().to_string());

        env
    }
}

/// Hook execution result
#[derive(Debug)]
pub struct HookResult {
    /// Hook path as listed in the manifest
    pub name: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub execution_time: Duration,
}

impl HookResult {
    /// Check if the hook succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output
    pub fn output(&self) -> String {
        let mut output = String::new();
        if !self.stdout.is_empty() {
            output.push_str("STDOUT:\n");
            output.push_str(&self.stdout);
            output.push('\n');
        }
        if !self.stderr.is_empty() {
            output.push_str("STDERR:\n");
            output.push_str(&self.stderr);
        }
        output
    }
}

/// Runs hook scripts for one module
pub struct HookRunner {
    context: HookContext,
    node: String,
}

impl HookRunner {
    /// Create a runner for the given context
    pub fn new(context: HookContext) -> Self {
        Self {
            context,
            node: DEFAULT_NODE.to_string(),
        }
    }

    /// Override the interpreter for `.js` hooks
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = node.into();
        self
    }

    /// Run one hook, failing on a missing file or non-zero exit
    pub fn run(&self, hook: &str) -> BuildResult<HookResult> {
        let path = fsutil::absolute(&self.context.support_dir.join(hook))?;

        if !path.is_file() {
            return Err(BuildError::HookNotFound {
                name: hook.to_string(),
                path,
            });
        }

        let kind = HookKind::from_path(&path);
        tracing::debug!("Running hook {} ({:?})", hook, kind);

        let program = match kind {
            HookKind::Node => self.node.clone(),
            HookKind::Shell => "sh".to_string(),
            HookKind::Executable => path.display().to_string(),
        };
        let mut command = Command::new(&program);
        if kind != HookKind::Executable {
            command.arg(&path);
        }

        let start = Instant::now();
        let output = command
            .current_dir(&self.context.support_dir)
            .envs(self.context.environment())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .and_then(|child| child.wait_with_output())
            .map_err(|error| BuildError::ToolSpawn {
                program: program.clone(),
                error,
            })?;

        let result = HookResult {
            name: hook.to_string(),
            exit_code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            execution_time: start.elapsed(),
        };

        for line in result.stdout.lines() {
            tracing::info!("{}", line);
        }
        for line in result.stderr.lines() {
            tracing::warn!("{}", line);
        }

        if !result.success() {
            return Err(BuildError::HookFailed {
                name: result.name.clone(),
                exit_code: result.exit_code,
                output: result.output(),
            });
        }

        tracing::debug!(
            "Hook {} completed in {:.2}s",
            hook,
            result.execution_time.as_secs_f64()
        );

        Ok(result)
    }

    /// Run the hooks of one phase in listed order, stopping at the first failure
    pub fn run_phase(&self, hooks: &[String], phase: HookPhase) -> BuildResult<Vec<HookResult>> {
        if hooks.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!("Executing {} {} hooks", hooks.len(), phase.name());

        hooks.iter().map(|hook| self.run(hook)).collect()
    }
}
