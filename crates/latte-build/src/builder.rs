//! Build session orchestration
use crate::compile_stack::CompileStack;
use crate::error::BuildResult;
use crate::flags::BuildFlags;
use crate::pipeline::{BuildPipeline, ModuleOutcome};
use crate::repository::FsModuleRepository;
use crate::toolchain::Toolchain;
use latte_config::{ConfigLoader, WorkspaceConfig};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Outcome of one module in a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReport {
    pub module: String,
    pub outcome: ModuleOutcome,
}

/// Result of a build session
#[derive(Debug)]
pub struct BuildContext {
    /// The requested module
    pub root: String,
    /// Modules in the order they were to be processed
    pub build_order: Vec<String>,
    /// Per-module outcomes of the modules processed, in build order
    pub modules: Vec<ModuleReport>,
    /// Build statistics
    pub stats: BuildStats,
}

impl BuildContext {
    /// Outcome of a module processed in this session
    pub fn outcome(&self, module: &str) -> Option<&ModuleOutcome> {
        self.modules
            .iter()
            .find(|report| report.module == module)
            .map(|report| &report.outcome)
    }

    /// Outcome of the requested module
    pub fn root_outcome(&self) -> Option<&ModuleOutcome> {
        self.outcome(&self.root)
    }
}

/// Build statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Number of modules in the build order
    pub total_modules: usize,
    pub built: usize,
    pub up_to_date: usize,
    pub stubs: usize,
    pub missing: usize,
    pub aborted: usize,
    /// Total build time
    pub total_time: Duration,
}

impl BuildStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one module outcome
    pub fn record(&mut self, outcome: &ModuleOutcome) {
        self.total_modules += 1;
        match outcome {
            ModuleOutcome::Built { .. } => self.built += 1,
            ModuleOutcome::UpToDate => self.up_to_date += 1,
            ModuleOutcome::Stub => self.stubs += 1,
            ModuleOutcome::Missing => self.missing += 1,
            ModuleOutcome::Aborted { .. } => self.aborted += 1,
        }
    }
}

/// Main builder for orchestrating a session
pub struct Builder {
    /// Directory the workspace paths are relative to
    root_dir: PathBuf,
    workspace: WorkspaceConfig,
    flags: BuildFlags,
    toolchain: Toolchain,
}

impl Builder {
    /// Create a builder for the workspace at the given path, reading `xlatte.json`
    pub fn new(workspace_path: impl AsRef<Path>) -> BuildResult<Self> {
        let root_dir = workspace_path.as_ref().to_path_buf();
        let workspace = ConfigLoader::new().load_workspace(&root_dir)?;

        Ok(Self {
            root_dir,
            workspace,
            flags: BuildFlags::default(),
            toolchain: Toolchain::default(),
        })
    }

    /// Set build flags
    pub fn with_flags(mut self, flags: BuildFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the collaborators
    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Replace the loaded workspace configuration
    pub fn with_workspace(mut self, workspace: WorkspaceConfig) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn workspace(&self) -> &WorkspaceConfig {
        &self.workspace
    }

    /// Build `module` and everything it includes
    pub fn build(&self, module: &str) -> BuildResult<BuildContext> {
        let build_start = Instant::now();

        let repository = FsModuleRepository::new(self.workspace.modules_dir(&self.root_dir));
        let stack = CompileStack::build(module, &repository)?;
        let build_order = stack.build_order();

        tracing::debug!("Build order: {}", build_order.join(", "));

        let pipeline = BuildPipeline::new(
            &repository,
            &self.toolchain,
            &self.workspace,
            &self.root_dir,
            self.flags,
        );

        let mut stats = BuildStats::new();
        let mut modules = Vec::with_capacity(build_order.len());

        for name in &build_order {
            let outcome = pipeline.run_module(name)?;
            let aborted = matches!(outcome, ModuleOutcome::Aborted { .. });
            stats.record(&outcome);
            modules.push(ModuleReport {
                module: name.clone(),
                outcome,
            });

            // An aborted module ends the session; later modules are not started
            if aborted {
                break;
            }
        }

        stats.total_time = build_start.elapsed();

        tracing::debug!(
            "Build completed in {:.2}s: {} built, {} up to date",
            stats.total_time.as_secs_f64(),
            stats.built,
            stats.up_to_date
        );

        Ok(BuildContext {
            root: module.to_string(),
            build_order,
            modules,
            stats,
        })
    }
}
