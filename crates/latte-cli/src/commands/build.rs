//! Build command - build a module and the modules it includes

use crate::config::Config;
use anyhow::{Context, Result};
use latte_build::{BuildContext, BuildFlags, Builder, ModuleOutcome, StageKind};
use std::path::PathBuf;
use std::process::ExitCode;

/// Build command arguments
#[derive(Debug, Default)]
pub struct BuildArgs {
    /// Module to build
    pub module: String,
    /// Minify the emitted script
    pub minimize: bool,
    /// Release build
    pub release: bool,
    /// Widen generated record field types
    pub records_any: bool,
    /// Rebuild even when the release is up to date
    pub force: bool,
    /// Stop each module's pipeline after this stage
    pub abort_after: Option<StageKind>,
    /// Workspace directory (defaults to current directory)
    pub workspace_dir: Option<PathBuf>,
}

impl BuildArgs {
    fn flags(&self) -> BuildFlags {
        BuildFlags::new()
            .with_minimize(self.minimize)
            .with_release(self.release)
            .with_widen_record_types(self.records_any)
            .with_force(self.force)
            .with_abort_after(self.abort_after)
    }
}

/// Run the build command
pub fn run(args: BuildArgs, config: &Config) -> Result<BuildContext> {
    let workspace_dir = args
        .workspace_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let module = args.module.to_lowercase();

    let builder = Builder::new(&workspace_dir)
        .context("Failed to load workspace configuration")?
        .with_flags(args.flags())
        .with_toolchain(config.toolchain());

    tracing::debug!("Building {} ({} profile)", module, args.flags().profile());

    let context = builder
        .build(&module)
        .with_context(|| format!("Build of {} failed", module))?;

    report(&context);

    Ok(context)
}

fn report(context: &BuildContext) {
    for report in &context.modules {
        tracing::debug!("{}: {}", report.module, report.outcome.label());
    }

    let stats = &context.stats;
    tracing::info!(
        "Finished {} in {:.2}s: {} built, {} up to date, {} missing",
        context.root,
        stats.total_time.as_secs_f64(),
        stats.built,
        stats.up_to_date,
        stats.missing
    );
}

/// A stub root module is a failed build; everything else exits cleanly
pub fn exit_code(context: &BuildContext) -> ExitCode {
    match context.root_outcome() {
        Some(ModuleOutcome::Stub) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latte_build::Profile;

    #[test]
    fn test_flags_default() {
        let flags = BuildArgs::default().flags();
        assert_eq!(flags, BuildFlags::default());
        assert_eq!(flags.profile(), Profile::Dev);
    }

    #[test]
    fn test_flags_from_args() {
        let args = BuildArgs {
            module: "forms".to_string(),
            minimize: true,
            release: true,
            records_any: true,
            force: true,
            abort_after: Some(StageKind::Compile),
            ..Default::default()
        };
        let flags = args.flags();

        assert!(flags.minimize);
        assert!(flags.force);
        assert!(flags.widen_record_types);
        assert_eq!(flags.profile(), Profile::Release);
        assert_eq!(flags.abort_after, Some(StageKind::Compile));
    }

    #[test]
    fn test_stub_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("datalatte/docs")).unwrap();

        let args = BuildArgs {
            module: "Docs".to_string(),
            workspace_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let context = run(args, &Config::default()).unwrap();
        assert_eq!(context.root, "docs");
        assert_eq!(context.root_outcome(), Some(&ModuleOutcome::Stub));
    }

    #[test]
    fn test_missing_root_succeeds() {
        let dir = tempfile::tempdir().unwrap();

        let args = BuildArgs {
            module: "nowhere".to_string(),
            workspace_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let context = run(args, &Config::default()).unwrap();
        assert_eq!(context.root_outcome(), Some(&ModuleOutcome::Missing));
    }
}
