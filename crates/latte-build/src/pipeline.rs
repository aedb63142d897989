//! Per-module build pipeline
//!
//! A module is built by a fixed, ordered list of stages. Each stage runs to
//! completion before the next starts; a stage marked `abort_after` ends the
//! run early with [`ModuleOutcome::Aborted`]. Before any stage runs the
//! module must exist, must not be a stub, and must be stale (or forced).

use crate::compile_order::{CompileOrderResolver, SourceUnit, RECORDS_UNIT_FILE, UNIT_EXTENSION};
use crate::error::{BuildError, BuildResult};
use crate::flags::BuildFlags;
use crate::fsutil;
use crate::hooks::{HookContext, HookPhase, HookRunner};
use crate::release::{self, ArtifactKind, ReleaseLayout};
use crate::repository::{ModuleDescriptor, ModuleLayout, ModuleRepository};
use crate::staleness::StalenessGate;
use crate::toolchain::{CompileRequest, ExtractedView, Toolchain};
use latte_config::workspace::WORKSPACE_CONFIG_FILE;
use latte_config::WorkspaceConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Reference manifest written into the module's `ts/` directory
pub const REFERENCE_MANIFEST_FILE: &str = "all.ts";

/// Concatenated view classes in `support/ts-include/`
pub const VIEWS_FILE: &str = "views.ts";

/// View markup bank in `support/ts-include/`
pub const VIEWS_BANK_FILE: &str = "views_bank.ts";

/// Server records file in `support/`
pub const SERVER_RECORDS_FILE: &str = "records.php";

/// Build stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    Announce,
    CopyIncludes,
    PublishConfig,
    BeforeMake,
    ServerRecords,
    ClientRecords,
    RecordStubs,
    Strings,
    Styles,
    Views,
    Compile,
    Relocate,
    ServerBundle,
    ExportFiles,
    Minify,
    AfterMake,
}

impl StageKind {
    /// Every stage in execution order
    pub const ALL: [StageKind; 16] = [
        Self::Announce,
        Self::CopyIncludes,
        Self::PublishConfig,
        Self::BeforeMake,
        Self::ServerRecords,
        Self::ClientRecords,
        Self::RecordStubs,
        Self::Strings,
        Self::Styles,
        Self::Views,
        Self::Compile,
        Self::Relocate,
        Self::ServerBundle,
        Self::ExportFiles,
        Self::Minify,
        Self::AfterMake,
    ];

    /// Name shown in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Announce => "Announce",
            Self::CopyIncludes => "Copy Includes",
            Self::PublishConfig => "Publish Config",
            Self::BeforeMake => "Before Make",
            Self::ServerRecords => "PHP Records",
            Self::ClientRecords => "TypeScript Records",
            Self::RecordStubs => "Records Stubs",
            Self::Strings => "Strings",
            Self::Styles => "CSS",
            Self::Views => "View Extract",
            Self::Compile => "TypeScript Compile",
            Self::Relocate => "Relocate Script",
            Self::ServerBundle => "PHP Release",
            Self::ExportFiles => "Files Export",
            Self::Minify => "Minimize",
            Self::AfterMake => "After Make",
        }
    }

    /// Identifier accepted on the command line
    pub fn key(&self) -> &'static str {
        match self {
            Self::Announce => "announce",
            Self::CopyIncludes => "copy-includes",
            Self::PublishConfig => "publish-config",
            Self::BeforeMake => "before-make",
            Self::ServerRecords => "server-records",
            Self::ClientRecords => "client-records",
            Self::RecordStubs => "record-stubs",
            Self::Strings => "strings",
            Self::Styles => "styles",
            Self::Views => "views",
            Self::Compile => "compile",
            Self::Relocate => "relocate",
            Self::ServerBundle => "server-bundle",
            Self::ExportFiles => "export-files",
            Self::Minify => "minify",
            Self::AfterMake => "after-make",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for StageKind {
    type Err = String;

    /// Parse a stage key or logged name, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.key().eq_ignore_ascii_case(s) || stage.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let keys: Vec<&str> = Self::ALL.iter().map(|stage| stage.key()).collect();
                format!("unknown stage '{}' (expected one of: {})", s, keys.join(", "))
            })
    }
}

/// One entry of the stage list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStageSpec {
    pub kind: StageKind,
    /// Stop the pipeline once this stage has run
    pub abort_after: bool,
}

impl BuildStageSpec {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// The stage list for a set of flags
pub fn stage_plan(flags: &BuildFlags) -> Vec<BuildStageSpec> {
    StageKind::ALL
        .iter()
        .map(|&kind| BuildStageSpec {
            kind,
            abort_after: flags.abort_after == Some(kind),
        })
        .collect()
}

/// Whether the pipeline proceeds after a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageFlow {
    Continue,
    Abort,
}

/// How a module's pipeline run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOutcome {
    /// Every stage ran
    Built { stages_run: usize },
    /// The release is newer than the sources
    UpToDate,
    /// The module has neither `ts/` nor `php/`
    Stub,
    /// The module directory does not exist
    Missing,
    /// The run stopped after the named stage
    Aborted { after: &'static str },
}

impl ModuleOutcome {
    /// Short label for summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::Built { .. } => "built",
            Self::UpToDate => "up to date",
            Self::Stub => "stub",
            Self::Missing => "missing",
            Self::Aborted { .. } => "aborted",
        }
    }
}

/// Paths and manifest of the module being built
struct ModuleRun {
    descriptor: ModuleDescriptor,
    layout: ModuleLayout,
    release: ReleaseLayout,
}

impl ModuleRun {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn ts_include_file(&self, name: &str) -> PathBuf {
        self.layout.ts_include.join(name)
    }

    /// Script emitted by the compiler before relocation
    fn emitted_script(&self) -> PathBuf {
        self.ts_include_file(&ArtifactKind::Script.file_name(self.name()))
    }
}

/// Runs the stage list for one module at a time
pub struct BuildPipeline<'a> {
    repository: &'a dyn ModuleRepository,
    toolchain: &'a Toolchain,
    workspace: &'a WorkspaceConfig,
    /// Directory the workspace paths are relative to
    root_dir: PathBuf,
    flags: BuildFlags,
}

impl<'a> BuildPipeline<'a> {
    pub fn new(
        repository: &'a dyn ModuleRepository,
        toolchain: &'a Toolchain,
        workspace: &'a WorkspaceConfig,
        root_dir: impl Into<PathBuf>,
        flags: BuildFlags,
    ) -> Self {
        Self {
            repository,
            toolchain,
            workspace,
            root_dir: root_dir.into(),
            flags,
        }
    }

    /// `<output>/releases`
    pub fn releases_dir(&self) -> PathBuf {
        self.workspace.releases_dir(&self.root_dir)
    }

    pub fn flags(&self) -> &BuildFlags {
        &self.flags
    }

    /// Build one module
    pub fn run_module(&self, name: &str) -> BuildResult<ModuleOutcome> {
        let descriptor = match self.repository.resolve(name) {
            Ok(descriptor) => descriptor,
            Err(BuildError::ModuleNotFound { path, .. }) => {
                tracing::error!("Module {} does not exist: {}", name, path.display());
                return Ok(ModuleOutcome::Missing);
            }
            Err(e) => return Err(e),
        };

        let layout = descriptor.layout();
        if layout.is_stub() {
            tracing::info!(
                "Make aborted: no php/ or ts/ directory indicates {} is only a stub",
                name
            );
            return Ok(ModuleOutcome::Stub);
        }

        let release = ReleaseLayout::new(&self.releases_dir(), name);
        let verdict = StalenessGate::new(self.flags.force).check(&layout.root, &release.dir)?;
        if !verdict.needs_build() {
            tracing::debug!("{} is {}", name, verdict.describe());
            return Ok(ModuleOutcome::UpToDate);
        }
        tracing::debug!("Building {}: {}", name, verdict.describe());

        fsutil::create_dir(&release.dir)?;
        fsutil::create_dir(&layout.ts_include)?;

        let module = ModuleRun {
            descriptor,
            layout,
            release,
        };

        let mut stages_run = 0;
        for spec in stage_plan(&self.flags) {
            tracing::debug!("{}", spec.name());

            let flow = self.run_stage(spec, &module)?;
            stages_run += 1;

            if flow == StageFlow::Abort {
                tracing::info!("Make of {} stopped after {}", name, spec.name());
                return Ok(ModuleOutcome::Aborted { after: spec.name() });
            }
        }

        Ok(ModuleOutcome::Built { stages_run })
    }

    /// Run one stage; the stage marked `abort_after` ends the pipeline
    fn run_stage(&self, spec: BuildStageSpec, module: &ModuleRun) -> BuildResult<StageFlow> {
        match spec.kind {
            StageKind::Announce => {
                tracing::info!("Compiling {}", module.name());
            }
            StageKind::CopyIncludes => self.copy_includes(module)?,
            StageKind::PublishConfig => {
                let target = self
                    .workspace
                    .output_dir(&self.root_dir)
                    .join(WORKSPACE_CONFIG_FILE);
                fsutil::write_if_changed(&target, &self.workspace.to_json()?)?;
            }
            StageKind::BeforeMake => {
                self.hooks(module)
                    .run_phase(&module.descriptor.manifest.before_make, HookPhase::BeforeMake)?;
            }
            StageKind::ServerRecords | StageKind::ClientRecords | StageKind::RecordStubs
                if !module.descriptor.manifest.has_connection() =>
            {
                tracing::debug!("{} has no connection, no records", module.name());
            }
            StageKind::ServerRecords => {
                if let Some(code) = self.toolchain.records.server_records(&module.descriptor)? {
                    if !code.is_empty() {
                        let target = module.layout.support.join(SERVER_RECORDS_FILE);
                        fsutil::write_if_changed(&target, &code)?;
                    }
                }
            }
            StageKind::ClientRecords => {
                let code = self
                    .toolchain
                    .records
                    .client_records(&module.descriptor, self.flags.widen_record_types)?;
                if let Some(code) = code.filter(|code| !code.trim().is_empty()) {
                    fsutil::write_if_changed(&module.ts_include_file(RECORDS_UNIT_FILE), &code)?;
                }
            }
            StageKind::RecordStubs => {
                self.toolchain.records.record_stubs(&module.descriptor)?;
            }
            StageKind::Strings => self.strings(module)?,
            StageKind::Styles => {
                self.toolchain.styles.generate(
                    &module.layout.root,
                    &module.release.artifact(ArtifactKind::Stylesheet),
                )?;
            }
            StageKind::Views => self.views(module)?,
            StageKind::Compile => self.compile(module)?,
            StageKind::Relocate => {
                let emitted = module.emitted_script();
                if emitted.is_file() {
                    let target = module.release.artifact(ArtifactKind::Script);
                    fs::rename(&emitted, &target).map_err(|e| BuildError::io(&emitted, e))?;
                } else {
                    tracing::debug!("No script emitted for {}", module.name());
                }
            }
            StageKind::ServerBundle => {
                release::clear_server_files(&module.release)?;
                if self.flags.profile().is_release() {
                    let support = &module.layout.support;
                    let report = release::write_server_bundle(
                        &module.release,
                        &support.join(SERVER_RECORDS_FILE),
                        &module.layout.php,
                    )?;
                    tracing::debug!(
                        "{}: {} scripts bundled, {} copied",
                        report.bundle.display(),
                        report.appended.len(),
                        report.copied.len()
                    );
                    release::write_manifest_bundle(
                        &module.release,
                        &module.descriptor.manifest.to_json(),
                    )?;
                }
            }
            StageKind::ExportFiles => {
                for file in module.descriptor.manifest.exported_files() {
                    fsutil::copy_file(
                        &module.layout.support.join(file),
                        &module.release.support.join(file),
                    )?;
                }
            }
            StageKind::Minify => {
                if self.flags.minimize {
                    let script = module.release.artifact(ArtifactKind::Script);
                    if script.is_file() {
                        self.toolchain.minifier.minify(&script)?;
                    } else {
                        tracing::warn!("Nothing to minimize: {}", script.display());
                    }
                }
            }
            StageKind::AfterMake => {
                self.hooks(module)
                    .run_phase(&module.descriptor.manifest.after_make, HookPhase::AfterMake)?;
            }
        }

        if spec.abort_after {
            Ok(StageFlow::Abort)
        } else {
            Ok(StageFlow::Continue)
        }
    }

    fn hooks(&self, module: &ModuleRun) -> HookRunner {
        let context = HookContext::new(
            module.name(),
            &module.layout.root,
            &module.release.dir,
            self.flags.profile(),
        );
        HookRunner::new(context).with_node(&self.toolchain.node)
    }

    /// Refresh `support/ts-include/` from the manifest and the included modules
    fn copy_includes(&self, module: &ModuleRun) -> BuildResult<()> {
        let ts_include = &module.layout.ts_include;

        for file in fsutil::find_files(ts_include, UNIT_EXTENSION)? {
            if fsutil::file_name(&file) != RECORDS_UNIT_FILE {
                fs::remove_file(&file).map_err(|e| BuildError::io(&file, e))?;
            }
        }

        for include in &module.descriptor.manifest.ts_include {
            let source = module.layout.support.join(include);
            fsutil::copy_file(&source, &ts_include.join(fsutil::file_name(&source)))?;
        }

        for included in module.descriptor.included_modules() {
            let dir = ModuleLayout::new(&self.repository.module_dir(included)).ts_include;
            for file in fsutil::find_files(&dir, UNIT_EXTENSION)? {
                let name = fsutil::file_name(&file);
                if [RECORDS_UNIT_FILE, VIEWS_FILE, VIEWS_BANK_FILE].contains(&name) {
                    continue;
                }
                fsutil::copy_file(&file, &ts_include.join(name))?;
            }
        }

        Ok(())
    }

    fn strings(&self, module: &ModuleRun) -> BuildResult<()> {
        let declarations = module.ts_include_file(&format!("{}.strings.d.ts", module.name()));
        self.toolchain
            .strings
            .export(&module.layout.lang, &declarations, &module.release.dir)?;

        if self.flags.profile().is_release() {
            for table in fsutil::find_files(&module.layout.lang, "txt")? {
                let target = module.release.dir.join(fsutil::file_name(&table));
                fsutil::copy_file(&table, &target)?;
            }
        }

        Ok(())
    }

    fn views(&self, module: &ModuleRun) -> BuildResult<()> {
        if !module.layout.view.is_dir() {
            return Ok(());
        }

        let views = self.toolchain.views.extract(&module.layout.view)?;
        let sources: String = views.iter().map(|view| view.source.as_str()).collect();

        fsutil::write_if_changed(&module.ts_include_file(VIEWS_FILE), &sources)?;
        fsutil::write_if_changed(&module.ts_include_file(VIEWS_BANK_FILE), &views_bank(&views)?)?;
        Ok(())
    }

    fn compile(&self, module: &ModuleRun) -> BuildResult<()> {
        let ts = &module.layout.ts;
        if !ts.is_dir() {
            tracing::debug!("{} has no client sources", module.name());
            return Ok(());
        }

        let manifest_path = ts.join(REFERENCE_MANIFEST_FILE);
        let includes = fsutil::find_files(&module.layout.ts_include, UNIT_EXTENSION)?;
        let units = fsutil::find_files(ts, UNIT_EXTENSION)?
            .into_iter()
            .filter(|path| *path != manifest_path)
            .map(|path| SourceUnit::read(&path))
            .collect::<BuildResult<Vec<_>>>()?;

        let order = CompileOrderResolver::new()
            .with_manual_includes(includes)
            .resolve(&units)?;
        tracing::debug!(
            "{}: {} includes, {} plain units, {} class units",
            module.name(),
            order.manual_includes.len(),
            order.non_class.len(),
            order.classes.len()
        );
        order.write_reference_manifest(&manifest_path)?;

        let request = CompileRequest {
            module: module.name().to_string(),
            manifest: manifest_path.clone(),
            output: module.emitted_script(),
        };
        let output = self.toolchain.compiler.compile(&request)?;

        if output.is_clean() {
            remove_if_exists(&manifest_path)?;
        } else {
            for diagnostic in &output.diagnostics {
                tracing::warn!("{}", diagnostic);
            }
        }

        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> BuildResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(path, e)),
    }
}

/// Script registering each view's markup under its class name
fn views_bank(views: &[ExtractedView]) -> BuildResult<String> {
    let bank: BTreeMap<&str, &str> = views
        .iter()
        .map(|view| (view.class_name.as_str(), view.html.as_str()))
        .collect();

    let mut json = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut json, formatter);
    bank.serialize(&mut serializer)
        .map_err(|e| BuildError::stage(StageKind::Views.name(), e))?;

    Ok(format!(
        "module latte{{ \n    window['latte']['globalViewsBank'] = _merge( window['latte']['globalViewsBank'] || {{}}, {}) \n}}",
        String::from_utf8_lossy(&json)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_stage_plan_order() {
        let plan = stage_plan(&BuildFlags::new());
        assert_eq!(plan.len(), 16);
        assert_eq!(plan[0].kind, StageKind::Announce);
        assert_eq!(plan[3].kind, StageKind::BeforeMake);
        assert_eq!(plan[10].kind, StageKind::Compile);
        assert_eq!(plan[15].kind, StageKind::AfterMake);
        assert!(plan.iter().all(|spec| !spec.abort_after));
    }

    #[test]
    fn test_stage_plan_marks_abort() {
        let flags = BuildFlags::new().with_abort_after(Some(StageKind::Views));
        let plan = stage_plan(&flags);

        let marked: Vec<StageKind> = plan
            .iter()
            .filter(|spec| spec.abort_after)
            .map(|spec| spec.kind)
            .collect();
        assert_eq!(marked, vec![StageKind::Views]);
    }

    #[rstest]
    #[case("views", StageKind::Views)]
    #[case("View Extract", StageKind::Views)]
    #[case("COMPILE", StageKind::Compile)]
    #[case("server-bundle", StageKind::ServerBundle)]
    #[case("php release", StageKind::ServerBundle)]
    fn test_stage_from_str(#[case] input: &str, #[case] expected: StageKind) {
        assert_eq!(input.parse::<StageKind>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_stage() {
        let err = "linking".parse::<StageKind>().unwrap_err();
        assert!(err.contains("unknown stage 'linking'"));
        assert!(err.contains("copy-includes"));
    }

    #[test]
    fn test_views_bank_format() {
        let views = vec![ExtractedView {
            class_name: "LoginView".to_string(),
            source: String::new(),
            html: "<div/>".to_string(),
        }];

        assert_eq!(
            views_bank(&views).unwrap(),
            "module latte{ \n    window['latte']['globalViewsBank'] = _merge( window['latte']['globalViewsBank'] || {}, {\n    \"LoginView\": \"<div/>\"\n}) \n}"
        );
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(ModuleOutcome::Built { stages_run: 16 }.label(), "built");
        assert_eq!(ModuleOutcome::Aborted { after: "CSS" }.label(), "aborted");
        assert_eq!(ModuleOutcome::Missing.label(), "missing");
    }
}
