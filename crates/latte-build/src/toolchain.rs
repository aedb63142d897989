//! External tools and code generators used by the pipeline
//!
//! Each collaborator is a trait so sessions and tests can substitute their
//! own implementation. The defaults spawn the usual command-line tools
//! (`tsc`, a minifier) or do nothing for generators whose inputs live
//! outside this crate (database schemas, stylesheets, markup views).

use crate::error::{BuildError, BuildResult};
use crate::hooks::DEFAULT_NODE;
use crate::repository::ModuleDescriptor;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

/// Default compiler program
pub const DEFAULT_TSC: &str = "tsc";

/// Default minifier program
pub const DEFAULT_MINIFIER: &str = "terser";

/// One compiler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Module being compiled
    pub module: String,
    /// Reference manifest listing the inputs in order
    pub manifest: PathBuf,
    /// Emitted script bundle
    pub output: PathBuf,
}

/// Result of a compiler run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOutput {
    /// Reformatted diagnostics, one per line
    pub diagnostics: Vec<String>,
}

impl CompilerOutput {
    /// Whether the compiler reported nothing
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Single-pass compiler for a module's client sources
pub trait ExternalCompiler {
    fn compile(&self, request: &CompileRequest) -> BuildResult<CompilerOutput>;
}

/// Invokes `tsc` on a reference manifest
#[derive(Debug, Clone)]
pub struct TscCompiler {
    program: String,
}

impl TscCompiler {
    pub fn new() -> Self {
        Self {
            program: DEFAULT_TSC.to_string(),
        }
    }

    /// Use a different compiler executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for TscCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalCompiler for TscCompiler {
    fn compile(&self, request: &CompileRequest) -> BuildResult<CompilerOutput> {
        tracing::debug!(
            "{} -d --target ES6 --out {} {}",
            self.program,
            request.output.display(),
            request.manifest.display()
        );

        // The exit status is not consulted: diagnostics are reported, never fatal.
        let output = Command::new(&self.program)
            .args(["-d", "--target", "ES6", "--out"])
            .arg(&request.output)
            .arg(&request.manifest)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .and_then(|child| child.wait_with_output())
            .map_err(|error| BuildError::ToolSpawn {
                program: self.program.clone(),
                error,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::info!("{}", stdout.trim_end());
        }

        Ok(CompilerOutput {
            diagnostics: format_diagnostics(&String::from_utf8_lossy(&output.stderr)),
        })
    }
}

fn position_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\((\d+),(\d+)\):").expect("position pattern is valid"))
}

/// Rewrite `file(l,c): msg` positions to `file:l:c msg` and number each line
pub fn format_diagnostics(raw: &str) -> Vec<String> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            let line = position_pattern().replace_all(line, ":${1}:${2} ");
            format!("({}) at {}", i + 1, line)
        })
        .collect()
}

/// Generates record classes from the module's schema
pub trait RecordsGenerator {
    /// Server-side record code, if the module has any
    fn server_records(&self, module: &ModuleDescriptor) -> BuildResult<Option<String>>;

    /// Client-side record declarations
    fn client_records(
        &self,
        module: &ModuleDescriptor,
        widen_types: bool,
    ) -> BuildResult<Option<String>>;

    /// Write per-record stub classes the module does not have yet
    fn record_stubs(&self, module: &ModuleDescriptor) -> BuildResult<()>;
}

/// Exports localized string tables
pub trait StringsExporter {
    fn export(&self, lang_dir: &Path, declarations: &Path, release_dir: &Path) -> BuildResult<()>;
}

/// Produces a module's stylesheet
pub trait StyleGenerator {
    fn generate(&self, module_dir: &Path, stylesheet: &Path) -> BuildResult<()>;
}

/// A view class extracted from markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedView {
    pub class_name: String,
    /// Generated class source
    pub source: String,
    /// Markup the class renders
    pub html: String,
}

/// Turns markup views into classes
pub trait ViewExtractor {
    fn extract(&self, view_dir: &Path) -> BuildResult<Vec<ExtractedView>>;
}

/// Rewrites an emitted script in place
pub trait Minifier {
    fn minify(&self, script: &Path) -> BuildResult<()>;
}

/// Generator that produces nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl RecordsGenerator for Noop {
    fn server_records(&self, _module: &ModuleDescriptor) -> BuildResult<Option<String>> {
        Ok(None)
    }

    fn client_records(
        &self,
        _module: &ModuleDescriptor,
        _widen_types: bool,
    ) -> BuildResult<Option<String>> {
        Ok(None)
    }

    fn record_stubs(&self, _module: &ModuleDescriptor) -> BuildResult<()> {
        Ok(())
    }
}

impl StringsExporter for Noop {
    fn export(&self, _lang: &Path, _declarations: &Path, _release: &Path) -> BuildResult<()> {
        Ok(())
    }
}

impl StyleGenerator for Noop {
    fn generate(&self, _module_dir: &Path, _stylesheet: &Path) -> BuildResult<()> {
        Ok(())
    }
}

impl ViewExtractor for Noop {
    fn extract(&self, _view_dir: &Path) -> BuildResult<Vec<ExtractedView>> {
        Ok(Vec::new())
    }
}

/// Runs `<program> <script>` and replaces the script with the program's stdout
#[derive(Debug, Clone)]
pub struct CommandMinifier {
    program: String,
}

impl CommandMinifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CommandMinifier {
    fn default() -> Self {
        Self::new(DEFAULT_MINIFIER)
    }
}

impl Minifier for CommandMinifier {
    fn minify(&self, script: &Path) -> BuildResult<()> {
        let output = Command::new(&self.program)
            .arg(script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .and_then(|child| child.wait_with_output())
            .map_err(|error| BuildError::ToolSpawn {
                program: self.program.clone(),
                error,
            })?;

        if !output.status.success() {
            return Err(BuildError::ToolFailed {
                program: self.program.clone(),
                exit_code: output.status.code().unwrap_or(1),
                output: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        fs::write(script, &output.stdout).map_err(|e| BuildError::io(script, e))
    }
}

/// The collaborators of one build session
pub struct Toolchain {
    pub compiler: Box<dyn ExternalCompiler>,
    pub records: Box<dyn RecordsGenerator>,
    pub strings: Box<dyn StringsExporter>,
    pub styles: Box<dyn StyleGenerator>,
    pub views: Box<dyn ViewExtractor>,
    pub minifier: Box<dyn Minifier>,
    /// Interpreter for `.js` hooks
    pub node: String,
}

impl Toolchain {
    pub fn with_compiler(mut self, compiler: impl ExternalCompiler + 'static) -> Self {
        self.compiler = Box::new(compiler);
        self
    }

    pub fn with_records(mut self, records: impl RecordsGenerator + 'static) -> Self {
        self.records = Box::new(records);
        self
    }

    pub fn with_strings(mut self, strings: impl StringsExporter + 'static) -> Self {
        self.strings = Box::new(strings);
        self
    }

    pub fn with_styles(mut self, styles: impl StyleGenerator + 'static) -> Self {
        self.styles = Box::new(styles);
        self
    }

    pub fn with_views(mut self, views: impl ViewExtractor + 'static) -> Self {
        self.views = Box::new(views);
        self
    }

    pub fn with_minifier(mut self, minifier: impl Minifier + 'static) -> Self {
        self.minifier = Box::new(minifier);
        self
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = node.into();
        self
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            compiler: Box::new(TscCompiler::new()),
            records: Box::new(Noop),
            strings: Box::new(Noop),
            styles: Box::new(Noop),
            views: Box::new(Noop),
            minifier: Box::new(CommandMinifier::default()),
            node: DEFAULT_NODE.to_string(),
        }
    }
}
