//! Latte build system infrastructure
//!
//! Builds latte modules in dependency order:
//! - Cross-module build order from `module-include` fan-in
//! - Timestamp staleness checks per module release
//! - Single-pass compile order from class inheritance
//! - A fixed stage pipeline per module (code generation, compile, release)
//! - Before/after make hooks and pluggable external tools

pub mod builder;
pub mod compile_order;
pub mod compile_stack;
pub mod error;
pub mod flags;
pub mod fsutil;
pub mod hooks;
pub mod pipeline;
pub mod release;
pub mod repository;
pub mod staleness;
pub mod toolchain;

// Re-export main types
pub use builder::{BuildContext, BuildStats, Builder, ModuleReport};
pub use compile_order::{
    classify, ClassDecl, CompileOrder, CompileOrderResolver, SourceUnit, SourceUnitInfo,
    RECORDS_UNIT_FILE,
};
pub use compile_stack::{CompileStack, CompileStackEntry};
pub use error::{BuildError, BuildResult, CycleKind};
pub use flags::{BuildFlags, Profile};
pub use hooks::{HookContext, HookKind, HookPhase, HookResult, HookRunner};
pub use pipeline::{
    stage_plan, BuildPipeline, BuildStageSpec, ModuleOutcome, StageFlow, StageKind,
};
pub use release::{ArtifactKind, ReleaseLayout};
pub use repository::{FsModuleRepository, ModuleDescriptor, ModuleLayout, ModuleRepository};
pub use staleness::{Staleness, StalenessGate};
pub use toolchain::{
    CommandMinifier, CompileRequest, CompilerOutput, ExternalCompiler, ExtractedView, Minifier,
    Noop, RecordsGenerator, StringsExporter, StyleGenerator, Toolchain, TscCompiler,
    ViewExtractor,
};

// Re-export latte-config types for convenience
pub use latte_config::{ModuleManifest, WorkspaceConfig};
