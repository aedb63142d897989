//! Module lookup
//!
//! Resolves module names to their directory and parsed manifest, and derives
//! the conventional source paths of a module.

use crate::error::{BuildError, BuildResult};
use latte_config::{ConfigLoader, ModuleManifest};
use std::path::{Path, PathBuf};

/// Snapshot of one module, taken once per invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDescriptor {
    /// Module name (its directory name)
    pub name: String,
    /// Module root directory
    pub root: PathBuf,
    /// Parsed `module.json`, or defaults
    pub manifest: ModuleManifest,
}

impl ModuleDescriptor {
    /// Create a descriptor
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, manifest: ModuleManifest) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            manifest,
        }
    }

    /// Names of the modules this module includes
    pub fn included_modules(&self) -> &[String] {
        self.manifest.included_modules()
    }

    /// Source paths of this module
    pub fn layout(&self) -> ModuleLayout {
        ModuleLayout::new(&self.root)
    }
}

/// Conventional directories inside a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    pub root: PathBuf,
    /// Localized string files
    pub lang: PathBuf,
    /// Authored client sources
    pub ts: PathBuf,
    /// Server-side scripts
    pub php: PathBuf,
    /// Markup views
    pub view: PathBuf,
    /// Support files, hook scripts and generated server records
    pub support: PathBuf,
    /// Generated and copied client includes
    pub ts_include: PathBuf,
}

impl ModuleLayout {
    pub fn new(root: &Path) -> Self {
        let support = root.join("support");
        Self {
            root: root.to_path_buf(),
            lang: root.join("lang"),
            ts: root.join("ts"),
            php: root.join("php"),
            view: root.join("view"),
            ts_include: support.join("ts-include"),
            support,
        }
    }

    /// A module with neither client sources nor server scripts is only a stub
    pub fn is_stub(&self) -> bool {
        !self.ts.exists() && !self.php.exists()
    }
}

/// Source of module descriptors
pub trait ModuleRepository {
    /// Directory a module with this name would live in
    fn module_dir(&self, name: &str) -> PathBuf;

    /// Resolve a module, failing with `ModuleNotFound` when its directory is absent
    fn resolve(&self, name: &str) -> BuildResult<ModuleDescriptor>;
}

/// Repository reading modules from a directory on disk
#[derive(Debug, Clone)]
pub struct FsModuleRepository {
    modules_dir: PathBuf,
    loader: ConfigLoader,
}

impl FsModuleRepository {
    /// Create a repository over the given modules directory
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
            loader: ConfigLoader::new(),
        }
    }

    /// The modules directory
    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }
}

impl ModuleRepository for FsModuleRepository {
    fn module_dir(&self, name: &str) -> PathBuf {
        self.modules_dir.join(name)
    }

    fn resolve(&self, name: &str) -> BuildResult<ModuleDescriptor> {
        let root = self.module_dir(name);

        if !root.is_dir() {
            return Err(BuildError::module_not_found(name, root));
        }

        let manifest = self.loader.load_manifest(&root)?;
        Ok(ModuleDescriptor::new(name, root, manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_layout_paths() {
        let layout = ModuleLayout::new(Path::new("/m/forms"));
        assert_eq!(layout.ts, PathBuf::from("/m/forms/ts"));
        assert_eq!(layout.ts_include, PathBuf::from("/m/forms/support/ts-include"));
        assert_eq!(layout.view, PathBuf::from("/m/forms/view"));
    }

    #[test]
    fn test_resolve_missing_module() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsModuleRepository::new(dir.path());

        match repo.resolve("ghost") {
            Err(BuildError::ModuleNotFound { module, path }) => {
                assert_eq!(module, "ghost");
                assert_eq!(path, dir.path().join("ghost"));
            }
            other => panic!("Expected ModuleNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_reads_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("forms");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("module.json"), r#"{"module-include": ["_core"]}"#).unwrap();

        let module = FsModuleRepository::new(dir.path()).resolve("forms").unwrap();

        assert_eq!(module.name, "forms");
        assert_eq!(module.included_modules(), ["_core"]);
    }

    #[test]
    fn test_stub_detection() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ModuleLayout::new(dir.path());
        assert!(layout.is_stub());

        fs::create_dir(&layout.php).unwrap();
        assert!(!layout.is_stub());
    }
}
