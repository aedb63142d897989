//! Timestamp-based staleness check for module releases
//!
//! A module is rebuilt when its release directory is missing, or when the
//! newest file anywhere under the module directory is strictly newer than the
//! newest file anywhere under its release directory.

use crate::error::{BuildError, BuildResult};
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

/// Verdict of the staleness gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// The release directory does not exist
    ReleaseMissing,
    /// Some source file is newer than every release file
    SourcesNewer,
    /// The release is at least as new as every source
    UpToDate,
    /// The caller asked to rebuild regardless
    Forced,
}

impl Staleness {
    /// Whether the module must be rebuilt
    pub fn needs_build(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }

    /// Short description for logs
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ReleaseMissing => "no release yet",
            Self::SourcesNewer => "sources changed",
            Self::UpToDate => "up to date",
            Self::Forced => "forced",
        }
    }
}

/// Decides whether a module's release is out of date
#[derive(Debug, Clone, Copy, Default)]
pub struct StalenessGate {
    force: bool,
}

impl StalenessGate {
    /// Create a gate; `force` bypasses the timestamp comparison
    pub fn new(force: bool) -> Self {
        Self { force }
    }

    /// Compare the source tree against the release tree
    pub fn check(&self, source_root: &Path, release_root: &Path) -> BuildResult<Staleness> {
        if self.force {
            return Ok(Staleness::Forced);
        }

        if !release_root.exists() {
            return Ok(Staleness::ReleaseMissing);
        }

        let newest_source = newest_modification(source_root)?;
        let newest_release = newest_modification(release_root)?;

        if newest_source > newest_release {
            Ok(Staleness::SourcesNewer)
        } else {
            Ok(Staleness::UpToDate)
        }
    }

    /// Boolean form of [`check`](Self::check)
    pub fn needs_build(&self, source_root: &Path, release_root: &Path) -> BuildResult<bool> {
        self.check(source_root, release_root)
            .map(|verdict| verdict.needs_build())
    }
}

/// Newest modification time of any file under `root` (the epoch for an empty tree)
pub fn newest_modification(root: &Path) -> BuildResult<SystemTime> {
    let mut newest = SystemTime::UNIX_EPOCH;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| BuildError::io(root, e.into()))?;

        if !entry.file_type().is_file() {
            continue;
        }

        let modified = entry
            .metadata()
            .map_err(|e| BuildError::io(entry.path(), e.into()))?
            .modified()
            .map_err(|e| BuildError::io(entry.path(), e))?;

        if modified > newest {
            newest = modified;
        }
    }

    Ok(newest)
}
