//! Small filesystem helpers shared by the stages
use crate::error::{BuildError, BuildResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Make `path` absolute against the current directory
pub fn absolute(path: &Path) -> BuildResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path))
}

/// Write `contents` unless the file already holds exactly that text
///
/// Returns whether the file was written. Leaving unchanged files alone keeps
/// their timestamps, which the staleness gate depends on.
pub fn write_if_changed(path: &Path, contents: &str) -> BuildResult<bool> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == contents {
            return Ok(false);
        }
    }

    create_parent(path)?;
    fs::write(path, contents).map_err(|e| BuildError::io(path, e))?;
    Ok(true)
}

/// Copy a file, creating the destination directory
pub fn copy_file(from: &Path, to: &Path) -> BuildResult<()> {
    create_parent(to)?;
    fs::copy(from, to).map_err(|e| BuildError::io(from, e))?;
    Ok(())
}

/// Create a directory and its parents
pub fn create_dir(path: &Path) -> BuildResult<()> {
    fs::create_dir_all(path).map_err(|e| BuildError::io(path, e))
}

fn create_parent(path: &Path) -> BuildResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir(parent),
        _ => Ok(()),
    }
}

/// Files with `extension` anywhere under `dir`, sorted by path
///
/// A missing directory yields no files.
pub fn find_files(dir: &Path, extension: &str) -> BuildResult<Vec<PathBuf>> {
    collect_files(dir, extension, usize::MAX)
}

/// Files with `extension` directly inside `dir`, sorted by name
pub fn direct_files(dir: &Path, extension: &str) -> BuildResult<Vec<PathBuf>> {
    collect_files(dir, extension, 1)
}

fn collect_files(dir: &Path, extension: &str, depth: usize) -> BuildResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(depth).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::io(dir, e.into()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extension) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Delete the files with `extension` directly inside `dir`, except `keep`
pub fn remove_files(dir: &Path, extension: &str, keep: &[&str]) -> BuildResult<usize> {
    let mut removed = 0;
    for path in direct_files(dir, extension)? {
        if keep.contains(&file_name(&path)) {
            continue;
        }
        fs::remove_file(&path).map_err(|e| BuildError::io(&path, e))?;
        removed += 1;
    }
    Ok(removed)
}

/// Final path component as text, empty when absent
pub fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}
