//! Release directory layout and server bundle assembly
use crate::error::{BuildError, BuildResult};
use crate::fsutil;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Kind of file produced in a release directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Emitted client script
    Script,
    /// Generated stylesheet
    Stylesheet,
    /// Concatenated server scripts
    ServerBundle,
    /// Serialized module manifest for the server
    ManifestBundle,
}

impl ArtifactKind {
    /// File name of this artifact for a module
    pub fn file_name(&self, module: &str) -> String {
        match self {
            Self::Script => format!("{}.js", module),
            Self::Stylesheet => format!("{}.css", module),
            Self::ServerBundle => format!("{}.php", module),
            Self::ManifestBundle => "module.json.php".to_string(),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script => write!(f, "script"),
            Self::Stylesheet => write!(f, "stylesheet"),
            Self::ServerBundle => write!(f, "server bundle"),
            Self::ManifestBundle => write!(f, "manifest bundle"),
        }
    }
}

/// Paths of one module's release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseLayout {
    pub module: String,
    /// `<output>/releases/<module>`
    pub dir: PathBuf,
    /// Exported support files
    pub support: PathBuf,
}

impl ReleaseLayout {
    pub fn new(releases_dir: &Path, module: impl Into<String>) -> Self {
        let module = module.into();
        let dir = releases_dir.join(&module);
        Self {
            support: dir.join("support"),
            dir,
            module,
        }
    }

    /// Path of an artifact in this release
    pub fn artifact(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name(&self.module))
    }
}

/// Escape text for a double-quoted PHP string literal
pub fn escape_php_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '"' | '\'' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\0' => escaped.push_str("\\0"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Contents of `module.json.php`
pub fn manifest_bundle(module: &str, manifest_json: &str) -> String {
    format!(
        "<?php\n\n$GLOBALS['module-json-{}'] = \"{}\";",
        module,
        escape_php_string(manifest_json)
    )
}

/// Drop a leading open-tag line, keeping the line break that ended it
fn strip_header_keep_newline(content: &str) -> &str {
    if !content.starts_with("<?") {
        return content;
    }
    content.find('\n').map(|i| &content[i..]).unwrap_or("")
}

/// Drop a leading open-tag line including its line break
fn strip_header(content: &str) -> &str {
    if !content.starts_with("<?") {
        return content;
    }
    content.find('\n').map(|i| &content[i + 1..]).unwrap_or("")
}

/// What the server bundle step produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerBundleReport {
    /// The concatenated bundle
    pub bundle: PathBuf,
    /// Scripts appended to the bundle, in order
    pub appended: Vec<PathBuf>,
    /// `_`-prefixed scripts copied next to the bundle
    pub copied: Vec<PathBuf>,
}

/// Delete the server scripts left in the release directory by a previous build
pub fn clear_server_files(layout: &ReleaseLayout) -> BuildResult<usize> {
    fsutil::remove_files(&layout.dir, "php", &[])
}

/// Write `<module>.php` from the records file and the module's server scripts
///
/// The bundle opens with `<?php`, then the records body, then every script
/// under `php_dir` (sorted by path) with its open tag removed. Scripts whose
/// name starts with `_` are not concatenated; they are copied verbatim into
/// the release directory under their own name.
pub fn write_server_bundle(
    layout: &ReleaseLayout,
    records_file: &Path,
    php_dir: &Path,
) -> BuildResult<ServerBundleReport> {
    let bundle_path = layout.artifact(ArtifactKind::ServerBundle);
    let mut bundle = String::from("<?php\n");

    if records_file.is_file() {
        let records = fs::read_to_string(records_file).map_err(|e| BuildError::io(records_file, e))?;
        bundle.push_str("\n\n");
        bundle.push_str(strip_header_keep_newline(&records));
    }

    let mut report = ServerBundleReport {
        bundle: bundle_path.clone(),
        ..Default::default()
    };

    let mut event_files = Vec::new();
    for script in fsutil::find_files(php_dir, "php")? {
        if fsutil::file_name(&script).starts_with('_') {
            event_files.push(script);
            continue;
        }
        let contents = fs::read_to_string(&script).map_err(|e| BuildError::io(&script, e))?;
        bundle.push_str(strip_header(&contents));
        report.appended.push(script);
    }

    fsutil::create_dir(&layout.dir)?;
    fs::write(&bundle_path, bundle).map_err(|e| BuildError::io(&bundle_path, e))?;

    for script in event_files {
        let target = layout.dir.join(fsutil::file_name(&script));
        fsutil::copy_file(&script, &target)?;
        report.copied.push(target);
    }

    Ok(report)
}

/// Write `module.json.php`
pub fn write_manifest_bundle(layout: &ReleaseLayout, manifest_json: &str) -> BuildResult<PathBuf> {
    let path = layout.artifact(ArtifactKind::ManifestBundle);
    fs::write(&path, manifest_bundle(&layout.module, manifest_json))
        .map_err(|e| BuildError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_file_names() {
        assert_eq!(ArtifactKind::Script.file_name("forms"), "forms.js");
        assert_eq!(ArtifactKind::Stylesheet.file_name("forms"), "forms.css");
        assert_eq!(ArtifactKind::ServerBundle.file_name("forms"), "forms.php");
        assert_eq!(ArtifactKind::ManifestBundle.file_name("forms"), "module.json.php");
        assert_eq!(ArtifactKind::ServerBundle.to_string(), "server bundle");
    }

    #[test]
    fn test_release_layout() {
        let layout = ReleaseLayout::new(Path::new("/out/releases"), "forms");
        assert_eq!(layout.dir, PathBuf::from("/out/releases/forms"));
        assert_eq!(layout.support, PathBuf::from("/out/releases/forms/support"));
        assert_eq!(
            layout.artifact(ArtifactKind::Script),
            PathBuf::from("/out/releases/forms/forms.js")
        );
    }

    #[test]
    fn test_escape_php_string() {
        assert_eq!(
            escape_php_string(r#"{"a":"it's \ here"}"#),
            r#"{\"a\":\"it\'s \\ here\"}"#
        );
        assert_eq!(escape_php_string("nul\0byte"), "nul\\0byte");
    }

    #[test]
    fn test_manifest_bundle() {
        assert_eq!(
            manifest_bundle("forms", r#"{"version":"0.1"}"#),
            "<?php\n\n$GLOBALS['module-json-forms'] = \"{\\\"version\\\":\\\"0.1\\\"}\";"
        );
    }

    #[test]
    fn test_strip_headers() {
        assert_eq!(strip_header_keep_newline("<?php\nbody"), "\nbody");
        assert_eq!(strip_header("<?php\nbody"), "body");
        assert_eq!(strip_header("body"), "body");
        assert_eq!(strip_header("<?php"), "");
    }

    #[test]
    fn test_server_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let module = temp_dir.path().join("forms");
        let php = module.join("php");
        fs::create_dir_all(php.join("sub")).unwrap();
        fs::write(php.join("a.php"), "<?php\nclass A {}\n").unwrap();
        fs::write(php.join("sub/b.php"), "class B {}\n").unwrap();
        fs::write(php.join("_events.php"), "<?php\non('x');\n").unwrap();
        let records = module.join("support/records.php");
        fs::create_dir_all(records.parent().unwrap()).unwrap();
        fs::write(&records, "<?php\nclass R {}\n").unwrap();

        let layout = ReleaseLayout::new(&temp_dir.path().join("releases"), "forms");
        let report = write_server_bundle(&layout, &records, &php).unwrap();

        assert_eq!(
            fs::read_to_string(&report.bundle).unwrap(),
            "<?php\n\n\n\nclass R {}\nclass A {}\nclass B {}\n"
        );
        assert_eq!(report.appended.len(), 2);
        assert_eq!(report.copied, vec![layout.dir.join("_events.php")]);
        assert_eq!(
            fs::read_to_string(layout.dir.join("_events.php")).unwrap(),
            "<?php\non('x');\n"
        );
    }

    #[test]
    fn test_clear_server_files() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ReleaseLayout::new(temp_dir.path(), "forms");
        fs::create_dir_all(&layout.dir).unwrap();
        fs::write(layout.dir.join("forms.php"), "").unwrap();
        fs::write(layout.dir.join("forms.js"), "").unwrap();

        assert_eq!(clear_server_files(&layout).unwrap(), 1);
        assert!(layout.dir.join("forms.js").exists());
    }
}
