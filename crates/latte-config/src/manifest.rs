//! Module Manifest (module.json)
//!
//! Declares a module's inclusions, include files, hook scripts and exported
//! assets. A parsed manifest keeps the JSON it was read from, so release
//! bundles reproduce the file's keys, key order and empty lists exactly.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// File name of a module manifest
pub const MANIFEST_FILE: &str = "module.json";

/// Module manifest from module.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleManifest {
    /// Manifest version; only defaulted when `module.json` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Database connection settings, or `{"file": "..."}` pointing at them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Value>,

    /// Tables that records are generated for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<String>>,

    /// Modules whose declarations this module compiles against
    #[serde(default, rename = "module-include", skip_serializing_if = "Vec::is_empty")]
    pub module_include: Vec<String>,

    /// Support files copied into the include directory before compiling
    #[serde(default, rename = "ts-include", skip_serializing_if = "Vec::is_empty")]
    pub ts_include: Vec<String>,

    /// Scripts run before the first generation stage
    #[serde(default, rename = "before-make", skip_serializing_if = "Vec::is_empty")]
    pub before_make: Vec<String>,

    /// Scripts run after the last stage
    #[serde(default, rename = "after-make", skip_serializing_if = "Vec::is_empty")]
    pub after_make: Vec<String>,

    /// Client scripts exported with the release
    #[serde(default, rename = "ua-include-js", skip_serializing_if = "Vec::is_empty")]
    pub ua_include_js: Vec<String>,

    /// Client stylesheets exported with the release
    #[serde(default, rename = "ua-include-css", skip_serializing_if = "Vec::is_empty")]
    pub ua_include_css: Vec<String>,

    /// Other support files exported with the release
    #[serde(default, rename = "release-export", skip_serializing_if = "Vec::is_empty")]
    pub release_export: Vec<String>,

    /// Keys not interpreted by the build
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,

    /// The document this manifest was parsed from, reproduced by `to_json`
    #[serde(skip)]
    pub raw: Option<Value>,
}

fn default_version() -> Option<String> {
    Some("0.1".to_string())
}

impl Default for ModuleManifest {
    fn default() -> Self {
        Self {
            version: default_version(),
            connection: None,
            records: None,
            module_include: Vec::new(),
            ts_include: Vec::new(),
            before_make: Vec::new(),
            after_make: Vec::new(),
            ua_include_js: Vec::new(),
            ua_include_css: Vec::new(),
            release_export: Vec::new(),
            extra: BTreeMap::new(),
            raw: None,
        }
    }
}

impl ModuleManifest {
    /// Load manifest from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::from_json(&content).map_err(|e| ConfigError::JsonParseError {
            file: path.to_path_buf(),
            error: e,
        })
    }

    /// Parse manifest from JSON text
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let raw: Value = serde_json::from_str(content)?;
        let mut manifest: Self = serde_json::from_value(raw.clone())?;
        manifest.raw = Some(raw);
        Ok(manifest)
    }

    /// Compact JSON: the parsed document as read, or the fields of a built manifest
    pub fn to_json(&self) -> String {
        let json = match &self.raw {
            Some(raw) => serde_json::to_string(raw),
            None => serde_json::to_string(self),
        };
        // Every field is a JSON value already; serialization cannot fail.
        json.unwrap_or_else(|_| "{}".to_string())
    }

    /// Whether the module declares database connection settings
    pub fn has_connection(&self) -> bool {
        matches!(self.connection, Some(Value::Object(_)))
    }

    /// Names of the modules this module includes
    pub fn included_modules(&self) -> &[String] {
        &self.module_include
    }

    /// Support files exported with a release, in aggregation order
    pub fn exported_files(&self) -> Vec<&str> {
        self.ua_include_js
            .iter()
            .chain(&self.ua_include_css)
            .chain(&self.release_export)
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest_json() {
        assert_eq!(ModuleManifest::default().to_json(), r#"{"version":"0.1"}"#);
    }

    #[test]
    fn test_has_connection() {
        let manifest =
            ModuleManifest::from_json(r#"{"connection": {"host": "localhost"}}"#).unwrap();
        assert!(manifest.has_connection());

        let manifest = ModuleManifest::from_json(r#"{"connection": "nope"}"#).unwrap();
        assert!(!manifest.has_connection());
    }

    #[test]
    fn test_exported_files_order() {
        let manifest = ModuleManifest::from_json(
            r#"{
                "release-export": ["img/logo.png"],
                "ua-include-css": ["a.css"],
                "ua-include-js": ["a.js", "b.js"]
            }"#,
        )
        .unwrap();
        assert_eq!(
            manifest.exported_files(),
            vec!["a.js", "b.js", "a.css", "img/logo.png"]
        );
    }

    #[test]
    fn test_parsed_manifest_json_is_unchanged() {
        let source = r#"{"module-include":[],"zeta":{"b":1,"a":2},"alpha":true}"#;
        let manifest = ModuleManifest::from_json(source).unwrap();

        assert_eq!(manifest.version, None);
        assert_eq!(manifest.to_json(), source);
    }

    #[test]
    fn test_built_manifest_json() {
        let manifest = ModuleManifest {
            module_include: vec!["_core".to_string()],
            ..Default::default()
        };
        assert_eq!(
            manifest.to_json(),
            r#"{"version":"0.1","module-include":["_core"]}"#
        );
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let manifest = ModuleManifest::from_json(r#"{"title": "Core", "version": "2"}"#).unwrap();
        assert_eq!(manifest.version.as_deref(), Some("2"));
        assert_eq!(manifest.extra.get("title"), Some(&Value::from("Core")));
        assert!(manifest.to_json().contains(r#""title":"Core""#));
    }
}
