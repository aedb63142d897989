//! Compilation order for the source units of one module
//!
//! The external compiler resolves declarations in a single pass, in the order
//! files are referenced, so every base class must be referenced before the
//! classes extending it. The only dependency signal available is the
//! `extends` clause of each unit's exported class.
//!
//! Units are restricted to single inheritance, so the classes form a forest.
//! Each class counts its transitive descendants (`dependent_count`): every
//! descendant increments every ancestor on its chain, which makes an
//! ancestor's count strictly greater than any of its descendants' counts.
//! Sorting by descending count therefore places ancestors first.

use crate::error::{BuildError, BuildResult, CycleKind};
use crate::fsutil;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// File name of the shared records unit
///
/// Many classes use the record shapes declared there without extending them,
/// so it is always ordered first among class units.
pub const RECORDS_UNIT_FILE: &str = "records.ts";

/// Extension of the source units handed to the compiler
pub const UNIT_EXTENSION: &str = "ts";

fn class_header() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)export\s+(?:abstract\s+)?class\s+(\w+)(?:\s*<[\w\s,.=]*>)?(?:\s+extends\s+([\w.]+))?",
        )
        .expect("class header pattern is valid")
    })
}

/// A source file and its text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub source: String,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Read a unit from disk
    pub fn read(path: &Path) -> BuildResult<Self> {
        let source = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        Ok(Self::new(path, source))
    }
}

/// Exported class declared by a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    /// Parent class as written, possibly qualified (`latte.View`)
    pub base: Option<String>,
}

/// Find the first exported class header in `source`
pub fn classify(source: &str) -> Option<ClassDecl> {
    let captures = class_header().captures(source)?;
    Some(ClassDecl {
        name: captures.get(1)?.as_str().to_string(),
        base: captures.get(2).map(|m| m.as_str().to_string()),
    })
}

/// Classification and ordering weight of a class unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnitInfo {
    pub path: PathBuf,
    pub class: ClassDecl,
    /// Number of other class units that transitively extend this one
    pub dependent_count: usize,
}

impl SourceUnitInfo {
    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    pub fn base_class_name(&self) -> Option<&str> {
        self.class.base.as_deref()
    }

    /// Whether this is the shared records unit
    pub fn is_records_unit(&self) -> bool {
        self.path.file_name().and_then(|n| n.to_str()) == Some(RECORDS_UNIT_FILE)
    }
}

/// Resolved order of a module's units
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOrder {
    /// Explicit includes, in declared order
    pub manual_includes: Vec<PathBuf>,
    /// Units without an exported class, in discovery order
    pub non_class: Vec<PathBuf>,
    /// Class units, ancestors before descendants
    pub classes: Vec<SourceUnitInfo>,
}

impl CompileOrder {
    /// All paths in compilation order
    pub fn paths(&self) -> Vec<&Path> {
        self.manual_includes
            .iter()
            .chain(&self.non_class)
            .map(PathBuf::as_path)
            .chain(self.classes.iter().map(|info| info.path.as_path()))
            .collect()
    }

    /// Number of referenced files
    pub fn len(&self) -> usize {
        self.manual_includes.len() + self.non_class.len() + self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reference manifest text: one absolute reference per line
    pub fn reference_manifest(&self) -> BuildResult<String> {
        let mut manifest = String::new();
        for path in self.paths() {
            let absolute = fsutil::absolute(path)?;
            manifest.push_str(&format!(
                "/// <reference path=\"{}\" />\n",
                absolute.display()
            ));
        }
        Ok(manifest)
    }

    /// Write the reference manifest, returning whether the file changed
    pub fn write_reference_manifest(&self, path: &Path) -> BuildResult<bool> {
        fsutil::write_if_changed(path, &self.reference_manifest()?)
    }
}

/// Computes single-pass compilation order from inheritance
#[derive(Debug, Clone, Default)]
pub struct CompileOrderResolver {
    manual_includes: Vec<PathBuf>,
}

impl CompileOrderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files referenced before every unit, in the given order
    pub fn with_manual_includes(mut self, includes: Vec<PathBuf>) -> Self {
        self.manual_includes = includes;
        self
    }

    /// Order `units`, given in discovery order
    pub fn resolve(&self, units: &[SourceUnit]) -> BuildResult<CompileOrder> {
        let mut non_class = Vec::new();
        let mut classes = Vec::new();

        for unit in units {
            if self.manual_includes.contains(&unit.path) {
                continue;
            }

            match classify(&unit.source) {
                Some(class) => {
                    tracing::debug!(
                        "{} declares {}{}",
                        unit.path.display(),
                        class.name,
                        class
                            .base
                            .as_ref()
                            .map(|b| format!(" extends {}", b))
                            .unwrap_or_default()
                    );
                    classes.push(SourceUnitInfo {
                        path: unit.path.clone(),
                        class,
                        dependent_count: 0,
                    });
                }
                None => non_class.push(unit.path.clone()),
            }
        }

        count_dependents(&mut classes)?;
        apply_records_override(&mut classes);

        // `sort_by` is stable: ties keep discovery order
        classes.sort_by(|a, b| b.dependent_count.cmp(&a.dependent_count));

        Ok(CompileOrder {
            manual_includes: self.manual_includes.clone(),
            non_class,
            classes,
        })
    }
}

/// Assign every class the number of classes whose ancestor chain reaches it
///
/// A base name not declared in the set ends the chain. A chain that comes
/// back to a class it already passed is an inheritance cycle.
fn count_dependents(classes: &mut [SourceUnitInfo]) -> BuildResult<()> {
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for (index, info) in classes.iter().enumerate() {
        // Later declarations of the same name win
        by_name.insert(info.class_name(), index);
    }

    let mut counts = vec![0usize; classes.len()];

    for start in 0..classes.len() {
        let mut seen = HashSet::from([start]);
        let mut chain = vec![start];
        let mut current = start;

        while let Some(base) = classes[current].base_class_name() {
            let Some(&parent) = by_name.get(base) else {
                break;
            };

            if !seen.insert(parent) {
                let at = chain.iter().position(|&i| i == parent).unwrap_or(0);
                let mut names: Vec<&str> = chain[at..]
                    .iter()
                    .map(|&i| classes[i].class_name())
                    .collect();
                names.push(classes[parent].class_name());
                return Err(BuildError::cycle(CycleKind::Inheritance, &names));
            }

            counts[parent] += 1;
            chain.push(parent);
            current = parent;
        }
    }

    for (info, count) in classes.iter_mut().zip(counts) {
        info.dependent_count = count;
    }

    Ok(())
}

/// Force the records unit to the highest count in the set
fn apply_records_override(classes: &mut [SourceUnitInfo]) {
    let total = classes.len();
    for info in classes.iter_mut().filter(|info| info.is_records_unit()) {
        info.dependent_count = total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn unit(path: &str, source: &str) -> SourceUnit {
        SourceUnit::new(path, source)
    }

    fn class_names(order: &CompileOrder) -> Vec<&str> {
        order.classes.iter().map(|c| c.class_name()).collect()
    }

    #[rstest]
    #[case("export class Foo {}", "Foo", None)]
    #[case("export class Foo extends Bar {}", "Foo", Some("Bar"))]
    #[case("export class Foo extends latte.View {}", "Foo", Some("latte.View"))]
    #[case("export class Foo<T> extends Bar<T> {}", "Foo", Some("Bar"))]
    #[case("export class Map<K, V> extends Base {}", "Map", Some("Base"))]
    #[case("export class Box<T = any> {}", "Box", None)]
    #[case("export abstract class Shape extends Node {}", "Shape", Some("Node"))]
    #[case("module latte {\n    export  class\tItem\n        extends Element {", "Item", Some("Element"))]
    #[case("EXPORT CLASS Loud EXTENDS Quiet {}", "Loud", Some("Quiet"))]
    fn test_classify_class_units(
        #[case] source: &str,
        #[case] name: &str,
        #[case] base: Option<&str>,
    ) {
        let class = classify(source).expect("should be a class unit");
        assert_eq!(class.name, name);
        assert_eq!(class.base.as_deref(), base);
    }

    #[rstest]
    #[case("")]
    #[case("interface Foo { x: number }")]
    #[case("class Internal {}")]
    #[case("export function helper() {}")]
    #[case("declare module latte { class Foo {} }")]
    fn test_classify_non_class_units(#[case] source: &str) {
        assert_eq!(classify(source), None);
    }

    #[test]
    fn test_classify_takes_first_class() {
        let source = "export class A extends B {}\nexport class C extends D {}";
        assert_eq!(classify(source).unwrap().name, "A");
    }

    #[test]
    fn test_chain_with_records_unit() {
        let units = vec![
            unit("a.ts", "export class A {}"),
            unit("b.ts", "export class B extends A {}"),
            unit("c.ts", "export class C extends B {}"),
            unit("records.ts", "export class R {}"),
        ];

        let order = CompileOrderResolver::new().resolve(&units).unwrap();

        assert_eq!(class_names(&order), vec!["R", "A", "B", "C"]);
        let counts: Vec<usize> = order.classes.iter().map(|c| c.dependent_count).collect();
        assert_eq!(counts, vec![4, 2, 1, 0]);
    }

    #[test]
    fn test_ancestor_counts_exceed_descendants() {
        let units = vec![
            unit("leaf1.ts", "export class Leaf1 extends Mid {}"),
            unit("leaf2.ts", "export class Leaf2 extends Mid {}"),
            unit("mid.ts", "export class Mid extends Root {}"),
            unit("other.ts", "export class Other extends Root {}"),
            unit("root.ts", "export class Root {}"),
        ];

        let order = CompileOrderResolver::new().resolve(&units).unwrap();

        let count = |name: &str| {
            order
                .classes
                .iter()
                .find(|c| c.class_name() == name)
                .unwrap()
                .dependent_count
        };
        assert_eq!(count("Root"), 4);
        assert_eq!(count("Mid"), 2);
        assert_eq!(count("Leaf1"), 0);
        assert!(count("Root") >= count("Mid") + 1);
        assert!(count("Mid") >= count("Leaf2") + 1);

        let names = class_names(&order);
        let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(pos("Root") < pos("Mid"));
        assert!(pos("Mid") < pos("Leaf1"));
        assert!(pos("Mid") < pos("Leaf2"));
        assert!(pos("Root") < pos("Other"));
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let units = vec![
            unit("z.ts", "export class Z {}"),
            unit("y.ts", "export class Y {}"),
            unit("x.ts", "export class X {}"),
        ];

        let order = CompileOrderResolver::new().resolve(&units).unwrap();

        assert_eq!(class_names(&order), vec!["Z", "Y", "X"]);
    }

    #[test]
    fn test_external_base_is_a_root() {
        let units = vec![
            unit("view.ts", "export class MyView extends latte.View {}"),
            unit("child.ts", "export class Child extends MyView {}"),
        ];

        let order = CompileOrderResolver::new().resolve(&units).unwrap();

        assert_eq!(class_names(&order), vec!["MyView", "Child"]);
        assert_eq!(order.classes[0].dependent_count, 1);
    }

    #[test]
    fn test_inheritance_cycle_detected() {
        let units = vec![
            unit("a.ts", "export class A extends C {}"),
            unit("b.ts", "export class B extends A {}"),
            unit("c.ts", "export class C extends B {}"),
        ];

        match CompileOrderResolver::new().resolve(&units) {
            Err(BuildError::CycleDetected { kind, cycle }) => {
                assert_eq!(kind, CycleKind::Inheritance);
                assert_eq!(cycle, "A -> C -> B -> A");
            }
            other => panic!("Expected CycleDetected error, got {:?}", other),
        }
    }

    #[test]
    fn test_self_extension_is_a_cycle() {
        let units = vec![unit("a.ts", "export class A extends A {}")];
        assert!(matches!(
            CompileOrderResolver::new().resolve(&units),
            Err(BuildError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_sections_in_order() {
        let units = vec![
            unit("b.ts", "export class B extends A {}"),
            unit("helpers.ts", "function help() {}"),
            unit("a.ts", "export class A {}"),
            unit("types.d.ts", "declare var x: number;"),
        ];

        let order = CompileOrderResolver::new()
            .with_manual_includes(vec![PathBuf::from("lib.d.ts"), PathBuf::from("jquery.d.ts")])
            .resolve(&units)
            .unwrap();

        assert_eq!(
            order.paths(),
            vec![
                Path::new("lib.d.ts"),
                Path::new("jquery.d.ts"),
                Path::new("helpers.ts"),
                Path::new("types.d.ts"),
                Path::new("a.ts"),
                Path::new("b.ts"),
            ]
        );
    }

    #[test]
    fn test_manual_includes_not_repeated() {
        let units = vec![unit("/m/inc.ts", "export class Inc {}")];

        let order = CompileOrderResolver::new()
            .with_manual_includes(vec![PathBuf::from("/m/inc.ts")])
            .resolve(&units)
            .unwrap();

        assert_eq!(order.len(), 1);
        assert!(order.classes.is_empty());
    }

    #[test]
    fn test_reference_manifest_lines() {
        let order = CompileOrder {
            manual_includes: vec![PathBuf::from("/m/inc.d.ts")],
            non_class: vec![PathBuf::from("/m/ts/util.ts")],
            classes: Vec::new(),
        };

        assert_eq!(
            order.reference_manifest().unwrap(),
            "/// <reference path=\"/m/inc.d.ts\" />\n/// <reference path=\"/m/ts/util.ts\" />\n"
        );
    }
}
