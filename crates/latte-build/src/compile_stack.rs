//! Build order computation for modules, weighted by inclusion fan-in
//!
//! Every time the inclusion walk reaches a module its fan-in grows by one, so
//! a module included from many places (directly or through other modules)
//! ends up with a high count. Modules are built from the highest count down;
//! the requested module is reached only once and therefore builds last.
use crate::error::{BuildError, BuildResult, CycleKind};
use crate::repository::ModuleRepository;
use std::collections::HashMap;

/// A module in the compile stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileStackEntry {
    /// Module name
    pub module: String,
    /// Number of times the inclusion walk reached this module
    pub fan_in: usize,
}

/// Modules required to build one requested module
#[derive(Debug, Clone, Default)]
pub struct CompileStack {
    /// Entries sorted ascending by fan-in, discovery order among ties
    entries: Vec<CompileStackEntry>,
    /// Modules that did not resolve during the walk
    missing: Vec<String>,
}

/// One module being expanded by the walk
struct Frame {
    module: String,
    includes: Vec<String>,
    next: usize,
}

impl CompileStack {
    /// Walk the inclusion graph from `root` and compute the stack
    pub fn build(root: &str, repository: &dyn ModuleRepository) -> BuildResult<Self> {
        let mut walker = Walker {
            repository,
            counts: HashMap::new(),
            discovered: Vec::new(),
            includes: HashMap::new(),
            missing: Vec::new(),
        };

        let mut stack = vec![walker.visit(root)?];

        while let Some(frame) = stack.last_mut() {
            let Some(child) = frame.includes.get(frame.next).cloned() else {
                stack.pop();
                continue;
            };
            frame.next += 1;

            if let Some(start) = stack.iter().position(|f| f.module == child) {
                let mut cycle: Vec<&str> = stack[start..].iter().map(|f| f.module.as_str()).collect();
                cycle.push(&child);
                return Err(BuildError::cycle(CycleKind::Inclusion, &cycle));
            }

            let frame = walker.visit(&child)?;
            stack.push(frame);
        }

        let mut entries: Vec<CompileStackEntry> = walker
            .discovered
            .into_iter()
            .map(|module| {
                let fan_in = walker.counts[&module];
                CompileStackEntry { module, fan_in }
            })
            .collect();

        // Stable: ties keep discovery order
        entries.sort_by_key(|entry| entry.fan_in);

        Ok(Self {
            entries,
            missing: walker.missing,
        })
    }

    /// Entries sorted ascending by fan-in
    pub fn entries(&self) -> &[CompileStackEntry] {
        &self.entries
    }

    /// Module names in the order they must be built (highest fan-in first)
    pub fn build_order(&self) -> Vec<String> {
        self.entries
            .iter()
            .rev()
            .map(|entry| entry.module.clone())
            .collect()
    }

    /// Fan-in of a module, if it is part of the stack
    pub fn fan_in(&self, module: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|entry| entry.module == module)
            .map(|entry| entry.fan_in)
    }

    /// Modules that could not be resolved
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Number of modules in the stack
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Walker<'a> {
    repository: &'a dyn ModuleRepository,
    counts: HashMap<String, usize>,
    discovered: Vec<String>,
    includes: HashMap<String, Vec<String>>,
    missing: Vec<String>,
}

impl Walker<'_> {
    /// Count one visit to `module` and return its expansion frame
    fn visit(&mut self, module: &str) -> BuildResult<Frame> {
        match self.counts.get_mut(module) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(module.to_string(), 1);
                self.discovered.push(module.to_string());
            }
        }

        Ok(Frame {
            module: module.to_string(),
            includes: self.includes_of(module)?,
            next: 0,
        })
    }

    /// Included module names, resolved once per module
    fn includes_of(&mut self, module: &str) -> BuildResult<Vec<String>> {
        if let Some(includes) = self.includes.get(module) {
            return Ok(includes.clone());
        }

        let includes = match self.repository.resolve(module) {
            Ok(descriptor) => descriptor.included_modules().to_vec(),
            Err(BuildError::ModuleNotFound { path, .. }) => {
                tracing::warn!("Module {} does not exist: {}", module, path.display());
                self.missing.push(module.to_string());
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        self.includes.insert(module.to_string(), includes.clone());
        Ok(includes)
    }
}
