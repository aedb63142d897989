//! CLI configuration via environment variables
//!
//! External programs the build shells out to can be swapped without touching
//! any configuration file.

use latte_build::{CommandMinifier, Toolchain, TscCompiler};
use std::env;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Compiler program (LATTE_TSC, defaults to `tsc`)
    pub tsc: Option<String>,
    /// Minifier program (LATTE_MINIFIER, defaults to `terser`)
    pub minifier: Option<String>,
    /// Interpreter for `.js` hooks (LATTE_NODE, defaults to `node`)
    pub node: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            tsc: var("LATTE_TSC"),
            minifier: var("LATTE_MINIFIER"),
            node: var("LATTE_NODE"),
        }
    }

    /// Collaborators for a build session
    pub fn toolchain(&self) -> Toolchain {
        let mut toolchain = Toolchain::default();
        if let Some(ref tsc) = self.tsc {
            toolchain = toolchain.with_compiler(TscCompiler::new().with_program(tsc));
        }
        if let Some(ref minifier) = self.minifier {
            toolchain = toolchain.with_minifier(CommandMinifier::new(minifier));
        }
        if let Some(ref node) = self.node {
            toolchain = toolchain.with_node(node);
        }
        toolchain
    }
}
