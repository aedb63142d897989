//! Build flags and profiles
//!
//! Flags are captured once when a build session starts and passed by value
//! into every pipeline run. Nothing reads them from process-wide state.

use crate::pipeline::StageKind;
use std::fmt;

/// Build profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Profile {
    /// Development build (default)
    #[default]
    Dev,
    /// Release build: also produces the server bundle and copies string tables
    Release,
}

impl Profile {
    /// Get profile name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Release => "release",
        }
    }

    /// Whether release-only stages run
    pub fn is_release(&self) -> bool {
        matches!(self, Self::Release)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Flags for one build session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildFlags {
    /// Minify the emitted script after compilation
    pub minimize: bool,
    /// Build with the release profile
    pub release: bool,
    /// Ignore the staleness gate
    pub force: bool,
    /// Declare generated record fields with the widest type
    pub widen_record_types: bool,
    /// Stop each module's pipeline after this stage
    pub abort_after: Option<StageKind>,
}

impl BuildFlags {
    /// Create default flags
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable minification
    pub fn with_minimize(mut self, minimize: bool) -> Self {
        self.minimize = minimize;
        self
    }

    /// Enable/disable the release profile
    pub fn with_release(mut self, release: bool) -> Self {
        self.release = release;
        self
    }

    /// Enable/disable forced rebuilds
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Enable/disable record type widening
    pub fn with_widen_record_types(mut self, widen: bool) -> Self {
        self.widen_record_types = widen;
        self
    }

    /// Stop after the given stage
    pub fn with_abort_after(mut self, stage: Option<StageKind>) -> Self {
        self.abort_after = stage;
        self
    }

    /// Profile selected by the flags
    pub fn profile(&self) -> Profile {
        if self.release {
            Profile::Release
        } else {
            Profile::Dev
        }
    }
}
