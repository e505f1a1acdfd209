// src/exec/readiness.rs

//! Readiness detection over process output.
//!
//! A chunk is whatever the launcher delivers as one [`ProcessEvent::Output`],
//! which for [`LocalProcessLauncher`] is one line. A banner that lies inside
//! a single chunk is always detected; a banner split across two chunks is
//! not.
//!
//! [`ProcessEvent::Output`]: crate::exec::ProcessEvent::Output
//! [`LocalProcessLauncher`]: crate::exec::LocalProcessLauncher

use regex::Regex;

use crate::errors::{ChainsvcError, Result};

/// Banner the connector prints once it accepts requests.
pub const CONNECTOR_BANNER: &str = "Connector started on";

/// Does `chunk` contain a match for `pattern`?
pub fn matches(chunk: &str, pattern: &Regex) -> bool {
    pattern.is_match(chunk)
}

/// A compiled readiness pattern.
#[derive(Debug, Clone)]
pub struct ReadinessDetector {
    pattern: Regex,
}

impl ReadinessDetector {
    /// Compile a regex pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            ChainsvcError::ConfigError(format!("invalid readiness pattern {pattern:?}: {e}"))
        })?;
        Ok(Self { pattern })
    }

    /// Match a literal substring, no regex syntax.
    pub fn literal(banner: &str) -> Self {
        let escaped = regex::escape(banner);
        // Escaped input is always a valid pattern.
        let pattern = Regex::new(&escaped).expect("escaped literal is a valid regex");
        Self { pattern }
    }

    pub fn matches(&self, chunk: &str) -> bool {
        matches(chunk, &self.pattern)
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl PartialEq for ReadinessDetector {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ReadinessDetector {}

impl Default for ReadinessDetector {
    fn default() -> Self {
        Self::literal(CONNECTOR_BANNER)
    }
}
