//! Build mode and the predicates that gate transform steps

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of build is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Source maps, no minification
    Debug,
    /// Minified, prefixed, optimized
    Release,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Debug => write!(f, "debug"),
            BuildMode::Release => write!(f, "release"),
        }
    }
}

/// Predicate attached to a transform step
///
/// A step whose predicate does not hold is an identity pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum When {
    Always,
    Debug,
    Release,
}

impl When {
    /// Check the predicate against the mode of the current invocation
    pub fn holds(&self, mode: BuildMode) -> bool {
        match self {
            When::Always => true,
            When::Debug => mode == BuildMode::Debug,
            When::Release => mode == BuildMode::Release,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_when_holds() {
        assert!(When::Always.holds(BuildMode::Debug));
        assert!(When::Always.holds(BuildMode::Release));
        assert!(When::Debug.holds(BuildMode::Debug));
        assert!(!When::Debug.holds(BuildMode::Release));
        assert!(When::Release.holds(BuildMode::Release));
        assert!(!When::Release.holds(BuildMode::Debug));
    }
}
