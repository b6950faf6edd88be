//! Build modes and the user's mode selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::BuildError;

/// A named build profile.
///
/// Each mode gets exactly one environment per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Debug symbols, `DEBUG` define, no install step
    Debug,
    /// Optimized build installed under the prefix
    Release,
    /// Optimized build staged into a platform package
    Retail,
}

impl BuildMode {
    /// Get the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Debug => "debug",
            BuildMode::Release => "release",
            BuildMode::Retail => "retail",
        }
    }

    /// Whether this mode compiles with debug symbols.
    pub fn is_debug(&self) -> bool {
        matches!(self, BuildMode::Debug)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(BuildMode::Debug),
            "release" => Ok(BuildMode::Release),
            "retail" => Ok(BuildMode::Retail),
            _ => Err(BuildError::InvalidMode {
                value: s.to_string(),
                expected: "debug, release, retail".to_string(),
            }),
        }
    }
}

/// The `--mode` option: which of the install-oriented branches to construct.
///
/// Retail is deliberately absent; it is gated on the platform instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSelection {
    /// Release and debug
    #[default]
    All,
    Debug,
    Release,
}

impl ModeSelection {
    /// Get the selection as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeSelection::All => "all",
            ModeSelection::Debug => "debug",
            ModeSelection::Release => "release",
        }
    }

    /// Modes constructed for this selection, in construction order.
    pub fn modes(&self) -> &'static [BuildMode] {
        match self {
            ModeSelection::All => &[BuildMode::Release, BuildMode::Debug],
            ModeSelection::Debug => &[BuildMode::Debug],
            ModeSelection::Release => &[BuildMode::Release],
        }
    }

    /// Whether the selection includes `mode`.
    pub fn includes(&self, mode: BuildMode) -> bool {
        self.modes().contains(&mode)
    }
}

impl fmt::Display for ModeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeSelection {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ModeSelection::All),
            "debug" => Ok(ModeSelection::Debug),
            "release" => Ok(ModeSelection::Release),
            _ => Err(BuildError::InvalidMode {
                value: s.to_string(),
                expected: "all, debug, release".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_parse() {
        assert_eq!("all".parse::<ModeSelection>().unwrap(), ModeSelection::All);
        assert_eq!(
            "release".parse::<ModeSelection>().unwrap(),
            ModeSelection::Release
        );
        assert_eq!("debug".parse::<ModeSelection>().unwrap(), ModeSelection::Debug);
    }

    #[test]
    fn test_selection_rejects_retail_and_garbage() {
        for bad in ["retail", "Release", "", "fast"] {
            let err = bad.parse::<ModeSelection>().unwrap_err();
            assert!(matches!(err, BuildError::InvalidMode { .. }), "{}", bad);
        }
    }

    #[test]
    fn test_all_expands_to_release_and_debug() {
        assert_eq!(
            ModeSelection::All.modes(),
            &[BuildMode::Release, BuildMode::Debug]
        );
        assert!(!ModeSelection::Release.includes(BuildMode::Debug));
        assert!(!ModeSelection::All.includes(BuildMode::Retail));
    }

    #[test]
    fn test_build_mode_roundtrip_names() {
        for mode in [BuildMode::Debug, BuildMode::Release, BuildMode::Retail] {
            assert_eq!(mode.as_str().parse::<BuildMode>().unwrap(), mode);
        }
        assert!(BuildMode::Debug.is_debug());
        assert!(!BuildMode::Retail.is_debug());
    }
}
