//! Source languages and the C++ standard selection.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Source language of a compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    #[serde(alias = "cpp", alias = "cxx", alias = "c++")]
    Cxx,
}

impl Language {
    /// Get the language name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
        }
    }

    /// Classify a source file by extension. Headers and unknown files yield `None`.
    pub fn from_path(path: &Path) -> Option<Language> {
        match path.extension()?.to_str()? {
            "c" => Some(Language::C),
            "cc" | "cpp" | "cxx" | "c++" | "C" => Some(Language::Cxx),
            _ => None,
        }
    }
}

/// C++ standard version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum CppStandard {
    #[serde(rename = "11", alias = "c++11")]
    Cpp11,
    #[default]
    #[serde(rename = "14", alias = "c++14")]
    Cpp14,
    #[serde(rename = "17", alias = "c++17")]
    Cpp17,
    #[serde(rename = "20", alias = "c++20")]
    Cpp20,
}

impl CppStandard {
    /// Get the standard as a compiler flag value (e.g., "c++14").
    pub fn as_flag_value(&self) -> &'static str {
        match self {
            CppStandard::Cpp11 => "c++11",
            CppStandard::Cpp14 => "c++14",
            CppStandard::Cpp17 => "c++17",
            CppStandard::Cpp20 => "c++20",
        }
    }

    /// The `-std=` argument.
    pub fn as_flag(&self) -> String {
        format!("-std={}", self.as_flag_value())
    }
}

impl std::str::FromStr for CppStandard {
    type Err = CppStandardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "11" | "c++11" => Ok(CppStandard::Cpp11),
            "14" | "c++14" => Ok(CppStandard::Cpp14),
            "17" | "c++17" => Ok(CppStandard::Cpp17),
            "20" | "c++20" => Ok(CppStandard::Cpp20),
            _ => Err(CppStandardParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid C++ standard string.
#[derive(Debug, Clone)]
pub struct CppStandardParseError(pub String);

impl std::fmt::Display for CppStandardParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid C++ standard '{}', valid values: 11, 14, 17, 20",
            self.0
        )
    }
}

impl std::error::Error for CppStandardParseError {}
