//! Named preprocessor toggles registered into every environment.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single preprocessor definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Define {
    pub name: String,
    pub value: Option<String>,
}

impl Define {
    /// A bare `-DNAME` toggle.
    pub fn flag(name: impl Into<String>) -> Self {
        Define {
            name: name.into(),
            value: None,
        }
    }

    /// A `-DNAME=VALUE` definition.
    pub fn valued(name: impl Into<String>, value: impl Into<String>) -> Self {
        Define {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Render as a compiler argument.
    pub fn to_arg(&self) -> String {
        match &self.value {
            Some(v) => format!("-D{}={}", self.name, v),
            None => format!("-D{}", self.name),
        }
    }
}

impl fmt::Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for Define {
    type Err = String;

    /// Parse `NAME` or `NAME=VALUE` as given to `-D` on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = match s.split_once('=') {
            Some((n, v)) => (n, Some(v)),
            None => (s, None),
        };
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(format!("invalid define '{}'", s));
        }
        Ok(Define {
            name: name.to_string(),
            value: value.map(str::to_string),
        })
    }
}

/// Value of a `[defines]` entry in `Kiln.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefineValue {
    /// `true` enables a bare toggle, `false` leaves it out
    Toggle(bool),
    Int(i64),
    Text(String),
}

/// The flag registry.
///
/// Entries are kept sorted by name so registration order is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Defines {
    entries: BTreeMap<String, Option<String>>,
}

impl Defines {
    /// Create an empty registry.
    pub fn new() -> Self {
        Defines::default()
    }

    /// Build a registry from manifest entries; disabled toggles are dropped.
    pub fn from_manifest(table: &BTreeMap<String, DefineValue>) -> Self {
        let mut defines = Defines::new();
        for (name, value) in table {
            match value {
                DefineValue::Toggle(true) => defines.set(Define::flag(name)),
                DefineValue::Toggle(false) => {}
                DefineValue::Int(i) => defines.set(Define::valued(name, i.to_string())),
                DefineValue::Text(s) => defines.set(Define::valued(name, s)),
            }
        }
        defines
    }

    /// Add or replace an entry.
    pub fn set(&mut self, define: Define) {
        self.entries.insert(define.name, define.value);
    }

    /// Add or replace an entry, builder style.
    pub fn with(mut self, define: Define) -> Self {
        self.set(define);
        self
    }

    /// Look up an entry's value. `Some(None)` is a bare toggle.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.entries.get(name).map(|v| v.as_deref())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = Define> + '_ {
        self.entries.iter().map(|(name, value)| Define {
            name: name.clone(),
            value: value.clone(),
        })
    }

    /// Register every entry into a preprocessor-definition list.
    pub fn register_into(&self, cppdefines: &mut Vec<Define>) {
        for define in self.iter() {
            tracing::debug!("registering define {}", define);
            cppdefines.push(define);
        }
    }
}
