//! Process-environment overrides for tools and flag lists.
//!
//! The variable table is read once into an [`EnvOverrides`] value. Applying
//! it to a base configuration yields a new configuration; nothing is mutated
//! after the fact.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::builder::environment::FlagSet;
use crate::builder::toolchain::ToolSet;

/// Staged-install root.
pub const DESTDIR: &str = "DESTDIR";

/// Every variable kiln reads from the process environment.
pub const OVERRIDE_VARS: &[&str] = &[
    DESTDIR,
    "CC",
    "CXX",
    "AR",
    "LINK",
    "CFLAGS",
    "CXXFLAGS",
    "CPPFLAGS",
    "ARFLAGS",
    "LDFLAGS",
    "LINKFLAGS",
    "LIBS",
];

/// Tools and flags before mode/platform/compiler deltas are appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseConfig {
    pub tools: ToolSet,
    pub flags: FlagSet,
}

/// Sparse map of override variables. Empty values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    vars: BTreeMap<String, String>,
}

impl EnvOverrides {
    /// No overrides at all.
    pub fn none() -> Self {
        EnvOverrides::default()
    }

    /// Snapshot the relevant variables of the current process.
    pub fn from_env() -> Self {
        Self::from_pairs(
            OVERRIDE_VARS
                .iter()
                .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v))),
        )
    }

    /// Build from explicit pairs. Unknown keys are ignored.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, v)| {
                let known = OVERRIDE_VARS.contains(&k.as_str());
                if !known {
                    tracing::debug!("ignoring unknown override {}", k);
                }
                known && !v.trim().is_empty()
            })
            .collect();
        EnvOverrides { vars }
    }

    /// Add one override, builder style.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if OVERRIDE_VARS.contains(&key) && !value.trim().is_empty() {
            self.vars.insert(key.to_string(), value);
        }
        self
    }

    /// Raw value of a set variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Whitespace-split value of a list variable.
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
    }

    /// The staged-install root, if set.
    pub fn destdir(&self) -> Option<PathBuf> {
        self.get(DESTDIR).map(PathBuf::from)
    }

    /// Iterate over set variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge onto a base configuration.
    ///
    /// Tool variables replace the tool path. `CFLAGS`, `CXXFLAGS`, `CPPFLAGS`,
    /// `ARFLAGS`, `LINKFLAGS` and `LIBS` replace their list; `LDFLAGS` is
    /// appended to link flags after `LINKFLAGS`.
    pub fn apply(&self, base: &BaseConfig) -> BaseConfig {
        let mut merged = base.clone();

        let tools = [
            ("CC", &mut merged.tools.cc),
            ("CXX", &mut merged.tools.cxx),
            ("AR", &mut merged.tools.ar),
            ("LINK", &mut merged.tools.link),
        ];
        for (key, slot) in tools {
            if let Some(value) = self.get(key) {
                tracing::debug!("{} overridden to {}", key, value);
                *slot = PathBuf::from(value);
            }
        }

        let lists = [
            ("CFLAGS", &mut merged.flags.cflags),
            ("CXXFLAGS", &mut merged.flags.cxxflags),
            ("CPPFLAGS", &mut merged.flags.cppflags),
            ("ARFLAGS", &mut merged.flags.arflags),
            ("LINKFLAGS", &mut merged.flags.linkflags),
            ("LIBS", &mut merged.flags.libs),
        ];
        for (key, slot) in lists {
            if let Some(values) = self.list(key) {
                tracing::debug!("{} overridden to {:?}", key, values);
                *slot = values;
            }
        }

        if let Some(ldflags) = self.list("LDFLAGS") {
            merged.flags.linkflags.extend(ldflags);
        }

        merged
    }
}
