//! Snapshot of the host environment a resolution may consult.
//!
//! Recipes never read `std::env` directly; credential policies and
//! per-user file lookups go through this snapshot so resolution stays a
//! function of its inputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Host environment visible to recipes.
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    env: BTreeMap<String, String>,
    home_dir: Option<PathBuf>,
    interactive: bool,
}

impl HostContext {
    /// An empty, non-interactive context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the current process environment and home directory.
    #[must_use]
    pub fn capture(interactive: bool) -> Self {
        Self {
            env: std::env::vars_os()
                .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
                    (Ok(key), Ok(value)) => Some((key, value)),
                    (key, _) => {
                        tracing::debug!(key = ?key, "skipping non-UTF-8 environment variable");
                        None
                    }
                })
                .collect(),
            home_dir: dirs::home_dir(),
            interactive,
        }
    }

    /// Returns a copy with one variable set.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.env.insert(key.into(), value.into());
        self
    }

    /// Returns a copy with the home directory replaced.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    /// Returns a copy with interactive input allowed or not.
    #[must_use]
    pub const fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Looks up a non-empty environment variable.
    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// User home directory, if known.
    #[must_use]
    pub fn home_dir(&self) -> Option<&Path> {
        self.home_dir.as_deref()
    }

    /// Whether prompts are allowed.
    #[must_use]
    pub const fn interactive(&self) -> bool {
        self.interactive
    }
}
