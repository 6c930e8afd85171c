//! CMake toolchain model and its rendering to a toolchain file.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::resolver::ResolvedConfig;

/// Value of a CMake cache variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CMakeValue {
    /// Rendered as `ON`/`OFF`.
    Bool(bool),
    /// Rendered quoted.
    Str(String),
    /// Rendered as a quoted `;`-separated list.
    List(Vec<String>),
}

impl CMakeValue {
    const fn cache_type(&self) -> &'static str {
        match self {
            Self::Bool(_) => "BOOL",
            Self::Str(_) | Self::List(_) => "STRING",
        }
    }
}

impl fmt::Display for CMakeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("ON"),
            Self::Bool(false) => f.write_str("OFF"),
            Self::Str(s) => write!(f, "\"{}\"", escape(s)),
            Self::List(items) => {
                let joined = items.iter().map(|s| escape(s)).collect::<Vec<_>>().join(";");
                write!(f, "\"{joined}\"")
            }
        }
    }
}

impl From<bool> for CMakeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for CMakeValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for CMakeValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('$', "\\$")
}

/// CMake generator selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Generator {
    /// `Ninja`.
    Ninja,
    /// `Unix Makefiles`.
    UnixMakefiles,
}

impl Generator {
    /// Name passed to `cmake -G`.
    #[must_use]
    pub const fn cmake_name(self) -> &'static str {
        match self {
            Self::Ninja => "Ninja",
            Self::UnixMakefiles => "Unix Makefiles",
        }
    }
}

/// Mutable toolchain a recipe's `generate` hook fills in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolchain {
    /// Forced generator, if any.
    pub generator: Option<Generator>,
    /// Cache variables.
    pub variables: BTreeMap<String, CMakeValue>,
    /// Compile definitions applied to every target.
    pub preprocessor_definitions: BTreeMap<String, String>,
}

impl Toolchain {
    /// Sets a cache variable, replacing any earlier value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<CMakeValue>) {
        let _ = self.variables.insert(name.into(), value.into());
    }

    /// Adds a compile definition.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let _ = self.preprocessor_definitions.insert(name.into(), value.into());
    }

    /// Forces the Ninja generator, both as `-G` and as the cached
    /// `CMAKE_GENERATOR`.
    pub fn use_ninja(&mut self) {
        self.generator = Some(Generator::Ninja);
        self.set("CMAKE_GENERATOR", Generator::Ninja.cmake_name());
    }
}

/// Renders the toolchain file for a resolved configuration.
///
/// Output is deterministic: variables and definitions are emitted in name
/// order.
#[must_use]
pub fn render_cmake_toolchain(config: &ResolvedConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "# Generated by kforge for {}/{} ({})",
        config.package, config.version, config.settings
    );
    let _ = writeln!(out, "include_guard()");
    if config.variables.contains_key("CMAKE_MSVC_RUNTIME_LIBRARY") {
        let _ = writeln!(out, "cmake_policy(SET CMP0091 NEW)");
    }
    let _ = writeln!(out);
    for (name, value) in &config.variables {
        let _ = writeln!(
            out,
            "set({name} {value} CACHE {} \"\" FORCE)",
            value.cache_type()
        );
    }
    if !config.preprocessor_definitions.is_empty() {
        let _ = writeln!(out);
        for (name, value) in &config.preprocessor_definitions {
            let _ = writeln!(out, "add_compile_definitions(\"{name}={}\")", escape(value));
        }
    }
    out
}
