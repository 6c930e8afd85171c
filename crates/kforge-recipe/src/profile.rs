//! Profiles: the settings and option overrides of one build, read from TOML.
//!
//! ```toml
//! [settings]
//! os = "Windows"
//! arch = "x86_64"
//! build_type = "Debug"
//!
//! [settings.compiler]
//! kind = "msvc"
//! version = "193"
//! runtime = "dynamic"
//!
//! [options."*"]
//! shared = true
//!
//! [options.poco]
//! enable_netssl = false
//! ```
//!
//! `*` options apply to every package declaring them; per-package options
//! must name options the package declares.

use std::collections::BTreeMap;
use std::path::Path;

use kforge_common::error::{KforgeError, Result};
use kforge_common::types::{Arch, BuildType, Compiler, Os, Settings};
use serde::Deserialize;

use crate::options::{OptionSchema, OptionValue};

/// Wildcard package pattern.
pub const ALL_PACKAGES: &str = "*";

#[derive(Debug, Deserialize)]
struct RawSettings {
    os: Os,
    arch: Arch,
    build_type: BuildType,
    compiler: Option<Compiler>,
    os_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    settings: RawSettings,
    #[serde(default)]
    options: BTreeMap<String, BTreeMap<String, OptionValue>>,
}

/// Settings plus per-package option overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Settings shared by every package of the build.
    pub settings: Settings,
    options: BTreeMap<String, BTreeMap<String, OptionValue>>,
}

impl Profile {
    /// A profile with no option overrides.
    #[must_use]
    pub const fn new(settings: Settings) -> Self {
        Self {
            settings,
            options: BTreeMap::new(),
        }
    }

    /// Parses a profile from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Parse` if the text is not a valid profile.
    pub fn from_toml(text: &str) -> Result<Self> {
        let raw: RawProfile = toml::from_str(text).map_err(|e| KforgeError::Parse {
            what: "profile",
            message: e.to_string(),
        })?;
        let s = raw.settings;
        let mut settings = Settings::new(s.os, s.arch, s.build_type);
        if let Some(compiler) = s.compiler {
            settings = settings.with_compiler(compiler);
        }
        if let Some(version) = s.os_version {
            settings = settings.with_os_version(version);
        }
        Ok(Self {
            settings,
            options: raw.options,
        })
    }

    /// Loads a profile file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading profile");
        let text = std::fs::read_to_string(path).map_err(|e| KforgeError::io(path, e))?;
        Self::from_toml(&text)
    }

    /// Adds an override for `package` (or [`ALL_PACKAGES`]).
    pub fn set_option(&mut self, package: &str, name: &str, value: OptionValue) {
        let _ = self
            .options
            .entry(package.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Parses a `pkg:name=value` or `name=value` CLI override.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Parse` if there is no `=`.
    pub fn apply_cli_override(&mut self, default_package: &str, spec: &str) -> Result<()> {
        let Some((key, value)) = spec.split_once('=') else {
            return Err(KforgeError::Parse {
                what: "option override",
                message: format!("\"{spec}\" is not of the form [pkg:]name=value"),
            });
        };
        let (package, name) = key.split_once(':').unwrap_or((default_package, key));
        let value = value.parse::<OptionValue>().unwrap_or_else(|never| match never {});
        self.set_option(package.trim(), name.trim(), value);
        Ok(())
    }

    /// Overrides for one package: wildcard values the schema declares,
    /// then the package's own values.
    #[must_use]
    pub fn options_for(&self, package: &str, schema: &OptionSchema) -> BTreeMap<String, OptionValue> {
        let mut out = BTreeMap::new();
        if let Some(wildcard) = self.options.get(ALL_PACKAGES) {
            for (name, value) in wildcard {
                if schema.contains(name) {
                    let _ = out.insert(name.clone(), value.clone());
                }
            }
        }
        if let Some(own) = self.options.get(package) {
            out.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        out
    }

    /// Returns `true` if the profile names `package` explicitly.
    #[must_use]
    pub fn overrides(&self, package: &str, option: &str) -> bool {
        self.options
            .get(package)
            .is_some_and(|opts| opts.contains_key(option))
    }
}
