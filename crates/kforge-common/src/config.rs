//! Global configuration model for kforge.
//!
//! Loaded from a TOML file (`--config` or `$KFORGE_CONFIG`); every field has
//! a default so an empty file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KforgeError, Result};

/// Root configuration for kforge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KforgeConfig {
    /// Root directory for per-package build and package folders.
    pub workspace_root: PathBuf,
    /// Directory where downloaded archives and installers are cached.
    pub download_cache: PathBuf,
    /// Whether interactive input (e.g. installer login prompts) is allowed.
    pub interactive: bool,
    /// Release tooling settings.
    pub release: ReleaseConfig,
}

impl Default for KforgeConfig {
    fn default() -> Self {
        Self {
            workspace_root: crate::constants::default_workspace_root(),
            download_cache: crate::constants::default_download_cache(),
            interactive: false,
            release: ReleaseConfig::default(),
        }
    }
}

/// Settings for the release-notes, appcast and translation tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Translation service base URL.
    pub translation_endpoint: String,
    /// Target languages (service codes, upper case) besides English.
    pub target_languages: Vec<String>,
    /// Operating system tags used to split release notes.
    pub systems: Vec<String>,
    /// Base URL the release-notes HTML files are published under.
    pub release_notes_base_url: String,
    /// Base URL the installers are downloaded from.
    pub download_base_url: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            translation_endpoint: crate::constants::DEEPL_API_URL.to_string(),
            target_languages: ["FR", "DE", "ES", "IT"].map(String::from).to_vec(),
            systems: ["win", "linux", "macos"].map(String::from).to_vec(),
            release_notes_base_url: "https://download.storage.infomaniak.com/drive/desktopclient"
                .to_string(),
            download_base_url: "https://download.storage.infomaniak.com/drive/desktopclient"
                .to_string(),
        }
    }
}

impl KforgeConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this model.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| KforgeError::Parse {
            what: "configuration",
            message: e.to_string(),
        })
    }

    /// Loads the configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading configuration");
        let text = std::fs::read_to_string(path).map_err(|e| KforgeError::io(path, e))?;
        Self::from_toml(&text)
    }

    /// Loads from an explicit path, then `$KFORGE_CONFIG`, else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured file cannot be read or parsed.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(crate::constants::CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = KforgeConfig::from_toml("").expect("parse");
        assert!(!config.interactive);
        assert_eq!(config.release.target_languages, vec!["FR", "DE", "ES", "IT"]);
        assert_eq!(config.release.systems, vec!["win", "linux", "macos"]);
    }

    #[test]
    fn partial_release_section_keeps_other_defaults() {
        let config = KforgeConfig::from_toml(
            r#"
interactive = true

[release]
target_languages = ["FR"]
"#,
        )
        .expect("parse");
        assert!(config.interactive);
        assert_eq!(config.release.target_languages, vec!["FR"]);
        assert_eq!(config.release.systems.len(), 3);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = KforgeConfig::from_toml("interactive = maybe").unwrap_err();
        assert!(err.to_string().contains("configuration"), "got: {err}");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("kforge.toml");
        std::fs::write(&path, "interactive = true\n").expect("write");
        let config = KforgeConfig::load(&path).expect("load");
        assert!(config.interactive);
    }
}
