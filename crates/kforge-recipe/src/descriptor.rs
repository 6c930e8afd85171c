//! Static package metadata: identity, option schema, supported platforms.

use kforge_common::error::{KforgeError, Result};
use kforge_common::types::Os;
use serde::Serialize;

use crate::options::OptionSchema;
use crate::version::Version;

/// Settings axes a recipe can declare irrelevant to its binary identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SettingAxis {
    /// Operating system.
    Os,
    /// Architecture.
    Arch,
    /// Compiler identity (kind, version, runtime).
    Compiler,
    /// Build type.
    BuildType,
}

/// Build backend a recipe drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuildSystem {
    /// CMake configure/build/install.
    CMake,
    /// Autotools `configure && make && make install`.
    Autotools,
    /// A recipe-provided shell script.
    Script,
    /// A vendor installer binary.
    Installer,
}

/// Static declaration of a package.
#[derive(Debug, Clone, Serialize)]
pub struct PackageDescriptor {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: Version,
    /// One-line description.
    pub description: String,
    /// SPDX license identifier.
    pub license: String,
    /// Upstream homepage.
    pub homepage: String,
    /// Operating systems the recipe supports.
    pub supported_os: Vec<Os>,
    /// Declared options.
    pub options: OptionSchema,
    /// Build backend.
    pub build_system: BuildSystem,
}

impl PackageDescriptor {
    /// Creates a descriptor supporting every operating system, with no options.
    #[must_use]
    pub fn new(name: impl Into<String>, version: Version, build_system: BuildSystem) -> Self {
        Self {
            name: name.into(),
            version,
            description: String::new(),
            license: String::new(),
            homepage: String::new(),
            supported_os: Os::ALL.to_vec(),
            options: OptionSchema::default(),
            build_system,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Sets the license.
    #[must_use]
    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    /// Sets the homepage.
    #[must_use]
    pub fn homepage(mut self, url: impl Into<String>) -> Self {
        self.homepage = url.into();
        self
    }

    /// Restricts the supported operating systems.
    #[must_use]
    pub fn only_on(mut self, os: &[Os]) -> Self {
        self.supported_os = os.to_vec();
        self
    }

    /// Sets the option schema.
    #[must_use]
    pub fn options(mut self, options: OptionSchema) -> Self {
        self.options = options;
        self
    }

    /// `name/version` reference.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }

    /// Validates the schema once at load time.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor has no name, supports no OS, or
    /// its option schema is inconsistent.
    pub fn validate_schema(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(KforgeError::configuration("package descriptor has no name"));
        }
        if self.supported_os.is_empty() {
            return Err(KforgeError::configuration(format!(
                "{}: no supported operating system declared",
                self.name
            )));
        }
        self.options.validate(&self.name)
    }

    /// Fails if `os` is outside the supported set.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Configuration` naming the supported systems.
    pub fn check_os(&self, os: Os) -> Result<()> {
        if self.supported_os.contains(&os) {
            return Ok(());
        }
        let supported = self
            .supported_os
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Err(KforgeError::configuration(format!(
            "{} is not supported on {os} (supported: {supported})",
            self.reference()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionSpec;

    #[test]
    fn check_os_names_supported_systems() {
        let desc = PackageDescriptor::new("cppunit", Version::new(&[1, 15, 1]), BuildSystem::Autotools)
            .only_on(&[Os::Windows]);
        let err = desc.check_os(Os::Linux).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cppunit/1.15.1"), "got: {msg}");
        assert!(msg.contains("supported: Windows"), "got: {msg}");
        assert!(desc.check_os(Os::Windows).is_ok());
    }

    #[test]
    fn schema_validation_catches_bad_default() {
        let desc = PackageDescriptor::new("pkg", Version::new(&[1]), BuildSystem::CMake).options(
            OptionSchema::new(vec![OptionSpec::choice("mode", &["a"], "b")]),
        );
        assert!(desc.validate_schema().is_err());
    }

    #[test]
    fn empty_os_set_is_invalid() {
        let desc = PackageDescriptor::new("pkg", Version::new(&[1]), BuildSystem::CMake).only_on(&[]);
        assert!(desc.validate_schema().is_err());
    }
}
