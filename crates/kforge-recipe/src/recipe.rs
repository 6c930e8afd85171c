//! The recipe trait every package implements.
//!
//! Hooks are called in a fixed order by [`crate::resolver::resolve`]:
//! `removed_options`, `platform_defaults`, `configure`, `validate`,
//! `generate`. Build-time hooks (`build_plan`, `expected_artifacts`,
//! `package_info`) receive the frozen [`ResolvedConfig`].

use std::collections::BTreeMap;
use std::path::Path;

use kforge_common::error::{KforgeError, Result};
use kforge_common::types::{Os, Settings};

use crate::descriptor::{BuildSystem, PackageDescriptor, SettingAxis};
use crate::host::HostContext;
use crate::manifest::{ConsumptionManifest, DependencyManifests};
use crate::options::{OptionValue, OptionValues};
use crate::plan::{BuildLayout, BuildPlan, ExpectedArtifact};
use crate::requirement::Requirement;
use crate::resolver::ResolvedConfig;
use crate::toolchain::{Generator, Toolchain};

/// A package recipe.
pub trait Recipe: Send + Sync {
    /// Static metadata and option schema.
    fn descriptor(&self) -> &PackageDescriptor;

    /// Options that do not exist for these settings. The default drops
    /// `fPIC` on Windows.
    fn removed_options(&self, settings: &Settings) -> Vec<&'static str> {
        if settings.os == Os::Windows {
            vec!["fPIC"]
        } else {
            Vec::new()
        }
    }

    /// Option defaults that depend on the platform. Profile and CLI values
    /// still take precedence.
    fn platform_defaults(&self, _settings: &Settings) -> BTreeMap<String, OptionValue> {
        BTreeMap::new()
    }

    /// Applies documented overrides and returns the settings to build with.
    ///
    /// The default removes `fPIC` from shared builds and keeps the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if an override cannot be applied (e.g. missing
    /// credentials after a policy fallback).
    fn configure(
        &self,
        settings: &Settings,
        options: &mut OptionValues,
        _host: &HostContext,
    ) -> Result<Settings> {
        if options.flag("shared") {
            options.remove("fPIC");
        }
        Ok(settings.clone())
    }

    /// Rejects unsupported combinations.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Configuration` naming the violated constraint.
    fn validate(&self, _settings: &Settings, _options: &OptionValues, _host: &HostContext) -> Result<()> {
        Ok(())
    }

    /// Adds recipe-specific cache variables and definitions on top of the
    /// generic ones.
    fn generate(&self, _settings: &Settings, _options: &OptionValues, _toolchain: &mut Toolchain) {}

    /// Host (library) requirements.
    ///
    /// # Errors
    ///
    /// Returns an error if a declared reference is malformed.
    fn requirements(&self, _config: &ResolvedConfig) -> Result<Vec<Requirement>> {
        Ok(Vec::new())
    }

    /// Tool requirements, reported but not built.
    ///
    /// # Errors
    ///
    /// Returns an error if a declared reference is malformed.
    fn build_requirements(&self, config: &ResolvedConfig) -> Result<Vec<Requirement>> {
        if config.generator == Some(Generator::Ninja) {
            Ok(vec![Requirement::tool("ninja/[>=1.11.1]")?])
        } else {
            Ok(Vec::new())
        }
    }

    /// Executables that must be on `PATH` before the build starts.
    fn required_programs(&self, config: &ResolvedConfig) -> Vec<&'static str> {
        let mut programs = match self.descriptor().build_system {
            BuildSystem::CMake => vec!["cmake"],
            BuildSystem::Autotools => vec!["bash", "make"],
            BuildSystem::Script => vec!["bash"],
            BuildSystem::Installer => Vec::new(),
        };
        if config.generator == Some(Generator::Ninja) {
            programs.push("ninja");
        }
        programs
    }

    /// The steps producing the package.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be built for this configuration.
    fn build_plan(
        &self,
        config: &ResolvedConfig,
        layout: &BuildLayout,
        deps: &DependencyManifests,
        host: &HostContext,
    ) -> Result<BuildPlan>;

    /// Artifacts checked after installation. The default expects `include`
    /// and `lib` folders.
    fn expected_artifacts(&self, _config: &ResolvedConfig, layout: &BuildLayout) -> Vec<ExpectedArtifact> {
        vec![
            ExpectedArtifact::dir("include directory", layout.package_dir.join("include")),
            ExpectedArtifact::dir("library directory", layout.package_dir.join("lib")),
        ]
    }

    /// Consumption metadata of the installed package.
    fn package_info(&self, config: &ResolvedConfig, package_dir: &Path) -> ConsumptionManifest;

    /// Settings axes that do not affect the binary identity.
    fn package_id_exclusions(&self, _settings: &Settings) -> Vec<SettingAxis> {
        Vec::new()
    }

    /// Options that do not affect the binary identity.
    fn package_id_ignored_options(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Rejects a shared build linked against a static MSVC runtime.
///
/// # Errors
///
/// Returns `KforgeError::Configuration` for `shared=True` with `MT`/`MTd`.
pub fn reject_shared_static_runtime(
    package: &str,
    settings: &Settings,
    options: &OptionValues,
) -> Result<()> {
    if options.flag("shared") && settings.is_msvc_static_runtime() {
        return Err(KforgeError::configuration(format!(
            "{package}: cannot build shared libraries with the static MSVC runtime ({})",
            settings
                .msvc_runtime()
                .map_or("MT", kforge_common::types::RuntimeLibrary::flag)
        )));
    }
    Ok(())
}

/// Architectures as reported in a manifest: the Apple names for macOS
/// (two for universal builds), the settings name elsewhere.
#[must_use]
pub fn manifest_architectures(settings: &Settings) -> Vec<String> {
    if settings.os.is_apple() {
        settings.arch.apple_names().into_iter().map(String::from).collect()
    } else {
        vec![settings.arch.to_string()]
    }
}
