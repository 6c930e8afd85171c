//! Platform-conditional configuration resolver.
//!
//! Turns `(recipe, settings, option overrides)` into a frozen
//! [`ResolvedConfig`]. Every configuration error surfaces here, before any
//! tool runs.

use std::collections::BTreeMap;

use kforge_common::error::{KforgeError, Result};
use kforge_common::types::{RuntimeLibrary, Settings};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::descriptor::{BuildSystem, SettingAxis};
use crate::host::HostContext;
use crate::options::{OptionValue, OptionValues};
use crate::recipe::Recipe;
use crate::toolchain::{CMakeValue, Generator, Toolchain};
use crate::version::Version;

/// The immutable result of resolving one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    /// Package name.
    pub package: String,
    /// Package version.
    pub version: Version,
    /// Settings after recipe overrides.
    pub settings: Settings,
    /// Validated option values.
    pub options: OptionValues,
    /// CMake cache variables, by name.
    pub variables: BTreeMap<String, CMakeValue>,
    /// Compile definitions.
    pub preprocessor_definitions: BTreeMap<String, String>,
    /// Forced generator, if any.
    pub generator: Option<Generator>,
    /// Build backend.
    pub build_system: BuildSystem,
    /// Settings axes excluded from the package id.
    pub package_id_exclusions: Vec<SettingAxis>,
    /// Options excluded from the package id.
    pub package_id_ignored_options: Vec<String>,
}

#[derive(Serialize)]
struct PackageIdInput<'a> {
    package: &'a str,
    version: String,
    os: Option<String>,
    arch: Option<String>,
    compiler: Option<String>,
    build_type: Option<String>,
    msvc_runtime: Option<&'static str>,
    os_version: Option<&'a str>,
    options: BTreeMap<&'a str, &'a OptionValue>,
}

impl ResolvedConfig {
    /// `name/version` reference.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}/{}", self.package, self.version)
    }

    /// Looks up a cache variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&CMakeValue> {
        self.variables.get(name)
    }

    /// Returns `true` for a shared-library build.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.options.flag("shared")
    }

    /// Binary identity: SHA-256 over the settings and options that affect
    /// the produced binaries, hex encoded.
    #[must_use]
    pub fn package_id(&self) -> String {
        let keep = |axis: SettingAxis| !self.package_id_exclusions.contains(&axis);
        let s = &self.settings;
        let input = PackageIdInput {
            package: &self.package,
            version: self.version.to_string(),
            os: keep(SettingAxis::Os).then(|| s.os.to_string()),
            arch: keep(SettingAxis::Arch).then(|| s.arch.to_string()),
            compiler: keep(SettingAxis::Compiler).then(|| {
                format!("{}-{}-{:?}", s.compiler.kind, s.compiler.version, s.compiler.runtime)
            }),
            build_type: keep(SettingAxis::BuildType).then(|| s.build_type.to_string()),
            // Kept even when the build type is excluded.
            msvc_runtime: s.msvc_runtime().map(RuntimeLibrary::flag),
            os_version: s.os_version.as_deref(),
            options: self
                .options
                .iter()
                .filter(|(name, _)| !self.package_id_ignored_options.contains(*name))
                .map(|(name, value)| (name.as_str(), value))
                .collect(),
        };
        // Serializing plain strings and maps cannot fail.
        let bytes = serde_json::to_vec(&input).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        hex::encode(&digest[..20])
    }
}

/// Resolves one package.
///
/// Order: schema check, OS check, per-platform option removal, option
/// validation, recipe overrides, generic and recipe constraints, then
/// toolchain generation. Recipe-generated variables override the generic
/// ones.
///
/// # Errors
///
/// Returns `KforgeError::Configuration` for any invalid or unsupported
/// option/setting combination.
pub fn resolve(
    recipe: &dyn Recipe,
    settings: &Settings,
    overrides: &BTreeMap<String, OptionValue>,
    host: &HostContext,
) -> Result<ResolvedConfig> {
    let desc = recipe.descriptor();
    tracing::info!(package = %desc.reference(), settings = %settings, "resolving configuration");

    desc.validate_schema()?;
    desc.check_os(settings.os)?;

    let removed = recipe.removed_options(settings);
    let mut requested = recipe.platform_defaults(settings);
    requested.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    let mut options = desc.options.instantiate(&desc.name, &removed, &requested)?;
    let settings = recipe.configure(settings, &mut options, host)?;

    if settings.arch == kforge_common::types::Arch::Universal && !settings.os.is_apple() {
        return Err(KforgeError::configuration(format!(
            "{}: universal architecture ({}) is only available on Apple platforms, not {}",
            desc.reference(),
            settings.arch,
            settings.os
        )));
    }
    recipe.validate(&settings, &options, host)?;

    let mut toolchain = generic_toolchain(&settings, &options);
    recipe.generate(&settings, &options, &mut toolchain);
    for (name, value) in &toolchain.variables {
        tracing::debug!(package = %desc.name, variable = %name, value = %value, "toolchain variable");
    }

    let package_id_exclusions = recipe.package_id_exclusions(&settings);
    Ok(ResolvedConfig {
        package: desc.name.clone(),
        version: desc.version.clone(),
        settings,
        options,
        variables: toolchain.variables,
        preprocessor_definitions: toolchain.preprocessor_definitions,
        generator: toolchain.generator,
        build_system: desc.build_system,
        package_id_exclusions,
        package_id_ignored_options: recipe
            .package_id_ignored_options()
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
    })
}

/// Variables every CMake build gets before the recipe's own.
fn generic_toolchain(settings: &Settings, options: &OptionValues) -> Toolchain {
    let mut tc = Toolchain::default();
    tc.set("CMAKE_BUILD_TYPE", settings.build_type.as_str());

    if settings.os.is_apple() {
        let archs = settings
            .arch
            .apple_names()
            .into_iter()
            .map(String::from)
            .collect();
        tc.set("CMAKE_OSX_ARCHITECTURES", CMakeValue::List(archs));
        if let Some(target) = &settings.os_version {
            tc.set("CMAKE_OSX_DEPLOYMENT_TARGET", target.as_str());
        }
    }

    if let Some(runtime) = settings.msvc_runtime() {
        tc.set("CMAKE_MSVC_RUNTIME_LIBRARY", runtime.cmake_name());
    }

    if options.contains("shared") {
        tc.set("BUILD_SHARED_LIBS", options.flag("shared"));
    }
    if options.contains("fPIC") {
        tc.set("CMAKE_POSITION_INDEPENDENT_CODE", options.flag("fPIC"));
    }
    tc
}
