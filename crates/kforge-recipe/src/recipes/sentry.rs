//! Sentry native SDK.
//!
//! The crash backend and the upload transport are both options. The
//! transport defaults to WinHTTP on Windows and curl elsewhere; crashpad
//! ships its own handler executable next to the library.

use std::collections::BTreeMap;
use std::path::Path;

use kforge_common::error::{KforgeError, Result};
use kforge_common::types::{stdcpp_library, Os, Settings};

use super::{cmake, copy_license};
use crate::descriptor::{BuildSystem, PackageDescriptor};
use crate::host::HostContext;
use crate::manifest::{Component, ConsumptionManifest, DependencyManifests};
use crate::options::{OptionSchema, OptionSpec, OptionValue, OptionValues};
use crate::plan::{BuildLayout, BuildPlan, ExpectedArtifact, Step};
use crate::recipe::{manifest_architectures, reject_shared_static_runtime, Recipe};
use crate::requirement::Requirement;
use crate::resolver::ResolvedConfig;
use crate::toolchain::Toolchain;
use crate::version::Version;

/// sentry 0.7.17.
#[derive(Debug)]
pub struct Sentry {
    desc: PackageDescriptor,
}

impl Sentry {
    /// Creates the recipe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            desc: PackageDescriptor::new("sentry", Version::new(&[0, 7, 17]), BuildSystem::CMake)
                .description("The Sentry Native SDK for C/C++ applications")
                .license("MIT")
                .homepage("https://github.com/getsentry/sentry-native")
                .options(OptionSchema::new(vec![
                    OptionSpec::flag("shared", false),
                    OptionSpec::flag("fPIC", true),
                    OptionSpec::choice("backend", &["crashpad", "breakpad", "inproc", "none"], "crashpad"),
                    OptionSpec::choice("transport", &["curl", "winhttp", "none"], "curl"),
                    OptionSpec::flag("performance", false),
                ])),
        }
    }

    fn backend(options: &OptionValues) -> &str {
        options.choice("backend").unwrap_or("none")
    }

    fn transport(options: &OptionValues) -> &str {
        options.choice("transport").unwrap_or("none")
    }

    fn handler_name(settings: &Settings) -> &'static str {
        if settings.os == Os::Windows {
            "crashpad_handler.exe"
        } else {
            "crashpad_handler"
        }
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Self::new()
    }
}

impl Recipe for Sentry {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.desc
    }

    fn platform_defaults(&self, settings: &Settings) -> BTreeMap<String, OptionValue> {
        if settings.os == Os::Windows {
            BTreeMap::from([("transport".to_string(), OptionValue::from("winhttp"))])
        } else {
            BTreeMap::new()
        }
    }

    fn validate(&self, settings: &Settings, options: &OptionValues, _host: &HostContext) -> Result<()> {
        reject_shared_static_runtime("sentry", settings, options)?;
        if Self::transport(options) == "winhttp" && settings.os != Os::Windows {
            return Err(KforgeError::configuration(format!(
                "sentry: transport=winhttp is only available on Windows, not {}",
                settings.os
            )));
        }
        if Self::backend(options) == "breakpad" && settings.os == Os::Windows && settings.is_mingw() {
            return Err(KforgeError::configuration(
                "sentry: the breakpad backend does not build with MinGW",
            ));
        }
        Ok(())
    }

    fn generate(&self, settings: &Settings, options: &OptionValues, toolchain: &mut Toolchain) {
        toolchain.set("SENTRY_BACKEND", Self::backend(options));
        toolchain.set("SENTRY_TRANSPORT", Self::transport(options));
        toolchain.set("SENTRY_BUILD_SHARED_LIBS", options.flag("shared"));
        toolchain.set("SENTRY_PERFORMANCE_MONITORING", options.flag("performance"));
        toolchain.set("SENTRY_BUILD_TESTS", false);
        toolchain.set("SENTRY_BUILD_EXAMPLES", false);
        if Self::backend(options) == "crashpad" {
            toolchain.set("CRASHPAD_ZLIB_SYSTEM", true);
        }
        if settings.is_msvc() {
            toolchain.set("SENTRY_BUILD_RUNTIMESTATIC", settings.is_msvc_static_runtime());
        }
        if settings.os == Os::Windows {
            toolchain.use_ninja();
        }
    }

    fn requirements(&self, config: &ResolvedConfig) -> Result<Vec<Requirement>> {
        let mut reqs = Vec::new();
        if Self::transport(&config.options) == "curl" {
            reqs.push(Requirement::host("openssl/[>=3 <4]")?);
        }
        if Self::backend(&config.options) == "crashpad" {
            reqs.push(Requirement::host("zlib/[>=1.2.11 <2]")?);
        }
        Ok(reqs)
    }

    fn required_programs(&self, config: &ResolvedConfig) -> Vec<&'static str> {
        let mut programs = vec!["cmake", "git"];
        if config.generator.is_some() {
            programs.push("ninja");
        }
        programs
    }

    fn build_plan(
        &self,
        config: &ResolvedConfig,
        layout: &BuildLayout,
        deps: &DependencyManifests,
        _host: &HostContext,
    ) -> Result<BuildPlan> {
        let mut plan = cmake::standard_plan(config, layout, deps, None)?;
        plan.push(copy_license(&layout.source_dir, &layout.package_dir, "LICENSE"));
        for leftover in ["lib/cmake", "lib/pkgconfig"] {
            plan.push(Step::Remove {
                path: layout.package_dir.join(leftover),
            });
        }
        Ok(plan)
    }

    fn expected_artifacts(&self, config: &ResolvedConfig, layout: &BuildLayout) -> Vec<ExpectedArtifact> {
        let mut artifacts = vec![
            ExpectedArtifact::file("sentry header", layout.package_dir.join("include/sentry.h")),
            ExpectedArtifact::dir("library directory", layout.package_dir.join("lib")),
        ];
        if Self::backend(&config.options) == "crashpad" {
            artifacts.push(ExpectedArtifact::file(
                "crashpad handler",
                layout.package_dir.join("bin").join(Self::handler_name(&config.settings)),
            ));
        }
        artifacts
    }

    fn package_info(&self, config: &ResolvedConfig, package_dir: &Path) -> ConsumptionManifest {
        let settings = &config.settings;
        let options = &config.options;
        let backend = Self::backend(options);

        let mut sentry = Component::with_libs(["sentry"])
            .property("cmake_target_name", "sentry::sentry");
        match settings.os {
            Os::Linux => sentry.system_libs.extend(["pthread", "dl"].map(String::from)),
            Os::Windows => {
                sentry
                    .system_libs
                    .extend(["dbghelp", "shlwapi", "version"].map(String::from));
                if Self::transport(options) == "winhttp" {
                    sentry.system_libs.push("winhttp".to_string());
                }
            }
            Os::Macos => sentry.frameworks.push("CoreFoundation".to_string()),
        }
        if Self::transport(options) == "curl" {
            sentry = sentry.requires("openssl::ssl");
        }
        if !config.is_shared() {
            sentry.defines.push("SENTRY_BUILD_STATIC".to_string());
            if matches!(backend, "crashpad" | "breakpad") {
                if let Some(stdcpp) = stdcpp_library(settings) {
                    sentry.system_libs.push(stdcpp.to_string());
                }
            }
        }

        let mut manifest = ConsumptionManifest::new(
            &config.package,
            config.version.to_string(),
            package_dir,
            manifest_architectures(settings),
        );
        manifest.set_property("cmake_file_name", "sentry");
        manifest.set_property("cmake_target_name", "sentry::sentry");

        if backend == "crashpad" {
            let mut util = Component::with_libs(["crashpad_util"])
                .requires("crashpad_mini_chromium")
                .requires("zlib::zlib");
            if settings.os == Os::Macos {
                util.frameworks
                    .extend(["CoreFoundation", "Foundation", "IOKit", "Security"].map(String::from));
                util.system_libs.push("bsm".to_string());
            }
            manifest.add_component("crashpad_mini_chromium", Component::with_libs(["mini_chromium"]));
            manifest.add_component("crashpad_util", util);
            manifest.add_component(
                "crashpad_client",
                Component::with_libs(["crashpad_client"]).requires("crashpad_util"),
            );
            sentry = sentry.requires("crashpad_client");
        } else if backend == "breakpad" {
            manifest.add_component("breakpad_client", Component::with_libs(["breakpad_client"]));
            sentry = sentry.requires("breakpad_client");
        }
        manifest.add_component("sentry", sentry);
        manifest
    }
}
