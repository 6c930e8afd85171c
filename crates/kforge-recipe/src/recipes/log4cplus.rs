//! log4cplus logging library.

use std::path::Path;

use kforge_common::error::Result;
use kforge_common::types::{stdcpp_library, Os, Settings};

use super::{cmake, copy_license};
use crate::descriptor::{BuildSystem, PackageDescriptor};
use crate::host::HostContext;
use crate::manifest::{Component, ConsumptionManifest, DependencyManifests};
use crate::options::{OptionSchema, OptionSpec, OptionValues};
use crate::plan::{BuildLayout, BuildPlan, Step};
use crate::recipe::{manifest_architectures, reject_shared_static_runtime, Recipe};
use crate::resolver::ResolvedConfig;
use crate::toolchain::Toolchain;
use crate::version::Version;

/// log4cplus 2.1.1.
#[derive(Debug)]
pub struct Log4cplus {
    desc: PackageDescriptor,
}

impl Log4cplus {
    /// Creates the recipe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            desc: PackageDescriptor::new("log4cplus", Version::new(&[2, 1, 1]), BuildSystem::CMake)
                .description("Simple to use C++ logging API modelled after Java log4j")
                .license("BSD-2-Clause AND Apache-2.0")
                .homepage("https://github.com/log4cplus/log4cplus")
                .options(OptionSchema::new(vec![
                    OptionSpec::flag("shared", false),
                    OptionSpec::flag("fPIC", true),
                    OptionSpec::flag("unicode", true),
                    OptionSpec::flag("thread_pool", true),
                ])),
        }
    }

    fn library_name(config: &ResolvedConfig) -> String {
        let unicode = if config.options.flag("unicode") { "U" } else { "" };
        let debug = if config.settings.os == Os::Windows && config.settings.build_type.is_debug() {
            "D"
        } else {
            ""
        };
        format!("log4cplus{unicode}{debug}")
    }
}

impl Default for Log4cplus {
    fn default() -> Self {
        Self::new()
    }
}

impl Recipe for Log4cplus {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.desc
    }

    fn validate(&self, settings: &Settings, options: &OptionValues, _host: &HostContext) -> Result<()> {
        reject_shared_static_runtime("log4cplus", settings, options)
    }

    fn generate(&self, settings: &Settings, options: &OptionValues, toolchain: &mut Toolchain) {
        toolchain.set("UNICODE", options.flag("unicode"));
        toolchain.set("LOG4CPLUS_ENABLE_THREAD_POOL", options.flag("thread_pool"));
        toolchain.set("LOG4CPLUS_BUILD_TESTING", false);
        toolchain.set("LOG4CPLUS_BUILD_LOGGINGSERVER", false);
        toolchain.set("WITH_UNIT_TESTS", false);
        toolchain.set("LOG4CPLUS_ENABLE_DECORATED_LIBRARY_NAME", true);
        if settings.os == Os::Windows {
            toolchain.use_ninja();
        }
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
        for leftover in ["lib/cmake", "lib/pkgconfig", "share"] {
            plan.push(Step::Remove {
                path: layout.package_dir.join(leftover),
            });
        }
        Ok(plan)
    }

    fn package_info(&self, config: &ResolvedConfig, package_dir: &Path) -> ConsumptionManifest {
        let settings = &config.settings;
        let mut component = Component::with_libs([Self::library_name(config)])
            .property("cmake_target_name", "log4cplus::log4cplus");
        if config.options.flag("unicode") {
            component.defines.extend(["UNICODE", "_UNICODE"].map(String::from));
        }
        match settings.os {
            Os::Linux => component.system_libs.extend(["dl", "m", "rt", "pthread"].map(String::from)),
            Os::Windows => component.system_libs.extend(["advapi32", "ws2_32"].map(String::from)),
            Os::Macos => {}
        }
        if !config.is_shared() {
            component.defines.push("LOG4CPLUS_STATIC".to_string());
            if let Some(stdcpp) = stdcpp_library(settings) {
                component.system_libs.push(stdcpp.to_string());
            }
        }

        let mut manifest = ConsumptionManifest::new(
            &config.package,
            config.version.to_string(),
            package_dir,
            manifest_architectures(settings),
        );
        manifest.set_property("cmake_file_name", "log4cplus");
        manifest.set_property("cmake_target_name", "log4cplus::log4cplus");
        manifest.set_property("pkg_config_name", "log4cplus");
        manifest.add_component("log4cplus", component);
        manifest
    }
}
