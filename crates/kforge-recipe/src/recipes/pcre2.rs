//! PCRE2 regular expression library, pulled in by Poco Foundation.

use std::path::Path;

use kforge_common::error::{KforgeError, Result};
use kforge_common::types::{Os, Settings};

use super::{cmake, copy_license};
use crate::descriptor::{BuildSystem, PackageDescriptor};
use crate::host::HostContext;
use crate::manifest::{Component, ConsumptionManifest, DependencyManifests};
use crate::options::{OptionSchema, OptionSpec, OptionValues};
use crate::plan::{BuildLayout, BuildPlan, Step};
use crate::recipe::{manifest_architectures, Recipe};
use crate::resolver::ResolvedConfig;
use crate::toolchain::Toolchain;
use crate::version::Version;

const WIDTHS: [(&str, &str); 3] = [("build_pcre2_8", "8"), ("build_pcre2_16", "16"), ("build_pcre2_32", "32")];

/// pcre2 10.42.
#[derive(Debug)]
pub struct Pcre2 {
    desc: PackageDescriptor,
}

impl Pcre2 {
    /// Creates the recipe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            desc: PackageDescriptor::new("pcre2", Version::new(&[10, 42]), BuildSystem::CMake)
                .description("Perl Compatible Regular Expressions")
                .license("BSD-3-Clause")
                .homepage("https://www.pcre.org/")
                .options(OptionSchema::new(vec![
                    OptionSpec::flag("shared", false),
                    OptionSpec::flag("fPIC", true),
                    OptionSpec::flag("build_pcre2_8", true),
                    OptionSpec::flag("build_pcre2_16", true),
                    OptionSpec::flag("build_pcre2_32", true),
                    OptionSpec::flag("support_jit", false),
                ])),
        }
    }

    fn library_name(config: &ResolvedConfig, width: &str) -> String {
        let settings = &config.settings;
        let debug = settings.os == Os::Windows && settings.build_type.is_debug();
        let static_suffix = if settings.is_msvc() && !config.is_shared() { "-static" } else { "" };
        format!("pcre2-{width}{static_suffix}{}", if debug { "d" } else { "" })
    }
}

impl Default for Pcre2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Recipe for Pcre2 {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.desc
    }

    fn validate(&self, _settings: &Settings, options: &OptionValues, _host: &HostContext) -> Result<()> {
        if WIDTHS.iter().all(|(option, _)| !options.flag(option)) {
            return Err(KforgeError::configuration(
                "pcre2: at least one of build_pcre2_8, build_pcre2_16 or build_pcre2_32 must be enabled",
            ));
        }
        Ok(())
    }

    fn generate(&self, settings: &Settings, options: &OptionValues, toolchain: &mut Toolchain) {
        for (option, width) in WIDTHS {
            toolchain.set(format!("PCRE2_BUILD_PCRE2_{width}"), options.flag(option));
        }
        toolchain.set("PCRE2_SUPPORT_JIT", options.flag("support_jit"));
        toolchain.set("PCRE2_BUILD_TESTS", false);
        toolchain.set("PCRE2_BUILD_PCRE2GREP", false);
        toolchain.set("PCRE2_SUPPORT_LIBBZ2", false);
        toolchain.set("PCRE2_SUPPORT_LIBZ", false);
        if settings.is_msvc() {
            toolchain.set("PCRE2_STATIC_RUNTIME", settings.is_msvc_static_runtime());
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
        plan.push(copy_license(&layout.source_dir, &layout.package_dir, "LICENCE"));
        for leftover in ["cmake", "lib/cmake", "lib/pkgconfig", "share", "man"] {
            plan.push(Step::Remove {
                path: layout.package_dir.join(leftover),
            });
        }
        Ok(plan)
    }

    fn package_info(&self, config: &ResolvedConfig, package_dir: &Path) -> ConsumptionManifest {
        let mut manifest = ConsumptionManifest::new(
            &config.package,
            config.version.to_string(),
            package_dir,
            manifest_architectures(&config.settings),
        );
        manifest.set_property("cmake_file_name", "PCRE2");
        manifest.set_property("pkg_config_name", "libpcre2");
        for (option, width) in WIDTHS {
            if !config.options.flag(option) {
                continue;
            }
            let mut component = Component::with_libs([Self::library_name(config, width)])
                .property("cmake_target_name", format!("PCRE2::{width}BIT"))
                .property("pkg_config_name", format!("libpcre2-{width}"));
            if !config.is_shared() {
                component.defines.push("PCRE2_STATIC".to_string());
            }
            manifest.add_component(format!("pcre2-{width}"), component);
        }
        manifest
    }
}
