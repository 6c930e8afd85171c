//! Expat XML parser, required by Poco XML.

use std::path::Path;

use kforge_common::error::Result;
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

/// expat 2.6.2.
#[derive(Debug)]
pub struct Expat {
    desc: PackageDescriptor,
}

impl Expat {
    /// Creates the recipe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            desc: PackageDescriptor::new("expat", Version::new(&[2, 6, 2]), BuildSystem::CMake)
                .description("Fast streaming XML parser written in C")
                .license("MIT")
                .homepage("https://github.com/libexpat/libexpat")
                .options(OptionSchema::new(vec![
                    OptionSpec::flag("shared", false),
                    OptionSpec::flag("fPIC", true),
                    OptionSpec::choice("char_type", &["char", "wchar_t", "ushort"], "char"),
                ])),
        }
    }

    /// Installed library name, following expat's own naming scheme.
    fn library_name(config: &ResolvedConfig) -> String {
        let settings = &config.settings;
        let wide = if config.options.choice("char_type") == Some("wchar_t") { "w" } else { "" };
        if settings.is_msvc() {
            let debug = if settings.build_type.is_debug() { "d" } else { "" };
            let runtime = if settings.is_msvc_static_runtime() { "MT" } else { "MD" };
            format!("libexpat{wide}{debug}{runtime}")
        } else {
            format!("expat{wide}")
        }
    }
}

impl Default for Expat {
    fn default() -> Self {
        Self::new()
    }
}

impl Recipe for Expat {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.desc
    }

    fn generate(&self, settings: &Settings, options: &OptionValues, toolchain: &mut Toolchain) {
        for knob in ["EXPAT_BUILD_DOCS", "EXPAT_BUILD_EXAMPLES", "EXPAT_BUILD_TESTS", "EXPAT_BUILD_TOOLS"] {
            toolchain.set(knob, false);
        }
        toolchain.set("EXPAT_SHARED_LIBS", options.flag("shared"));
        toolchain.set("EXPAT_CHAR_TYPE", options.choice("char_type").unwrap_or("char"));
        if settings.is_msvc() {
            toolchain.set("EXPAT_MSVC_STATIC_CRT", settings.is_msvc_static_runtime());
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
        plan.push(copy_license(&layout.source_dir, &layout.package_dir, "COPYING"));
        for leftover in ["lib/cmake", "lib/pkgconfig", "share"] {
            plan.push(Step::Remove {
                path: layout.package_dir.join(leftover),
            });
        }
        Ok(plan)
    }

    fn package_info(&self, config: &ResolvedConfig, package_dir: &Path) -> ConsumptionManifest {
        let mut component = Component::with_libs([Self::library_name(config)])
            .property("cmake_target_name", "expat::expat");
        if !config.is_shared() {
            component.defines.push("XML_STATIC".to_string());
        }
        match config.options.choice("char_type") {
            Some("wchar_t") => component
                .defines
                .extend(["XML_UNICODE".to_string(), "XML_UNICODE_WCHAR_T".to_string()]),
            Some("ushort") => component.defines.push("XML_UNICODE".to_string()),
            _ => {}
        }
        if config.settings.os == Os::Linux {
            component.system_libs.push("m".to_string());
        }

        let mut manifest = ConsumptionManifest::new(
            &config.package,
            config.version.to_string(),
            package_dir,
            manifest_architectures(&config.settings),
        );
        manifest.set_property("cmake_file_name", "expat");
        manifest.set_property("cmake_target_name", "expat::expat");
        manifest.set_property("pkg_config_name", "expat");
        manifest.add_component("expat", component);
        manifest
    }
}
