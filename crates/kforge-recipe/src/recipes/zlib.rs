//! zlib compression library.

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

/// zlib 1.3.1.
#[derive(Debug)]
pub struct Zlib {
    desc: PackageDescriptor,
}

impl Zlib {
    /// Creates the recipe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            desc: PackageDescriptor::new("zlib", Version::new(&[1, 3, 1]), BuildSystem::CMake)
                .description("A Massively Spiffy Yet Delicately Unobtrusive Compression Library")
                .license("Zlib")
                .homepage("https://zlib.net")
                .options(OptionSchema::new(vec![
                    OptionSpec::flag("shared", false),
                    OptionSpec::flag("fPIC", true),
                ])),
        }
    }
}

impl Default for Zlib {
    fn default() -> Self {
        Self::new()
    }
}

impl Recipe for Zlib {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.desc
    }

    fn generate(&self, _settings: &Settings, _options: &OptionValues, toolchain: &mut Toolchain) {
        toolchain.set("SKIP_INSTALL_ALL", false);
        toolchain.set("SKIP_INSTALL_LIBRARIES", false);
        toolchain.set("SKIP_INSTALL_HEADERS", false);
        toolchain.set("SKIP_INSTALL_FILES", true);
        toolchain.set("ZLIB_BUILD_EXAMPLES", false);
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
        // The upstream install always ships the static archive next to the shared one.
        if config.is_shared() && config.settings.os != Os::Windows {
            plan.push(Step::Remove {
                path: layout.package_dir.join("lib").join("libz.a"),
            });
        }
        plan.push(Step::Remove {
            path: layout.package_dir.join("share"),
        });
        Ok(plan)
    }

    fn package_info(&self, config: &ResolvedConfig, package_dir: &Path) -> ConsumptionManifest {
        let settings = &config.settings;
        let lib = if settings.is_msvc() {
            if config.is_shared() { "zlib" } else { "zlibstatic" }
        } else {
            "z"
        };
        let mut component = Component::with_libs([lib])
            .property("cmake_target_name", "ZLIB::ZLIB")
            .property("pkg_config_name", "zlib");
        if config.is_shared() && settings.os == Os::Windows {
            component.defines.push("ZLIB_DLL".to_string());
        }

        let mut manifest = ConsumptionManifest::new(
            &config.package,
            config.version.to_string(),
            package_dir,
            manifest_architectures(settings),
        );
        manifest.set_property("cmake_file_name", "ZLIB");
        manifest.set_property("cmake_target_name", "ZLIB::ZLIB");
        manifest.set_property("cmake_find_mode", "both");
        manifest.add_component("zlib", component);
        manifest
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use kforge_common::types::{Arch, BuildType};

    use super::*;
    use crate::options::OptionValue;
    use crate::resolver::resolve;

    fn resolved(settings: &Settings, shared: bool) -> ResolvedConfig {
        let overrides = BTreeMap::from([("shared".to_string(), OptionValue::Bool(shared))]);
        resolve(&Zlib::new(), settings, &overrides, &HostContext::new()).expect("resolve")
    }

    #[test]
    fn msvc_library_name_depends_on_linkage() {
        let settings = Settings::new(Os::Windows, Arch::X86_64, BuildType::Release);
        let shared = Zlib::new().package_info(&resolved(&settings, true), Path::new("/p"));
        let fixed = Zlib::new().package_info(&resolved(&settings, false), Path::new("/p"));
        assert_eq!(shared.components["zlib"].libs, vec!["zlib"]);
        assert!(shared.all_defines().contains("ZLIB_DLL"));
        assert_eq!(fixed.components["zlib"].libs, vec!["zlibstatic"]);
        assert!(fixed.all_defines().is_empty());
    }

    #[test]
    fn unix_library_is_z() {
        let settings = Settings::new(Os::Linux, Arch::X86_64, BuildType::Release);
        let manifest = Zlib::new().package_info(&resolved(&settings, false), Path::new("/p"));
        assert_eq!(manifest.components["zlib"].libs, vec!["z"]);
        manifest.validate().expect("valid manifest");
    }

    #[test]
    fn shared_unix_build_drops_static_archive() {
        let settings = Settings::new(Os::Linux, Arch::X86_64, BuildType::Release);
        let layout = BuildLayout::under(Path::new("/w"), "zlib", "1.3.1", "id");
        let plan = Zlib::new()
            .build_plan(&resolved(&settings, true), &layout, &DependencyManifests::new(), &HostContext::new())
            .expect("plan");
        assert!(plan.steps.contains(&Step::Remove {
            path: layout.package_dir.join("lib").join("libz.a"),
        }));
    }
}
