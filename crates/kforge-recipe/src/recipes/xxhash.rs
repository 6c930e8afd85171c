//! xxHash: extremely fast non-cryptographic hash.
//!
//! Release is forced outside Windows and the build type does not take part
//! in the package id; on Windows the MSVC runtime variant still separates
//! Debug from Release binaries. Windows builds go through Ninja.

use std::path::Path;

use kforge_common::error::Result;
use kforge_common::types::{BuildType, Os, Settings};

use super::{cmake, copy_license};
use crate::descriptor::{BuildSystem, PackageDescriptor, SettingAxis};
use crate::host::HostContext;
use crate::manifest::{Component, ConsumptionManifest, DependencyManifests};
use crate::options::{OptionSchema, OptionSpec, OptionValues};
use crate::plan::{BuildLayout, BuildPlan, Step};
use crate::recipe::{manifest_architectures, Recipe};
use crate::resolver::ResolvedConfig;
use crate::toolchain::Toolchain;
use crate::version::Version;

const MACOS_DEPLOYMENT_TARGET: &str = "11.0";

/// xxhash 0.8.2.
#[derive(Debug)]
pub struct XxHash {
    desc: PackageDescriptor,
}

impl XxHash {
    /// Creates the recipe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            desc: PackageDescriptor::new("xxhash", Version::new(&[0, 8, 2]), BuildSystem::CMake)
                .description("Extremely fast non-cryptographic hash algorithm")
                .license("BSD-2-Clause")
                .homepage("https://github.com/Cyan4973/xxHash")
                .options(OptionSchema::new(vec![
                    OptionSpec::flag("shared", true),
                    OptionSpec::flag("fPIC", false),
                    OptionSpec::flag("utility", true),
                ])),
        }
    }
}

impl Default for XxHash {
    fn default() -> Self {
        Self::new()
    }
}

impl Recipe for XxHash {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.desc
    }

    fn configure(
        &self,
        settings: &Settings,
        options: &mut OptionValues,
        _host: &HostContext,
    ) -> Result<Settings> {
        if options.flag("shared") {
            options.remove("fPIC");
        }
        let mut settings = settings.clone();
        if settings.os == Os::Macos && settings.os_version.is_none() {
            settings = settings.with_os_version(MACOS_DEPLOYMENT_TARGET);
        }
        if settings.os != Os::Windows && settings.build_type != BuildType::Release {
            tracing::warn!(
                package = "xxhash",
                requested = %settings.build_type,
                "forcing Release build type"
            );
            settings = settings.with_build_type(BuildType::Release);
        }
        Ok(settings)
    }

    fn generate(&self, settings: &Settings, _options: &OptionValues, toolchain: &mut Toolchain) {
        toolchain.set("CMAKE_MACOSX_BUNDLE", false);
        toolchain.set("CMAKE_POLICY_VERSION_MINIMUM", "3.5");
        toolchain.set("XXHASH_BUILD_XXHSUM", false);
        toolchain.set("CMAKE_MACOSX_RPATH", true);
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
        let mut plan = cmake::standard_plan(config, layout, deps, Some("cmake_unofficial"))?;
        plan.push(copy_license(&layout.source_dir, &layout.package_dir, "LICENSE"));
        for leftover in ["lib/cmake", "lib/pkgconfig", "share"] {
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
        manifest.set_property("cmake_file_name", "xxHash");
        manifest.set_property("cmake_target_name", "xxHash::xxhash");
        manifest.set_property("pkg_config_name", "libxxhash");
        let mut component = Component::with_libs(["xxhash"])
            .property("cmake_target_name", "xxHash::xxhash")
            .property("pkg_config_name", "libxxhash");
        // The DLL exports with XXH_EXPORT; consumers import.
        if config.is_shared() && config.settings.os == Os::Windows {
            component.defines.push("XXH_IMPORT".to_string());
        }
        manifest.add_component("libxxhash", component);
        manifest
    }

    fn package_id_exclusions(&self, _settings: &Settings) -> Vec<SettingAxis> {
        vec![SettingAxis::BuildType]
    }
}
