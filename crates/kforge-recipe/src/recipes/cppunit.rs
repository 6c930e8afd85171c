//! CppUnit, built with autotools under an MSYS2 bash on Windows.

use std::path::Path;

use kforge_common::error::Result;
use kforge_common::types::{stdcpp_library, Os, Settings};

use super::{copy_license, path_arg, source_steps};
use crate::descriptor::{BuildSystem, PackageDescriptor};
use crate::host::HostContext;
use crate::manifest::{Component, ConsumptionManifest, DependencyManifests};
use crate::options::{OptionSchema, OptionSpec};
use crate::plan::{BuildLayout, BuildPlan, Step, ToolInvocation};
use crate::recipe::{manifest_architectures, Recipe};
use crate::requirement::Requirement;
use crate::resolver::ResolvedConfig;
use crate::version::Version;

/// Host variable overriding the automake `compile` wrapper location.
pub const COMPILE_WRAPPER_ENV: &str = "AUTOMAKE_COMPILE_WRAPPER";
/// Host variable overriding the automake `ar-lib` wrapper location.
pub const AR_WRAPPER_ENV: &str = "AUTOMAKE_AR_WRAPPER";

const DEFAULT_COMPILE_WRAPPER: &str = "/usr/share/automake-1.16/compile";
const DEFAULT_AR_WRAPPER: &str = "/usr/share/automake-1.16/ar-lib";

/// cppunit 1.15.1.
#[derive(Debug)]
pub struct Cppunit {
    desc: PackageDescriptor,
}

impl Cppunit {
    /// Creates the recipe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            desc: PackageDescriptor::new("cppunit", Version::new(&[1, 15, 1]), BuildSystem::Autotools)
                .description("C++ port of the JUnit unit testing framework")
                .license("LGPL-2.1-or-later")
                .homepage("https://freedesktop.org/wiki/Software/cppunit/")
                .only_on(&[Os::Windows])
                .options(OptionSchema::new(vec![
                    OptionSpec::flag("shared", false),
                    OptionSpec::flag("fPIC", true),
                ])),
        }
    }

    fn configure_invocation(config: &ResolvedConfig, layout: &BuildLayout, host: &HostContext) -> ToolInvocation {
        let settings = &config.settings;
        let yes_no = |v: bool| if v { "yes" } else { "no" };
        let mut configure = ToolInvocation::new("bash")
            .arg(path_arg(&layout.source_dir.join("configure")))
            .arg(format!("--prefix={}", path_arg(&layout.package_dir)))
            .arg(format!("--enable-shared={}", yes_no(config.is_shared())))
            .arg(format!("--enable-static={}", yes_no(!config.is_shared())))
            .arg(format!("--enable-debug={}", yes_no(settings.build_type.is_debug())))
            .args(["--enable-doxygen=no", "--enable-dot=no", "--disable-werror", "--enable-html-docs=no"])
            .current_dir(&layout.build_dir);
        if settings.is_msvc() {
            let runtime = settings.msvc_runtime().map_or("MD", |r| r.flag());
            let compile = host.var(COMPILE_WRAPPER_ENV).unwrap_or(DEFAULT_COMPILE_WRAPPER);
            let ar = host.var(AR_WRAPPER_ENV).unwrap_or(DEFAULT_AR_WRAPPER);
            configure = configure
                .env("CFLAGS", format!("-{runtime} -FS"))
                .env("CXXFLAGS", format!("-{runtime} -EHsc -FS"))
                .env("CC", format!("{compile} cl -nologo"))
                .env("CXX", format!("{compile} cl -nologo"))
                .env("LD", "link -nologo")
                .env("AR", format!("{ar} \"lib -nologo\""))
                .env("NM", "dumpbin -symbols")
                .env("OBJDUMP", ":")
                .env("RANLIB", ":")
                .env("STRIP", ":");
        }
        configure
    }
}

impl Default for Cppunit {
    fn default() -> Self {
        Self::new()
    }
}

impl Recipe for Cppunit {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.desc
    }

    fn removed_options(&self, _settings: &Settings) -> Vec<&'static str> {
        vec!["fPIC"]
    }

    fn build_requirements(&self, config: &ResolvedConfig) -> Result<Vec<Requirement>> {
        if config.settings.is_msvc() {
            Ok(vec![Requirement::tool("automake/1.16.5")?])
        } else {
            Ok(Vec::new())
        }
    }

    fn build_plan(
        &self,
        config: &ResolvedConfig,
        layout: &BuildLayout,
        _deps: &DependencyManifests,
        host: &HostContext,
    ) -> Result<BuildPlan> {
        let mut plan = BuildPlan::default();
        for step in source_steps(&config.package, &config.version.to_string(), &layout.source_dir)? {
            plan.push(step);
        }
        plan.push(Step::ReplaceInFiles {
            root: layout.source_dir.clone(),
            file_name: "Makefile.in".to_string(),
            search: "SUBDIRS = src include examples doc".to_string(),
            replace: "SUBDIRS = src include".to_string(),
        });
        plan.run(Self::configure_invocation(config, layout, host));
        plan.push(Step::ReplaceInFiles {
            root: layout.build_dir.clone(),
            file_name: "Makefile".to_string(),
            search: "-Werror".to_string(),
            replace: String::new(),
        });
        plan.run(ToolInvocation::new("make").current_dir(&layout.build_dir));
        plan.run(
            ToolInvocation::new("make")
                .arg("install")
                .current_dir(&layout.build_dir),
        );
        plan.push(copy_license(&layout.source_dir, &layout.package_dir, "COPYING"));

        let lib = layout.package_dir.join("lib");
        let bin = layout.package_dir.join("bin");
        if config.settings.is_msvc() && config.is_shared() {
            plan.push(Step::Rename {
                from: lib.join("cppunit.dll.lib"),
                to: lib.join("cppunit.lib"),
                required: true,
            });
            plan.push(Step::Rename {
                from: bin.join(format!("cppunit-{}.dll", config.version)),
                to: bin.join("cppunit.dll"),
                required: false,
            });
        }
        plan.push(Step::Remove {
            path: lib.join("libcppunit.la"),
        });
        plan.push(Step::Remove {
            path: lib.join("pkgconfig"),
        });
        plan.push(Step::Remove {
            path: layout.package_dir.join("share"),
        });
        Ok(plan)
    }

    fn package_info(&self, config: &ResolvedConfig, package_dir: &Path) -> ConsumptionManifest {
        let settings = &config.settings;
        let mut component = Component::with_libs(["cppunit"]).property("pkg_config_name", "cppunit");
        if config.is_shared() {
            component.defines.push("CPPUNIT_DLL".to_string());
        } else if let Some(stdcpp) = stdcpp_library(settings) {
            component.system_libs.push(stdcpp.to_string());
        }

        let mut manifest = ConsumptionManifest::new(
            &config.package,
            config.version.to_string(),
            package_dir,
            manifest_architectures(settings),
        );
        manifest.set_property("pkg_config_name", "cppunit");
        manifest.add_component("cppunit", component);
        manifest
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use kforge_common::error::KforgeError;
    use kforge_common::types::{Arch, BuildType, Compiler, CompilerKind};

    use super::*;
    use crate::options::OptionValue;
    use crate::resolver::resolve;

    fn resolved(settings: &Settings, shared: bool) -> Result<ResolvedConfig> {
        let overrides = BTreeMap::from([("shared".to_string(), OptionValue::Bool(shared))]);
        resolve(&Cppunit::new(), settings, &overrides, &HostContext::new())
    }

    #[test]
    fn only_windows_is_supported() {
        let err = resolved(&Settings::new(Os::Linux, Arch::X86_64, BuildType::Release), false).unwrap_err();
        assert!(matches!(err, KforgeError::Configuration { .. }));
        assert!(err.to_string().contains("supported: Windows"), "got: {err}");
    }

    #[test]
    fn shared_msvc_plan_renames_import_library() {
        let config = resolved(&Settings::new(Os::Windows, Arch::X86_64, BuildType::Release), true)
            .expect("resolve");
        let layout = BuildLayout::under(Path::new("C:/w"), "cppunit", "1.15.1", "id");
        let host = HostContext::new().with_var(COMPILE_WRAPPER_ENV, "/opt/compile");
        let plan = Cppunit::new()
            .build_plan(&config, &layout, &DependencyManifests::new(), &host)
            .expect("plan");
        let configure = plan.invocations().next().expect("configure");
        assert!(configure.args.contains(&"--enable-debug=no".to_string()));
        assert_eq!(configure.env.get("CC").map(String::as_str), Some("/opt/compile cl -nologo"));
        assert!(plan.steps.iter().any(|s| matches!(
            s,
            Step::Rename { to, required: true, .. } if to.ends_with("cppunit.lib")
        )));
        assert!(plan.steps.iter().any(|s| matches!(
            s,
            Step::ReplaceInFiles { file_name, search, .. } if file_name == "Makefile" && search == "-Werror"
        )));
    }

    #[test]
    fn linkage_changes_manifest() {
        let settings = Settings::new(Os::Windows, Arch::X86_64, BuildType::Release)
            .with_compiler(Compiler::new(CompilerKind::Gcc, "13"));
        let shared = Cppunit::new().package_info(&resolved(&settings, true).expect("resolve"), Path::new("/p"));
        let fixed = Cppunit::new().package_info(&resolved(&settings, false).expect("resolve"), Path::new("/p"));
        assert!(shared.all_defines().contains("CPPUNIT_DLL"));
        assert!(fixed.all_defines().is_empty());
        assert!(fixed.all_system_libs().contains("stdc++"));
    }

    #[test]
    fn msvc_needs_automake() {
        let config = resolved(&Settings::new(Os::Windows, Arch::X86_64, BuildType::Debug), false)
            .expect("resolve");
        let tools = Cppunit::new().build_requirements(&config).expect("tools");
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "automake");
    }
}
