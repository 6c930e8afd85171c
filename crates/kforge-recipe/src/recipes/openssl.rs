//! OpenSSL, built through its own `Configure` script.
//!
//! On macOS the library is always shared and Release, built once per
//! architecture and merged into universal dylibs by `openssl_build.sh`.
//! Elsewhere a single `perl Configure` run drives `make`/`nmake`.

use std::path::{Path, PathBuf};

use kforge_common::error::{KforgeError, Result};
use kforge_common::types::{Arch, BuildType, Os, Settings};

use super::{copy_license, path_arg, source_steps};
use crate::descriptor::{BuildSystem, PackageDescriptor, SettingAxis};
use crate::host::HostContext;
use crate::manifest::{Component, ConsumptionManifest, DependencyManifests};
use crate::options::{OptionSchema, OptionSpec, OptionValues};
use crate::plan::{BuildLayout, BuildPlan, ExpectedArtifact, Step, ToolInvocation};
use crate::recipe::{manifest_architectures, Recipe};
use crate::requirement::Requirement;
use crate::resolver::ResolvedConfig;
use crate::version::Version;

/// CMake module exported to consumers, relative to the package folder.
pub const CMAKE_MODULE: &str = "lib/cmake/conan-official-openssl-variables.cmake";

const BUILD_SCRIPT: &str = include_str!("openssl_build.sh");

/// openssl 3.2.4.
#[derive(Debug)]
pub struct Openssl {
    desc: PackageDescriptor,
}

impl Openssl {
    /// Creates the recipe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            desc: PackageDescriptor::new("openssl", Version::new(&[3, 2, 4]), BuildSystem::Script)
                .description("TLS/SSL and crypto library")
                .license("Apache-2.0")
                .homepage("https://github.com/openssl/openssl")
                .options(OptionSchema::new(vec![
                    OptionSpec::flag("shared", true),
                    OptionSpec::flag("fPIC", true),
                ])),
        }
    }

    fn zlib_dirs(deps: &DependencyManifests) -> Result<(PathBuf, PathBuf)> {
        let zlib = deps
            .get("zlib")
            .ok_or_else(|| KforgeError::configuration("openssl: zlib must be built before OpenSSL"))?;
        let has_libs = zlib.components.values().any(|c| !c.libs.is_empty());
        let component = zlib.components.values().next();
        match component {
            Some(c) if has_libs => {
                let include = c.include_dirs.first().map_or("include", String::as_str);
                let lib = c.lib_dirs.first().map_or("lib", String::as_str);
                Ok((zlib.package_folder.join(include), zlib.package_folder.join(lib)))
            }
            _ => Err(KforgeError::configuration(
                "openssl: zlib is required, but no libraries were found in the zlib package",
            )),
        }
    }

    fn macos_plan(
        config: &ResolvedConfig,
        layout: &BuildLayout,
        deps: &DependencyManifests,
        plan: &mut BuildPlan,
    ) -> Result<()> {
        let (zlib_include, zlib_lib) = Self::zlib_dirs(deps)?;
        let script = layout.build_dir.join("openssl_build.sh");
        plan.push(Step::WriteFile {
            path: script.clone(),
            contents: BUILD_SCRIPT.to_string(),
        });
        plan.run(
            ToolInvocation::new("bash")
                .arg(path_arg(&script))
                .args(["--version".to_string(), config.version.to_string()])
                .args(["--source-folder".to_string(), path_arg(&layout.source_dir)])
                .args(["--build-folder".to_string(), path_arg(&layout.build_dir)])
                .args(["--zlib-include".to_string(), path_arg(&zlib_include)])
                .args(["--zlib-lib".to_string(), path_arg(&zlib_lib)])
                .args(["--conan-arch", config.settings.arch.as_str()]),
        );

        let multi = layout.build_dir.join("openssl.multi");
        let first_slice = config.settings.arch.apple_names().first().copied().unwrap_or("x86_64");
        plan.push(Step::Copy {
            from: multi.join("include"),
            to: layout.package_dir.join("include"),
            pattern: "*.h".to_string(),
        });
        plan.push(Step::Copy {
            from: multi.join("lib"),
            to: layout.package_dir.join("lib"),
            pattern: "*.dylib".to_string(),
        });
        plan.push(Step::Copy {
            from: layout.build_dir.join(format!("openssl.{first_slice}")),
            to: layout.package_dir.clone(),
            pattern: "*.pc".to_string(),
        });
        for lib in ["libssl.3.dylib", "libcrypto.3.dylib"] {
            plan.run(
                ToolInvocation::new("install_name_tool")
                    .arg("-id")
                    .arg(format!("@rpath/{lib}"))
                    .arg(path_arg(&layout.package_dir.join("lib").join(lib))),
            );
        }
        Ok(())
    }

    fn configure_target(settings: &Settings) -> &'static str {
        match (settings.os, settings.arch) {
            (Os::Windows, Arch::X86) => "VC-WIN32",
            (Os::Windows, Arch::Armv8) => "VC-WIN64-ARM",
            (Os::Windows, _) if settings.is_mingw() => "mingw64",
            (Os::Windows, _) => "VC-WIN64A",
            (_, Arch::Armv8) => "linux-aarch64",
            (_, Arch::X86) => "linux-x86",
            _ => "linux-x86_64",
        }
    }

    fn configure_plan(
        config: &ResolvedConfig,
        layout: &BuildLayout,
        deps: &DependencyManifests,
        plan: &mut BuildPlan,
    ) -> Result<()> {
        let (zlib_include, zlib_lib) = Self::zlib_dirs(deps)?;
        let settings = &config.settings;
        let mut configure = ToolInvocation::new("perl")
            .arg("Configure")
            .arg(Self::configure_target(settings))
            .arg(if config.is_shared() { "shared" } else { "no-shared" })
            .arg("zlib")
            .arg(format!("--with-zlib-include={}", path_arg(&zlib_include)))
            .arg(format!("--with-zlib-lib={}", path_arg(&zlib_lib)))
            .arg(format!("--prefix={}", path_arg(&layout.package_dir)))
            .arg(format!("--openssldir={}", path_arg(&layout.package_dir.join("ssl"))))
            .arg("--libdir=lib")
            .arg("no-tests")
            .current_dir(&layout.source_dir);
        if settings.build_type.is_debug() {
            configure = configure.arg("--debug");
        }
        if config.options.flag("fPIC") {
            configure = configure.arg("-fPIC");
        }
        plan.run(configure);

        let make = if settings.is_msvc() { "nmake" } else { "make" };
        plan.run(ToolInvocation::new(make).current_dir(&layout.source_dir));
        plan.run(
            ToolInvocation::new(make)
                .arg("install_sw")
                .current_dir(&layout.source_dir),
        );
        Ok(())
    }

    fn library_names(config: &ResolvedConfig) -> (&'static str, &'static str) {
        let settings = &config.settings;
        if settings.is_msvc() {
            ("libssl", "libcrypto")
        } else if settings.os == Os::Macos && config.is_shared() {
            ("ssl.3", "crypto.3")
        } else {
            ("ssl", "crypto")
        }
    }
}

impl Default for Openssl {
    fn default() -> Self {
        Self::new()
    }
}

/// Content of the CMake module mapping the generated `OpenSSL_*` variables
/// onto the names `FindOpenSSL` consumers expect.
#[must_use]
pub fn cmake_module_variables(build_type: BuildType) -> String {
    let config = build_type.as_str().to_ascii_uppercase();
    let mut out = String::from("set(OPENSSL_FOUND TRUE)\n");
    out.push_str("if(DEFINED OpenSSL_INCLUDE_DIR)\n    set(OPENSSL_INCLUDE_DIR ${OpenSSL_INCLUDE_DIR})\nendif()\n");
    for (component, upper) in [("Crypto", "CRYPTO"), ("SSL", "SSL")] {
        let pad = " ".repeat(format!("    set(OPENSSL_{upper}_LIBRARIES ").len());
        out.push_str(&format!(
            "if(DEFINED OpenSSL_{component}_LIBS)\n\
             \x20   set(OPENSSL_{upper}_LIBRARY ${{OpenSSL_{component}_LIBS}})\n\
             \x20   set(OPENSSL_{upper}_LIBRARIES ${{OpenSSL_{component}_LIBS}}\n\
             {pad}${{OpenSSL_{component}_DEPENDENCIES}}\n\
             {pad}${{OpenSSL_{component}_FRAMEWORKS}}\n\
             {pad}${{OpenSSL_{component}_SYSTEM_LIBS}})\n\
             elseif(DEFINED openssl_OpenSSL_{component}_LIBS_{config})\n\
             \x20   set(OPENSSL_{upper}_LIBRARY ${{openssl_OpenSSL_{component}_LIBS_{config}}})\n\
             \x20   set(OPENSSL_{upper}_LIBRARIES ${{openssl_OpenSSL_{component}_LIBS_{config}}}\n\
             {pad}${{openssl_OpenSSL_{component}_DEPENDENCIES_{config}}}\n\
             {pad}${{openssl_OpenSSL_{component}_FRAMEWORKS_{config}}}\n\
             {pad}${{openssl_OpenSSL_{component}_SYSTEM_LIBS_{config}}})\n\
             endif()\n"
        ));
    }
    out.push_str("if(DEFINED OpenSSL_LIBRARIES)\n    set(OPENSSL_LIBRARIES ${OpenSSL_LIBRARIES})\nendif()\n");
    out.push_str("if(DEFINED OpenSSL_VERSION)\n    set(OPENSSL_VERSION ${OpenSSL_VERSION})\nendif()\n");
    out
}

impl Recipe for Openssl {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.desc
    }

    fn configure(
        &self,
        settings: &Settings,
        options: &mut OptionValues,
        _host: &HostContext,
    ) -> Result<Settings> {
        let mut settings = settings.clone();
        if settings.os == Os::Macos {
            if !options.flag("shared") {
                tracing::warn!(
                    package = "openssl",
                    "only shared libraries are supported on Apple platforms, forcing shared=True"
                );
                options.set("shared", true);
            }
            if settings.build_type != BuildType::Release {
                tracing::warn!(
                    package = "openssl",
                    requested = %settings.build_type,
                    "building in Release regardless of the profile build type"
                );
                settings = settings.with_build_type(BuildType::Release);
            }
        }
        if options.flag("shared") {
            options.remove("fPIC");
        }
        Ok(settings)
    }

    fn requirements(&self, _config: &ResolvedConfig) -> Result<Vec<Requirement>> {
        Ok(vec![
            Requirement::host("zlib/[>=1.2.11 <2]")?
                .transitive_headers()
                .with_option("shared", false),
        ])
    }

    fn required_programs(&self, config: &ResolvedConfig) -> Vec<&'static str> {
        let settings = &config.settings;
        match settings.os {
            Os::Macos => vec!["bash", "lipo", "install_name_tool"],
            Os::Windows if settings.is_msvc() => vec!["perl", "nmake"],
            _ => vec!["perl", "make"],
        }
    }

    fn build_plan(
        &self,
        config: &ResolvedConfig,
        layout: &BuildLayout,
        deps: &DependencyManifests,
        _host: &HostContext,
    ) -> Result<BuildPlan> {
        let mut plan = BuildPlan::default();
        for step in source_steps(&config.package, &config.version.to_string(), &layout.source_dir)? {
            plan.push(step);
        }
        if config.settings.os == Os::Macos {
            Self::macos_plan(config, layout, deps, &mut plan)?;
        } else {
            Self::configure_plan(config, layout, deps, &mut plan)?;
        }
        plan.push(Step::WriteFile {
            path: layout.package_dir.join(CMAKE_MODULE),
            contents: cmake_module_variables(config.settings.build_type),
        });
        plan.push(copy_license(&layout.source_dir, &layout.package_dir, "LICENSE.txt"));
        Ok(plan)
    }

    fn expected_artifacts(&self, config: &ResolvedConfig, layout: &BuildLayout) -> Vec<ExpectedArtifact> {
        let mut artifacts = vec![
            ExpectedArtifact::dir("include directory", layout.package_dir.join("include/openssl")),
            ExpectedArtifact::dir("library directory", layout.package_dir.join("lib")),
            ExpectedArtifact::file("CMake variables module", layout.package_dir.join(CMAKE_MODULE)),
        ];
        if config.settings.os == Os::Macos {
            artifacts.push(ExpectedArtifact::file(
                "universal ssl library",
                layout.package_dir.join("lib/libssl.3.dylib"),
            ));
        }
        artifacts
    }

    fn package_info(&self, config: &ResolvedConfig, package_dir: &Path) -> ConsumptionManifest {
        let settings = &config.settings;
        let (ssl, crypto) = Self::library_names(config);

        let mut crypto = Component::with_libs([crypto])
            .requires("zlib::zlib")
            .property("cmake_target_name", "OpenSSL::Crypto")
            .property("pkg_config_name", "libcrypto");
        match settings.os {
            Os::Linux => crypto
                .system_libs
                .extend(["dl", "pthread", "rt"].map(String::from)),
            Os::Windows => crypto
                .system_libs
                .extend(["crypt32", "ws2_32", "advapi32", "user32", "bcrypt"].map(String::from)),
            Os::Macos => {}
        }
        let ssl = Component::with_libs([ssl])
            .requires("crypto")
            .property("cmake_target_name", "OpenSSL::SSL")
            .property("pkg_config_name", "libssl");

        let mut manifest = ConsumptionManifest::new(
            &config.package,
            config.version.to_string(),
            package_dir,
            manifest_architectures(settings),
        );
        manifest.set_property("cmake_target_name", "openssl::openssl");
        manifest.set_property("cmake_file_name", "OpenSSL");
        manifest.set_property("cmake_find_mode", "both");
        manifest.set_property("pkg_config_name", "openssl");
        manifest.add_component("crypto", crypto);
        manifest.add_component("ssl", ssl);
        manifest.build_modules.push(CMAKE_MODULE.to_string());
        manifest
    }

    fn package_id_exclusions(&self, settings: &Settings) -> Vec<SettingAxis> {
        if settings.os == Os::Macos {
            vec![SettingAxis::Compiler, SettingAxis::BuildType]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::options::OptionValue;
    use crate::resolver::resolve;

    fn resolved(settings: &Settings, overrides: &[(&str, bool)]) -> ResolvedConfig {
        let overrides: BTreeMap<String, OptionValue> = overrides
            .iter()
            .map(|(k, v)| ((*k).to_string(), OptionValue::Bool(*v)))
            .collect();
        resolve(&Openssl::new(), settings, &overrides, &HostContext::new()).expect("resolve")
    }

    fn zlib_deps() -> DependencyManifests {
        let mut zlib = ConsumptionManifest::new("zlib", "1.3.1", "/deps/zlib", vec![]);
        zlib.add_component("zlib", Component::with_libs(["z"]));
        DependencyManifests::from([("zlib".to_string(), zlib)])
    }

    #[test]
    fn macos_forces_shared_release() {
        let settings = Settings::new(Os::Macos, Arch::Universal, BuildType::Debug);
        let config = resolved(&settings, &[("shared", false)]);
        assert!(config.is_shared());
        assert_eq!(config.settings.build_type, BuildType::Release);
        let manifest = Openssl::new().package_info(&config, Path::new("/p"));
        assert_eq!(manifest.architectures, vec!["arm64", "x86_64"]);
        assert_eq!(manifest.components["ssl"].libs, vec!["ssl.3"]);
        assert_eq!(manifest.build_modules, vec![CMAKE_MODULE]);
        manifest.validate().expect("valid manifest");
    }

    #[test]
    fn macos_package_id_ignores_compiler_and_build_type() {
        let debug = resolved(&Settings::new(Os::Macos, Arch::Armv8, BuildType::Debug), &[]);
        let release = resolved(&Settings::new(Os::Macos, Arch::Armv8, BuildType::Release), &[]);
        assert_eq!(debug.package_id(), release.package_id());
    }

    #[test]
    fn requires_static_zlib_with_headers() {
        let config = resolved(&Settings::new(Os::Linux, Arch::X86_64, BuildType::Release), &[]);
        let reqs = Openssl::new().requirements(&config).expect("requirements");
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].name, "zlib");
        assert!(reqs[0].transitive_headers);
        assert_eq!(reqs[0].options.get("shared"), Some(&OptionValue::Bool(false)));
    }

    #[test]
    fn macos_plan_runs_the_merge_script() {
        let config = resolved(&Settings::new(Os::Macos, Arch::Universal, BuildType::Release), &[]);
        let layout = BuildLayout::under(Path::new("/w"), "openssl", "3.2.4", "id");
        let plan = Openssl::new()
            .build_plan(&config, &layout, &zlib_deps(), &HostContext::new())
            .expect("plan");
        let script = plan.invocations().find(|inv| inv.program == "bash").expect("script run");
        assert!(script.args.windows(2).any(|w| w == ["--conan-arch", "armv8|x86_64"]));
        assert!(script.args.windows(2).any(|w| w == ["--zlib-lib", "/deps/zlib/lib"]));
        assert!(plan.steps.iter().any(|s| matches!(
            s,
            Step::Copy { pattern, .. } if pattern == "*.dylib"
        )));
    }

    #[test]
    fn missing_zlib_fails_the_plan() {
        let config = resolved(&Settings::new(Os::Linux, Arch::X86_64, BuildType::Release), &[]);
        let layout = BuildLayout::under(Path::new("/w"), "openssl", "3.2.4", "id");
        let err = Openssl::new()
            .build_plan(&config, &layout, &DependencyManifests::new(), &HostContext::new())
            .unwrap_err();
        assert!(err.to_string().contains("zlib"), "got: {err}");
    }

    #[test]
    fn cmake_module_uses_upper_case_build_type() {
        let module = cmake_module_variables(BuildType::Release);
        assert!(module.starts_with("set(OPENSSL_FOUND TRUE)\n"));
        assert!(module.contains("openssl_OpenSSL_SSL_LIBS_RELEASE"));
        assert!(module.contains("openssl_OpenSSL_Crypto_SYSTEM_LIBS_RELEASE"));
        assert!(!module.contains("%(config)s"));
    }

    #[test]
    fn windows_uses_nmake() {
        let config = resolved(&Settings::new(Os::Windows, Arch::X86_64, BuildType::Release), &[]);
        assert!(Openssl::new().required_programs(&config).contains(&"nmake"));
        let layout = BuildLayout::under(Path::new("/w"), "openssl", "3.2.4", "id");
        let plan = Openssl::new()
            .build_plan(&config, &layout, &zlib_deps(), &HostContext::new())
            .expect("plan");
        let programs: Vec<_> = plan.invocations().map(|inv| inv.program.as_str()).collect();
        assert_eq!(programs, ["perl", "nmake", "nmake"]);
    }
}
