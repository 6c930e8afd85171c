//! Qt, installed through the vendor's online installer.
//!
//! Nothing is compiled. The plan downloads the installer matching the host
//! platform and runs it unattended with a fixed module list. The installer
//! needs a Qt account, supplied according to `qt_login_type`:
//!
//! * `ini`: the installer reads `qtaccount.ini` from its default location.
//!   When that file is absent the recipe falls back to `envvars`.
//! * `envvars`: `QT_INSTALLER_LOGIN_EMAIL` and `QT_INSTALLER_JWT_TOKEN`.
//! * `cli`: the installer prompts; only allowed for interactive runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kforge_common::constants::{QT_EMAIL_ENV, QT_INSTALLER_BASE_URL, QT_JWT_ENV};
use kforge_common::error::{KforgeError, Result};
use kforge_common::types::{Os, Settings};

use crate::descriptor::{BuildSystem, PackageDescriptor};
use crate::host::HostContext;
use crate::manifest::{Component, ConsumptionManifest, DependencyManifests};
use crate::options::{OptionSchema, OptionSpec, OptionValues};
use crate::plan::{BuildLayout, BuildPlan, ExpectedArtifact, InstallerFormat, InstallerRun, Step};
use crate::recipe::{manifest_architectures, Recipe};
use crate::resolver::ResolvedConfig;
use crate::version::Version;

const CREDENTIALS_DOC: &str = "https://doc.qt.io/qt-6/get-and-install-qt-cli.html#providing-login-information";

/// Installer file name for a platform, as published under the official
/// online installers folder. macOS and Windows installers are always `x64`.
#[must_use]
pub fn installer_name(settings: &Settings) -> String {
    let os = match settings.os {
        Os::Macos => "mac",
        Os::Linux => "linux",
        Os::Windows => "windows",
    };
    let arch = if settings.os == Os::Linux && settings.arch.is_arm() { "arm64" } else { "x64" };
    let extension = installer_format(settings.os).extension();
    format!("qt-online-installer-{os}-{arch}-online.{extension}")
}

const fn installer_format(os: Os) -> InstallerFormat {
    match os {
        Os::Macos => InstallerFormat::Dmg,
        Os::Linux => InstallerFormat::Run,
        Os::Windows => InstallerFormat::Exe,
    }
}

/// Installer compiler id of the prebuilt binaries.
#[must_use]
pub const fn compiler_id(os: Os) -> &'static str {
    match os {
        Os::Macos => "clang_64",
        Os::Linux => "gcc_64",
        Os::Windows => "win64_msvc2019_64",
    }
}

/// Folder the installer creates under `<root>/<version>/`.
const fn install_subdir(os: Os) -> &'static str {
    match os {
        Os::Macos => "macos",
        Os::Linux => "gcc_64",
        Os::Windows => "msvc2019_64",
    }
}

/// Installer module identifiers for a Qt version.
#[must_use]
pub fn modules(version: &Version, os: Os) -> Vec<String> {
    let major = version.major();
    let compact: String = version.parts().iter().map(ToString::to_string).collect();
    let prefix = format!("qt.qt{major}.{compact}");
    let mut modules = vec![
        format!("{prefix}.{}", compiler_id(os)),
        "qt.tools".to_string(),
        "qt.tools.maintenance".to_string(),
        format!("{prefix}.qt5compat"),
        format!("{prefix}.src"),
        format!("{prefix}.addons"),
        format!("{prefix}.addons.qtpositioning"),
        format!("{prefix}.addons.qtwebchannel"),
        format!("{prefix}.addons.qtwebengine"),
        format!("{prefix}.addons.qtwebview"),
    ];
    if os == Os::Windows {
        modules.extend(
            [
                "qt.tools.ninja",
                "qt.tools.vcredist",
                "qt.tools.vcredist_64",
                "qt.tools.vcredist_msvc2019_x64",
                "qt.tools.vcredist_msvc2019_x86",
            ]
            .map(String::from),
        );
    }
    modules
}

/// Default location of `qtaccount.ini` for the target OS.
#[must_use]
pub fn qtaccount_ini(os: Os, host: &HostContext) -> Option<PathBuf> {
    let home = host.home_dir()?;
    Some(match os {
        Os::Windows => home.join("AppData/Roaming/Qt/qtaccount.ini"),
        Os::Macos => home.join("Library/Application Support/Qt/qtaccount.ini"),
        Os::Linux => home.join(".local/share/Qt/qtaccount.ini"),
    })
}

fn require_env<'a>(host: &'a HostContext, key: &str, what: &str) -> Result<&'a str> {
    host.var(key).ok_or_else(|| {
        KforgeError::configuration(format!(
            "qt: the 'envvars' login type needs the environment variable {key} set to your {what}. See {CREDENTIALS_DOC}"
        ))
    })
}

/// qt 6.2.3.
#[derive(Debug)]
pub struct Qt {
    desc: PackageDescriptor,
}

impl Qt {
    /// Creates the recipe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            desc: PackageDescriptor::new("qt", Version::new(&[6, 2, 3]), BuildSystem::Installer)
                .description("Cross-platform application framework, installed with the Qt online installer")
                .license("LGPL-3.0-only")
                .homepage("https://www.qt.io")
                .options(OptionSchema::new(vec![OptionSpec::choice(
                    "qt_login_type",
                    &["ini", "envvars", "cli"],
                    "ini",
                )])),
        }
    }

    fn install_root(config: &ResolvedConfig, package_dir: &Path) -> PathBuf {
        package_dir
            .join(config.version.to_string())
            .join(install_subdir(config.settings.os))
    }
}

impl Default for Qt {
    fn default() -> Self {
        Self::new()
    }
}

impl Recipe for Qt {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.desc
    }

    fn removed_options(&self, _settings: &Settings) -> Vec<&'static str> {
        Vec::new()
    }

    fn configure(
        &self,
        settings: &Settings,
        options: &mut OptionValues,
        host: &HostContext,
    ) -> Result<Settings> {
        if options.choice("qt_login_type") == Some("ini") {
            let ini = qtaccount_ini(settings.os, host);
            if !ini.as_deref().is_some_and(Path::is_file) {
                tracing::warn!(
                    package = "qt",
                    path = ?ini,
                    "qtaccount.ini not found in the default location, falling back to the 'envvars' login type"
                );
                options.set("qt_login_type", "envvars");
            }
        }
        Ok(settings.clone())
    }

    fn validate(&self, _settings: &Settings, options: &OptionValues, host: &HostContext) -> Result<()> {
        match options.choice("qt_login_type") {
            Some("envvars") => {
                let _ = require_env(host, QT_EMAIL_ENV, "Qt account email")?;
                let _ = require_env(host, QT_JWT_ENV, "Qt account JWT token")?;
                Ok(())
            }
            Some("cli") if !host.interactive() => Err(KforgeError::configuration(
                "qt: the 'cli' login type prompts for credentials, but interactive input is disabled; use 'ini' or 'envvars'",
            )),
            _ => Ok(()),
        }
    }

    fn required_programs(&self, config: &ResolvedConfig) -> Vec<&'static str> {
        if config.settings.os == Os::Macos {
            vec!["hdiutil"]
        } else {
            Vec::new()
        }
    }

    fn build_plan(
        &self,
        config: &ResolvedConfig,
        layout: &BuildLayout,
        _deps: &DependencyManifests,
        host: &HostContext,
    ) -> Result<BuildPlan> {
        let settings = &config.settings;
        let name = installer_name(settings);
        let installer = layout.build_dir.join(&name);

        let mut args = Vec::new();
        let mut env = BTreeMap::new();
        if config.options.choice("qt_login_type") == Some("envvars") {
            let email = require_env(host, QT_EMAIL_ENV, "Qt account email")?;
            let token = require_env(host, QT_JWT_ENV, "Qt account JWT token")?;
            args.extend(["--email".to_string(), email.to_string()]);
            let _ = env.insert(QT_JWT_ENV.to_string(), token.to_string());
        }
        args.extend([
            "--root".to_string(),
            super::path_arg(&layout.package_dir),
            "--confirm-command".to_string(),
            "--accept-obligations".to_string(),
            "--accept-licenses".to_string(),
            "--default-answer".to_string(),
            "install".to_string(),
        ]);
        args.extend(modules(&config.version, settings.os));

        let mut plan = BuildPlan::default();
        plan.push(Step::Download {
            url: format!("{QT_INSTALLER_BASE_URL}/{name}"),
            dest: installer.clone(),
        });
        if settings.os == Os::Linux {
            plan.push(Step::MakeExecutable {
                path: installer.clone(),
            });
        }
        plan.push(Step::Install(InstallerRun {
            installer,
            format: installer_format(settings.os),
            args,
            env,
        }));
        Ok(plan)
    }

    fn expected_artifacts(&self, config: &ResolvedConfig, layout: &BuildLayout) -> Vec<ExpectedArtifact> {
        let root = Self::install_root(config, &layout.package_dir);
        vec![
            ExpectedArtifact::dir("Qt version directory", root.clone()),
            ExpectedArtifact::dir("Qt library directory", root.join("lib")),
        ]
    }

    fn package_info(&self, config: &ResolvedConfig, package_dir: &Path) -> ConsumptionManifest {
        let relative = format!("{}/{}", config.version, install_subdir(config.settings.os));
        let component = Component {
            include_dirs: vec![format!("{relative}/include")],
            lib_dirs: vec![format!("{relative}/lib")],
            bin_dirs: vec![format!("{relative}/bin")],
            ..Component::default()
        };

        let mut manifest = ConsumptionManifest::new(
            &config.package,
            config.version.to_string(),
            package_dir,
            manifest_architectures(&config.settings),
        );
        manifest.set_property("cmake_file_name", format!("Qt{}", config.version.major()));
        manifest.set_property("cmake_find_mode", "none");
        manifest.set_property("cmake_prefix_path", relative.clone());
        let _ = manifest.env.insert(
            "QT_PLUGIN_PATH".to_string(),
            Self::install_root(config, package_dir).join("plugins").display().to_string(),
        );
        manifest.add_component("qt", component);
        manifest
    }

    fn package_id_ignored_options(&self) -> &'static [&'static str] {
        &["qt_login_type"]
    }
}

#[cfg(test)]
mod tests {
    use kforge_common::types::{Arch, BuildType};

    use super::*;
    use crate::options::OptionValue;
    use crate::resolver::resolve;

    fn resolve_with(settings: &Settings, login: &str, host: &HostContext) -> Result<ResolvedConfig> {
        let overrides = BTreeMap::from([("qt_login_type".to_string(), OptionValue::from(login))]);
        resolve(&Qt::new(), settings, &overrides, host)
    }

    fn mac() -> Settings {
        Settings::new(Os::Macos, Arch::Armv8, BuildType::Release)
    }

    #[test]
    fn installer_names_per_platform() {
        assert_eq!(installer_name(&mac()), "qt-online-installer-mac-x64-online.dmg");
        assert_eq!(
            installer_name(&Settings::new(Os::Linux, Arch::Armv8, BuildType::Release)),
            "qt-online-installer-linux-arm64-online.run"
        );
        assert_eq!(
            installer_name(&Settings::new(Os::Windows, Arch::Armv8, BuildType::Release)),
            "qt-online-installer-windows-x64-online.exe"
        );
    }

    #[test]
    fn module_list_for_windows() {
        let list = modules(&Version::new(&[6, 2, 3]), Os::Windows);
        assert_eq!(list[0], "qt.qt6.623.win64_msvc2019_64");
        assert!(list.contains(&"qt.qt6.623.addons.qtwebengine".to_string()));
        assert!(list.contains(&"qt.tools.ninja".to_string()));
        assert!(!modules(&Version::new(&[6, 2, 3]), Os::Linux).contains(&"qt.tools.ninja".to_string()));
    }

    #[test]
    fn envvars_without_token_fails_before_any_step() {
        let host = HostContext::new().with_var(QT_EMAIL_ENV, "dev@example.com");
        let err = resolve_with(&mac(), "envvars", &host).unwrap_err();
        assert!(matches!(err, KforgeError::Configuration { .. }));
        assert!(err.to_string().contains(QT_JWT_ENV), "got: {err}");
    }

    #[test]
    fn missing_ini_falls_back_to_envvars() {
        let home = tempfile::tempdir().expect("tempdir");
        let host = HostContext::new().with_home(home.path());
        let err = resolve_with(&mac(), "ini", &host).unwrap_err();
        assert!(err.to_string().contains(QT_EMAIL_ENV), "got: {err}");

        let host = host.with_var(QT_EMAIL_ENV, "dev@example.com").with_var(QT_JWT_ENV, "jwt");
        let config = resolve_with(&mac(), "ini", &host).expect("resolve");
        assert_eq!(config.options.choice("qt_login_type"), Some("envvars"));
    }

    #[test]
    fn present_ini_is_used() {
        let home = tempfile::tempdir().expect("tempdir");
        let ini = home.path().join(".local/share/Qt");
        std::fs::create_dir_all(&ini).expect("mkdir");
        std::fs::write(ini.join("qtaccount.ini"), "[QtAccount]\n").expect("write ini");
        let host = HostContext::new().with_home(home.path());
        let settings = Settings::new(Os::Linux, Arch::X86_64, BuildType::Release);
        let config = resolve_with(&settings, "ini", &host).expect("resolve");
        assert_eq!(config.options.choice("qt_login_type"), Some("ini"));
    }

    #[test]
    fn cli_requires_interactive_input() {
        let err = resolve_with(&mac(), "cli", &HostContext::new()).unwrap_err();
        assert!(err.to_string().contains("interactive"), "got: {err}");
        assert!(resolve_with(&mac(), "cli", &HostContext::new().with_interactive(true)).is_ok());
    }

    #[test]
    fn envvars_plan_passes_email_first() {
        let host = HostContext::new()
            .with_var(QT_EMAIL_ENV, "dev@example.com")
            .with_var(QT_JWT_ENV, "jwt");
        let settings = Settings::new(Os::Linux, Arch::X86_64, BuildType::Release);
        let config = resolve_with(&settings, "envvars", &host).expect("resolve");
        let layout = BuildLayout::under(Path::new("/w"), "qt", "6.2.3", "id");
        let plan = Qt::new()
            .build_plan(&config, &layout, &DependencyManifests::new(), &host)
            .expect("plan");
        assert!(matches!(&plan.steps[0], Step::Download { url, .. } if url.ends_with("linux-x64-online.run")));
        assert!(matches!(&plan.steps[1], Step::MakeExecutable { .. }));
        let Step::Install(run) = &plan.steps[2] else {
            panic!("expected an installer step, got {:?}", plan.steps[2]);
        };
        assert_eq!(&run.args[..4], ["--email", "dev@example.com", "--root", "/w/qt/6.2.3/package/id"]);
        assert_eq!(run.env.get(QT_JWT_ENV).map(String::as_str), Some("jwt"));
        assert!(run.args.contains(&"qt.qt6.623.gcc_64".to_string()));
    }

    #[test]
    fn manifest_exports_plugin_path() {
        let host = HostContext::new().with_interactive(true);
        let config = resolve_with(&mac(), "cli", &host).expect("resolve");
        let manifest = Qt::new().package_info(&config, Path::new("/opt/qt"));
        assert_eq!(
            manifest.env.get("QT_PLUGIN_PATH").map(String::as_str),
            Some("/opt/qt/6.2.3/macos/plugins")
        );
        assert_eq!(manifest.architectures, vec!["arm64"]);
    }
}
