//! POCO C++ libraries.
//!
//! Poco is a tree of components, most of them behind an `enable_*` option.
//! An enabled component requires every optional component it depends on to
//! be enabled too; the exported manifest mirrors the same tree.

use std::path::Path;

use kforge_common::error::{KforgeError, Result};
use kforge_common::types::{stdcpp_library, Os, Settings};

use super::{cmake, copy_license};
use crate::descriptor::{BuildSystem, PackageDescriptor};
use crate::host::HostContext;
use crate::manifest::{Component, ConsumptionManifest, DependencyManifests};
use crate::options::{OptionSchema, OptionSpec, OptionValue, OptionValues};
use crate::plan::{BuildLayout, BuildPlan, Step};
use crate::recipe::{manifest_architectures, reject_shared_static_runtime, Recipe};
use crate::requirement::Requirement;
use crate::resolver::ResolvedConfig;
use crate::toolchain::Toolchain;
use crate::version::Version;

/// One node of the Poco component tree.
#[derive(Debug, Clone, Copy)]
pub struct PocoComponent {
    /// Upstream component name (`Foundation`, `NetSSL`).
    pub name: &'static str,
    /// Option enabling the component; `None` for always-built components.
    pub option: Option<&'static str>,
    /// Default of `option`.
    pub default: bool,
    /// Poco components this one links against.
    pub dependencies: &'static [&'static str],
    /// Components of other packages this one links against.
    pub external: &'static [&'static str],
    /// Whether the component produces a library (tools do not).
    pub is_lib: bool,
}

const fn lib(
    name: &'static str,
    option: Option<&'static str>,
    default: bool,
    dependencies: &'static [&'static str],
    external: &'static [&'static str],
) -> PocoComponent {
    PocoComponent {
        name,
        option,
        default,
        dependencies,
        external,
        is_lib: true,
    }
}

const fn tool(
    name: &'static str,
    option: &'static str,
    dependencies: &'static [&'static str],
    external: &'static [&'static str],
) -> PocoComponent {
    PocoComponent {
        name,
        option: Some(option),
        default: false,
        dependencies,
        external,
        is_lib: false,
    }
}

/// The Poco 1.13 component tree.
pub const COMPONENTS: &[PocoComponent] = &[
    lib("Foundation", None, true, &[], &["pcre2::pcre2", "zlib::zlib"]),
    lib("Crypto", Some("enable_crypto"), true, &["Foundation"], &["openssl::openssl"]),
    lib("JSON", Some("enable_json"), true, &["Foundation"], &[]),
    lib("Net", Some("enable_net"), true, &["Foundation"], &[]),
    lib("NetSSL", Some("enable_netssl"), true, &["Crypto", "Util", "Net"], &[]),
    lib("Util", Some("enable_util"), true, &["Foundation", "XML", "JSON"], &[]),
    lib("XML", Some("enable_xml"), true, &["Foundation"], &["expat::expat"]),
    tool("mod_poco", "enable_apacheconnector", &["Util", "Net"], &["apr::apr", "apr-util::apr-util"]),
    tool("CppParser", "enable_cppparser", &["Foundation"], &[]),
    lib("Data", Some("enable_data"), false, &["Foundation"], &[]),
    lib("DataMySQL", Some("enable_data_mysql"), false, &["Data"], &["libmysqlclient::libmysqlclient"]),
    lib("DataODBC", Some("enable_data_odbc"), false, &["Data"], &[]),
    lib("DataPostgreSQL", Some("enable_data_postgresql"), false, &["Data"], &["libpq::libpq"]),
    lib("DataSQLite", Some("enable_data_sqlite"), false, &["Data"], &["sqlite3::sqlite3"]),
    lib("Encodings", Some("enable_encodings"), false, &["Foundation"], &[]),
    lib("JWT", Some("enable_jwt"), false, &["JSON", "Crypto"], &[]),
    lib("MongoDB", Some("enable_mongodb"), false, &["Net"], &[]),
    lib("NetSSLWin", Some("enable_netssl_win"), false, &["Net", "Util"], &[]),
    lib("PDF", Some("enable_pdf"), false, &["XML", "Util"], &[]),
    tool("PageCompiler", "enable_pagecompiler", &["Net", "Util"], &[]),
    tool("File2Page", "enable_pagecompiler_file2page", &["Net", "Util", "XML", "JSON"], &[]),
    tool("PocoDoc", "enable_pocodoc", &["Util", "XML", "CppParser"], &[]),
    lib("Redis", Some("enable_redis"), false, &["Net"], &[]),
    lib("SevenZip", Some("enable_sevenzip"), false, &["Util", "XML"], &[]),
    lib("Zip", Some("enable_zip"), false, &["Util", "XML"], &[]),
    lib("ActiveRecord", Some("enable_activerecord"), false, &["Foundation", "Data"], &[]),
    tool("ActiveRecordCompiler", "enable_activerecord_compiler", &["Util", "XML"], &[]),
    lib("Prometheus", Some("enable_prometheus"), false, &["Foundation", "Net"], &[]),
];

fn component(name: &str) -> Option<&'static PocoComponent> {
    COMPONENTS.iter().find(|c| c.name == name)
}

fn enabled(comp: &PocoComponent, options: &OptionValues) -> bool {
    comp.option.is_none_or(|option| options.flag(option))
}

/// Dependencies after dropping the ones Util can live without.
fn dependencies(comp: &PocoComponent, options: &OptionValues) -> Vec<&'static str> {
    comp.dependencies
        .iter()
        .copied()
        .filter(|dep| {
            comp.name != "Util"
                || !((*dep == "XML" && !options.flag("enable_xml"))
                    || (*dep == "JSON" && !options.flag("enable_json")))
        })
        .collect()
}

/// poco 1.13.3.
#[derive(Debug)]
pub struct Poco {
    desc: PackageDescriptor,
}

impl Poco {
    /// Creates the recipe.
    #[must_use]
    pub fn new() -> Self {
        let mut options = OptionSchema::new(vec![
            OptionSpec::flag("shared", true),
            OptionSpec::flag("fPIC", true),
            OptionSpec::flag("enable_fork", true),
            OptionSpec::new(
                "enable_active_record",
                vec![
                    OptionValue::Bool(true),
                    OptionValue::Bool(false),
                    OptionValue::from("deprecated"),
                ],
                OptionValue::from("deprecated"),
            ),
            OptionSpec::flag("log_debug", false),
            OptionSpec::flag("with_sql_parser", false),
            OptionSpec::flag("comp_foundation_sharedlibrary_debug_suffix", true),
        ]);
        for comp in COMPONENTS {
            if let Some(option) = comp.option {
                options.push(OptionSpec::flag(option, comp.default));
            }
        }
        Self {
            desc: PackageDescriptor::new("poco", Version::new(&[1, 13, 3]), BuildSystem::CMake)
                .description("Modern, powerful open source C++ class libraries for network-centric applications")
                .license("BSL-1.0")
                .homepage("https://pocoproject.org")
                .options(options),
        }
    }

    /// Library suffix: the lower-cased runtime flag for static MSVC builds,
    /// `d` for other Debug builds.
    fn library_suffix(config: &ResolvedConfig) -> String {
        let settings = &config.settings;
        match settings.msvc_runtime() {
            Some(runtime) if !config.is_shared() => runtime.flag().to_ascii_lowercase(),
            _ if settings.build_type.is_debug() => "d".to_string(),
            _ => String::new(),
        }
    }
}

impl Default for Poco {
    fn default() -> Self {
        Self::new()
    }
}

impl Recipe for Poco {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.desc
    }

    fn removed_options(&self, settings: &Settings) -> Vec<&'static str> {
        let mut removed = if settings.os == Os::Windows {
            vec!["fPIC", "enable_fork"]
        } else {
            vec!["enable_netssl_win"]
        };
        if !settings.build_type.is_debug() {
            removed.push("comp_foundation_sharedlibrary_debug_suffix");
        }
        removed
    }

    fn configure(
        &self,
        settings: &Settings,
        options: &mut OptionValues,
        _host: &HostContext,
    ) -> Result<Settings> {
        if options.choice("enable_active_record") != Some("deprecated") {
            tracing::warn!(
                package = "poco",
                "enable_active_record option is deprecated, use 'enable_activerecord' instead"
            );
        }
        if options.flag("shared") {
            options.remove("fPIC");
        }
        Ok(settings.clone())
    }

    fn validate(&self, settings: &Settings, options: &OptionValues, _host: &HostContext) -> Result<()> {
        reject_shared_static_runtime("poco", settings, options)?;
        for comp in COMPONENTS {
            let Some(option) = comp.option else { continue };
            if !options.flag(option) {
                continue;
            }
            for dep in dependencies(comp, options) {
                let Some(dep_option) = component(dep).and_then(|d| d.option) else {
                    continue;
                };
                if !options.flag(dep_option) {
                    return Err(KforgeError::configuration(format!(
                        "poco: option {option} requires also option {dep_option}"
                    )));
                }
            }
        }
        if options.flag("enable_netssl") && options.flag("enable_netssl_win") {
            return Err(KforgeError::configuration(
                "poco: conflicting enable_netssl[_win] settings",
            ));
        }
        Ok(())
    }

    fn generate(&self, settings: &Settings, options: &OptionValues, toolchain: &mut Toolchain) {
        for option in COMPONENTS.iter().filter_map(|c| c.option) {
            toolchain.set(option.to_ascii_uppercase(), options.flag(option));
        }
        toolchain.set("POCO_UNBUNDLED", true);
        toolchain.set("CMAKE_INSTALL_SYSTEM_RUNTIME_LIBS_SKIP", true);
        toolchain.set("OPENSSL_FOUND", "TRUE");
        if settings.is_msvc() {
            toolchain.set("POCO_MT", settings.is_msvc_static_runtime());
        }
        if !options.flag("with_sql_parser") {
            toolchain.set("POCO_DATA_NO_SQL_PARSER", true);
        }
        toolchain.define("POCO_NO_AUTOMATIC_LIBS", "1");
        toolchain.define("XML_DTD", "1");
        if options.contains("enable_fork") && !options.flag("enable_fork") {
            toolchain.define("POCO_NO_FORK_EXEC", "1");
        }
        if options.contains("comp_foundation_sharedlibrary_debug_suffix")
            && !options.flag("comp_foundation_sharedlibrary_debug_suffix")
        {
            toolchain.define("POCO_NO_SHARED_LIBRARY_DEBUG_SUFFIX", "1");
        }
    }

    fn requirements(&self, config: &ResolvedConfig) -> Result<Vec<Requirement>> {
        let options = &config.options;
        let shared = config.is_shared();
        let mut reqs = vec![
            Requirement::host("pcre2/[>=10.42 <11]")?,
            Requirement::host("zlib/[>=1.2.11 <2]")?
                .transitive_headers()
                .with_option("shared", shared),
        ];
        if options.flag("enable_xml") {
            reqs.push(Requirement::host("expat/[>=2.6.2 <3]")?.transitive_headers());
        }
        if options.flag("enable_netssl") || options.flag("enable_crypto") {
            reqs.push(Requirement::host("openssl/3.2.4")?.with_option("shared", shared));
        }
        Ok(reqs)
    }

    fn required_programs(&self, _config: &ResolvedConfig) -> Vec<&'static str> {
        vec!["cmake", "git"]
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
        for leftover in ["lib/cmake", "cmake"] {
            plan.push(Step::Remove {
                path: layout.package_dir.join(leftover),
            });
        }
        Ok(plan)
    }

    fn package_info(&self, config: &ResolvedConfig, package_dir: &Path) -> ConsumptionManifest {
        let settings = &config.settings;
        let options = &config.options;
        let suffix = Self::library_suffix(config);

        let mut manifest = ConsumptionManifest::new(
            &config.package,
            config.version.to_string(),
            package_dir,
            manifest_architectures(settings),
        );
        manifest.set_property("cmake_file_name", "Poco");
        manifest.set_property("cmake_target_name", "Poco::Poco");

        for comp in COMPONENTS.iter().filter(|c| enabled(c, options)) {
            let mut entry = Component::default()
                .property("cmake_target_name", format!("Poco::{}", comp.name))
                .property("cmake_file_name", comp.name);
            if comp.is_lib {
                entry.libs.push(format!("Poco{}{suffix}", comp.name));
            }
            entry.requires = dependencies(comp, options)
                .into_iter()
                .map(|dep| format!("poco_{}", dep.to_ascii_lowercase()))
                .chain(comp.external.iter().map(|ext| (*ext).to_string()))
                .collect();
            manifest.add_component(format!("poco_{}", comp.name.to_ascii_lowercase()), entry);
        }

        if let Some(foundation) = manifest.component_mut("poco_foundation") {
            if settings.os == Os::Linux {
                foundation
                    .system_libs
                    .extend(["pthread", "dl", "rt"].map(String::from));
            }
            if options.flag("log_debug") {
                foundation.defines.push("POCO_LOG_DEBUG".to_string());
            }
            if settings.is_msvc() {
                foundation.defines.push("POCO_NO_AUTOMATIC_LIBS".to_string());
            }
            if !config.is_shared() {
                foundation.defines.push("POCO_STATIC=ON".to_string());
                if settings.os == Os::Windows {
                    foundation
                        .system_libs
                        .extend(["ws2_32", "iphlpapi", "crypt32"].map(String::from));
                }
                if let Some(stdcpp) = stdcpp_library(settings) {
                    foundation.system_libs.push(stdcpp.to_string());
                }
            }
            foundation.defines.push("POCO_UNBUNDLED".to_string());
        }
        if settings.is_mingw() && !config.is_shared() {
            if let Some(net) = manifest.component_mut("poco_net") {
                net.system_libs.push("mswsock".to_string());
            }
        }
        if let Some(util) = manifest.component_mut("poco_util") {
            if !options.flag("enable_json") {
                util.defines.push("POCO_UTIL_NO_JSONCONFIGURATION".to_string());
            }
            if !options.flag("enable_xml") {
                util.defines.push("POCO_UTIL_NO_XMLCONFIGURATION".to_string());
            }
        }
        manifest
    }

    fn package_id_ignored_options(&self) -> &'static [&'static str] {
        &["enable_active_record", "log_debug"]
    }
}
