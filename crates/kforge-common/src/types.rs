//! Settings axes every recipe reads: operating system, architecture,
//! compiler and build type.
//!
//! [`Settings`] is immutable once built. Recipes that need a documented
//! override (e.g. forcing `Release`) derive a new value with the `with_*`
//! helpers instead of mutating shared state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KforgeError;

/// Target operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Os {
    /// Microsoft Windows.
    Windows,
    /// Apple macOS.
    Macos,
    /// GNU/Linux.
    Linux,
}

impl Os {
    /// All supported operating systems, in declaration order.
    pub const ALL: [Self; 3] = [Self::Windows, Self::Macos, Self::Linux];

    /// Returns `true` for Apple platforms.
    #[must_use]
    pub const fn is_apple(self) -> bool {
        matches!(self, Self::Macos)
    }

    /// Canonical settings name (`Windows`, `Macos`, `Linux`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::Macos => "Macos",
            Self::Linux => "Linux",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = KforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win" => Ok(Self::Windows),
            "macos" | "mac" | "darwin" => Ok(Self::Macos),
            "linux" => Ok(Self::Linux),
            _ => Err(KforgeError::configuration(format!(
                "unsupported operating system \"{s}\" (expected Windows, Macos or Linux)"
            ))),
        }
    }
}

impl TryFrom<String> for Os {
    type Error = KforgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Os> for String {
    fn from(value: Os) -> Self {
        value.as_str().to_string()
    }
}

/// Target CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Arch {
    /// 64-bit x86.
    X86_64,
    /// 32-bit x86.
    X86,
    /// 64-bit ARM.
    Armv8,
    /// Apple universal binary carrying both `arm64` and `x86_64` slices.
    Universal,
}

impl Arch {
    /// Settings name of the architecture.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::X86 => "x86",
            Self::Armv8 => "armv8",
            Self::Universal => "armv8|x86_64",
        }
    }

    /// Returns `true` for ARM architectures.
    #[must_use]
    pub const fn is_arm(self) -> bool {
        matches!(self, Self::Armv8)
    }

    /// Architecture names as Apple toolchains spell them.
    ///
    /// A universal build yields both slices, sorted.
    #[must_use]
    pub fn apple_names(self) -> Vec<&'static str> {
        match self {
            Self::X86_64 => vec!["x86_64"],
            Self::X86 => vec!["i386"],
            Self::Armv8 => vec!["arm64"],
            Self::Universal => vec!["arm64", "x86_64"],
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = KforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Ok(Self::X86_64),
            "x86" | "i386" | "i686" => Ok(Self::X86),
            "armv8" | "arm64" | "aarch64" => Ok(Self::Armv8),
            "armv8|x86_64" | "x86_64|armv8" | "universal" => Ok(Self::Universal),
            _ => Err(KforgeError::configuration(format!(
                "unsupported architecture \"{s}\""
            ))),
        }
    }
}

impl TryFrom<String> for Arch {
    type Error = KforgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Arch> for String {
    fn from(value: Arch) -> Self {
        value.as_str().to_string()
    }
}

/// Build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuildType {
    /// Unoptimized build with debug information.
    Debug,
    /// Optimized build.
    Release,
    /// Optimized build with debug information.
    RelWithDebInfo,
    /// Size-optimized build.
    MinSizeRel,
}

impl BuildType {
    /// Settings name of the build type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
            Self::RelWithDebInfo => "RelWithDebInfo",
            Self::MinSizeRel => "MinSizeRel",
        }
    }

    /// Returns `true` for [`BuildType::Debug`].
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildType {
    type Err = KforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            "relwithdebinfo" => Ok(Self::RelWithDebInfo),
            "minsizerel" => Ok(Self::MinSizeRel),
            _ => Err(KforgeError::configuration(format!(
                "unsupported build type \"{s}\""
            ))),
        }
    }
}

impl TryFrom<String> for BuildType {
    type Error = KforgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BuildType> for String {
    fn from(value: BuildType) -> Self {
        value.as_str().to_string()
    }
}

/// Compiler family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompilerKind {
    /// Microsoft Visual C++.
    Msvc,
    /// Apple Clang.
    AppleClang,
    /// Upstream LLVM Clang.
    Clang,
    /// GNU GCC (including MinGW on Windows).
    Gcc,
}

impl CompilerKind {
    /// Settings name of the compiler.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Msvc => "msvc",
            Self::AppleClang => "apple-clang",
            Self::Clang => "clang",
            Self::Gcc => "gcc",
        }
    }
}

impl fmt::Display for CompilerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompilerKind {
    type Err = KforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "msvc" | "visual studio" => Ok(Self::Msvc),
            "apple-clang" | "apple_clang" => Ok(Self::AppleClang),
            "clang" => Ok(Self::Clang),
            "gcc" => Ok(Self::Gcc),
            _ => Err(KforgeError::configuration(format!(
                "unsupported compiler \"{s}\""
            ))),
        }
    }
}

impl TryFrom<String> for CompilerKind {
    type Error = KforgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CompilerKind> for String {
    fn from(value: CompilerKind) -> Self {
        value.as_str().to_string()
    }
}

/// How the C/C++ runtime is linked (MSVC only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeLink {
    /// `/MD` family: runtime in a DLL.
    #[default]
    Dynamic,
    /// `/MT` family: runtime linked statically.
    Static,
}

/// Concrete MSVC runtime library selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeLibrary {
    /// `/MT`.
    MultiThreaded,
    /// `/MTd`.
    MultiThreadedDebug,
    /// `/MD`.
    MultiThreadedDll,
    /// `/MDd`.
    MultiThreadedDebugDll,
}

impl RuntimeLibrary {
    /// Selects the runtime variant for a link mode and build type.
    ///
    /// Debug always maps to a debug variant; every other build type maps to
    /// the release variant.
    #[must_use]
    pub const fn select(link: RuntimeLink, build_type: BuildType) -> Self {
        match (link, build_type.is_debug()) {
            (RuntimeLink::Dynamic, true) => Self::MultiThreadedDebugDll,
            (RuntimeLink::Dynamic, false) => Self::MultiThreadedDll,
            (RuntimeLink::Static, true) => Self::MultiThreadedDebug,
            (RuntimeLink::Static, false) => Self::MultiThreaded,
        }
    }

    /// Value accepted by `CMAKE_MSVC_RUNTIME_LIBRARY`.
    #[must_use]
    pub const fn cmake_name(self) -> &'static str {
        match self {
            Self::MultiThreaded => "MultiThreaded",
            Self::MultiThreadedDebug => "MultiThreadedDebug",
            Self::MultiThreadedDll => "MultiThreadedDLL",
            Self::MultiThreadedDebugDll => "MultiThreadedDebugDLL",
        }
    }

    /// Compiler flag without the leading slash (`MT`, `MTd`, `MD`, `MDd`).
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::MultiThreaded => "MT",
            Self::MultiThreadedDebug => "MTd",
            Self::MultiThreadedDll => "MD",
            Self::MultiThreadedDebugDll => "MDd",
        }
    }

    /// Returns `true` for the statically linked variants.
    #[must_use]
    pub const fn is_static(self) -> bool {
        matches!(self, Self::MultiThreaded | Self::MultiThreadedDebug)
    }
}

/// Compiler identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Compiler {
    /// Compiler family.
    pub kind: CompilerKind,
    /// Compiler version as written in the profile (e.g. `193`, `15`, `11`).
    pub version: String,
    /// Runtime link mode; only meaningful for MSVC.
    #[serde(default)]
    pub runtime: RuntimeLink,
}

impl Compiler {
    /// Creates a compiler with the default (dynamic) runtime.
    #[must_use]
    pub fn new(kind: CompilerKind, version: impl Into<String>) -> Self {
        Self {
            kind,
            version: version.into(),
            runtime: RuntimeLink::Dynamic,
        }
    }

    /// Returns a copy of this compiler with the given runtime link mode.
    #[must_use]
    pub fn with_runtime(mut self, runtime: RuntimeLink) -> Self {
        self.runtime = runtime;
        self
    }

    /// The conventional default compiler of an operating system.
    #[must_use]
    pub fn default_for(os: Os) -> Self {
        match os {
            Os::Windows => Self::new(CompilerKind::Msvc, "193"),
            Os::Macos => Self::new(CompilerKind::AppleClang, "15"),
            Os::Linux => Self::new(CompilerKind::Gcc, "11"),
        }
    }
}

/// The immutable settings tuple a package is resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Settings {
    /// Target operating system.
    pub os: Os,
    /// Target architecture.
    pub arch: Arch,
    /// Compiler identity.
    pub compiler: Compiler,
    /// Build configuration.
    pub build_type: BuildType,
    /// Minimum OS version (macOS deployment target), if pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
}

impl Settings {
    /// Creates settings with the OS's default compiler.
    #[must_use]
    pub fn new(os: Os, arch: Arch, build_type: BuildType) -> Self {
        Self {
            os,
            arch,
            compiler: Compiler::default_for(os),
            build_type,
            os_version: None,
        }
    }

    /// Returns a copy with a different compiler.
    #[must_use]
    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Returns a copy with a different build type.
    #[must_use]
    pub fn with_build_type(mut self, build_type: BuildType) -> Self {
        self.build_type = build_type;
        self
    }

    /// Returns a copy with the OS version pinned.
    #[must_use]
    pub fn with_os_version(mut self, version: impl Into<String>) -> Self {
        self.os_version = Some(version.into());
        self
    }

    /// Returns `true` when compiling with MSVC.
    #[must_use]
    pub fn is_msvc(&self) -> bool {
        self.compiler.kind == CompilerKind::Msvc
    }

    /// Returns `true` when targeting Windows with GCC.
    #[must_use]
    pub fn is_mingw(&self) -> bool {
        self.os == Os::Windows && self.compiler.kind == CompilerKind::Gcc
    }

    /// MSVC runtime selection for these settings, `None` for other compilers.
    #[must_use]
    pub fn msvc_runtime(&self) -> Option<RuntimeLibrary> {
        self.is_msvc()
            .then(|| RuntimeLibrary::select(self.compiler.runtime, self.build_type))
    }

    /// Returns `true` when MSVC links its runtime statically.
    #[must_use]
    pub fn is_msvc_static_runtime(&self) -> bool {
        self.msvc_runtime().is_some_and(RuntimeLibrary::is_static)
    }

    /// Host settings of the running process, used as CLI defaults.
    #[must_use]
    pub fn host() -> Self {
        let os = if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::Macos
        } else {
            Os::Linux
        };
        let arch = if cfg!(target_arch = "aarch64") {
            Arch::Armv8
        } else {
            Arch::X86_64
        };
        Self::new(os, arch, BuildType::Release)
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}-{}/{}",
            self.os, self.arch, self.compiler.kind, self.compiler.version, self.build_type
        )
    }
}

/// The C++ standard library a static consumer must link explicitly.
///
/// `None` when the toolchain links it implicitly (MSVC).
#[must_use]
pub fn stdcpp_library(settings: &Settings) -> Option<&'static str> {
    match settings.compiler.kind {
        CompilerKind::Msvc => None,
        CompilerKind::AppleClang => Some("c++"),
        CompilerKind::Clang if settings.os == Os::Macos => Some("c++"),
        CompilerKind::Clang | CompilerKind::Gcc => Some("stdc++"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_parses_settings_names_case_insensitively() {
        assert_eq!("Macos".parse::<Os>().unwrap(), Os::Macos);
        assert_eq!("WINDOWS".parse::<Os>().unwrap(), Os::Windows);
        assert!("FreeBSD".parse::<Os>().is_err());
    }

    #[test]
    fn universal_arch_reports_both_slices() {
        let arch: Arch = "armv8|x86_64".parse().unwrap();
        assert_eq!(arch, Arch::Universal);
        assert_eq!(arch.apple_names(), vec!["arm64", "x86_64"]);
    }

    #[test]
    fn runtime_selection_follows_build_type() {
        for build_type in [
            BuildType::Debug,
            BuildType::Release,
            BuildType::RelWithDebInfo,
            BuildType::MinSizeRel,
        ] {
            let dynamic = RuntimeLibrary::select(RuntimeLink::Dynamic, build_type);
            let fixed = RuntimeLibrary::select(RuntimeLink::Static, build_type);
            if build_type.is_debug() {
                assert_eq!(dynamic.flag(), "MDd");
                assert_eq!(fixed.flag(), "MTd");
            } else {
                assert_eq!(dynamic.flag(), "MD");
                assert_eq!(fixed.flag(), "MT");
            }
        }
    }

    #[test]
    fn msvc_runtime_is_none_for_gcc() {
        let settings = Settings::new(Os::Linux, Arch::X86_64, BuildType::Debug);
        assert!(settings.msvc_runtime().is_none());
        assert!(!settings.is_msvc_static_runtime());
    }

    #[test]
    fn static_runtime_detection() {
        let settings = Settings::new(Os::Windows, Arch::X86_64, BuildType::Release)
            .with_compiler(Compiler::new(CompilerKind::Msvc, "193").with_runtime(RuntimeLink::Static));
        assert!(settings.is_msvc_static_runtime());
    }

    #[test]
    fn stdcpp_library_per_toolchain() {
        let linux = Settings::new(Os::Linux, Arch::X86_64, BuildType::Release);
        let mac = Settings::new(Os::Macos, Arch::Armv8, BuildType::Release);
        let win = Settings::new(Os::Windows, Arch::X86_64, BuildType::Release);
        assert_eq!(stdcpp_library(&linux), Some("stdc++"));
        assert_eq!(stdcpp_library(&mac), Some("c++"));
        assert_eq!(stdcpp_library(&win), None);
    }

    #[test]
    fn settings_deserialize_from_toml() {
        let settings: Settings = toml::from_str(
            r#"
os = "Windows"
arch = "x86_64"
build_type = "Debug"

[compiler]
kind = "msvc"
version = "193"
runtime = "static"
"#,
        )
        .expect("parse settings");
        assert_eq!(settings.os, Os::Windows);
        assert_eq!(settings.compiler.runtime, RuntimeLink::Static);
        assert_eq!(
            settings.msvc_runtime(),
            Some(RuntimeLibrary::MultiThreadedDebug)
        );
    }
}
