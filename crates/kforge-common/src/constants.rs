//! System-wide constants, environment variable names and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Application name used in CLI output and cache paths.
pub const APP_NAME: &str = "kforge";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "kforge";

/// Name of the generated CMake toolchain file written into build folders.
pub const TOOLCHAIN_FILE_NAME: &str = "kforge_toolchain.cmake";

/// Name of the consumption manifest written into install folders.
pub const MANIFEST_FILE_NAME: &str = "kforge-manifest.json";

/// Environment variable pointing at a configuration file.
pub const CONFIG_ENV: &str = "KFORGE_CONFIG";

/// Environment variable holding the Qt account email.
pub const QT_EMAIL_ENV: &str = "QT_INSTALLER_LOGIN_EMAIL";

/// Environment variable holding the Qt account JWT token.
pub const QT_JWT_ENV: &str = "QT_INSTALLER_JWT_TOKEN";

/// Environment variable holding the translation service API key.
pub const DEEPL_KEY_ENV: &str = "DEEPL_AUTH_KEY";

/// Environment variable pointing at the desktop client source checkout.
pub const SOURCE_DIR_ENV: &str = "KDRIVE_DIR";

/// Base URL of the Qt online installers.
pub const QT_INSTALLER_BASE_URL: &str = "https://download.qt.io/official_releases/online_installers";

/// Default translation service endpoint.
pub const DEEPL_API_URL: &str = "https://api-free.deepl.com";

/// Product name prefixed to release-notes files.
pub const RELEASE_PRODUCT: &str = "kDrive";

/// Release-notes template expected in the working directory.
pub const RELEASE_TEMPLATE: &str = "kDrive-template.html";

/// Returns the data directory, preferring the platform data dir
/// (`~/.local/share/kforge` and equivalents), falling back to `./.kforge`.
fn resolve_data_dir() -> PathBuf {
    dirs::data_dir().map_or_else(|| PathBuf::from(".kforge"), |dir| dir.join(APP_NAME))
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Returns the default download cache.
pub fn default_download_cache() -> PathBuf {
    data_dir().join("downloads")
}

/// Returns the default root for build and package folders.
pub fn default_workspace_root() -> PathBuf {
    data_dir().join("packages")
}
