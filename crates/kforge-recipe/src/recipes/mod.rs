//! Built-in recipes and the helpers they share.

pub mod cmake;
pub mod cppunit;
pub mod expat;
pub mod log4cplus;
pub mod openssl;
pub mod pcre2;
pub mod poco;
pub mod qt;
pub mod sentry;
pub mod xxhash;
pub mod zlib;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use kforge_common::error::{KforgeError, Result};
use serde::Deserialize;

use crate::plan::{Step, ToolInvocation};
use crate::recipe::Recipe;

/// Every built-in recipe.
#[must_use]
pub fn all() -> Vec<Arc<dyn Recipe>> {
    vec![
        Arc::new(cppunit::Cppunit::new()),
        Arc::new(expat::Expat::new()),
        Arc::new(log4cplus::Log4cplus::new()),
        Arc::new(openssl::Openssl::new()),
        Arc::new(pcre2::Pcre2::new()),
        Arc::new(poco::Poco::new()),
        Arc::new(qt::Qt::new()),
        Arc::new(sentry::Sentry::new()),
        Arc::new(xxhash::XxHash::new()),
        Arc::new(zlib::Zlib::new()),
    ]
}

/// Where a package version's sources come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Source {
    /// A `.tar.gz` archive.
    Archive {
        /// Download URL.
        url: String,
        /// Published checksum, if known.
        #[serde(default)]
        sha256: Option<String>,
    },
    /// A git tag.
    Git {
        /// Repository URL.
        git: String,
        /// Tag or branch to check out.
        tag: String,
        /// Whether submodules are needed.
        #[serde(default)]
        submodules: bool,
    },
}

type SourceTable = BTreeMap<String, BTreeMap<String, Source>>;

static SOURCES: OnceLock<std::result::Result<SourceTable, String>> = OnceLock::new();

fn source_table() -> Result<&'static SourceTable> {
    SOURCES
        .get_or_init(|| {
            serde_yaml::from_str(include_str!("sources.yml")).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|message| KforgeError::Parse {
            what: "source table",
            message: message.clone(),
        })
}

/// Looks up the sources of `name/version`.
///
/// # Errors
///
/// Returns `KforgeError::Configuration` if no source is recorded.
pub fn source(name: &str, version: &str) -> Result<&'static Source> {
    source_table()?
        .get(name)
        .and_then(|versions| versions.get(version))
        .ok_or_else(|| KforgeError::configuration(format!("no sources recorded for {name}/{version}")))
}

/// Steps that place the sources of `name/version` into `dest`.
///
/// # Errors
///
/// Returns an error if no source is recorded.
pub fn source_steps(name: &str, version: &str, dest: &Path) -> Result<Vec<Step>> {
    Ok(match source(name, version)? {
        Source::Archive { url, sha256 } => vec![Step::Fetch {
            url: url.clone(),
            sha256: sha256.clone(),
            dest: dest.to_path_buf(),
            strip_root: true,
        }],
        Source::Git {
            git,
            tag,
            submodules,
        } => {
            let mut clone = ToolInvocation::new("git")
                .args(["clone", "--depth", "1", "--branch", tag.as_str()]);
            if *submodules {
                clone = clone.args(["--recurse-submodules", "--shallow-submodules"]);
            }
            vec![
                Step::Remove {
                    path: dest.to_path_buf(),
                },
                Step::Run(clone.arg(git.as_str()).arg(path_arg(dest))),
            ]
        }
    })
}

/// A path as a command-line argument, with forward slashes.
#[must_use]
pub fn path_arg(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Copies `file_name` from the source folder into `licenses/`.
#[must_use]
pub fn copy_license(source_dir: &Path, package_dir: &Path, file_name: &str) -> Step {
    Step::Copy {
        from: source_dir.to_path_buf(),
        to: package_dir.join("licenses"),
        pattern: file_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_recipe_has_sources_except_installers() {
        for recipe in all() {
            let desc = recipe.descriptor();
            if desc.build_system == crate::descriptor::BuildSystem::Installer {
                continue;
            }
            assert!(
                source(&desc.name, &desc.version.to_string()).is_ok(),
                "no sources for {}",
                desc.reference()
            );
        }
    }

    #[test]
    fn archive_source_becomes_fetch() {
        let steps = source_steps("zlib", "1.3.1", Path::new("/src")).expect("steps");
        assert!(matches!(
            &steps[..],
            [Step::Fetch { sha256: Some(_), strip_root: true, .. }]
        ));
    }

    #[test]
    fn git_source_becomes_clone() {
        let steps = source_steps("sentry", "0.7.17", Path::new("/src")).expect("steps");
        let Some(Step::Run(clone)) = steps.last() else {
            panic!("expected a clone invocation, got {steps:?}");
        };
        assert_eq!(clone.program, "git");
        assert!(clone.args.contains(&"--recurse-submodules".to_string()));
        assert!(clone.args.contains(&"0.7.17".to_string()));
    }

    #[test]
    fn unknown_source_is_an_error() {
        assert!(source("zlib", "0.1").is_err());
    }
}
