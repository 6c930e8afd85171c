//! Dependency edges declared by recipes.

use std::collections::BTreeMap;
use std::fmt;

use kforge_common::error::{KforgeError, Result};
use serde::Serialize;

use crate::options::OptionValue;
use crate::version::VersionRange;

/// Whether a dependency is linked into the package or only run at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequirementKind {
    /// Library consumed by the package.
    Host,
    /// Tool executed while building (`ninja`, `automake`).
    Tool,
}

/// One edge `consumer -> name/range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    /// Dependency package name.
    pub name: String,
    /// Accepted versions.
    #[serde(serialize_with = "serialize_display")]
    pub range: VersionRange,
    /// Options forced onto this dependency. They apply to the named direct
    /// dependency only.
    pub options: BTreeMap<String, OptionValue>,
    /// Whether the dependency's headers are visible to the consumer's consumers.
    pub transitive_headers: bool,
    /// Host or tool requirement.
    pub kind: RequirementKind,
}

fn serialize_display<S: serde::Serializer>(
    range: &VersionRange,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(range)
}

impl Requirement {
    /// Parses a `name/range` reference (`zlib/[>=1.2.11 <2]`, `openssl/3.2.4`).
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Parse` if the reference has no `/` or the range
    /// is malformed.
    pub fn parse(reference: &str, kind: RequirementKind) -> Result<Self> {
        let Some((name, range)) = reference.split_once('/') else {
            return Err(KforgeError::Parse {
                what: "requirement",
                message: format!("\"{reference}\" is not of the form name/version"),
            });
        };
        Ok(Self {
            name: name.trim().to_string(),
            range: range.parse()?,
            options: BTreeMap::new(),
            transitive_headers: false,
            kind,
        })
    }

    /// Parses a host requirement.
    ///
    /// # Errors
    ///
    /// See [`Requirement::parse`].
    pub fn host(reference: &str) -> Result<Self> {
        Self::parse(reference, RequirementKind::Host)
    }

    /// Parses a tool requirement.
    ///
    /// # Errors
    ///
    /// See [`Requirement::parse`].
    pub fn tool(reference: &str) -> Result<Self> {
        Self::parse(reference, RequirementKind::Tool)
    }

    /// Forces an option on the dependency.
    #[must_use]
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        let _ = self.options.insert(name.into(), value.into());
        self
    }

    /// Marks headers as transitively visible.
    #[must_use]
    pub const fn transitive_headers(mut self) -> Self {
        self.transitive_headers = true;
        self
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    #[test]
    fn parse_bracketed_range() {
        let req = Requirement::host("zlib/[>=1.2.11 <2]").expect("parse");
        assert_eq!(req.name, "zlib");
        assert!(req.range.matches(&Version::new(&[1, 3, 1])));
        assert!(!req.range.matches(&Version::new(&[2, 0])));
        assert_eq!(req.to_string(), "zlib/[>=1.2.11 <2]");
    }

    #[test]
    fn parse_exact_pin() {
        let req = Requirement::host("openssl/3.2.4").expect("parse");
        assert!(req.range.matches(&Version::new(&[3, 2, 4])));
        assert!(!req.range.matches(&Version::new(&[3, 2, 5])));
    }

    #[test]
    fn missing_slash_is_rejected() {
        assert!(Requirement::tool("ninja").is_err());
    }

    #[test]
    fn forwarded_options_are_kept() {
        let req = Requirement::host("zlib/[>=1.2.11 <2]")
            .expect("parse")
            .with_option("shared", false)
            .transitive_headers();
        assert_eq!(req.options.get("shared"), Some(&OptionValue::Bool(false)));
        assert!(req.transitive_headers);
    }
}
