//! Release version and date arguments.
//!
//! A release version must start with one to three dot-separated numeric
//! components, the last of which may be `*` (`3`, `3.6`, `3.6.0`, `3.*`).
//! Only the prefix is checked; a suffix such as `-beta1` is kept verbatim
//! and ends up in the generated file names.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use kforge_common::error::{KforgeError, Result};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::recognize,
    sequence::terminated,
};

/// A validated release version, kept exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseVersion(String);

impl ReleaseVersion {
    /// The version as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base name of every release-notes file of this version
    /// (`kDrive-3.6.0`).
    #[must_use]
    pub fn notes_stem(&self) -> String {
        format!("{}-{}", kforge_common::constants::RELEASE_PRODUCT, self.0)
    }
}

fn segment(input: &str) -> IResult<&str, &str> {
    recognize(terminated(digit1, char('.'))).parse(input)
}

fn last(input: &str) -> IResult<&str, &str> {
    alt((tag("*"), digit1)).parse(input)
}

/// Matches the leading `MAJOR.MINOR.PATCH`-like part of `input`.
fn version_prefix(input: &str) -> IResult<&str, &str> {
    alt((
        recognize((segment, segment, last)),
        recognize((segment, last)),
        last,
    ))
    .parse(input)
}

impl FromStr for ReleaseVersion {
    type Err = KforgeError;

    fn from_str(s: &str) -> Result<Self> {
        match version_prefix(s) {
            Ok(_) => Ok(Self(s.to_string())),
            Err(_) => Err(KforgeError::Parse {
                what: "release version",
                message: format!("invalid version \"{s}\" (expected e.g. 3.6.0)"),
            }),
        }
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses a `YYYY-MM-DD` release date.
///
/// # Errors
///
/// Returns `KforgeError::Parse` for anything else.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| KforgeError::Parse {
        what: "release date",
        message: format!("\"{s}\": {e} (expected YYYY-MM-DD)"),
    })
}
