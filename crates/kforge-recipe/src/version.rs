//! Package versions and version ranges, parsed with `nom`.
//!
//! Versions are dot-separated numeric components with an optional
//! `-prerelease` tag (`1.2.11`, `10.42`, `3.2.4`). Ranges use the bracketed
//! comparator syntax of the recipe requirements: `[>=1.2.11 <2]`,
//! `[>=1.11.1]`, `[~2.5 || ^3]`. A bare version outside brackets is an
//! exact pin.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use kforge_common::error::{KforgeError, Result};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{all_consuming, map, map_res, opt, value},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, preceded},
};
use serde::{Deserialize, Serialize};

/// A package version.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    parts: Vec<u64>,
    pre: Option<String>,
}

impl Version {
    /// Creates a release version from numeric components.
    #[must_use]
    pub fn new(parts: &[u64]) -> Self {
        Self {
            parts: parts.to_vec(),
            pre: None,
        }
    }

    /// Numeric components.
    #[must_use]
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// Component `idx`, reading missing trailing components as zero.
    #[must_use]
    pub fn part(&self, idx: usize) -> u64 {
        self.parts.get(idx).copied().unwrap_or(0)
    }

    /// Major component.
    #[must_use]
    pub fn major(&self) -> u64 {
        self.part(0)
    }

    /// Returns the version with component `idx` incremented and every
    /// later component dropped (`1.2.3` bumped at 1 gives `1.3`).
    #[must_use]
    fn bumped(&self, idx: usize) -> Self {
        let mut parts: Vec<u64> = (0..=idx).map(|i| self.part(i)).collect();
        if let Some(last) = parts.last_mut() {
            *last += 1;
        }
        Self { parts, pre: None }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        let significant = self
            .parts
            .iter()
            .rposition(|p| *p != 0)
            .map_or(0, |idx| idx + 1);
        self.parts[..significant].hash(state);
        self.pre.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for idx in 0..len {
            match self.part(idx).cmp(&other.part(idx)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .parts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&joined)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = KforgeError;

    fn from_str(s: &str) -> Result<Self> {
        all_consuming(version)
            .parse(s.trim())
            .map(|(_, v)| v)
            .map_err(|e| KforgeError::Parse {
                what: "version",
                message: format!("\"{s}\": {e}"),
            })
    }
}

impl TryFrom<String> for Version {
    type Error = KforgeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

/// Comparison operator of a range comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `=` or no operator.
    Exact,
    /// `>`.
    Greater,
    /// `>=`.
    GreaterEq,
    /// `<`.
    Less,
    /// `<=`.
    LessEq,
    /// `~`: same components up to the minor (or major if only one given).
    Tilde,
    /// `^`: same major.
    Caret,
}

impl Op {
    const fn symbol(self) -> &'static str {
        match self {
            Self::Exact => "",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Tilde => "~",
            Self::Caret => "^",
        }
    }
}

/// One `op version` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    /// Operator.
    pub op: Op,
    /// Operand.
    pub version: Version,
}

impl Comparator {
    /// Returns `true` if `candidate` satisfies this term.
    #[must_use]
    pub fn matches(&self, candidate: &Version) -> bool {
        let v = &self.version;
        match self.op {
            Op::Exact => candidate == v,
            Op::Greater => candidate > v,
            Op::GreaterEq => candidate >= v,
            Op::Less => candidate < v,
            Op::LessEq => candidate <= v,
            Op::Tilde => {
                let idx = if v.parts.len() >= 2 { 1 } else { 0 };
                candidate >= v && *candidate < v.bumped(idx)
            }
            Op::Caret => candidate >= v && *candidate < v.bumped(0),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.version)
    }
}

/// A version constraint: a union of comparator conjunctions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    alternatives: Vec<Vec<Comparator>>,
    bracketed: bool,
}

impl VersionRange {
    /// A range pinning exactly one version.
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self {
            alternatives: vec![vec![Comparator {
                op: Op::Exact,
                version,
            }]],
            bracketed: false,
        }
    }

    /// A range accepting every release (`[>=0]`).
    #[must_use]
    pub fn any() -> Self {
        Self {
            alternatives: vec![vec![Comparator {
                op: Op::GreaterEq,
                version: Version::new(&[0]),
            }]],
            bracketed: true,
        }
    }

    /// Returns `true` if `candidate` satisfies any alternative.
    #[must_use]
    pub fn matches(&self, candidate: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|terms| terms.iter().all(|c| c.matches(candidate)))
    }

    /// Returns the highest candidate satisfying the range.
    pub fn best<'a>(&self, candidates: impl IntoIterator<Item = &'a Version>) -> Option<&'a Version> {
        candidates.into_iter().filter(|v| self.matches(v)).max()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self
            .alternatives
            .iter()
            .map(|terms| {
                terms
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join(" || ");
        if self.bracketed {
            write!(f, "[{body}]")
        } else {
            f.write_str(&body)
        }
    }
}

impl FromStr for VersionRange {
    type Err = KforgeError;

    fn from_str(s: &str) -> Result<Self> {
        all_consuming(delimited(multispace0, range, multispace0))
            .parse(s)
            .map(|(_, r)| r)
            .map_err(|e| KforgeError::Parse {
                what: "version range",
                message: format!("\"{s}\": {e}"),
            })
    }
}

fn number(input: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse::<u64>).parse(input)
}

fn prerelease(input: &str) -> IResult<&str, String> {
    map(
        preceded(
            char('-'),
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '.'),
        ),
        String::from,
    )
    .parse(input)
}

/// Parses `1.2.3[-pre]`.
fn version(input: &str) -> IResult<&str, Version> {
    let (input, parts) = separated_list1(char('.'), number).parse(input)?;
    let (input, pre) = opt(prerelease).parse(input)?;
    Ok((input, Version { parts, pre }))
}

fn op(input: &str) -> IResult<&str, Op> {
    alt((
        value(Op::GreaterEq, tag(">=")),
        value(Op::LessEq, tag("<=")),
        value(Op::Greater, tag(">")),
        value(Op::Less, tag("<")),
        value(Op::Exact, tag("=")),
        value(Op::Tilde, tag("~")),
        value(Op::Caret, tag("^")),
    ))
    .parse(input)
}

fn comparator(input: &str) -> IResult<&str, Comparator> {
    let (input, op) = opt(op).parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, version) = version.parse(input)?;
    Ok((
        input,
        Comparator {
            op: op.unwrap_or(Op::Exact),
            version,
        },
    ))
}

fn term_separator(input: &str) -> IResult<&str, ()> {
    alt((
        value((), delimited(multispace0, char(','), multispace0)),
        value((), multispace1),
    ))
    .parse(input)
}

fn conjunction(input: &str) -> IResult<&str, Vec<Comparator>> {
    separated_list1(term_separator, comparator).parse(input)
}

fn union_separator(input: &str) -> IResult<&str, ()> {
    value((), delimited(multispace0, tag("||"), multispace0)).parse(input)
}

fn bracketed(input: &str) -> IResult<&str, VersionRange> {
    let (input, alternatives) = delimited(
        (char('['), multispace0),
        separated_list0(union_separator, conjunction),
        (multispace0, char(']')),
    )
    .parse(input)?;
    Ok((
        input,
        VersionRange {
            alternatives,
            bracketed: true,
        },
    ))
}

fn range(input: &str) -> IResult<&str, VersionRange> {
    alt((bracketed, map(version, VersionRange::exact))).parse(input)
}
