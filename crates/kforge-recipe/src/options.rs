//! Option schemas and validated option values.
//!
//! A recipe declares each option once, with its allowed values and default.
//! Values coming from profiles, the CLI, or a consumer's forwarded options
//! are checked against that schema exactly once, at resolution time.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use kforge_common::error::{KforgeError, Result};
use serde::{Deserialize, Serialize};

/// A single option value: a boolean flag or a string choice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean flag.
    Bool(bool),
    /// String choice.
    Str(String),
}

impl OptionValue {
    /// Returns the boolean value, if this is a flag.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Str(_) => None,
        }
    }

    /// Returns the string value, if this is a choice.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Bool(_) => None,
            Self::Str(s) => Some(s),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl FromStr for OptionValue {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" => Self::Bool(true),
            "false" | "off" | "no" => Self::Bool(false),
            _ => Self::Str(s.to_string()),
        })
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// Declaration of one option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionSpec {
    /// Option name.
    pub name: String,
    /// Every value the option may take.
    pub allowed: Vec<OptionValue>,
    /// Value used when nothing overrides it.
    pub default: OptionValue,
}

impl OptionSpec {
    /// Declares an option with an explicit allowed set.
    #[must_use]
    pub fn new(name: impl Into<String>, allowed: Vec<OptionValue>, default: OptionValue) -> Self {
        Self {
            name: name.into(),
            allowed,
            default,
        }
    }

    /// Declares a `[True, False]` option.
    #[must_use]
    pub fn flag(name: impl Into<String>, default: bool) -> Self {
        Self::new(
            name,
            vec![OptionValue::Bool(true), OptionValue::Bool(false)],
            OptionValue::Bool(default),
        )
    }

    /// Declares a string-choice option.
    #[must_use]
    pub fn choice(name: impl Into<String>, allowed: &[&str], default: &str) -> Self {
        Self::new(
            name,
            allowed.iter().map(|v| OptionValue::from(*v)).collect(),
            OptionValue::from(default),
        )
    }

    /// Returns `true` if `value` is in the allowed set.
    #[must_use]
    pub fn allows(&self, value: &OptionValue) -> bool {
        self.allowed.contains(value)
    }

    fn allowed_list(&self) -> String {
        self.allowed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Ordered collection of option declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptionSchema {
    specs: Vec<OptionSpec>,
}

impl OptionSchema {
    /// Creates a schema from declarations, in order.
    #[must_use]
    pub const fn new(specs: Vec<OptionSpec>) -> Self {
        Self { specs }
    }

    /// Appends a declaration.
    pub fn push(&mut self, spec: OptionSpec) {
        self.specs.push(spec);
    }

    /// Looks up a declaration by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Returns `true` if the schema declares `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates declarations in order.
    pub fn iter(&self) -> impl Iterator<Item = &OptionSpec> {
        self.specs.iter()
    }

    /// Checks the schema itself: unique names, non-empty allowed sets,
    /// defaults inside their allowed set.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Configuration` naming the first broken option.
    pub fn validate(&self, package: &str) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for spec in &self.specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(KforgeError::configuration(format!(
                    "{package}: option \"{}\" is declared twice",
                    spec.name
                )));
            }
            if spec.allowed.is_empty() {
                return Err(KforgeError::configuration(format!(
                    "{package}: option \"{}\" has no allowed values",
                    spec.name
                )));
            }
            if !spec.allows(&spec.default) {
                return Err(KforgeError::configuration(format!(
                    "{package}: default \"{}\" of option \"{}\" is not one of [{}]",
                    spec.default,
                    spec.name,
                    spec.allowed_list()
                )));
            }
        }
        Ok(())
    }

    /// Builds the validated option values for one resolution.
    ///
    /// `removed` lists options that do not exist on the current platform;
    /// overrides naming them are ignored. Overrides naming options the
    /// schema does not declare at all are rejected.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Configuration` for unknown options or values
    /// outside the allowed set.
    pub fn instantiate(
        &self,
        package: &str,
        removed: &[&str],
        overrides: &BTreeMap<String, OptionValue>,
    ) -> Result<OptionValues> {
        let mut values = BTreeMap::new();
        for spec in &self.specs {
            if removed.contains(&spec.name.as_str()) {
                continue;
            }
            let _ = values.insert(spec.name.clone(), spec.default.clone());
        }

        for (name, value) in overrides {
            let Some(spec) = self.get(name) else {
                return Err(KforgeError::configuration(format!(
                    "{package}: unknown option \"{name}\""
                )));
            };
            if removed.contains(&name.as_str()) {
                tracing::debug!(package, option = %name, "ignoring option removed on this platform");
                continue;
            }
            if !spec.allows(value) {
                return Err(KforgeError::configuration(format!(
                    "{package}: invalid value \"{value}\" for option \"{name}\", expected one of [{}]",
                    spec.allowed_list()
                )));
            }
            let _ = values.insert(name.clone(), value.clone());
        }

        Ok(OptionValues { values })
    }
}

/// Option values of one resolved package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionValues {
    values: BTreeMap<String, OptionValue>,
}

impl OptionValues {
    /// Returns a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Returns a flag's value; absent or non-boolean options read as `false`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(OptionValue::as_bool).unwrap_or(false)
    }

    /// Returns a choice's value.
    #[must_use]
    pub fn choice(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(OptionValue::as_str)
    }

    /// Returns `true` if the option exists on this platform.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Sets a value. Used by recipes for documented overrides only.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) {
        let _ = self.values.insert(name.into(), value.into());
    }

    /// Removes an option that does not apply to this configuration.
    pub fn remove(&mut self, name: &str) {
        let _ = self.values.remove(name);
    }

    /// Iterates values sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> OptionSchema {
        OptionSchema::new(vec![
            OptionSpec::flag("shared", true),
            OptionSpec::flag("fPIC", true),
            OptionSpec::choice("qt_login_type", &["ini", "envvars", "cli"], "ini"),
        ])
    }

    #[test]
    fn default_outside_allowed_set_is_rejected() {
        let bad = OptionSchema::new(vec![OptionSpec::choice("mode", &["a", "b"], "c")]);
        let err = bad.validate("pkg").unwrap_err();
        assert!(err.to_string().contains("default \"c\""), "got: {err}");
    }

    #[test]
    fn duplicate_option_is_rejected() {
        let bad = OptionSchema::new(vec![
            OptionSpec::flag("shared", true),
            OptionSpec::flag("shared", false),
        ]);
        assert!(bad.validate("pkg").is_err());
    }

    #[test]
    fn instantiate_applies_defaults_and_overrides() {
        let mut overrides = BTreeMap::new();
        let _ = overrides.insert("qt_login_type".to_string(), OptionValue::from("envvars"));
        let values = schema().instantiate("pkg", &[], &overrides).unwrap();
        assert!(values.flag("shared"));
        assert_eq!(values.choice("qt_login_type"), Some("envvars"));
    }

    #[test]
    fn unknown_option_is_rejected() {
        let mut overrides = BTreeMap::new();
        let _ = overrides.insert("with_ssl".to_string(), OptionValue::Bool(true));
        let err = schema().instantiate("pkg", &[], &overrides).unwrap_err();
        assert!(err.to_string().contains("unknown option \"with_ssl\""), "got: {err}");
    }

    #[test]
    fn value_outside_allowed_set_is_rejected() {
        let mut overrides = BTreeMap::new();
        let _ = overrides.insert("qt_login_type".to_string(), OptionValue::from("oauth"));
        let err = schema().instantiate("pkg", &[], &overrides).unwrap_err();
        assert!(err.to_string().contains("ini, envvars, cli"), "got: {err}");
    }

    #[test]
    fn removed_option_is_absent_and_overrides_ignored() {
        let mut overrides = BTreeMap::new();
        let _ = overrides.insert("fPIC".to_string(), OptionValue::Bool(false));
        let values = schema().instantiate("pkg", &["fPIC"], &overrides).unwrap();
        assert!(!values.contains("fPIC"));
    }

    #[test]
    fn option_value_parses_loosely() {
        assert_eq!("True".parse::<OptionValue>().unwrap(), OptionValue::Bool(true));
        assert_eq!("off".parse::<OptionValue>().unwrap(), OptionValue::Bool(false));
        assert_eq!(
            "deprecated".parse::<OptionValue>().unwrap(),
            OptionValue::from("deprecated")
        );
    }
}
