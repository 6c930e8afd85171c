//! The recipe catalog, keyed by package name and version.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use kforge_common::error::{KforgeError, Result};

use crate::recipe::Recipe;
use crate::version::{Version, VersionRange};

/// Every known recipe, grouped by name and sorted by version.
#[derive(Default, Clone)]
pub struct RecipeIndex {
    recipes: BTreeMap<String, BTreeMap<Version, Arc<dyn Recipe>>>,
}

impl fmt::Debug for RecipeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.recipes
                    .iter()
                    .map(|(name, versions)| (name, versions.keys().collect::<Vec<_>>())),
            )
            .finish()
    }
}

impl RecipeIndex {
    /// An empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in recipe has an inconsistent schema.
    pub fn builtin() -> Result<Self> {
        let mut index = Self::new();
        for recipe in crate::recipes::all() {
            index.register(recipe)?;
        }
        Ok(index)
    }

    /// Adds a recipe after checking its schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is invalid or the same
    /// `name/version` is already registered.
    pub fn register(&mut self, recipe: Arc<dyn Recipe>) -> Result<()> {
        let desc = recipe.descriptor();
        desc.validate_schema()?;
        let versions = self.recipes.entry(desc.name.clone()).or_default();
        if versions.contains_key(&desc.version) {
            return Err(KforgeError::configuration(format!(
                "recipe {} is registered twice",
                desc.reference()
            )));
        }
        tracing::debug!(recipe = %desc.reference(), "registered recipe");
        let _ = versions.insert(desc.version.clone(), recipe);
        Ok(())
    }

    /// The highest version of `name` satisfying `range`.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Configuration` if the package is unknown or no
    /// version satisfies the range.
    pub fn get(&self, name: &str, range: &VersionRange) -> Result<Arc<dyn Recipe>> {
        let versions = self.versions_of(name)?;
        versions
            .iter()
            .rev()
            .find(|(v, _)| range.matches(v))
            .map(|(_, r)| Arc::clone(r))
            .ok_or_else(|| {
                KforgeError::configuration(format!(
                    "no version of {name} satisfies {range} (available: {})",
                    versions
                        .keys()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    /// The highest registered version of `name`.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Configuration` if the package is unknown.
    pub fn latest(&self, name: &str) -> Result<Arc<dyn Recipe>> {
        self.get(name, &VersionRange::any())
    }

    /// Registered versions of `name`, ascending.
    #[must_use]
    pub fn versions(&self, name: &str) -> Vec<&Version> {
        self.recipes
            .get(name)
            .map(|v| v.keys().collect())
            .unwrap_or_default()
    }

    /// Every recipe, by name then version.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Recipe>> {
        self.recipes.values().flat_map(BTreeMap::values)
    }

    /// Number of registered recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    fn versions_of(&self, name: &str) -> Result<&BTreeMap<Version, Arc<dyn Recipe>>> {
        self.recipes
            .get(name)
            .ok_or_else(|| KforgeError::configuration(format!("unknown package \"{name}\"")))
    }
}
