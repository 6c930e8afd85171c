//! Consumption manifests: what a consumer needs to link against a package.
//!
//! A manifest is produced once after a successful install and serialized to
//! `kforge-manifest.json` next to the installed files. Components form a DAG;
//! a requirement without `::` names another component of the same package,
//! `pkg::comp` names a component of a dependency.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use kforge_common::constants::MANIFEST_FILE_NAME;
use kforge_common::error::{KforgeError, Result};
use serde::{Deserialize, Serialize};

/// Manifests of already-built dependencies, by package name.
pub type DependencyManifests = BTreeMap<String, ConsumptionManifest>;

/// One linkable unit of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
    /// Library names, without prefix or extension.
    pub libs: Vec<String>,
    /// Include directories, relative to the package folder.
    pub include_dirs: Vec<String>,
    /// Library directories, relative to the package folder.
    pub lib_dirs: Vec<String>,
    /// Runtime binary directories, relative to the package folder.
    pub bin_dirs: Vec<String>,
    /// Compile definitions consumers must set.
    pub defines: Vec<String>,
    /// System libraries to link.
    pub system_libs: Vec<String>,
    /// Apple frameworks to link.
    pub frameworks: Vec<String>,
    /// Extra linker flags.
    pub link_flags: Vec<String>,
    /// Internal (`comp`) or external (`pkg::comp`) requirements.
    pub requires: Vec<String>,
    /// Generator properties (`cmake_target_name`, `pkg_config_name`).
    pub properties: BTreeMap<String, String>,
}

impl Default for Component {
    fn default() -> Self {
        Self {
            libs: Vec::new(),
            include_dirs: vec!["include".to_string()],
            lib_dirs: vec!["lib".to_string()],
            bin_dirs: vec!["bin".to_string()],
            defines: Vec::new(),
            system_libs: Vec::new(),
            frameworks: Vec::new(),
            link_flags: Vec::new(),
            requires: Vec::new(),
            properties: BTreeMap::new(),
        }
    }
}

impl Component {
    /// A component linking the given libraries, with default folders.
    #[must_use]
    pub fn with_libs<I, S>(libs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            libs: libs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Adds a requirement.
    #[must_use]
    pub fn requires(mut self, name: impl Into<String>) -> Self {
        self.requires.push(name.into());
        self
    }

    /// Sets a generator property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.properties.insert(key.into(), value.into());
        self
    }

    fn internal_requires(&self) -> impl Iterator<Item = &str> {
        self.requires
            .iter()
            .map(String::as_str)
            .filter(|r| !r.contains("::"))
    }
}

/// Consumption metadata of one installed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionManifest {
    /// Package name.
    pub package: String,
    /// Package version.
    pub version: String,
    /// Install folder the relative paths are based on.
    pub package_folder: PathBuf,
    /// Architectures contained in the binaries (two for universal builds).
    pub architectures: Vec<String>,
    /// Package-level generator properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Components by name.
    pub components: BTreeMap<String, Component>,
    /// Environment variables consumers must set at runtime.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// CMake modules consumers must include, relative to the package folder.
    #[serde(default)]
    pub build_modules: Vec<String>,
}

impl ConsumptionManifest {
    /// Starts an empty manifest.
    #[must_use]
    pub fn new(
        package: impl Into<String>,
        version: impl Into<String>,
        package_folder: impl Into<PathBuf>,
        architectures: Vec<String>,
    ) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            package_folder: package_folder.into(),
            architectures,
            properties: BTreeMap::new(),
            components: BTreeMap::new(),
            env: BTreeMap::new(),
            build_modules: Vec::new(),
        }
    }

    /// Adds or replaces a component.
    pub fn add_component(&mut self, name: impl Into<String>, component: Component) {
        let _ = self.components.insert(name.into(), component);
    }

    /// Mutable access to a component, if present.
    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.get_mut(name)
    }

    /// Sets a package-level property.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.properties.insert(key.into(), value.into());
    }

    /// Checks component references and acyclicity.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Configuration` on an unknown internal
    /// reference, a malformed `pkg::comp` reference, or a cycle.
    pub fn validate(&self) -> Result<()> {
        for (name, component) in &self.components {
            for req in &component.requires {
                if let Some((pkg, comp)) = req.split_once("::") {
                    if pkg.is_empty() || comp.is_empty() {
                        return Err(KforgeError::configuration(format!(
                            "{}: component \"{name}\" has malformed requirement \"{req}\"",
                            self.package
                        )));
                    }
                } else if !self.components.contains_key(req) {
                    return Err(KforgeError::configuration(format!(
                        "{}: component \"{name}\" requires unknown component \"{req}\"",
                        self.package
                    )));
                }
            }
        }
        let _ = self.topological()?;
        Ok(())
    }

    /// Components ordered dependencies-first.
    fn topological(&self) -> Result<Vec<&str>> {
        let mut graph = petgraph::Graph::<&str, ()>::new();
        let mut nodes = HashMap::new();
        for name in self.components.keys() {
            let _ = nodes.insert(name.as_str(), graph.add_node(name.as_str()));
        }
        for (name, component) in &self.components {
            for req in component.internal_requires() {
                if let (Some(&from), Some(&to)) = (nodes.get(req), nodes.get(name.as_str())) {
                    let _ = graph.add_edge(from, to, ());
                }
            }
        }
        petgraph::algo::toposort(&graph, None)
            .map(|order| order.into_iter().map(|idx| graph[idx]).collect())
            .map_err(|cycle| {
                KforgeError::configuration(format!(
                    "{}: cyclic component requirements involving \"{}\"",
                    self.package, graph[cycle.node_id()]
                ))
            })
    }

    /// The requested components plus everything they require internally.
    ///
    /// # Errors
    ///
    /// Returns an error if a requested component does not exist.
    pub fn closure(&self, names: &[&str]) -> Result<BTreeSet<String>> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = names.to_vec();
        while let Some(name) = stack.pop() {
            let Some(component) = self.components.get(name) else {
                return Err(KforgeError::configuration(format!(
                    "{}: unknown component \"{name}\"",
                    self.package
                )));
            };
            if seen.insert(name.to_string()) {
                stack.extend(component.internal_requires());
            }
        }
        Ok(seen)
    }

    /// Libraries of all components in link order (dependents before their
    /// dependencies).
    ///
    /// # Errors
    ///
    /// Returns an error if the component graph is cyclic.
    pub fn link_order(&self) -> Result<Vec<String>> {
        let order = self.topological()?;
        Ok(order
            .into_iter()
            .rev()
            .filter_map(|name| self.components.get(name))
            .flat_map(|c| c.libs.iter().cloned())
            .collect())
    }

    /// Every define of every component, deduplicated and sorted.
    #[must_use]
    pub fn all_defines(&self) -> BTreeSet<&str> {
        self.components
            .values()
            .flat_map(|c| c.defines.iter().map(String::as_str))
            .collect()
    }

    /// Every system library of every component, deduplicated and sorted.
    #[must_use]
    pub fn all_system_libs(&self) -> BTreeSet<&str> {
        self.components
            .values()
            .flat_map(|c| c.system_libs.iter().map(String::as_str))
            .collect()
    }

    /// Writes the manifest into `dir` and returns the file path.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| KforgeError::io(&path, e))?;
        tracing::debug!(path = %path.display(), "wrote consumption manifest");
        Ok(path)
    }

    /// Reads a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| KforgeError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openssl_like() -> ConsumptionManifest {
        let mut m = ConsumptionManifest::new("openssl", "3.2.4", "/pkg", vec!["x86_64".into()]);
        m.add_component("crypto", Component::with_libs(["crypto"]));
        m.add_component(
            "ssl",
            Component::with_libs(["ssl"]).requires("crypto").requires("zlib::zlib"),
        );
        m
    }

    #[test]
    fn valid_dag_passes() {
        openssl_like().validate().expect("valid");
    }

    #[test]
    fn unknown_internal_reference_is_rejected() {
        let mut m = openssl_like();
        m.add_component("apps", Component::default().requires("tls"));
        let err = m.validate().unwrap_err();
        assert!(err.to_string().contains("unknown component \"tls\""), "got: {err}");
    }

    #[test]
    fn cycle_is_rejected() {
        let mut m = ConsumptionManifest::new("p", "1", "/pkg", vec![]);
        m.add_component("a", Component::default().requires("b"));
        m.add_component("b", Component::default().requires("a"));
        let err = m.validate().unwrap_err();
        assert!(err.to_string().contains("cyclic"), "got: {err}");
    }

    #[test]
    fn closure_follows_internal_requires_only() {
        let closure = openssl_like().closure(&["ssl"]).expect("closure");
        assert_eq!(
            closure.into_iter().collect::<Vec<_>>(),
            vec!["crypto".to_string(), "ssl".to_string()]
        );
    }

    #[test]
    fn link_order_puts_dependents_first() {
        assert_eq!(openssl_like().link_order().expect("order"), vec!["ssl", "crypto"]);
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = openssl_like();
        let path = manifest.write_to(dir.path()).expect("write");
        assert!(path.ends_with("kforge-manifest.json"));
        assert_eq!(ConsumptionManifest::read(&path).expect("read"), manifest);
    }
}
