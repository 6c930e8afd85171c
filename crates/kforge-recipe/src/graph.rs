//! Dependency graph expansion and build ordering using `petgraph`.
//!
//! Starting from the root requirements, every host requirement is resolved
//! against the catalog. Options forwarded by a consumer change how the
//! dependency resolves, which may in turn change the dependency's own
//! requirements, so expansion repeats until forwarded options and version
//! constraints stop changing.
//!
//! When consumers forward different values for the same option, the
//! consumer closest to the roots wins; disagreement at the same depth is a
//! configuration error.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use kforge_common::error::{KforgeError, Result};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::host::HostContext;
use crate::options::OptionValue;
use crate::profile::Profile;
use crate::recipe::Recipe;
use crate::requirement::{Requirement, RequirementKind};
use crate::resolver::{ResolvedConfig, resolve};
use crate::version::VersionRange;

/// A resolved package inside the graph.
#[derive(Clone)]
pub struct GraphNode {
    /// The recipe that was selected.
    pub recipe: Arc<dyn Recipe>,
    /// Its resolved configuration.
    pub config: ResolvedConfig,
    /// Its declared host and tool requirements.
    pub requirements: Vec<Requirement>,
}

impl std::fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphNode")
            .field("config", &self.config)
            .field("requirements", &self.requirements)
            .finish_non_exhaustive()
    }
}

/// Value forwarded onto a dependency option, with the consumer that set it
/// and that consumer's distance from the roots.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Forwarded {
    value: OptionValue,
    consumer: String,
    depth: usize,
}

type ForwardMap = BTreeMap<String, BTreeMap<String, Forwarded>>;
type ConstraintMap = BTreeMap<String, Vec<(String, VersionRange)>>;

/// Upper bound on expansion passes before giving up.
const MAX_PASSES: usize = 32;

/// The resolved package graph.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
    nodes: BTreeMap<String, GraphNode>,
}

impl DependencyGraph {
    /// Expands `roots` against `index` under `profile`.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Configuration` when a package cannot be
    /// resolved, a forwarded option is unknown to its target, two consumers
    /// at the same depth forward conflicting values, no catalog version
    /// satisfies every range, or the graph is cyclic.
    pub fn expand(
        index: &crate::index::RecipeIndex,
        profile: &Profile,
        roots: &[Requirement],
        host: &HostContext,
    ) -> Result<Self> {
        let mut forwarded = ForwardMap::new();
        let mut constraints = ConstraintMap::new();

        for pass in 1..=MAX_PASSES {
            tracing::debug!(pass, "expanding dependency graph");
            let outcome = expand_pass(index, profile, roots, host, &forwarded, &constraints)?;
            if outcome.forwarded == forwarded && outcome.constraints == constraints {
                let graph = Self::from_nodes(outcome.nodes)?;
                tracing::info!(packages = graph.nodes.len(), passes = pass, "dependency graph resolved");
                return Ok(graph);
            }
            forwarded = outcome.forwarded;
            constraints = outcome.constraints;
        }
        Err(KforgeError::configuration(format!(
            "dependency graph did not converge after {MAX_PASSES} passes"
        )))
    }

    fn from_nodes(nodes: BTreeMap<String, GraphNode>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();
        for name in nodes.keys() {
            let _ = indices.insert(name.clone(), graph.add_node(name.clone()));
        }
        for (name, node) in &nodes {
            for req in host_requirements(&node.requirements) {
                if let (Some(&dep), Some(&consumer)) = (indices.get(&req.name), indices.get(name)) {
                    // Edges point from dependency to dependent.
                    let _ = graph.update_edge(dep, consumer, ());
                }
            }
        }
        let built = Self {
            graph,
            indices,
            nodes,
        };
        let _ = built.build_order()?;
        Ok(built)
    }

    /// Resolved packages by name.
    #[must_use]
    pub const fn nodes(&self) -> &BTreeMap<String, GraphNode> {
        &self.nodes
    }

    /// One resolved package.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    /// Direct host dependencies of `name`, sorted.
    #[must_use]
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut deps: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].as_str())
            .collect();
        deps.sort_unstable();
        deps
    }

    /// Packages in build order: dependencies first, ties broken by name.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Configuration` if the graph is cyclic.
    pub fn build_order(&self) -> Result<Vec<&str>> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| (n, self.graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();
        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| self.graph[*n].as_str())
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(name) = ready.pop_first() {
            order.push(name);
            let idx = self.indices[name];
            for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        let _ = ready.insert(self.graph[dependent].as_str());
                    }
                }
            }
        }

        if order.len() == self.graph.node_count() {
            Ok(order)
        } else {
            let stuck: Vec<&str> = self
                .nodes
                .keys()
                .map(String::as_str)
                .filter(|n| !order.contains(n))
                .collect();
            Err(KforgeError::configuration(format!(
                "cyclic dependency detected between: {}",
                stuck.join(", ")
            )))
        }
    }
}

struct PassOutcome {
    nodes: BTreeMap<String, GraphNode>,
    forwarded: ForwardMap,
    constraints: ConstraintMap,
}

fn host_requirements(reqs: &[Requirement]) -> impl Iterator<Item = &Requirement> {
    reqs.iter().filter(|r| r.kind == RequirementKind::Host)
}

fn expand_pass(
    index: &crate::index::RecipeIndex,
    profile: &Profile,
    roots: &[Requirement],
    host: &HostContext,
    forwarded: &ForwardMap,
    constraints: &ConstraintMap,
) -> Result<PassOutcome> {
    let mut nodes = BTreeMap::new();
    let mut next_forwarded = ForwardMap::new();
    let mut next_constraints = ConstraintMap::new();
    let mut queue: VecDeque<(String, String, VersionRange, usize)> = roots
        .iter()
        .map(|r| ("<root>".to_string(), r.name.clone(), r.range.clone(), 0))
        .collect();
    for root in roots {
        record_forwarded(&mut next_forwarded, "<root>", 0, root)?;
    }

    while let Some((consumer, name, range, depth)) = queue.pop_front() {
        next_constraints
            .entry(name.clone())
            .or_default()
            .push((consumer, range));
        if nodes.contains_key(&name) {
            continue;
        }

        let recipe = select_version(index, &name, constraints.get(&name), &next_constraints[&name])?;
        let desc = recipe.descriptor();

        let mut overrides = profile.options_for(&name, &desc.options);
        if let Some(forced) = forwarded.get(&name) {
            for (option, fwd) in forced {
                if !desc.options.contains(option) {
                    return Err(KforgeError::configuration(format!(
                        "{} forwards unknown option \"{option}\" to {}",
                        fwd.consumer,
                        desc.reference()
                    )));
                }
                if profile.overrides(&name, option) {
                    tracing::warn!(
                        package = %name,
                        option = %option,
                        consumer = %fwd.consumer,
                        "profile value wins over forwarded option"
                    );
                    continue;
                }
                let _ = overrides.insert(option.clone(), fwd.value.clone());
            }
        }

        let config = resolve(recipe.as_ref(), &profile.settings, &overrides, host)?;
        let mut requirements = recipe.requirements(&config)?;
        requirements.extend(recipe.build_requirements(&config)?);

        for req in host_requirements(&requirements) {
            record_forwarded(&mut next_forwarded, &name, depth + 1, req)?;
            queue.push_back((name.clone(), req.name.clone(), req.range.clone(), depth + 1));
        }

        let _ = nodes.insert(
            name,
            GraphNode {
                recipe,
                config,
                requirements,
            },
        );
    }

    Ok(PassOutcome {
        nodes,
        forwarded: next_forwarded,
        constraints: next_constraints,
    })
}

fn record_forwarded(
    map: &mut ForwardMap,
    consumer: &str,
    depth: usize,
    req: &Requirement,
) -> Result<()> {
    let target = map.entry(req.name.clone()).or_default();
    for (option, value) in &req.options {
        match target.get(option) {
            Some(existing) if existing.value == *value => {}
            Some(existing) if existing.depth < depth => {
                tracing::warn!(
                    package = %req.name,
                    option = %option,
                    kept = %existing.value,
                    kept_from = %existing.consumer,
                    ignored = %value,
                    ignored_from = %consumer,
                    "forwarded option overridden by a consumer closer to the root"
                );
            }
            Some(existing) => {
                return Err(KforgeError::configuration(format!(
                    "conflicting values for {}:{option}: {} requires {}, {consumer} requires {value}",
                    req.name, existing.consumer, existing.value
                )));
            }
            None => {
                let _ = target.insert(
                    option.clone(),
                    Forwarded {
                        value: value.clone(),
                        consumer: consumer.to_string(),
                        depth,
                    },
                );
            }
        }
    }
    Ok(())
}

/// Highest catalog version satisfying every known range for `name`.
fn select_version(
    index: &crate::index::RecipeIndex,
    name: &str,
    previous: Option<&Vec<(String, VersionRange)>>,
    current: &[(String, VersionRange)],
) -> Result<Arc<dyn Recipe>> {
    let ranges: Vec<&(String, VersionRange)> =
        previous.into_iter().flatten().chain(current).collect();
    let available = index.versions(name);
    if available.is_empty() {
        return Err(KforgeError::configuration(format!(
            "unknown package \"{name}\" required by {}",
            ranges
                .iter()
                .map(|(c, _)| c.as_str())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    let chosen = available
        .into_iter()
        .rev()
        .find(|v| ranges.iter().all(|(_, r)| r.matches(v)));
    match chosen {
        Some(version) => index.get(name, &VersionRange::exact(version.clone())),
        None => Err(KforgeError::configuration(format!(
            "no version of {name} satisfies {}",
            ranges
                .iter()
                .map(|(c, r)| format!("{r} (from {c})"))
                .collect::<Vec<_>>()
                .join(" and ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use kforge_common::types::{Arch, BuildType, Os, Settings};

    use super::*;
    use crate::descriptor::{BuildSystem, PackageDescriptor};
    use crate::index::RecipeIndex;
    use crate::manifest::{ConsumptionManifest, DependencyManifests};
    use crate::options::{OptionSchema, OptionSpec};
    use crate::plan::{BuildLayout, BuildPlan};
    use crate::resolver::ResolvedConfig;
    use crate::version::Version;

    /// Test recipe with a fixed requirement list.
    struct Fake {
        desc: PackageDescriptor,
        requires: Vec<(&'static str, Option<bool>)>,
    }

    impl Fake {
        fn new(name: &str, version: &[u64], requires: Vec<(&'static str, Option<bool>)>) -> Arc<dyn Recipe> {
            Arc::new(Self {
                desc: PackageDescriptor::new(name, Version::new(version), BuildSystem::CMake)
                    .options(OptionSchema::new(vec![OptionSpec::flag("shared", true)])),
                requires,
            })
        }
    }

    impl Recipe for Fake {
        fn descriptor(&self) -> &PackageDescriptor {
            &self.desc
        }

        fn requirements(&self, _: &ResolvedConfig) -> Result<Vec<Requirement>> {
            self.requires
                .iter()
                .map(|(reference, shared)| {
                    let req = Requirement::host(reference)?;
                    Ok(match shared {
                        Some(value) => req.with_option("shared", *value),
                        None => req,
                    })
                })
                .collect()
        }

        fn build_plan(
            &self,
            _: &ResolvedConfig,
            _: &BuildLayout,
            _: &DependencyManifests,
            _: &HostContext,
        ) -> Result<BuildPlan> {
            Ok(BuildPlan::default())
        }

        fn package_info(&self, config: &ResolvedConfig, dir: &Path) -> ConsumptionManifest {
            ConsumptionManifest::new(&config.package, config.version.to_string(), dir, vec![])
        }
    }

    fn index(recipes: Vec<Arc<dyn Recipe>>) -> RecipeIndex {
        let mut index = RecipeIndex::new();
        for r in recipes {
            index.register(r).expect("register");
        }
        index
    }

    fn profile() -> Profile {
        Profile::new(Settings::new(Os::Linux, Arch::X86_64, BuildType::Release))
    }

    fn roots(names: &[&str]) -> Vec<Requirement> {
        names
            .iter()
            .map(|n| Requirement::host(&format!("{n}/[>=0]")).expect("root"))
            .collect()
    }

    #[test]
    fn diamond_builds_dependencies_first_in_name_order() {
        let idx = index(vec![
            Fake::new("app", &[1], vec![("b/[>=1]", None), ("a/[>=1]", None)]),
            Fake::new("a", &[1], vec![("base/1", None)]),
            Fake::new("b", &[1], vec![("base/1", None)]),
            Fake::new("base", &[1], vec![]),
        ]);
        let graph = DependencyGraph::expand(&idx, &profile(), &roots(&["app"]), &HostContext::new())
            .expect("expand");
        assert_eq!(graph.build_order().expect("order"), vec!["base", "a", "b", "app"]);
        assert_eq!(graph.dependencies("app"), vec!["a", "b"]);
    }

    #[test]
    fn build_order_is_stable_across_runs() {
        let idx = index(vec![
            Fake::new("z", &[1], vec![]),
            Fake::new("m", &[1], vec![]),
            Fake::new("a", &[1], vec![]),
        ]);
        let first = DependencyGraph::expand(&idx, &profile(), &roots(&["z", "m", "a"]), &HostContext::new())
            .expect("expand");
        let second = DependencyGraph::expand(&idx, &profile(), &roots(&["a", "z", "m"]), &HostContext::new())
            .expect("expand");
        assert_eq!(first.build_order().expect("order"), vec!["a", "m", "z"]);
        assert_eq!(first.build_order().expect("a"), second.build_order().expect("b"));
    }

    #[test]
    fn forwarded_option_reaches_dependency() {
        let idx = index(vec![
            Fake::new("openssl", &[3, 2, 4], vec![("zlib/[>=1.2.11 <2]", Some(false))]),
            Fake::new("zlib", &[1, 3, 1], vec![]),
        ]);
        let graph = DependencyGraph::expand(&idx, &profile(), &roots(&["openssl"]), &HostContext::new())
            .expect("expand");
        let zlib = graph.get("zlib").expect("zlib");
        assert!(!zlib.config.options.flag("shared"));
        assert!(graph.get("openssl").expect("openssl").config.options.flag("shared"));
    }

    #[test]
    fn conflicting_forwarded_values_fail() {
        let idx = index(vec![
            Fake::new("app", &[1], vec![("a/1", None), ("b/1", None)]),
            Fake::new("a", &[1], vec![("zlib/[>=1]", Some(true))]),
            Fake::new("b", &[1], vec![("zlib/[>=1]", Some(false))]),
            Fake::new("zlib", &[1, 3, 1], vec![]),
        ]);
        let err = DependencyGraph::expand(&idx, &profile(), &roots(&["app"]), &HostContext::new())
            .unwrap_err();
        assert!(err.to_string().contains("conflicting values for zlib:shared"), "got: {err}");
    }

    #[test]
    fn consumer_closer_to_root_wins() {
        let idx = index(vec![
            Fake::new("poco", &[1], vec![("openssl/1", None), ("zlib/[>=1]", Some(true))]),
            Fake::new("openssl", &[1], vec![("zlib/[>=1]", Some(false))]),
            Fake::new("zlib", &[1, 3, 1], vec![]),
        ]);
        let graph = DependencyGraph::expand(&idx, &profile(), &roots(&["poco"]), &HostContext::new())
            .expect("expand");
        assert!(graph.get("zlib").expect("zlib").config.options.flag("shared"));
    }

    #[test]
    fn intersecting_ranges_pick_common_version() {
        let idx = index(vec![
            Fake::new("app", &[1], vec![("a/1", None), ("zlib/[>=1.2 <1.3]", None)]),
            Fake::new("a", &[1], vec![("zlib/[>=1.2.11]", None)]),
            Fake::new("zlib", &[1, 2, 13], vec![]),
            Fake::new("zlib", &[1, 3, 1], vec![]),
        ]);
        let graph = DependencyGraph::expand(&idx, &profile(), &roots(&["app"]), &HostContext::new())
            .expect("expand");
        assert_eq!(graph.get("zlib").expect("zlib").config.version.to_string(), "1.2.13");
    }

    #[test]
    fn unsatisfiable_range_fails() {
        let idx = index(vec![
            Fake::new("app", &[1], vec![("zlib/[>=2]", None)]),
            Fake::new("zlib", &[1, 3, 1], vec![]),
        ]);
        let err = DependencyGraph::expand(&idx, &profile(), &roots(&["app"]), &HostContext::new())
            .unwrap_err();
        assert!(err.to_string().contains("no version of zlib"), "got: {err}");
    }

    #[test]
    fn cycle_is_rejected() {
        let idx = index(vec![
            Fake::new("a", &[1], vec![("b/1", None)]),
            Fake::new("b", &[1], vec![("a/1", None)]),
        ]);
        let err = DependencyGraph::expand(&idx, &profile(), &roots(&["a"]), &HostContext::new())
            .unwrap_err();
        assert!(err.to_string().contains("cyclic"), "got: {err}");
    }

    #[test]
    fn unknown_forwarded_option_fails_fast() {
        struct Forwarder(PackageDescriptor);
        impl Recipe for Forwarder {
            fn descriptor(&self) -> &PackageDescriptor {
                &self.0
            }
            fn requirements(&self, _: &ResolvedConfig) -> Result<Vec<Requirement>> {
                Ok(vec![Requirement::host("zlib/1.3.1")?.with_option("with_gzip", true)])
            }
            fn build_plan(
            &self,
            _: &ResolvedConfig,
            _: &BuildLayout,
            _: &DependencyManifests,
            _: &HostContext,
        ) -> Result<BuildPlan> {
                Ok(BuildPlan::default())
            }
            fn package_info(&self, config: &ResolvedConfig, dir: &Path) -> ConsumptionManifest {
                ConsumptionManifest::new(&config.package, config.version.to_string(), dir, vec![])
            }
        }
        let idx = index(vec![
            Arc::new(Forwarder(PackageDescriptor::new(
                "app",
                Version::new(&[1]),
                BuildSystem::CMake,
            ))) as Arc<dyn Recipe>,
            Fake::new("zlib", &[1, 3, 1], vec![]),
        ]);
        let err = DependencyGraph::expand(&idx, &profile(), &roots(&["app"]), &HostContext::new())
            .unwrap_err();
        assert!(err.to_string().contains("unknown option \"with_gzip\""), "got: {err}");
    }
}
