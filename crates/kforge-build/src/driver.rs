//! The build driver: executes a recipe's plan and publishes its manifest.
//!
//! For one package the driver checks required programs, writes the
//! toolchain file, executes every plan step in order, validates the
//! expected artifacts and writes the consumption manifest into the package
//! folder. Any failure is fatal for the package.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use kforge_common::constants::MANIFEST_FILE_NAME;
use kforge_common::error::{KforgeError, Result};
use kforge_recipe::descriptor::BuildSystem;
use kforge_recipe::graph::DependencyGraph;
use kforge_recipe::host::HostContext;
use kforge_recipe::manifest::{ConsumptionManifest, DependencyManifests};
use kforge_recipe::plan::{ArtifactKind, BuildLayout, ExpectedArtifact, Step};
use kforge_recipe::recipe::Recipe;
use kforge_recipe::resolver::ResolvedConfig;
use kforge_recipe::toolchain::render_cmake_toolchain;

use crate::fetch::Downloader;
use crate::installer::run_installer;
use crate::runner::ToolRunner;
use crate::staging;

/// Executes build plans.
pub struct BuildDriver {
    runner: Arc<dyn ToolRunner>,
    downloader: Downloader,
    check_programs: bool,
    rebuild: bool,
}

impl std::fmt::Debug for BuildDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildDriver")
            .field("check_programs", &self.check_programs)
            .field("rebuild", &self.rebuild)
            .finish_non_exhaustive()
    }
}

impl BuildDriver {
    /// A driver running tools with `runner` and downloading with
    /// `downloader`.
    #[must_use]
    pub fn new(runner: Arc<dyn ToolRunner>, downloader: Downloader) -> Self {
        Self {
            runner,
            downloader,
            check_programs: true,
            rebuild: false,
        }
    }

    /// Skips the `PATH` lookup of required programs.
    #[must_use]
    pub const fn without_program_check(mut self) -> Self {
        self.check_programs = false;
        self
    }

    /// Rebuilds packages whose manifest already exists.
    #[must_use]
    pub const fn rebuild(mut self, rebuild: bool) -> Self {
        self.rebuild = rebuild;
        self
    }

    /// Fails if a program the recipe needs is not on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Configuration` naming the missing programs.
    pub fn check_programs(&self, recipe: &dyn Recipe, config: &ResolvedConfig) -> Result<()> {
        if !self.check_programs {
            return Ok(());
        }
        let missing: Vec<&str> = recipe
            .required_programs(config)
            .into_iter()
            .filter(|program| which::which(program).is_err())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(KforgeError::configuration(format!(
                "{}: required programs not found on PATH: {}",
                config.reference(),
                missing.join(", ")
            )))
        }
    }

    /// Builds one package into `layout` and returns its manifest.
    ///
    /// # Errors
    ///
    /// Returns the first configuration, network, build or validation error.
    pub fn run(
        &self,
        recipe: &dyn Recipe,
        config: &ResolvedConfig,
        layout: &BuildLayout,
        deps: &DependencyManifests,
        host: &HostContext,
    ) -> Result<ConsumptionManifest> {
        let _span = tracing::info_span!("build", package = %config.reference()).entered();
        tracing::info!(package_id = %config.package_id(), "building");

        self.check_programs(recipe, config)?;
        let plan = recipe.build_plan(config, layout, deps, host)?;

        staging::remove_path(&layout.package_dir)?;
        for dir in [&layout.build_dir, &layout.package_dir] {
            std::fs::create_dir_all(dir).map_err(|e| KforgeError::io(dir, e))?;
        }
        if config.build_system != BuildSystem::Installer {
            let toolchain = layout.toolchain_file();
            staging::write_file(&toolchain, &render_cmake_toolchain(config))?;
            tracing::debug!(path = %toolchain.display(), "wrote toolchain file");
        }

        for (n, step) in plan.steps.iter().enumerate() {
            tracing::info!(step = n + 1, total = plan.steps.len(), "{step}");
            self.execute(step, layout)?;
        }

        validate_artifacts(&recipe.expected_artifacts(config, layout))?;

        let manifest = recipe.package_info(config, &layout.package_dir);
        manifest.validate()?;
        let _ = manifest.write_to(&layout.package_dir)?;
        tracing::info!(package_dir = %layout.package_dir.display(), "package ready");
        Ok(manifest)
    }

    fn execute(&self, step: &Step, layout: &BuildLayout) -> Result<()> {
        match step {
            Step::Fetch {
                url,
                sha256,
                dest,
                strip_root,
            } => self
                .downloader
                .fetch_archive(url, sha256.as_deref(), dest, *strip_root),
            Step::Download { url, dest } => self.downloader.download(url, dest),
            Step::Run(invocation) => self.runner.run(invocation).map(|_| ()),
            Step::Copy { from, to, pattern } => staging::copy_matching(from, to, pattern).map(|_| ()),
            Step::Rename { from, to, required } => staging::rename(from, to, *required),
            Step::ReplaceInFiles {
                root,
                file_name,
                search,
                replace,
            } => staging::replace_in_files(root, file_name, search, replace).map(|_| ()),
            Step::Remove { path } => staging::remove_path(path),
            Step::MakeExecutable { path } => staging::make_executable(path),
            Step::WriteFile { path, contents } => staging::write_file(path, contents),
            Step::Install(run) => run_installer(run, self.runner.as_ref(), &layout.build_dir),
        }
    }

    /// Builds every package of `graph` in build order under `root`.
    ///
    /// Packages whose manifest already exists in their package folder are
    /// reused unless the driver was told to rebuild.
    ///
    /// # Errors
    ///
    /// Returns the first error; packages built before it stay installed.
    pub fn build_graph(
        &self,
        graph: &DependencyGraph,
        root: &Path,
        host: &HostContext,
    ) -> Result<BTreeMap<String, ConsumptionManifest>> {
        let mut built: BTreeMap<String, ConsumptionManifest> = BTreeMap::new();
        for name in graph.build_order()? {
            let node = graph
                .get(name)
                .ok_or_else(|| KforgeError::configuration(format!("{name} is missing from the graph")))?;
            let config = &node.config;
            let layout = BuildLayout::under(root, name, &config.version.to_string(), &config.package_id());

            let existing = layout.package_dir.join(MANIFEST_FILE_NAME);
            if !self.rebuild && existing.is_file() {
                tracing::info!(package = %config.reference(), "up to date");
                let _ = built.insert(name.to_string(), ConsumptionManifest::read(&existing)?);
                continue;
            }

            let deps: DependencyManifests = dependency_closure(graph, name)
                .into_iter()
                .filter_map(|dep| built.get(&dep).map(|m| (dep, m.clone())))
                .collect();
            let manifest = self.run(node.recipe.as_ref(), config, &layout, &deps, host)?;
            let _ = built.insert(name.to_string(), manifest);
        }
        Ok(built)
    }
}

/// Every package `name` depends on, directly or transitively.
fn dependency_closure(graph: &DependencyGraph, name: &str) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<&str> = graph.dependencies(name);
    while let Some(dep) = stack.pop() {
        if seen.insert(dep.to_string()) {
            stack.extend(graph.dependencies(dep));
        }
    }
    seen
}

/// Checks that every expected artifact exists.
///
/// # Errors
///
/// Returns `KforgeError::Validation` for the first missing artifact.
pub fn validate_artifacts(artifacts: &[ExpectedArtifact]) -> Result<()> {
    for artifact in artifacts {
        let present = match artifact.kind {
            ArtifactKind::Directory => artifact.path.is_dir(),
            ArtifactKind::File => artifact.path.is_file(),
        };
        if !present {
            return Err(KforgeError::Validation {
                kind: artifact.description,
                path: artifact.path.clone(),
            });
        }
        tracing::debug!(artifact = artifact.description, path = %artifact.path.display(), "artifact present");
    }
    Ok(())
}
