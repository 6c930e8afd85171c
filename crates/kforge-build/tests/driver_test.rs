//! End-to-end tests of the build driver with recorded tool invocations.
//!
//! Covered scenarios:
//! 1. A two-package graph builds dependencies first and passes their manifests on
//! 2. Existing manifests are reused unless a rebuild is requested
//! 3. Missing artifacts, failing tools and missing programs are fatal

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;

use kforge_build::driver::BuildDriver;
use kforge_build::fetch::Downloader;
use kforge_build::runner::RecordingRunner;
use kforge_common::constants::{MANIFEST_FILE_NAME, TOOLCHAIN_FILE_NAME};
use kforge_common::error::{KforgeError, Result};
use kforge_common::types::{Arch, BuildType, Os, Settings};
use kforge_recipe::descriptor::{BuildSystem, PackageDescriptor};
use kforge_recipe::graph::DependencyGraph;
use kforge_recipe::host::HostContext;
use kforge_recipe::index::RecipeIndex;
use kforge_recipe::manifest::{Component, ConsumptionManifest, DependencyManifests};
use kforge_recipe::options::{OptionSchema, OptionSpec};
use kforge_recipe::plan::{BuildLayout, BuildPlan, Step, ToolInvocation};
use kforge_recipe::profile::Profile;
use kforge_recipe::recipe::Recipe;
use kforge_recipe::requirement::Requirement;
use kforge_recipe::resolver::ResolvedConfig;
use kforge_recipe::version::Version;

/// Recipe that stages a header and a library without real tools.
struct Staged {
    desc: PackageDescriptor,
    requires: Vec<&'static str>,
    produce_lib: bool,
    programs: Vec<&'static str>,
}

impl Staged {
    fn new(name: &str, requires: Vec<&'static str>) -> Self {
        Self {
            desc: PackageDescriptor::new(name, Version::new(&[1, 0]), BuildSystem::CMake)
                .options(OptionSchema::new(vec![OptionSpec::flag("shared", false)])),
            requires,
            produce_lib: true,
            programs: Vec::new(),
        }
    }
}

impl Recipe for Staged {
    fn descriptor(&self) -> &PackageDescriptor {
        &self.desc
    }

    fn requirements(&self, _: &ResolvedConfig) -> Result<Vec<Requirement>> {
        self.requires.iter().map(|r| Requirement::host(r)).collect()
    }

    fn required_programs(&self, _: &ResolvedConfig) -> Vec<&'static str> {
        self.programs.clone()
    }

    fn build_plan(
        &self,
        config: &ResolvedConfig,
        layout: &BuildLayout,
        deps: &DependencyManifests,
        _: &HostContext,
    ) -> Result<BuildPlan> {
        let name = &config.package;
        let mut plan = BuildPlan::default();
        plan.push(Step::WriteFile {
            path: layout.source_dir.join(format!("include/{name}.h")),
            contents: "#pragma once\n".to_string(),
        });
        plan.run(
            ToolInvocation::new("cc")
                .arg(name.as_str())
                .args(deps.values().map(|m| m.package_folder.display().to_string()))
                .current_dir(&layout.build_dir),
        );
        plan.push(Step::Copy {
            from: layout.source_dir.clone(),
            to: layout.package_dir.clone(),
            pattern: "*.h".to_string(),
        });
        if self.produce_lib {
            plan.push(Step::WriteFile {
                path: layout.package_dir.join(format!("lib/lib{name}.a")),
                contents: String::new(),
            });
        }
        Ok(plan)
    }

    fn package_info(&self, config: &ResolvedConfig, package_dir: &Path) -> ConsumptionManifest {
        let mut component = Component::with_libs([config.package.clone()]);
        for req in &self.requires {
            let dep = req.split('/').next().unwrap_or_default();
            component = component.requires(format!("{dep}::{dep}"));
        }
        let mut manifest =
            ConsumptionManifest::new(&config.package, config.version.to_string(), package_dir, vec!["x86_64".into()]);
        manifest.add_component(config.package.clone(), component);
        manifest
    }
}

fn graph(app: Staged) -> DependencyGraph {
    let mut index = RecipeIndex::new();
    index.register(Arc::new(Staged::new("base", vec![]))).expect("register base");
    index.register(Arc::new(app)).expect("register app");
    let profile = Profile::new(Settings::new(Os::Linux, Arch::X86_64, BuildType::Release));
    let roots = [Requirement::host("app/1.0").expect("root")];
    DependencyGraph::expand(&index, &profile, &roots, &HostContext::new()).expect("expand")
}

fn driver(runner: &Arc<RecordingRunner>, cache: &Path) -> BuildDriver {
    BuildDriver::new(runner.clone(), Downloader::new(cache).expect("downloader")).without_program_check()
}

#[test]
fn graph_builds_dependencies_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(RecordingRunner::new());
    let graph = graph(Staged::new("app", vec!["base/[>=1]"]));

    let manifests = driver(&runner, &dir.path().join("cache"))
        .build_graph(&graph, dir.path(), &HostContext::new())
        .expect("build");

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].args, ["base"]);
    let base_folder = manifests["base"].package_folder.display().to_string();
    assert_eq!(calls[1].args, ["app".to_string(), base_folder]);

    let app = &manifests["app"];
    assert!(app.package_folder.join("include/app.h").is_file());
    assert!(app.package_folder.join(MANIFEST_FILE_NAME).is_file());
    let build_dir = calls[1].cwd.as_ref().expect("cwd");
    assert!(build_dir.join(TOOLCHAIN_FILE_NAME).is_file());

    let written = ConsumptionManifest::read(&app.package_folder.join(MANIFEST_FILE_NAME)).expect("read");
    assert_eq!(&written, app);
}

#[test]
fn existing_packages_are_reused_unless_rebuilding() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(RecordingRunner::new());
    let graph = graph(Staged::new("app", vec!["base/[>=1]"]));
    let cache = dir.path().join("cache");

    let _ = driver(&runner, &cache).build_graph(&graph, dir.path(), &HostContext::new()).expect("first");
    let _ = driver(&runner, &cache).build_graph(&graph, dir.path(), &HostContext::new()).expect("second");
    assert_eq!(runner.calls().len(), 2);

    let _ = driver(&runner, &cache)
        .rebuild(true)
        .build_graph(&graph, dir.path(), &HostContext::new())
        .expect("rebuild");
    assert_eq!(runner.calls().len(), 4);
}

#[test]
fn missing_library_fails_validation_without_manifest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(RecordingRunner::new());
    let mut app = Staged::new("app", vec!["base/[>=1]"]);
    app.produce_lib = false;
    let graph = graph(app);

    let err = driver(&runner, &dir.path().join("cache"))
        .build_graph(&graph, dir.path(), &HostContext::new())
        .unwrap_err();
    assert!(matches!(err, KforgeError::Validation { kind: "library directory", .. }), "got: {err}");

    let app = graph.get("app").expect("app");
    let layout = BuildLayout::under(dir.path(), "app", "1.0", &app.config.package_id());
    assert!(!layout.package_dir.join(MANIFEST_FILE_NAME).exists());
}

#[test]
fn failing_tool_stops_the_build() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(RecordingRunner::new().failing("cc", 1));
    let graph = graph(Staged::new("app", vec!["base/[>=1]"]));

    let err = driver(&runner, &dir.path().join("cache"))
        .build_graph(&graph, dir.path(), &HostContext::new())
        .unwrap_err();
    assert!(matches!(err, KforgeError::Build { status: 1, .. }), "got: {err}");
    assert_eq!(runner.calls().len(), 1, "app must not start after base failed");
}

#[test]
fn missing_program_fails_before_any_step() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(RecordingRunner::new());
    let mut app = Staged::new("app", vec![]);
    app.programs = vec!["kforge-no-such-tool"];
    let config = kforge_recipe::resolver::resolve(
        &app,
        &Settings::new(Os::Linux, Arch::X86_64, BuildType::Release),
        &std::collections::BTreeMap::new(),
        &HostContext::new(),
    )
    .expect("resolve");
    let layout = BuildLayout::under(dir.path(), "app", "1.0", "id");

    let driver = BuildDriver::new(runner.clone(), Downloader::new(dir.path()).expect("downloader"));
    let err = driver
        .run(&app, &config, &layout, &DependencyManifests::new(), &HostContext::new())
        .unwrap_err();
    assert!(err.to_string().contains("kforge-no-such-tool"), "got: {err}");
    assert!(runner.calls().is_empty());
    assert!(!layout.build_dir.exists());
}
