//! `kforge plan`: Show the build order and the steps each package would run.

use std::collections::BTreeMap;

use clap::Args;
use kforge_common::config::KforgeConfig;
use kforge_common::constants::MANIFEST_FILE_NAME;
use kforge_recipe::graph::DependencyGraph;
use kforge_recipe::host::HostContext;
use kforge_recipe::index::RecipeIndex;
use kforge_recipe::manifest::{ConsumptionManifest, DependencyManifests};
use kforge_recipe::plan::BuildLayout;

use super::{ProfileArgs, expand_graph};
use crate::output::{format_list, format_table, short_id};

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Package to plan, `name` or `name/version`.
    pub package: String,

    /// Settings and option overrides.
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Only print the build order.
    #[arg(long)]
    pub order_only: bool,
}

/// Executes the `plan` command.
///
/// Dependencies that are not built yet are planned against the manifest
/// their recipe would produce.
///
/// # Errors
///
/// Returns an error if the graph cannot be expanded or a plan cannot be
/// built.
pub fn execute(args: &PlanArgs, config: &KforgeConfig) -> anyhow::Result<()> {
    let index = RecipeIndex::builtin()?;
    let host = HostContext::capture(config.interactive);
    let graph = expand_graph(&index, &args.package, &args.profile, &host)?;
    let order = graph.build_order()?;

    let mut rows = Vec::with_capacity(order.len());
    let mut layouts = BTreeMap::new();
    for name in &order {
        let Some(node) = graph.get(name) else { continue };
        let id = node.config.package_id();
        let layout = BuildLayout::under(&config.workspace_root, name, &node.config.version.to_string(), &id);
        let built = layout.package_dir.join(MANIFEST_FILE_NAME).is_file();
        rows.push(vec![
            (*name).to_string(),
            node.config.version.to_string(),
            short_id(&id).to_string(),
            if built { "built" } else { "pending" }.to_string(),
            format_list(graph.dependencies(name)),
        ]);
        let _ = layouts.insert((*name).to_string(), layout);
    }
    println!("{}", format_table(&["PACKAGE", "VERSION", "ID", "STATUS", "REQUIRES"], &rows));
    if args.order_only {
        return Ok(());
    }

    let mut manifests = DependencyManifests::new();
    for name in &order {
        let (Some(node), Some(layout)) = (graph.get(name), layouts.get(*name)) else {
            continue;
        };
        let deps: DependencyManifests = closure(&graph, name)
            .into_iter()
            .filter_map(|dep| manifests.get(&dep).map(|m| (dep, m.clone())))
            .collect();
        let plan = node.recipe.build_plan(&node.config, layout, &deps, &host)?;

        println!();
        println!("{}:", node.config.reference());
        for (n, step) in plan.steps.iter().enumerate() {
            println!("  {:>2}. {step}", n + 1);
        }

        let manifest = existing_manifest(layout)?
            .unwrap_or_else(|| node.recipe.package_info(&node.config, &layout.package_dir));
        let _ = manifests.insert((*name).to_string(), manifest);
    }
    Ok(())
}

/// The manifest of an already-built package, if any.
fn existing_manifest(layout: &BuildLayout) -> anyhow::Result<Option<ConsumptionManifest>> {
    let path = layout.package_dir.join(MANIFEST_FILE_NAME);
    if path.is_file() {
        Ok(Some(ConsumptionManifest::read(&path)?))
    } else {
        Ok(None)
    }
}

/// Transitive dependencies of `name`.
fn closure(graph: &DependencyGraph, name: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut stack = graph.dependencies(name);
    while let Some(dep) = stack.pop() {
        if !seen.iter().any(|s| s == dep) {
            seen.push(dep.to_string());
            stack.extend(graph.dependencies(dep));
        }
    }
    seen
}
