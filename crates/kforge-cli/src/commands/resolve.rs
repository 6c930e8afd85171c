//! `kforge resolve`: Resolve a package and its dependencies for a profile.

use std::collections::BTreeMap;

use clap::Args;
use kforge_common::config::KforgeConfig;
use kforge_recipe::host::HostContext;
use kforge_recipe::index::RecipeIndex;
use kforge_recipe::resolver::ResolvedConfig;

use super::{ProfileArgs, expand_graph};
use crate::output::{format_list, format_section};

/// Arguments for the `resolve` command.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Package to resolve, `name` or `name/version`.
    pub package: String,

    /// Settings and option overrides.
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Print the resolved configurations as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `resolve` command.
///
/// Prints every package of the graph in build order.
///
/// # Errors
///
/// Returns an error if resolution fails for any package of the graph.
pub fn execute(args: &ResolveArgs, config: &KforgeConfig) -> anyhow::Result<()> {
    let index = RecipeIndex::builtin()?;
    let host = HostContext::capture(config.interactive);
    let graph = expand_graph(&index, &args.package, &args.profile, &host)?;
    let order = graph.build_order()?;

    if args.json {
        let configs: BTreeMap<&str, &ResolvedConfig> = graph
            .nodes()
            .iter()
            .map(|(name, node)| (name.as_str(), &node.config))
            .collect();
        println!("{}", serde_json::to_string_pretty(&configs)?);
        return Ok(());
    }

    for (n, name) in order.iter().enumerate() {
        let Some(node) = graph.get(name) else { continue };
        if n > 0 {
            println!();
        }
        println!("{}", describe(&node.config, &graph.dependencies(name)));
    }
    Ok(())
}

/// Human-readable block for one resolved package.
fn describe(config: &ResolvedConfig, deps: &[&str]) -> String {
    let mut out = format!("{} ({})", config.reference(), config.package_id());
    out.push_str(&format!("\n  settings: {}", config.settings));
    if let Some(runtime) = config.settings.msvc_runtime() {
        out.push_str(&format!("\n  runtime: {}", runtime.cmake_name()));
    }
    if let Some(generator) = config.generator {
        out.push_str(&format!("\n  generator: {}", generator.cmake_name()));
    }
    out.push_str(&format!("\n  requires: {}", format_list(deps)));
    for section in [
        format_section("options", config.options.iter()),
        format_section("variables", config.variables.iter()),
        format_section("definitions", config.preprocessor_definitions.iter()),
    ] {
        out.push('\n');
        out.push_str(&indent(&section));
    }
    out
}

fn indent(text: &str) -> String {
    text.lines().map(|l| format!("  {l}")).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use kforge_common::types::{Arch, BuildType, Os, Settings};
    use kforge_recipe::profile::Profile;
    use kforge_recipe::requirement::Requirement;

    use super::*;

    #[test]
    fn description_lists_runtime_and_sections() {
        let index = RecipeIndex::builtin().expect("catalog");
        let profile = Profile::new(Settings::new(Os::Windows, Arch::X86_64, BuildType::Debug));
        let root = Requirement::host("zlib/1.3.1").expect("reference");
        let graph = kforge_recipe::graph::DependencyGraph::expand(&index, &profile, &[root], &HostContext::new())
            .expect("graph");
        let node = graph.get("zlib").expect("zlib");

        let text = describe(&node.config, &[]);
        assert!(text.starts_with("zlib/1.3.1 ("), "got: {text}");
        assert!(text.contains("runtime: MultiThreadedDebugDLL"));
        assert!(text.contains("requires: -"));
        assert!(text.contains("  options:"));
    }
}
