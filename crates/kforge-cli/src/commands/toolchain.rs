//! `kforge toolchain`: Print the generated CMake toolchain of a package.

use std::path::PathBuf;

use clap::Args;
use kforge_common::config::KforgeConfig;
use kforge_recipe::host::HostContext;
use kforge_recipe::index::RecipeIndex;
use kforge_recipe::toolchain::render_cmake_toolchain;

use super::{ProfileArgs, expand_graph, package_name};

/// Arguments for the `toolchain` command.
#[derive(Args, Debug)]
pub struct ToolchainArgs {
    /// Package whose toolchain to render, `name` or `name/version`.
    pub package: String,

    /// Settings and option overrides.
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Write the toolchain to this file instead of stdout.
    #[arg(long, short = 'O')]
    pub output: Option<PathBuf>,
}

/// Executes the `toolchain` command.
///
/// # Errors
///
/// Returns an error if resolution fails or the file cannot be written.
pub fn execute(args: &ToolchainArgs, config: &KforgeConfig) -> anyhow::Result<()> {
    let index = RecipeIndex::builtin()?;
    let host = HostContext::capture(config.interactive);
    let graph = expand_graph(&index, &args.package, &args.profile, &host)?;
    let name = package_name(&args.package);
    let node = graph
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("{name} is missing from the resolved graph"))?;

    let rendered = render_cmake_toolchain(&node.config);
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(|e| anyhow::anyhow!("cannot write {}: {e}", path.display()))?;
            tracing::info!(path = %path.display(), package = %node.config.reference(), "toolchain written");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
