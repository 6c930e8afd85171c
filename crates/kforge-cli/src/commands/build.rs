//! `kforge build`: Build a package and its dependencies.

use std::sync::Arc;

use clap::Args;
use kforge_build::driver::BuildDriver;
use kforge_build::fetch::Downloader;
use kforge_build::runner::ProcessRunner;
use kforge_common::config::KforgeConfig;
use kforge_recipe::host::HostContext;
use kforge_recipe::index::RecipeIndex;

use super::{ProfileArgs, expand_graph};
use crate::output::format_table;

/// Arguments for the `build` command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Package to build, `name` or `name/version`.
    pub package: String,

    /// Settings and option overrides.
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Rebuild packages that are already installed.
    #[arg(long)]
    pub force: bool,

    /// Do not check that the required programs are on `PATH`.
    #[arg(long)]
    pub skip_program_check: bool,
}

/// Executes the `build` command.
///
/// Builds the graph in dependency order under the configured workspace
/// root and prints the package folders.
///
/// # Errors
///
/// Returns the first resolution, download, tool or validation error.
pub fn execute(args: &BuildArgs, config: &KforgeConfig) -> anyhow::Result<()> {
    let index = RecipeIndex::builtin()?;
    let host = HostContext::capture(config.interactive);
    let graph = expand_graph(&index, &args.package, &args.profile, &host)?;

    let mut driver = BuildDriver::new(Arc::new(ProcessRunner), Downloader::new(&config.download_cache)?)
        .rebuild(args.force);
    if args.skip_program_check {
        driver = driver.without_program_check();
    }

    tracing::info!(package = %args.package, root = %config.workspace_root.display(), "starting build");
    let built = driver.build_graph(&graph, &config.workspace_root, &host)?;

    let rows: Vec<Vec<String>> = built
        .values()
        .map(|m| {
            vec![
                m.package.clone(),
                m.version.clone(),
                m.package_folder.display().to_string(),
            ]
        })
        .collect();
    println!("{}", format_table(&["PACKAGE", "VERSION", "FOLDER"], &rows));
    Ok(())
}
