//! CLI command definitions and dispatch.

pub mod appcast;
pub mod build;
pub mod manifest;
pub mod plan;
pub mod recipes;
pub mod release_notes;
pub mod resolve;
pub mod split_notes;
pub mod toolchain;
pub mod translate;
pub mod update_translations;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kforge_common::config::KforgeConfig;
use kforge_common::types::{Arch, BuildType, Os, RuntimeLink, Settings};
use kforge_recipe::graph::DependencyGraph;
use kforge_recipe::host::HostContext;
use kforge_recipe::index::RecipeIndex;
use kforge_recipe::profile::Profile;
use kforge_recipe::requirement::Requirement;

/// kforge: dependency recipes and release tooling for the desktop client.
#[derive(Parser, Debug)]
#[command(name = "kforge", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file (defaults to `$KFORGE_CONFIG`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the built-in recipes.
    Recipes(recipes::RecipesArgs),
    /// Resolve a package and its dependencies for a profile.
    Resolve(resolve::ResolveArgs),
    /// Show the build order and the steps each package would run.
    Plan(plan::PlanArgs),
    /// Print the generated CMake toolchain of a package.
    Toolchain(toolchain::ToolchainArgs),
    /// Build a package and its dependencies.
    Build(build::BuildArgs),
    /// Show the consumption manifest of a built package.
    Manifest(manifest::ManifestArgs),
    /// Translate and split the release notes of a version.
    ReleaseNotes(release_notes::ReleaseNotesArgs),
    /// Split one combined release-notes file per operating system.
    SplitNotes(split_notes::SplitNotesArgs),
    /// Rewrite the update feed for a release.
    Appcast(appcast::AppcastArgs),
    /// Translate a text into the target languages.
    Translate(translate::TranslateArgs),
    /// Fill unfinished entries of the client's translation files.
    UpdateTranslations(update_translations::UpdateTranslationsArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the command
/// fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = KforgeConfig::discover(cli.config.as_deref())?;
    match cli.command {
        Command::Recipes(args) => recipes::execute(&args),
        Command::Resolve(args) => resolve::execute(&args, &config),
        Command::Plan(args) => plan::execute(&args, &config),
        Command::Toolchain(args) => toolchain::execute(&args, &config),
        Command::Build(args) => build::execute(&args, &config),
        Command::Manifest(args) => manifest::execute(&args, &config),
        Command::ReleaseNotes(args) => release_notes::execute(&args, &config),
        Command::SplitNotes(args) => split_notes::execute(&args, &config),
        Command::Appcast(args) => appcast::execute(&args, &config),
        Command::Translate(args) => translate::execute(&args, &config),
        Command::UpdateTranslations(args) => update_translations::execute(&args, &config),
    }
}

/// Settings and option overrides shared by the package commands.
#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    /// Profile TOML file; the host settings are used without one.
    #[arg(long, short = 'p')]
    pub profile: Option<PathBuf>,

    /// Target operating system (Windows, Macos, Linux).
    #[arg(long)]
    pub os: Option<Os>,

    /// Target architecture (x86_64, armv8, universal).
    #[arg(long)]
    pub arch: Option<Arch>,

    /// Build configuration (Debug, Release, RelWithDebInfo, MinSizeRel).
    #[arg(long)]
    pub build_type: Option<BuildType>,

    /// Link the MSVC runtime statically (MT/MTd).
    #[arg(long)]
    pub static_runtime: bool,

    /// Option override, repeatable. Without `pkg:` it applies to the
    /// requested package.
    #[arg(long = "option", short = 'o', value_name = "[PKG:]NAME=VALUE")]
    pub options: Vec<String>,
}

impl ProfileArgs {
    /// Builds the profile for `package`: file or host settings, then the
    /// command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile file or an override is invalid.
    pub fn profile(&self, package: &str) -> anyhow::Result<Profile> {
        let mut profile = match &self.profile {
            Some(path) => Profile::load(path)?,
            None => Profile::new(Settings::host()),
        };
        if let Some(os) = self.os {
            if os != profile.settings.os {
                let s = &profile.settings;
                profile.settings = Settings::new(os, s.arch, s.build_type);
            }
        }
        if let Some(arch) = self.arch {
            profile.settings.arch = arch;
        }
        if let Some(build_type) = self.build_type {
            profile.settings.build_type = build_type;
        }
        if self.static_runtime {
            profile.settings.compiler.runtime = RuntimeLink::Static;
        }
        for spec in &self.options {
            profile.apply_cli_override(package, spec)?;
        }
        tracing::debug!(settings = %profile.settings, "profile ready");
        Ok(profile)
    }
}

/// Name part of a `name[/version]` argument.
pub fn package_name(reference: &str) -> &str {
    reference.split('/').next().unwrap_or(reference).trim()
}

/// The root requirement for `name[/version]`; a bare name pins the latest
/// catalog version.
///
/// # Errors
///
/// Returns an error if the package is unknown or the reference malformed.
pub fn root_requirement(index: &RecipeIndex, reference: &str) -> anyhow::Result<Requirement> {
    if reference.contains('/') {
        return Ok(Requirement::host(reference)?);
    }
    let recipe = index.latest(reference)?;
    Ok(Requirement::host(&recipe.descriptor().reference())?)
}

/// Expands the graph of `reference` under the profile arguments.
///
/// # Errors
///
/// Returns any profile, resolution or graph error.
pub fn expand_graph(
    index: &RecipeIndex,
    reference: &str,
    args: &ProfileArgs,
    host: &HostContext,
) -> anyhow::Result<DependencyGraph> {
    let name = package_name(reference);
    let profile = args.profile(name)?;
    let root = root_requirement(index, reference)?;
    Ok(DependencyGraph::expand(index, &profile, &[root], host)?)
}
