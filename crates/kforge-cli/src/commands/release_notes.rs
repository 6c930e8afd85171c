//! `kforge release-notes`: Translate and split the release notes of a version.

use std::path::PathBuf;

use clap::Args;
use kforge_common::config::KforgeConfig;
use kforge_common::constants::RELEASE_TEMPLATE;
use kforge_release::notes::generate;
use kforge_release::translate::DeeplClient;
use kforge_release::version::ReleaseVersion;

/// Arguments for the `release-notes` command.
#[derive(Args, Debug)]
pub struct ReleaseNotesArgs {
    /// Release version (e.g. 3.6.0).
    #[arg(long, short = 'v')]
    pub version: ReleaseVersion,

    /// English HTML template.
    #[arg(long, default_value = RELEASE_TEMPLATE)]
    pub template: PathBuf,

    /// Existing folder the `kDrive-<version>` directory is created in.
    #[arg(long, short = 'O', default_value = "release_notes")]
    pub output: PathBuf,
}

/// Executes the `release-notes` command.
///
/// # Errors
///
/// Returns an error if the translation key is missing, the template or
/// output folder does not exist, or the translation service fails.
pub fn execute(args: &ReleaseNotesArgs, config: &KforgeConfig) -> anyhow::Result<()> {
    let release = &config.release;
    let client = DeeplClient::from_env(Some(release.translation_endpoint.as_str()))?;
    let report = generate(&args.template, &args.output, &args.version, release, &client)?;

    println!(
        "Generated {} release notes in {}",
        report.files.len(),
        report.dir.display()
    );
    if let Some(usage) = report.usage {
        println!(
            "Translation usage: {}/{} characters",
            usage.character_count, usage.character_limit
        );
    }
    Ok(())
}
