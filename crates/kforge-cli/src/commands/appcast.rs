//! `kforge appcast`: Rewrite the update feed for a release.

use std::path::PathBuf;

use clap::Args;
use kforge_common::config::KforgeConfig;
use kforge_release::appcast::{AppcastUpdate, reformat_file};
use kforge_release::version::{ReleaseVersion, parse_date};

/// Arguments for the `appcast` command.
#[derive(Args, Debug)]
pub struct AppcastArgs {
    /// Feed file, rewritten in place.
    pub file: PathBuf,

    /// Release version (e.g. 3.6.0).
    #[arg(long, short = 'v')]
    pub version: ReleaseVersion,

    /// Publication date (YYYY-MM-DD); the feed's date is kept without one.
    #[arg(long)]
    pub date: Option<String>,

    /// System tag of the linked release notes.
    #[arg(long, default_value = "macos")]
    pub system: String,
}

/// Executes the `appcast` command.
///
/// # Errors
///
/// Returns an error if the date is malformed or the feed cannot be
/// rewritten.
pub fn execute(args: &AppcastArgs, config: &KforgeConfig) -> anyhow::Result<()> {
    let date = args.date.as_deref().map(parse_date).transpose()?;
    let update = AppcastUpdate {
        version: args.version.clone(),
        system: args.system.clone(),
        languages: config.release.target_languages.clone(),
        notes_base_url: config.release.release_notes_base_url.clone(),
        download_base_url: config.release.download_base_url.clone(),
        date,
    };
    reformat_file(&args.file, &update)?;
    println!("Updated {} for {}", args.file.display(), args.version);
    Ok(())
}
