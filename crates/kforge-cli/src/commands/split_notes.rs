//! `kforge split-notes`: Split one combined release-notes file per operating system.

use std::path::PathBuf;

use clap::Args;
use kforge_common::config::KforgeConfig;
use kforge_release::notes::{TEMPLATE_LANGUAGE, split_file};
use kforge_release::version::ReleaseVersion;

/// Arguments for the `split-notes` command.
#[derive(Args, Debug)]
pub struct SplitNotesArgs {
    /// Combined HTML file with OS-tagged entries.
    pub file: PathBuf,

    /// Release version (e.g. 3.6.0).
    #[arg(long, short = 'v')]
    pub version: ReleaseVersion,

    /// Language code used in the file names.
    #[arg(long, default_value = TEMPLATE_LANGUAGE)]
    pub lang: String,

    /// Output folder (defaults to the file's folder).
    #[arg(long, short = 'O')]
    pub output: Option<PathBuf>,
}

/// Executes the `split-notes` command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or an output written.
pub fn execute(args: &SplitNotesArgs, config: &KforgeConfig) -> anyhow::Result<()> {
    let dir = match &args.output {
        Some(dir) => dir.clone(),
        None => args
            .file
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default(),
    };
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(&dir).map_err(|e| anyhow::anyhow!("cannot create {}: {e}", dir.display()))?;
    }

    let written = split_file(&args.file, &dir, &args.version, &args.lang, &config.release.systems)?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}
