//! `kforge update-translations`: Fill unfinished entries of the client's translation files.

use std::path::PathBuf;

use clap::Args;
use kforge_common::config::KforgeConfig;
use kforge_common::constants::SOURCE_DIR_ENV;
use kforge_release::translate::DeeplClient;
use kforge_release::ts::{translation_files, update_file};

use crate::output::format_table;

/// Arguments for the `update-translations` command.
#[derive(Args, Debug)]
pub struct UpdateTranslationsArgs {
    /// Client source checkout containing `translations/`.
    #[arg(long, env = SOURCE_DIR_ENV)]
    pub source_dir: PathBuf,
}

/// Executes the `update-translations` command.
///
/// # Errors
///
/// Returns an error if the checkout has no translations, the key is
/// missing, or a file cannot be translated.
pub fn execute(args: &UpdateTranslationsArgs, config: &KforgeConfig) -> anyhow::Result<()> {
    let files = translation_files(&args.source_dir)?;
    if files.is_empty() {
        println!("No translation files found.");
        return Ok(());
    }
    let client = DeeplClient::from_env(Some(config.release.translation_endpoint.as_str()))?;

    let mut rows = Vec::with_capacity(files.len());
    for path in &files {
        let filled = update_file(path, &client)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        rows.push(vec![name, filled.to_string()]);
    }
    println!("{}", format_table(&["FILE", "FILLED"], &rows));
    Ok(())
}
