//! `kforge translate`: Translate a text into the target languages.

use clap::Args;
use kforge_common::config::KforgeConfig;
use kforge_release::translate::{DeeplClient, TextFormat, Translator};

/// Arguments for the `translate` command.
#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// Text to translate from English.
    pub text: String,

    /// Target language, repeatable (defaults to the configured languages).
    #[arg(long = "lang", short = 'l')]
    pub languages: Vec<String>,
}

/// Executes the `translate` command.
///
/// # Errors
///
/// Returns an error if the translation key is missing or the service fails.
pub fn execute(args: &TranslateArgs, config: &KforgeConfig) -> anyhow::Result<()> {
    let client = DeeplClient::from_env(Some(config.release.translation_endpoint.as_str()))?;
    let languages = if args.languages.is_empty() {
        &config.release.target_languages
    } else {
        &args.languages
    };

    let texts = [args.text.clone()];
    for lang in languages {
        let lang = lang.to_uppercase();
        let translated = client.translate(&texts, &lang, TextFormat::Plain)?;
        for text in translated {
            println!("{lang}: {text}");
        }
    }
    Ok(())
}
