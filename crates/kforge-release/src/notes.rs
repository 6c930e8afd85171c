//! Per-language, per-OS release notes.
//!
//! The English template lists every change of a release, with OS-specific
//! entries written as `<li>Windows - Fixed bug</li>`. Generation translates
//! the template into each target language and splits every language into
//! one file per operating system: untagged lines go everywhere, tagged
//! lines only into their system's file with the tag removed.

use std::path::{Path, PathBuf};

use kforge_common::config::ReleaseConfig;
use kforge_common::error::{KforgeError, Result};

use crate::translate::{TextFormat, Translator, Usage};
use crate::version::ReleaseVersion;

/// Language code of the template.
pub const TEMPLATE_LANGUAGE: &str = "en";

/// Tags an entry for `system` may start with. Matching is case-insensitive.
#[must_use]
pub fn system_labels(system: &str) -> Vec<String> {
    let system = system.to_lowercase();
    let aliases: &[&str] = match system.as_str() {
        "win" | "windows" => &["win", "windows"],
        "macos" | "mac" | "osx" => &["macos", "mac", "osx"],
        _ => &[],
    };
    let mut labels: Vec<String> = aliases.iter().map(ToString::to_string).collect();
    if !labels.contains(&system) {
        labels.push(system);
    }
    labels
}

/// The system tag `line` starts an entry with, if any.
fn tagged_system<'a>(line: &str, systems: &'a [String]) -> Option<&'a str> {
    let lowered = line.to_lowercase();
    systems
        .iter()
        .find(|system| {
            system_labels(system)
                .iter()
                .any(|label| lowered.contains(&format!("<li>{label} -")))
        })
        .map(String::as_str)
}

/// Keeps the lines of `html` that belong to `system`.
///
/// Lines tagged for another system are dropped; lines tagged for `system`
/// are rewritten as `\t\t<li>` followed by the text after the tag.
#[must_use]
pub fn split_for_system(html: &str, system: &str, systems: &[String]) -> String {
    let mut out = String::with_capacity(html.len());
    for line in html.split_inclusive('\n') {
        match tagged_system(line, systems) {
            None => out.push_str(line),
            Some(tagged) if tagged.eq_ignore_ascii_case(system) => {
                let text = line
                    .find(" -")
                    .map_or("", |idx| line[idx + 2..].trim_start_matches(' '));
                out.push_str("\t\t<li>");
                out.push_str(text);
            }
            Some(_) => {}
        }
    }
    out
}

/// File name of the notes of `system` in `lang`:
/// `kDrive-3.6.0-win-fr.html`.
#[must_use]
pub fn notes_file_name(version: &ReleaseVersion, system: &str, lang: &str) -> String {
    format!(
        "{}-{}-{}.html",
        version.notes_stem(),
        system.to_lowercase(),
        lang.to_lowercase()
    )
}

/// Splits the combined document `combined` of `lang` into one file per
/// system next to it. Returns the written paths.
///
/// # Errors
///
/// Returns an I/O error if a file cannot be read or written.
pub fn split_file(
    combined: &Path,
    dir: &Path,
    version: &ReleaseVersion,
    lang: &str,
    systems: &[String],
) -> Result<Vec<PathBuf>> {
    let html = std::fs::read_to_string(combined).map_err(|e| KforgeError::io(combined, e))?;
    let mut written = Vec::with_capacity(systems.len());
    for system in systems {
        let path = dir.join(notes_file_name(version, system, lang));
        std::fs::write(&path, split_for_system(&html, system, systems)).map_err(|e| KforgeError::io(&path, e))?;
        tracing::debug!(path = %path.display(), "wrote release notes");
        written.push(path);
    }
    Ok(written)
}

/// Outcome of [`generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesReport {
    /// Directory holding the generated files.
    pub dir: PathBuf,
    /// Every generated file.
    pub files: Vec<PathBuf>,
    /// Translation usage after the run, if the service reported it.
    pub usage: Option<Usage>,
}

/// Generates the release notes of `version` from `template` into
/// `output_root/kDrive-<version>/`.
///
/// # Errors
///
/// Returns `KforgeError::Validation` if the template is missing,
/// `KforgeError::Configuration` if `output_root` does not exist, and
/// network or I/O errors from translating and writing.
pub fn generate(
    template: &Path,
    output_root: &Path,
    version: &ReleaseVersion,
    release: &ReleaseConfig,
    translator: &dyn Translator,
) -> Result<NotesReport> {
    if !template.is_file() {
        return Err(KforgeError::Validation {
            kind: "release notes template",
            path: template.to_path_buf(),
        });
    }
    if !output_root.is_dir() {
        return Err(KforgeError::configuration(format!(
            "release notes path does not exist: {}",
            output_root.display()
        )));
    }
    let _span = tracing::info_span!("release_notes", version = %version).entered();
    let dir = output_root.join(version.notes_stem());
    std::fs::create_dir_all(&dir).map_err(|e| KforgeError::io(&dir, e))?;

    let english = std::fs::read_to_string(template).map_err(|e| KforgeError::io(template, e))?;
    let mut files = Vec::new();
    let combined_name = |lang: &str| format!("{}-{}.html", version.notes_stem(), lang.to_lowercase());

    for lang in &release.target_languages {
        tracing::info!(lang = %lang, "translating release notes");
        let translations = translator.translate(std::slice::from_ref(&english), lang, TextFormat::Html)?;
        let [translated]: [String; 1] = translations.try_into().map_err(|got: Vec<String>| KforgeError::Network {
            url: release.translation_endpoint.clone(),
            message: format!("expected 1 translation for {lang}, got {}", got.len()),
        })?;
        let combined = dir.join(combined_name(lang));
        std::fs::write(&combined, translated).map_err(|e| KforgeError::io(&combined, e))?;
        files.extend(split_file(&combined, &dir, version, lang, &release.systems)?);
        std::fs::remove_file(&combined).map_err(|e| KforgeError::io(&combined, e))?;
    }

    let combined = dir.join(combined_name(TEMPLATE_LANGUAGE));
    let _ = std::fs::copy(template, &combined).map_err(|e| KforgeError::io(template, e))?;
    files.extend(split_file(&combined, &dir, version, TEMPLATE_LANGUAGE, &release.systems)?);
    std::fs::remove_file(&combined).map_err(|e| KforgeError::io(&combined, e))?;

    let usage = match translator.usage() {
        Ok(usage) => {
            tracing::info!(characters = usage.character_count, limit = usage.character_limit, "translation done");
            Some(usage)
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not read translation usage");
            None
        }
    };
    Ok(NotesReport { dir, files, usage })
}
