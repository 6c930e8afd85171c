//! Release-notes generation end to end.
//!
//! Covered scenarios:
//! 1. Every language is split per OS and the combined files are removed
//! 2. OS-tagged entries reach only their system, untagged entries reach all
//! 3. The translation service is driven over HTTP with the documented key header
//! 4. Missing template or output root fail before anything is written
//! 5. A service reply without exactly one translation aborts without writing notes

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use kforge_common::config::ReleaseConfig;
use kforge_common::error::{KforgeError, Result};
use kforge_release::notes::generate;
use kforge_release::translate::{DeeplClient, TextFormat, Translator, Usage};
use kforge_release::version::ReleaseVersion;

const TEMPLATE: &str = "<html>\n<body>\n\t<ul>\n\t\t<li>Improved sync speed</li>\n\t\t<li>Windows - Fixed bug</li>\n\t\t<li>macOS - New icon</li>\n\t\t<li>Linux - Fixed tray</li>\n\t</ul>\n</body>\n</html>\n";

/// Marks every entry with the target language.
struct Marker;

impl Translator for Marker {
    fn translate(&self, texts: &[String], target_lang: &str, format: TextFormat) -> Result<Vec<String>> {
        assert_eq!(format, TextFormat::Html);
        Ok(texts
            .iter()
            .map(|t| t.replace("</li>", &format!(" ({target_lang})</li>")))
            .collect())
    }

    fn usage(&self) -> Result<Usage> {
        Ok(Usage {
            character_count: 4200,
            character_limit: 500_000,
        })
    }
}

fn setup(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let template = dir.join("kDrive-template.html");
    std::fs::write(&template, TEMPLATE).expect("template");
    let root = dir.join("release_notes");
    std::fs::create_dir_all(&root).expect("root");
    (template, root)
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("read notes")
}

// ── Splitting ────────────────────────────────────────────────────

#[test]
fn every_language_is_split_per_system() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (template, root) = setup(dir.path());
    let version: ReleaseVersion = "3.6.0".parse().expect("version");

    let report = generate(&template, &root, &version, &ReleaseConfig::default(), &Marker).expect("generate");

    assert_eq!(report.dir, root.join("kDrive-3.6.0"));
    assert_eq!(report.files.len(), 15);
    assert_eq!(report.usage.map(|u| u.character_count), Some(4200));

    let mut names: Vec<String> = std::fs::read_dir(&report.dir)
        .expect("dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 15, "combined files must be removed: {names:?}");
    assert!(names.contains(&"kDrive-3.6.0-win-en.html".to_string()));
    assert!(names.contains(&"kDrive-3.6.0-macos-it.html".to_string()));
    assert!(!names.contains(&"kDrive-3.6.0-en.html".to_string()));
    assert!(!names.contains(&"kDrive-3.6.0-fr.html".to_string()));
}

#[test]
fn tagged_entries_reach_only_their_system() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (template, root) = setup(dir.path());
    let version: ReleaseVersion = "3.6.0".parse().expect("version");
    let report = generate(&template, &root, &version, &ReleaseConfig::default(), &Marker).expect("generate");

    let win_en = read(&report.dir.join("kDrive-3.6.0-win-en.html"));
    assert!(win_en.contains("\t\t<li>Fixed bug</li>\n"), "got: {win_en}");
    assert!(win_en.contains("<li>Improved sync speed</li>"));
    assert!(!win_en.contains("New icon"));
    assert!(!win_en.contains("Fixed tray"));

    let linux_en = read(&report.dir.join("kDrive-3.6.0-linux-en.html"));
    assert!(!linux_en.contains("Fixed bug"));
    assert!(linux_en.contains("\t\t<li>Fixed tray</li>\n"));

    let mac_fr = read(&report.dir.join("kDrive-3.6.0-macos-fr.html"));
    assert!(mac_fr.contains("\t\t<li>New icon (FR)</li>\n"), "got: {mac_fr}");
    assert!(mac_fr.contains("<li>Improved sync speed (FR)</li>"));
    assert!(!mac_fr.contains("Fixed bug"));
}

// ── Translation service ──────────────────────────────────────────

#[test]
fn notes_are_translated_through_the_service() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (template, root) = setup(dir.path());
    let version: ReleaseVersion = "3.6.1".parse().expect("version");

    let translated = TEMPLATE.replace("Fixed bug", "Correction de bogue");
    let mut server = mockito::Server::new();
    let translate = server
        .mock("POST", "/v2/translate")
        .match_header("authorization", "DeepL-Auth-Key test-key")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "target_lang": "FR",
            "tag_handling": "html",
        })))
        .with_body(serde_json::json!({ "translations": [{ "text": translated }] }).to_string())
        .expect(1)
        .create();
    let usage = server
        .mock("GET", "/v2/usage")
        .with_body(r#"{"character_count":321,"character_limit":500000}"#)
        .create();

    let release = ReleaseConfig {
        translation_endpoint: server.url(),
        target_languages: vec!["FR".into()],
        ..ReleaseConfig::default()
    };
    let client = DeeplClient::new(&release.translation_endpoint, "test-key").expect("client");
    let report = generate(&template, &root, &version, &release, &client).expect("generate");

    translate.assert();
    usage.assert();
    assert_eq!(report.files.len(), 6);
    assert_eq!(report.usage.map(|u| u.character_count), Some(321));
    let win_fr = read(&report.dir.join("kDrive-3.6.1-win-fr.html"));
    assert!(win_fr.contains("\t\t<li>Correction de bogue</li>"), "got: {win_fr}");
}

#[test]
fn service_failure_aborts_generation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (template, root) = setup(dir.path());
    let mut server = mockito::Server::new();
    let _mock = server.mock("POST", "/v2/translate").with_status(403).create();

    let release = ReleaseConfig {
        target_languages: vec!["DE".into()],
        ..ReleaseConfig::default()
    };
    let client = DeeplClient::new(server.url(), "bad").expect("client");
    let err = generate(&template, &root, &"3.6.1".parse().expect("version"), &release, &client).unwrap_err();
    assert!(matches!(err, KforgeError::Network { .. }), "got: {err}");
}

#[test]
fn empty_translation_reply_aborts_without_writing_notes() {
    struct Empty;

    impl Translator for Empty {
        fn translate(&self, _texts: &[String], _target_lang: &str, _format: TextFormat) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn usage(&self) -> Result<Usage> {
            Ok(Usage {
                character_count: 0,
                character_limit: 500_000,
            })
        }
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let (template, root) = setup(dir.path());
    let version: ReleaseVersion = "3.6.0".parse().expect("version");

    let err = generate(&template, &root, &version, &ReleaseConfig::default(), &Empty).unwrap_err();

    assert!(matches!(err, KforgeError::Network { .. }), "got: {err}");
    assert!(err.to_string().contains("expected 1 translation"), "got: {err}");
    let written = std::fs::read_dir(root.join("kDrive-3.6.0")).expect("dir").count();
    assert_eq!(written, 0);
}

// ── Preconditions ────────────────────────────────────────────────

#[test]
fn missing_template_is_a_validation_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let version: ReleaseVersion = "3.6.0".parse().expect("version");
    let err = generate(
        &dir.path().join("kDrive-template.html"),
        dir.path(),
        &version,
        &ReleaseConfig::default(),
        &Marker,
    )
    .unwrap_err();
    assert!(matches!(err, KforgeError::Validation { kind: "release notes template", .. }));
}

#[test]
fn missing_output_root_is_a_configuration_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (template, _) = setup(dir.path());
    let version: ReleaseVersion = "3.6.0".parse().expect("version");
    let missing = dir.path().join("nowhere");
    let err = generate(&template, &missing, &version, &ReleaseConfig::default(), &Marker).unwrap_err();
    assert!(err.to_string().contains("release notes path does not exist"), "got: {err}");
    assert!(!missing.exists());
}
