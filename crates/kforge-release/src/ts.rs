//! Filling unfinished entries of Qt Linguist `.ts` files.
//!
//! A message whose `<translation type="unfinished">` is empty gets a
//! machine translation of its `<source>`. The `unfinished` marker stays so
//! translators still review the entry; since the translation is no longer
//! empty, later runs leave it alone. Plural (`numerus="yes"`) messages are
//! skipped. Everything else is written back byte for byte.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use kforge_common::error::{KforgeError, Result};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::translate::{TextFormat, Translator};

/// Texts sent to the translator per request.
const BATCH_SIZE: usize = 50;

fn xml_error(e: impl std::fmt::Display) -> KforgeError {
    KforgeError::Parse {
        what: "Qt translation file",
        message: e.to_string(),
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .filter_map(std::result::Result::ok)
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(Cow::into_owned))
}

fn is_unfinished(element: &BytesStart<'_>) -> bool {
    attribute(element, b"type").as_deref() == Some("unfinished")
}

/// Target language of a `.ts` document, from `<TS language="fr_FR">`, as
/// an upper-case service code (`FR`).
///
/// # Errors
///
/// Returns `KforgeError::Parse` if the document is malformed or declares no
/// language.
pub fn document_language(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"TS" => {
                return attribute(&e, b"language")
                    .and_then(|lang| lang.split(['_', '-']).next().map(str::to_uppercase))
                    .filter(|lang| !lang.is_empty())
                    .ok_or_else(|| xml_error("<TS> element has no language attribute"));
            }
            Event::Eof => return Err(xml_error("no <TS> element")),
            _ => {}
        }
    }
}

/// Streams `xml` through, calling `fill` with the source text of every
/// empty unfinished singular translation. When `fill` returns a text, it
/// becomes the translation.
fn rewrite(xml: &str, mut fill: impl FnMut(&str) -> Option<String>) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut plural = false;
    let mut in_source = false;
    let mut source = String::new();

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        match &event {
            Event::Start(e) if e.name().as_ref() == b"message" => {
                plural = attribute(e, b"numerus").as_deref() == Some("yes");
                source.clear();
            }
            Event::Start(e) if e.name().as_ref() == b"source" => in_source = true,
            Event::End(e) if e.name().as_ref() == b"source" => in_source = false,
            Event::Text(t) if in_source => source.push_str(&t.unescape().map_err(xml_error)?),
            Event::Start(e) if e.name().as_ref() == b"translation" && !plural && is_unfinished(e) => {
                let element = e.to_owned();
                let existing = reader.read_text(element.name()).map_err(xml_error)?;
                let replacement = if existing.trim().is_empty() && !source.is_empty() {
                    fill(&source)
                } else {
                    None
                };
                let text = replacement.map_or(existing, |t| Cow::Owned(partial_escape(&t).into_owned()));
                write_translation(&mut writer, element, &text)?;
                continue;
            }
            Event::Empty(e) if e.name().as_ref() == b"translation" && !plural && is_unfinished(e) => {
                if !source.is_empty() {
                    if let Some(t) = fill(&source) {
                        write_translation(&mut writer, e.to_owned(), &partial_escape(&t))?;
                        continue;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        writer.write_event(event).map_err(xml_error)?;
    }
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

/// Writes `<translation ...>escaped</translation>`.
fn write_translation(writer: &mut Writer<Vec<u8>>, element: BytesStart<'static>, escaped: &str) -> Result<()> {
    let end = BytesEnd::new(String::from_utf8_lossy(element.name().as_ref()).into_owned());
    writer.write_event(Event::Start(element)).map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::from_escaped(escaped)))
        .map_err(xml_error)?;
    writer.write_event(Event::End(end)).map_err(xml_error)
}

/// Source texts that need a translation, in document order.
///
/// # Errors
///
/// Returns `KforgeError::Parse` if the document is malformed.
pub fn pending_sources(xml: &str) -> Result<Vec<String>> {
    let mut pending = Vec::new();
    let _ = rewrite(xml, |source| {
        pending.push(source.to_string());
        None
    })?;
    Ok(pending)
}

/// Fills every pending translation of `xml` through `translator`.
/// Returns the new document and the number of filled entries.
///
/// # Errors
///
/// Returns parse errors for malformed documents and translator errors.
pub fn fill_unfinished(xml: &str, translator: &dyn Translator) -> Result<(String, usize)> {
    let pending = pending_sources(xml)?;
    if pending.is_empty() {
        return Ok((xml.to_string(), 0));
    }
    let lang = document_language(xml)?;
    tracing::info!(lang = %lang, count = pending.len(), "translating unfinished messages");

    let mut translations = Vec::with_capacity(pending.len());
    for batch in pending.chunks(BATCH_SIZE) {
        let translated = translator.translate(batch, &lang, TextFormat::Html)?;
        if translated.len() != batch.len() {
            return Err(KforgeError::Parse {
                what: "translation reply",
                message: format!("expected {} translations, got {}", batch.len(), translated.len()),
            });
        }
        translations.extend(translated);
    }
    let filled = translations.len();
    let mut queue = translations.into_iter();
    let out = rewrite(xml, |_| queue.next())?;
    Ok((out, filled))
}

/// Updates one `.ts` file in place. Returns the number of filled entries.
///
/// # Errors
///
/// Returns I/O, parse and translator errors.
pub fn update_file(path: &Path, translator: &dyn Translator) -> Result<usize> {
    let xml = std::fs::read_to_string(path).map_err(|e| KforgeError::io(path, e))?;
    let (out, filled) = fill_unfinished(&xml, translator)?;
    if filled > 0 {
        std::fs::write(path, out).map_err(|e| KforgeError::io(path, e))?;
    }
    tracing::info!(path = %path.display(), filled, "translation file updated");
    Ok(filled)
}

/// The `client_*.ts` files of a source checkout, sorted.
///
/// # Errors
///
/// Returns `KforgeError::Validation` if `<source_dir>/translations` is
/// missing.
pub fn translation_files(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = source_dir.join("translations");
    if !dir.is_dir() {
        return Err(KforgeError::Validation {
            kind: "translations directory",
            path: dir,
        });
    }
    let entries = std::fs::read_dir(&dir).map_err(|e| KforgeError::io(&dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("client_") && n.ends_with(".ts"))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::translate::Usage;

    const TS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE TS>
<TS language="fr_FR" version="2.1">
<context>
<name>KDC::AboutDialog</name>
<message>
<location filename="../src/gui/aboutdialog.cpp" line="73"/>
<source>About</source>
<translation>À propos</translation>
</message>
<message>
<location filename="../src/gui/fileitemwidget.cpp" line="90"/>
<source>Open &lt;b&gt;%1&lt;/b&gt;</source>
<translation type="unfinished"></translation>
</message>
<message>
<source>Free up local space</source>
<translation type="unfinished">Libérer de l’espace local</translation>
</message>
<message numerus="yes">
<source>%n files</source>
<translation type="unfinished">
<numerusform></numerusform>
<numerusform></numerusform>
</translation>
</message>
<message>
<source>Share</source>
<translation type="unfinished"/>
</message>
</context>
</TS>
"#;

    struct Echo {
        calls: RefCell<Vec<(Vec<String>, String)>>,
    }

    impl Translator for Echo {
        fn translate(&self, texts: &[String], target_lang: &str, _: TextFormat) -> Result<Vec<String>> {
            self.calls.borrow_mut().push((texts.to_vec(), target_lang.to_string()));
            Ok(texts.iter().map(|t| format!("[{target_lang}] {t}")).collect())
        }

        fn usage(&self) -> Result<Usage> {
            Ok(Usage {
                character_count: 0,
                character_limit: 0,
            })
        }
    }

    #[test]
    fn only_empty_singular_unfinished_entries_are_pending() {
        assert_eq!(pending_sources(TS).expect("parse"), vec!["Open <b>%1</b>", "Share"]);
    }

    #[test]
    fn language_comes_from_the_ts_element() {
        assert_eq!(document_language(TS).expect("language"), "FR");
        assert!(document_language("<TS version=\"2.1\"></TS>").is_err());
    }

    #[test]
    fn fill_translates_and_escapes() {
        let echo = Echo { calls: RefCell::new(Vec::new()) };
        let (out, filled) = fill_unfinished(TS, &echo).expect("fill");
        assert_eq!(filled, 2);
        assert_eq!(echo.calls.borrow().len(), 1);
        assert_eq!(echo.calls.borrow()[0].1, "FR");

        assert!(out.contains(
            "<translation type=\"unfinished\">[FR] Open &lt;b&gt;%1&lt;/b&gt;</translation>"
        ));
        assert!(out.contains("<translation type=\"unfinished\">[FR] Share</translation>"));
        assert!(out.contains("Libérer de l’espace local"));
        assert!(out.contains("<numerusform></numerusform>"));
        assert!(out.contains("<translation>À propos</translation>"));
        assert!(out.contains("<TS language=\"fr_FR\" version=\"2.1\">"));
    }

    #[test]
    fn short_translation_reply_is_rejected() {
        struct Short;

        impl Translator for Short {
            fn translate(&self, texts: &[String], _: &str, _: TextFormat) -> Result<Vec<String>> {
                Ok(texts[..texts.len() - 1].to_vec())
            }

            fn usage(&self) -> Result<Usage> {
                Ok(Usage {
                    character_count: 0,
                    character_limit: 0,
                })
            }
        }

        let err = fill_unfinished(TS, &Short).unwrap_err();
        assert!(matches!(err, KforgeError::Parse { what: "translation reply", .. }), "got: {err}");
        assert!(err.to_string().contains("expected 2 translations, got 1"), "got: {err}");
    }

    #[test]
    fn filled_document_has_nothing_pending() {
        let echo = Echo { calls: RefCell::new(Vec::new()) };
        let (out, _) = fill_unfinished(TS, &echo).expect("fill");
        assert!(pending_sources(&out).expect("parse").is_empty());
        let (again, filled) = fill_unfinished(&out, &echo).expect("refill");
        assert_eq!(filled, 0);
        assert_eq!(again, out);
    }

    #[test]
    fn translation_files_are_discovered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let translations = dir.path().join("translations");
        std::fs::create_dir_all(&translations).expect("mkdir");
        for name in ["client_it.ts", "client_de.ts", "notes.txt", "other_fr.ts"] {
            std::fs::write(translations.join(name), "").expect("write");
        }
        let files = translation_files(dir.path()).expect("files");
        let names: Vec<_> = files.iter().filter_map(|p| p.file_name()?.to_str()).collect();
        assert_eq!(names, ["client_de.ts", "client_it.ts"]);
        assert!(translation_files(&dir.path().join("missing")).is_err());
    }
}
