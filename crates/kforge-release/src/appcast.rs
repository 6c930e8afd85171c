//! Update feed (Sparkle appcast) rewriting.
//!
//! Each `<item>` of the feed gets exactly one
//! `<sparkle:releaseNotesLink>` per language (English without `xml:lang`,
//! the others tagged), its enclosure `url` moved under the download base
//! URL, and its `pubDate` normalized to RFC 2822. Everything else is
//! written back unchanged.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use kforge_common::error::{KforgeError, Result};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::notes::{TEMPLATE_LANGUAGE, notes_file_name};
use crate::version::ReleaseVersion;

const NOTES_LINK: &str = "sparkle:releaseNotesLink";

fn xml_error(e: impl std::fmt::Display) -> KforgeError {
    KforgeError::Parse {
        what: "appcast",
        message: e.to_string(),
    }
}

/// What to write into the feed.
#[derive(Debug, Clone)]
pub struct AppcastUpdate {
    /// Release the feed announces.
    pub version: ReleaseVersion,
    /// System tag of the feed's release notes (`macos`).
    pub system: String,
    /// Translated languages, in addition to English.
    pub languages: Vec<String>,
    /// Base URL of the published release notes.
    pub notes_base_url: String,
    /// Base URL of the installers.
    pub download_base_url: String,
    /// Publication date; the feed's own date is kept when `None`.
    pub date: Option<NaiveDate>,
}

impl AppcastUpdate {
    /// `(language, url)` for every release-notes link, English first.
    #[must_use]
    pub fn notes_links(&self) -> Vec<(String, String)> {
        std::iter::once(TEMPLATE_LANGUAGE.to_string())
            .chain(self.languages.iter().map(|l| l.to_lowercase()))
            .map(|lang| {
                let url = format!(
                    "{}/{}/{}",
                    self.notes_base_url.trim_end_matches('/'),
                    self.version.notes_stem(),
                    notes_file_name(&self.version, &self.system, &lang)
                );
                (lang, url)
            })
            .collect()
    }

    fn pub_date(&self, existing: &str) -> Result<String> {
        if let Some(date) = self.date {
            let midnight = date.and_time(chrono::NaiveTime::MIN).and_utc();
            return Ok(midnight.to_rfc2822());
        }
        let existing = existing.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc2822(existing) {
            return Ok(parsed.to_rfc2822());
        }
        NaiveDate::parse_from_str(existing, "%Y-%m-%d")
            .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc().to_rfc2822())
            .map_err(|e| xml_error(format!("unreadable pubDate \"{existing}\": {e}")))
    }

    fn enclosure(&self, element: &BytesStart<'_>) -> Result<BytesStart<'static>> {
        let mut out = BytesStart::new(String::from_utf8_lossy(element.name().as_ref()).into_owned());
        for attr in element.attributes() {
            let attr = attr.map_err(xml_error)?;
            if attr.key.as_ref() == b"url" {
                let url = attr.unescape_value().map_err(xml_error)?;
                let file = url.rsplit('/').next().unwrap_or_default();
                let moved = format!("{}/{file}", self.download_base_url.trim_end_matches('/'));
                tracing::debug!(from = %url, to = %moved, "enclosure url");
                out.push_attribute(("url", moved.as_str()));
            } else {
                out.push_attribute(attr);
            }
        }
        Ok(out)
    }
}

struct FeedWriter {
    writer: Writer<Vec<u8>>,
    pending_ws: Option<String>,
}

impl FeedWriter {
    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.flush_ws()?;
        self.writer.write_event(event).map_err(xml_error)
    }

    fn flush_ws(&mut self) -> Result<()> {
        if let Some(ws) = self.pending_ws.take() {
            self.writer
                .write_event(Event::Text(BytesText::from_escaped(ws)))
                .map_err(xml_error)?;
        }
        Ok(())
    }

    fn links(&mut self, links: &[(String, String)], indent: &str) -> Result<()> {
        for (n, (lang, url)) in links.iter().enumerate() {
            if n > 0 {
                self.pending_ws = Some(indent.to_string());
            }
            let mut start = BytesStart::new(NOTES_LINK);
            if lang != TEMPLATE_LANGUAGE {
                start.push_attribute(("xml:lang", lang.as_str()));
            }
            self.event(Event::Start(start))?;
            self.event(Event::Text(BytesText::new(url)))?;
            self.event(Event::End(BytesEnd::new(NOTES_LINK)))?;
        }
        Ok(())
    }
}

/// Rewrites the feed `xml` for `update`.
///
/// # Errors
///
/// Returns `KforgeError::Parse` for malformed XML or an unreadable
/// `pubDate`.
pub fn reformat(xml: &str, update: &AppcastUpdate) -> Result<String> {
    let links = update.notes_links();
    let mut reader = Reader::from_str(xml);
    let mut out = FeedWriter {
        writer: Writer::new(Vec::with_capacity(xml.len())),
        pending_ws: None,
    };
    let mut in_item = false;
    let mut links_written = false;
    let mut child_indent = String::from("\n");

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        match event {
            Event::Text(ref t) if t.iter().all(u8::is_ascii_whitespace) => {
                let ws = String::from_utf8_lossy(t).into_owned();
                out.flush_ws()?;
                out.pending_ws = Some(ws);
            }
            Event::Start(ref e) if e.name().as_ref() == b"item" => {
                in_item = true;
                links_written = false;
                out.event(event)?;
            }
            Event::Start(ref e) if in_item && e.name().as_ref() == NOTES_LINK.as_bytes() => {
                let _ = reader.read_to_end(e.name()).map_err(xml_error)?;
                if links_written {
                    out.pending_ws = None;
                } else {
                    if let Some(ws) = &out.pending_ws {
                        child_indent.clone_from(ws);
                    }
                    out.links(&links, &child_indent)?;
                    links_written = true;
                }
            }
            Event::Empty(ref e) if in_item && e.name().as_ref() == NOTES_LINK.as_bytes() => {
                if links_written {
                    out.pending_ws = None;
                } else {
                    out.links(&links, out.pending_ws.clone().as_deref().unwrap_or("\n"))?;
                    links_written = true;
                }
            }
            Event::Start(ref e) if in_item && e.name().as_ref() == b"pubDate" => {
                if let Some(ws) = &out.pending_ws {
                    child_indent.clone_from(ws);
                }
                let existing = reader.read_text(e.name()).map_err(xml_error)?;
                let date = update.pub_date(&existing)?;
                let end = BytesEnd::new("pubDate");
                out.event(Event::Start(e.to_owned()))?;
                out.event(Event::Text(BytesText::new(&date)))?;
                out.event(Event::End(end))?;
            }
            Event::Start(ref e) if in_item && e.name().as_ref() == b"enclosure" => {
                let moved = update.enclosure(e)?;
                out.event(Event::Start(moved))?;
            }
            Event::Empty(ref e) if in_item && e.name().as_ref() == b"enclosure" => {
                let moved = update.enclosure(e)?;
                out.event(Event::Empty(moved))?;
            }
            Event::End(ref e) if e.name().as_ref() == b"item" => {
                if !links_written {
                    let closing_ws = out.pending_ws.take();
                    out.pending_ws = Some(child_indent.clone());
                    out.links(&links, &child_indent)?;
                    out.pending_ws = closing_ws;
                }
                in_item = false;
                out.event(event)?;
            }
            Event::Eof => break,
            _ => out.event(event)?,
        }
    }
    out.flush_ws()?;
    String::from_utf8(out.writer.into_inner()).map_err(xml_error)
}

/// Rewrites the feed file at `path` in place.
///
/// # Errors
///
/// Returns I/O and parse errors.
pub fn reformat_file(path: &Path, update: &AppcastUpdate) -> Result<()> {
    let xml = std::fs::read_to_string(path).map_err(|e| KforgeError::io(path, e))?;
    let out = reformat(&xml, update)?;
    std::fs::write(path, out).map_err(|e| KforgeError::io(path, e))?;
    tracing::info!(path = %path.display(), version = %update.version, "appcast updated");
    Ok(())
}

/// Today's date in UTC, the default publication date of a new release.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
