//! Formatted output helpers for CLI commands.
//!
//! Provides aligned tables, indented key/value sections and short
//! identifiers for terminal output.

/// Left-aligns `rows` under `headers`, two spaces between columns.
#[must_use]
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(idx) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut out = line(headers.to_vec());
    for row in rows {
        out.push('\n');
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

/// `  key: value` lines under a title; empty sections print `(none)`.
#[must_use]
pub fn format_section<K, V>(title: &str, entries: impl IntoIterator<Item = (K, V)>) -> String
where
    K: std::fmt::Display,
    V: std::fmt::Display,
{
    let mut out = format!("{title}:");
    let mut empty = true;
    for (key, value) in entries {
        out.push_str(&format!("\n  {key}: {value}"));
        empty = false;
    }
    if empty {
        out.push_str(" (none)");
    }
    out
}

/// Comma-separated list, `-` when empty.
#[must_use]
pub fn format_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() { "-".to_string() } else { joined }
}

/// First twelve characters of a package id.
#[must_use]
pub fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
