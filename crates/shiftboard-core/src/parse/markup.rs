//! Markup helpers for table extraction.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::identity::normalize_ws;

static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<table\b([^>]*)>(.*?)</table\s*>").expect("Invalid table regex")
});

static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("Invalid row regex"));

static CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(td|th)\b[^>]*>(.*?)</t[dh]\s*>").expect("Invalid cell regex")
});

/// Matches `class` and `id` attributes with double, single or no quotes.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:class|id)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("Invalid attribute regex")
});

static BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</?(?:p|div|li)\b[^>]*>").expect("Invalid break regex"));

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("Invalid entity regex"));

/// A table cell with its markup stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Cell {
    pub header: bool,
    pub text: String,
}

/// Returns the inner markup of the first table whose `class` or `id`
/// attribute mentions `needle` (case-insensitive).
pub(crate) fn find_table<'a>(doc: &'a str, needle: &str) -> Option<&'a str> {
    let needle = needle.to_lowercase();
    TABLE_RE.captures_iter(doc).find_map(|caps| {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        let tagged = ATTR_RE.captures_iter(attrs).any(|a| {
            a.iter()
                .skip(1)
                .flatten()
                .any(|v| v.as_str().to_lowercase().contains(&needle))
        });
        if tagged {
            caps.get(2).map(|m| m.as_str())
        } else {
            None
        }
    })
}

/// Splits table markup into rows of cells, top to bottom.
pub(crate) fn rows(table: &str) -> Vec<Vec<Cell>> {
    ROW_RE
        .captures_iter(table)
        .filter_map(|row| row.get(1))
        .map(|inner| {
            CELL_RE
                .captures_iter(inner.as_str())
                .map(|cell| Cell {
                    header: cell[1].eq_ignore_ascii_case("th"),
                    text: text_content(&cell[2]),
                })
                .collect()
        })
        .collect()
}

/// Strips tags, decodes entities and collapses whitespace.
pub(crate) fn text_content(markup: &str) -> String {
    let spaced = BREAK_RE.replace_all(markup, " ");
    let mut out = String::with_capacity(spaced.len());
    let mut in_tag = false;
    for ch in spaced.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&decode_entities(&out))
}

/// Decodes the named entities schedule pages use plus numeric references.
/// Unknown entities are left as written.
pub(crate) fn decode_entities(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |caps: &Captures<'_>| {
            let body = &caps[1];
            let decoded = match body {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                "ndash" => Some('\u{2013}'),
                "mdash" => Some('\u{2014}'),
                _ => numeric_entity(body),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn numeric_entity(body: &str) -> Option<char> {
    let digits = body.strip_prefix('#')?;
    let code = match digits.strip_prefix(|c: char| c == 'x' || c == 'X') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_table_by_class_or_id() {
        let doc = r#"<table class="nav"><tr><td>x</td></tr></table>
            <table id='weekSchedule'><tr><td>y</td></tr></table>"#;
        let inner = find_table(doc, "schedule").unwrap();
        assert!(inner.contains(">y<"));
        assert!(find_table(doc, "roster").is_none());
    }

    #[test]
    fn unquoted_attribute() {
        let doc = "<TABLE class=schedule-grid><TR><TD>a</TD></TR></TABLE>";
        assert!(find_table(doc, "schedule").is_some());
    }

    #[test]
    fn rows_keep_header_flag() {
        let table = "<tr><th>Provider</th><th>Date</th></tr><tr><td>Jane</td><td>2/3</td></tr>";
        let rows = rows(table);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].iter().all(|c| c.header));
        assert_eq!(rows[1][0].text, "Jane");
        assert!(!rows[1][1].header);
    }

    #[test]
    fn text_content_strips_and_decodes() {
        assert_eq!(
            text_content("<b>Dr.&nbsp;Jane</b>\n  Smith<br/>MD"),
            "Dr. Jane Smith MD"
        );
        assert_eq!(text_content("Smith &amp; Jones"), "Smith & Jones");
        assert_eq!(text_content("9:00&#8211;12:00"), "9:00\u{2013}12:00");
    }

    #[test]
    fn decode_is_single_pass() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
        assert_eq!(decode_entities("&bogus; &#x27;"), "&bogus; '");
    }
}
