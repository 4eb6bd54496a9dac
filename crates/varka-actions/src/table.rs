//! Key:value argument tables for rich payloads
//!
//! Commands like `channel.send_embed` take a loose `{key: value, ...}`
//! table rather than strict JSON. Commas split segments only outside
//! quotes, and only when the remainder opens with another `key:` pair, so
//! unquoted values may themselves contain commas. Keys are lowercased and
//! folded through a small alias map; `field`-prefixed keys accumulate into
//! an ordered list of `name|value|inline` triples.
//!
//! Variable substitution happens before the table reaches this parser; the
//! parser itself is pure text.

use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

fn key_ahead_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\w+:").expect("valid regex"))
}

/// One `field*` entry of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// A parsed argument table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgTable {
    /// Canonical-keyed scalar entries, in source order
    pub entries: IndexMap<String, String>,
    /// Accumulated `field*` entries, in source order
    pub fields: Vec<TableField>,
}

impl ArgTable {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// Canonical key for a table entry; `None` drops the segment
fn canonical_key(key: &str) -> Option<&'static str> {
    match key {
        "title" => Some("title"),
        "desc" | "description" => Some("description"),
        "color" => Some("color"),
        "thumb" | "thumbnail" => Some("thumbnail"),
        "image" => Some("image"),
        "footer" => Some("footer"),
        "url" => Some("url"),
        _ => None,
    }
}

/// Split table text on commas that sit outside quotes and are followed by
/// another `key:` pair
fn segments(clean: &str) -> Vec<String> {
    let chars: Vec<char> = clean.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '"' && (i == 0 || chars[i - 1] != '\\') {
            in_quotes = !in_quotes;
            current.push(ch);
        } else if ch == ',' && !in_quotes {
            let remaining: String = chars[i + 1..].iter().collect();
            if key_ahead_re().is_match(remaining.trim_start()) {
                segments.push(current.trim().to_string());
                current.clear();
            } else {
                current.push(ch);
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        segments.push(current.trim().to_string());
    }
    segments
}

fn strip_value(raw: &str) -> String {
    raw.trim().trim_matches('"').to_string()
}

/// Parse a loose `{key: value, ...}` table
pub fn parse_table(input: &str) -> ArgTable {
    let clean = input
        .trim()
        .trim_matches('"')
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim();

    let mut table = ArgTable::default();
    for segment in segments(clean) {
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = strip_value(value);

        if let Some(canonical) = canonical_key(&key) {
            table.entries.insert(canonical.to_string(), value);
        } else if key.starts_with("field") {
            let mut parts = value.split('|');
            table.fields.push(TableField {
                name: parts.next().map(str::trim).unwrap_or("None").to_string(),
                value: parts.next().map(str::trim).unwrap_or("None").to_string(),
                inline: parts
                    .next()
                    .map(|p| p.trim().eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            });
        }
    }
    table
}

/// Parse a table's `color` entry as a hex integer, with a fallback
pub fn parse_color(table: &ArgTable, fallback: u32) -> u32 {
    table
        .get("color")
        .map(|c| c.replace('#', "").replace("0x", ""))
        .and_then(|c| u32::from_str_radix(&c, 16).ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_table() {
        let table = parse_table("{title: Welcome, desc: Hello there, color: 0xff0000}");
        assert_eq!(table.get("title"), Some("Welcome"));
        assert_eq!(table.get("description"), Some("Hello there"));
        assert_eq!(parse_color(&table, 0x00ff00), 0xff0000);
    }

    #[test]
    fn test_comma_inside_value_without_key_ahead() {
        let table = parse_table("{title: One, two and three, footer: done}");
        assert_eq!(table.get("title"), Some("One, two and three"));
        assert_eq!(table.get("footer"), Some("done"));
    }

    #[test]
    fn test_comma_inside_quotes() {
        let table = parse_table(r#"{desc: "a, b: c", footer: end}"#);
        assert_eq!(table.get("description"), Some("a, b: c"));
        assert_eq!(table.get("footer"), Some("end"));
    }

    #[test]
    fn test_fields_accumulate_in_order() {
        let table = parse_table("{field1: Name|Value|true, field2: Other|Thing}");
        assert_eq!(
            table.fields,
            vec![
                TableField {
                    name: "Name".into(),
                    value: "Value".into(),
                    inline: true,
                },
                TableField {
                    name: "Other".into(),
                    value: "Thing".into(),
                    inline: false,
                },
            ]
        );
    }

    #[test]
    fn test_alias_keys_fold() {
        let table = parse_table("{thumb: http://x/i.png, description: d}");
        assert_eq!(table.get("thumbnail"), Some("http://x/i.png"));
    }

    #[test]
    fn test_bad_color_uses_fallback() {
        let table = parse_table("{color: chartreuse}");
        assert_eq!(parse_color(&table, 0x00ff00), 0x00ff00);
    }

    #[test]
    fn test_segment_without_colon_dropped() {
        let table = parse_table("{title: ok, stray segment}");
        assert_eq!(table.get("title"), Some("ok, stray segment"));
        assert_eq!(table.entries.len(), 1);
    }
}
