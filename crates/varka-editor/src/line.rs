//! Line-level edit directives
//!
//! A directive is `<1-based line number><operator><content>` where the
//! operator is `^` (insert before), `.` (insert after), `-` (delete), or
//! absent (replace). At most one space or tab after the operator is
//! consumed, so content keeps any further indentation; content may span
//! newlines.
//!
//! Out-of-range directives (line zero, or past the end — except insert-after
//! at exactly one-past-the-end) are silent no-ops. Input without a leading
//! line number is not a directive at all; callers append it as a new line.

use regex::Regex;
use std::sync::OnceLock;

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^(\d+)([\^.\-]?)[ \t]?(.*)$").expect("valid regex"))
}

/// Apply one edit directive to newline-delimited source
///
/// Returns `None` when the input is not a directive; otherwise the (possibly
/// unchanged) new source.
pub fn apply_edit(source: &str, directive: &str) -> Option<String> {
    let caps = directive_re().captures(directive.trim())?;

    let line_num: usize = caps[1].parse().ok()?;
    let operator = &caps[2];
    let content = &caps[3];

    let mut lines: Vec<String> = source.split('\n').map(String::from).collect();

    if line_num == 0 {
        return Some(source.to_string());
    }
    let idx = line_num - 1;
    if idx >= lines.len() && operator != "." {
        return Some(source.to_string());
    }

    match operator {
        "^" => lines.insert(idx, content.to_string()),
        "." => {
            if idx > lines.len() {
                return Some(source.to_string());
            }
            let at = (idx + 1).min(lines.len());
            lines.insert(at, content.to_string());
        }
        "-" => {
            lines.remove(idx);
        }
        _ => lines[idx] = content.to_string(),
    }

    Some(lines.join("\n"))
}

/// Prefix each line with its right-aligned 1-based number and one space
pub fn render_with_numbers(source: &str) -> String {
    let lines: Vec<&str> = source.split('\n').collect();
    let pad = lines.len().to_string().len();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>pad$} {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "a\nb\nc";

    #[test]
    fn test_insert_before() {
        assert_eq!(apply_edit(SOURCE, "2^x").unwrap(), "a\nx\nb\nc");
    }

    #[test]
    fn test_insert_after_and_one_past_end() {
        assert_eq!(apply_edit(SOURCE, "2.x").unwrap(), "a\nb\nx\nc");
        assert_eq!(apply_edit(SOURCE, "4.y").unwrap(), "a\nb\nc\ny");
        // two past the end is out of range
        assert_eq!(apply_edit(SOURCE, "5.y").unwrap(), SOURCE);
    }

    #[test]
    fn test_delete() {
        assert_eq!(apply_edit(SOURCE, "2-").unwrap(), "a\nc");
    }

    #[test]
    fn test_replace() {
        assert_eq!(apply_edit(SOURCE, "2 x").unwrap(), "a\nx\nc");
        assert_eq!(apply_edit(SOURCE, "3").unwrap(), "a\nb\n");
    }

    #[test]
    fn test_out_of_range_is_noop() {
        assert_eq!(apply_edit(SOURCE, "0 x").unwrap(), SOURCE);
        assert_eq!(apply_edit(SOURCE, "9-").unwrap(), SOURCE);
        assert_eq!(apply_edit(SOURCE, "9 x").unwrap(), SOURCE);
    }

    #[test]
    fn test_non_directive_returns_none() {
        assert!(apply_edit(SOURCE, "channel.send hi").is_none());
        assert!(apply_edit(SOURCE, "").is_none());
    }

    #[test]
    fn test_one_separator_eaten_indentation_kept() {
        assert_eq!(apply_edit(SOURCE, "2      indented").unwrap(), "a\n     indented\nc");
        assert_eq!(apply_edit(SOURCE, "2\t\tkept").unwrap(), "a\n\tkept\nc");
    }

    #[test]
    fn test_multiline_content() {
        assert_eq!(apply_edit(SOURCE, "2 x\ny").unwrap(), "a\nx\ny\nc");
    }

    #[test]
    fn test_render_with_numbers_pads() {
        let ten_lines = vec!["l"; 10].join("\n");
        let rendered = render_with_numbers(&ten_lines);
        assert!(rendered.starts_with(" 1 l"));
        assert!(rendered.ends_with("10 l"));
    }
}
