//! `{path}` placeholder substitution
//!
//! Scans text for single-brace placeholders and replaces each with the
//! resolver's stringified value. A placeholder whose path is absent is left
//! untouched verbatim, so re-substituting is a no-op rather than an erasure.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use varka_core::{ContextResolver, ExecutionContext};

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([a-zA-Z0-9_.\-,\s]+)\}").expect("valid regex"))
}

/// Replace every resolvable `{path}` placeholder in `text`
pub fn substitute(text: &str, resolver: &dyn ContextResolver, ctx: &ExecutionContext) -> String {
    if !text.contains('{') {
        return text.to_string();
    }

    placeholder_regex()
        .replace_all(text, |caps: &Captures<'_>| {
            let path = caps.get(1).map_or("", |m| m.as_str()).trim();
            match resolver.resolve(path, ctx) {
                Some(value) => value.to_string(),
                // absent path: keep the placeholder verbatim
                None => caps.get(0).map_or("", |m| m.as_str()).to_string(),
            }
        })
        .into_owned()
}
