//! Statement tokenizer
//!
//! Splits raw script text into statement tokens. Splitting is quote and
//! brace aware: a `;` or newline only separates statements outside quotes
//! and at brace depth zero, so `{a, b}` argument tables and quoted strings
//! can span separators.

/// Split raw script text into trimmed statement tokens
///
/// Empty tokens are dropped; a final unterminated token is still emitted.
pub fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut brace_level: i32 = 0;

    for ch in raw.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '{' if !in_quotes => brace_level += 1,
            '}' if !in_quotes => brace_level -= 1,
            _ => {}
        }

        if (ch == ';' || ch == '\n') && !in_quotes && brace_level <= 0 {
            let token = current.trim();
            if !token.is_empty() {
                tokens.push(token.to_string());
            }
            current.clear();
        } else {
            current.push(ch);
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        tokens.push(last.to_string());
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_semicolon_and_newline() {
        assert_eq!(tokenize("a; b\nc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_drops_empty_tokens() {
        assert_eq!(tokenize(";;a;;\n\n"), vec!["a"]);
    }

    #[test]
    fn test_quotes_protect_separators() {
        assert_eq!(
            tokenize("channel.send \"one; two\"; print x"),
            vec!["channel.send \"one; two\"", "print x"]
        );
    }

    #[test]
    fn test_braces_protect_separators() {
        assert_eq!(
            tokenize("channel.send_embed {title: a;\ndesc: b}"),
            vec!["channel.send_embed {title: a;\ndesc: b}"]
        );
    }

    #[test]
    fn test_braces_inside_quotes_ignored() {
        // the closing brace is quoted, so depth stays balanced
        assert_eq!(tokenize("print \"{\"; print y"), vec!["print \"{\"", "print y"]);
    }

    #[test]
    fn test_final_unterminated_token() {
        assert_eq!(tokenize("print last"), vec!["print last"]);
    }
}
