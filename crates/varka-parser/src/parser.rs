//! Statement-tree construction
//!
//! Builds a forest of statement nodes from the lexer's tokens. The parser
//! keeps a stack of destination frames, root first; `if`/`else`/`endif`
//! tokens push, swap, and pop frames. Malformed nesting never raises: a
//! stray `else` or `endif` at root degrades by rule, so any text parses.

use regex::Regex;
use std::sync::OnceLock;

use varka_core::{Conditional, Statement};

use crate::lexer::tokenize;

fn then_split_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+then").expect("valid regex"))
}

/// Parse raw script text into a statement forest
///
/// Comments and blank-free literal lines are preserved verbatim so the
/// result can be rendered back for editing.
pub fn parse(raw: &str) -> Vec<Statement> {
    let tokens = tokenize(raw);

    // Each frame is a finished-or-open branch plus the index of its owning
    // conditional within the parent frame (None for the root).
    struct Frame {
        dest: Vec<Statement>,
        owner: Option<OwnerSlot>,
    }

    enum OwnerSlot {
        Then,
        Else,
    }

    let mut stack: Vec<Frame> = vec![Frame {
        dest: Vec::new(),
        owner: None,
    }];

    fn close_frame(stack: &mut Vec<Frame>) {
        let frame = stack.pop().expect("root frame always present");
        let parent = stack.last_mut().expect("root frame always present");
        let slot = frame.owner.expect("non-root frame has an owner");
        let Some(Statement::Conditional(owner)) = parent.dest.last_mut() else {
            unreachable!("owning conditional is the last statement of the parent");
        };
        match slot {
            OwnerSlot::Then => owner.then_branch.extend(frame.dest),
            OwnerSlot::Else => owner.else_branch.extend(frame.dest),
        }
    }

    for token in tokens {
        let low = token.to_lowercase();

        if low.starts_with("if ") {
            let cond_part = token[3..].trim();
            let condition = match then_split_regex().find(cond_part) {
                Some(m) => cond_part[..m.start()].trim().to_string(),
                None => cond_part.to_string(),
            };
            stack
                .last_mut()
                .expect("root frame always present")
                .dest
                .push(Statement::Conditional(Conditional::new(condition)));
            stack.push(Frame {
                dest: Vec::new(),
                owner: Some(OwnerSlot::Then),
            });
        } else if low == "else" {
            if stack.len() > 1 {
                close_frame(&mut stack);
                stack.push(Frame {
                    dest: Vec::new(),
                    owner: Some(OwnerSlot::Else),
                });
            }
        } else if low == "endif" {
            if stack.len() > 1 {
                close_frame(&mut stack);
            } else {
                // stray endif at root is kept as a literal no-op so the
                // source re-serializes exactly
                stack[0].dest.push(Statement::Literal(token));
            }
        } else {
            stack
                .last_mut()
                .expect("root frame always present")
                .dest
                .push(Statement::from_text(token));
        }
    }

    // unterminated blocks: fold open frames back into their owners
    while stack.len() > 1 {
        close_frame(&mut stack);
    }

    stack.pop().expect("root frame always present").dest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_statements() {
        let forest = parse("print a; print b");
        assert_eq!(
            forest,
            vec![
                Statement::Literal("print a".into()),
                Statement::Literal("print b".into()),
            ]
        );
    }

    #[test]
    fn test_if_then_else_endif() {
        let forest = parse("if message.length > 3 then\nprint A\nelse\nprint B\nendif");
        assert_eq!(forest.len(), 1);
        let Statement::Conditional(cond) = &forest[0] else {
            panic!("expected conditional");
        };
        assert_eq!(cond.condition, "message.length > 3");
        assert_eq!(cond.then_branch, vec![Statement::Literal("print A".into())]);
        assert_eq!(cond.else_branch, vec![Statement::Literal("print B".into())]);
    }

    #[test]
    fn test_condition_without_then() {
        let forest = parse("if x == 1\nprint A\nendif");
        let Statement::Conditional(cond) = &forest[0] else {
            panic!("expected conditional");
        };
        assert_eq!(cond.condition, "x == 1");
    }

    #[test]
    fn test_case_insensitive_keywords() {
        let forest = parse("IF x THEN\nprint A\nELSE\nprint B\nENDIF");
        let Statement::Conditional(cond) = &forest[0] else {
            panic!("expected conditional");
        };
        assert_eq!(cond.condition, "x");
        assert_eq!(cond.else_branch.len(), 1);
    }

    #[test]
    fn test_stray_endif_kept_as_literal() {
        let forest = parse("print a\nendif");
        assert_eq!(
            forest,
            vec![
                Statement::Literal("print a".into()),
                Statement::Literal("endif".into()),
            ]
        );
    }

    #[test]
    fn test_stray_else_at_root_is_dropped() {
        let forest = parse("else\nprint a");
        assert_eq!(forest, vec![Statement::Literal("print a".into())]);
    }

    #[test]
    fn test_unterminated_if_still_parses() {
        let forest = parse("if x then\nprint a");
        let Statement::Conditional(cond) = &forest[0] else {
            panic!("expected conditional");
        };
        assert_eq!(cond.then_branch, vec![Statement::Literal("print a".into())]);
    }

    #[test]
    fn test_nested_conditionals() {
        let forest = parse("if a then\nif b then\nprint deep\nendif\nendif");
        let Statement::Conditional(outer) = &forest[0] else {
            panic!("expected conditional");
        };
        let Statement::Conditional(inner) = &outer.then_branch[0] else {
            panic!("expected nested conditional");
        };
        assert_eq!(inner.condition, "b");
        assert_eq!(
            inner.then_branch,
            vec![Statement::Literal("print deep".into())]
        );
    }

    #[test]
    fn test_comments_preserved() {
        let forest = parse("// header\nprint a");
        assert_eq!(forest[0], Statement::Comment("// header".into()));
    }
}
