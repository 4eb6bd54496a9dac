//! Script compilation and source rendering
//!
//! `compile` turns raw text into the stored condition/initialization/actions
//! triple; `render` is its inverse, producing the newline-delimited source
//! the line editor operates on. Rendering keeps every comment, so
//! render → parse → render is stable.

use varka_core::{ScriptBody, Statement};

use crate::parser::parse;

/// Compile raw script text into a stored script body
///
/// When the forest ends in a conditional with no else-branch and everything
/// before it is flat, the conditional is hoisted: its condition becomes the
/// script condition, its then-branch the actions, and the preceding flat
/// statements the initialization list (comments kept). Any other shape
/// stores the whole forest under an always-true condition.
pub fn compile(raw: &str) -> ScriptBody {
    let forest = parse(raw);

    let preceding_flat = forest
        .iter()
        .take(forest.len().saturating_sub(1))
        .all(|s| !matches!(s, Statement::Conditional(_)));

    if preceding_flat {
        if let Some(Statement::Conditional(cond)) = forest.last() {
            if cond.else_branch.is_empty() {
                let cond = cond.clone();
                let mut initialization = forest;
                initialization.pop();
                return ScriptBody {
                    condition: cond.condition,
                    actions: cond.then_branch,
                    initialization,
                };
            }
        }
    }

    ScriptBody::unconditional(forest)
}

/// Render a script body back to newline-delimited source
pub fn render(body: &ScriptBody) -> String {
    let mut lines = Vec::new();

    for stmt in &body.initialization {
        render_statement(stmt, 0, &mut lines);
    }

    let conditional = body.condition != "True";
    if conditional {
        lines.push(format!("if {} then", body.condition));
    }

    let indent = usize::from(conditional);
    for stmt in &body.actions {
        render_statement(stmt, indent, &mut lines);
    }

    if conditional {
        lines.push("endif".to_string());
    }

    lines.join("\n")
}

fn render_statement(stmt: &Statement, indent: usize, lines: &mut Vec<String>) {
    let spacing = "    ".repeat(indent);
    match stmt {
        Statement::Literal(text) | Statement::Comment(text) => {
            lines.push(format!("{}{}", spacing, text));
        }
        Statement::Conditional(cond) => {
            lines.push(format!("{}if {} then", spacing, cond.condition));
            for child in &cond.then_branch {
                render_statement(child, indent + 1, lines);
            }
            if !cond.else_branch.is_empty() {
                lines.push(format!("{}else", spacing));
                for child in &cond.else_branch {
                    render_statement(child, indent + 1, lines);
                }
            }
            lines.push(format!("{}endif", spacing));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use varka_core::Conditional;

    #[test]
    fn test_single_conditional_hoisted() {
        let body = compile("// setup\nephemeral n = 1\nif message.length > 3 then\nprint big\nendif");
        assert_eq!(body.condition, "message.length > 3");
        assert_eq!(body.actions, vec![Statement::Literal("print big".into())]);
        assert_eq!(
            body.initialization,
            vec![
                Statement::Comment("// setup".into()),
                Statement::Literal("ephemeral n = 1".into()),
            ]
        );
    }

    #[test]
    fn test_conditional_with_else_not_hoisted() {
        let body = compile("if x then\nprint a\nelse\nprint b\nendif");
        assert_eq!(body.condition, "True");
        assert_eq!(body.actions.len(), 1);
        assert!(matches!(body.actions[0], Statement::Conditional(_)));
    }

    #[test]
    fn test_multiple_statements_unconditional() {
        let body = compile("print a\nprint b");
        assert_eq!(body.condition, "True");
        assert_eq!(body.actions.len(), 2);
        assert!(body.initialization.is_empty());
    }

    #[test]
    fn test_render_hoisted_body() {
        let body = ScriptBody {
            condition: "x > 1".to_string(),
            actions: vec![Statement::Literal("print a".into())],
            initialization: vec![Statement::Literal("ephemeral n = 0".into())],
        };
        assert_eq!(render(&body), "ephemeral n = 0\nif x > 1 then\n    print a\nendif");
    }

    #[test]
    fn test_render_nested_indentation() {
        let body = ScriptBody::unconditional(vec![Statement::Conditional(Conditional {
            condition: "a".into(),
            then_branch: vec![Statement::Conditional(Conditional {
                condition: "b".into(),
                then_branch: vec![Statement::Literal("print deep".into())],
                else_branch: vec![],
            })],
            else_branch: vec![Statement::Comment("// other".into())],
        })]);
        assert_eq!(
            render(&body),
            "if a then\n    if b then\n        print deep\n    endif\nelse\n    // other\nendif"
        );
    }

    #[test]
    fn test_round_trip_executably_identical() {
        let source = "ephemeral n = 1\nif message.length > 3 then\nprint big\nif member.is_admin then\nprint admin\nelse\nprint user\nendif\nendif";
        let body = compile(source);
        let rendered = render(&body);
        let reparsed = compile(&rendered);
        assert_eq!(body, reparsed);
    }
}
