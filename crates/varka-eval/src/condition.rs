//! Condition evaluation
//!
//! Adds the string-oriented infix operators `startswith`, `endswith`, and
//! `matches` on top of the expression evaluator. Conditions never raise:
//! every failure is logged and yields `false`.

use regex::{Regex, RegexBuilder};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use varka_core::{ContextResolver, ExecutionContext, Value};

use crate::eval::ExpressionEvaluator;

/// Re-entrant evaluation depth bound
const MAX_DEPTH: usize = 10;

fn custom_ops_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(.+?)\s+(startswith|endswith|matches)\s+(.+)$").expect("valid regex")
    })
}

/// Evaluates condition strings against an execution context
pub struct ConditionEvaluator {
    expr: ExpressionEvaluator,
}

impl ConditionEvaluator {
    pub fn new(resolver: Arc<dyn ContextResolver>) -> Self {
        Self {
            expr: ExpressionEvaluator::new(resolver),
        }
    }

    /// Evaluate a condition to a boolean; all errors degrade to `false`
    pub fn evaluate(&self, condition: &str, ctx: &ExecutionContext) -> bool {
        self.evaluate_at(condition, ctx, 0)
    }

    /// Evaluate with an explicit re-entrancy depth (the executor passes its
    /// recursion depth through)
    pub fn evaluate_at(&self, condition: &str, ctx: &ExecutionContext, depth: usize) -> bool {
        if depth > MAX_DEPTH {
            warn!(condition, depth, "Condition evaluation depth exceeded");
            return false;
        }

        let cond = condition.trim();

        // literal short-circuits, no evaluation
        if cond == "True" {
            return true;
        }
        if cond == "False" {
            return false;
        }

        if let Some(caps) = custom_ops_regex().captures(cond) {
            let left = caps.get(1).map_or("", |m| m.as_str()).trim();
            let op = caps.get(2).map_or("", |m| m.as_str()).to_lowercase();
            let right = caps.get(3).map_or("", |m| m.as_str()).trim();

            let left_val = self
                .expr
                .evaluate(left, ctx)
                .unwrap_or(Value::Bool(false))
                .to_string();
            let right_val = right.trim_matches(|c| c == '"' || c == '\'');

            return match op.as_str() {
                "startswith" => left_val
                    .to_lowercase()
                    .starts_with(&right_val.to_lowercase()),
                "endswith" => left_val.to_lowercase().ends_with(&right_val.to_lowercase()),
                "matches" => match RegexBuilder::new(right_val)
                    .case_insensitive(true)
                    .build()
                {
                    Ok(pattern) => pattern.is_match(&left_val),
                    Err(err) => {
                        debug!(pattern = right_val, error = %err, "Invalid match pattern");
                        false
                    }
                },
                _ => false,
            };
        }

        self.expr.evaluate_truthy(cond, ctx)
    }
}
