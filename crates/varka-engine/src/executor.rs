//! The action-tree walker
//!
//! Executes one script run: statement nodes in order, conditionals by
//! recursive descent into exactly one branch, a fixed pacing delay after
//! each literal statement. Assignment statements and a few engine-internal
//! commands mutate the variable stores directly; everything else is
//! substituted and dispatched through the action registry.
//!
//! Nothing here raises into the caller. Failures degrade per statement and
//! the walk continues.

use regex::Regex;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

use varka_actions::{ActionCall, Command, SharedActionRegistry};
use varka_core::{ContextResolver, ExecutionContext, Statement, Value};
use varka_eval::{substitute, ConditionEvaluator, ExpressionEvaluator};
use varka_store::SharedVariableStore;

use crate::config::EngineConfig;

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^(global|user|ephemeral)\s+([A-Za-z0-9_]+)\s*(\+=|-=|\*=|/=|%=|=)\s*(.*)$")
            .expect("valid regex")
    })
}

fn command_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^([\w.]+)(?:\s+(.*))?$").expect("valid regex"))
}

/// Walks action trees against the live execution context
pub struct Executor {
    variables: SharedVariableStore,
    registry: SharedActionRegistry,
    resolver: Arc<dyn ContextResolver>,
    condition: ConditionEvaluator,
    expr: ExpressionEvaluator,
    pacing_delay: Duration,
    max_depth: usize,
}

impl Executor {
    pub fn new(
        config: &EngineConfig,
        variables: SharedVariableStore,
        registry: SharedActionRegistry,
        resolver: Arc<dyn ContextResolver>,
    ) -> Self {
        Self {
            variables,
            registry,
            condition: ConditionEvaluator::new(resolver.clone()),
            expr: ExpressionEvaluator::new(resolver.clone()),
            resolver,
            pacing_delay: config.pacing_delay(),
            max_depth: config.max_recursion_depth,
        }
    }

    /// Evaluate a script condition against the live context
    pub fn evaluate_condition(&self, condition: &str, ctx: &ExecutionContext) -> bool {
        self.condition.evaluate(condition, ctx)
    }

    /// Execute a statement sequence; exceeding the depth cap aborts the
    /// remainder of this call without raising
    pub fn execute_tree<'a>(
        &'a self,
        statements: &'a [Statement],
        ctx: &'a mut ExecutionContext,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if depth > self.max_depth {
                warn!(run_id = %ctx.run_id, depth, "Recursion limit hit");
                return;
            }

            for statement in statements {
                match statement {
                    Statement::Comment(_) => {}
                    Statement::Literal(text) => {
                        self.execute_statement(text, ctx).await;
                        if !self.pacing_delay.is_zero() {
                            tokio::time::sleep(self.pacing_delay).await;
                        }
                    }
                    Statement::Conditional(cond) => {
                        let hit = self.condition.evaluate_at(&cond.condition, ctx, depth);
                        let branch = if hit {
                            &cond.then_branch
                        } else {
                            &cond.else_branch
                        };
                        self.execute_tree(branch, ctx, depth + 1).await;
                    }
                }
            }
        })
    }

    async fn execute_statement(&self, raw: &str, ctx: &mut ExecutionContext) {
        let bare = raw.trim().trim_matches(';');
        if bare.eq_ignore_ascii_case("endif") || bare.trim_start().starts_with("//") {
            return;
        }

        let action = substitute(raw, self.resolver.as_ref(), ctx);
        let action = action.trim();
        if action.is_empty() {
            return;
        }

        if let Some(caps) = assignment_re().captures(action) {
            let scope_kind = caps[1].to_lowercase();
            let name = caps[2].to_string();
            let op = caps[3].to_string();
            let expr_text = caps[4].to_string();
            self.apply_assignment(&scope_kind, &name, &op, &expr_text, ctx)
                .await;
            return;
        }

        let Some(caps) = command_re().captures(action) else {
            return;
        };
        let cmd_text = caps[1].to_lowercase();
        let argument = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let command = match cmd_text.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                warn!(run_id = %ctx.run_id, command = %cmd_text, "Unknown command");
                self.registry
                    .report(ctx.clone(), format!("Error: {err}."))
                    .await;
                return;
            }
        };

        if command.is_engine_internal() {
            self.run_internal(command, &argument, ctx).await;
            return;
        }

        // dispatch failures are logged and reported by the registry
        let _ = self
            .registry
            .execute(ActionCall::new(command, argument, ctx.clone()))
            .await;
    }

    async fn run_internal(&self, command: Command, argument: &str, ctx: &mut ExecutionContext) {
        let scope = ctx.event.scope.clone();
        match command {
            Command::SystemWait => {
                if let Ok(secs) = argument.trim().parse::<f64>() {
                    if secs.is_finite() && secs > 0.0 {
                        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
                    }
                }
            }
            Command::GlobalSet => {
                if let Some((name, value)) = split_name_value(argument) {
                    self.variables
                        .set_global(&scope, name, Value::Str(value.to_string()));
                }
            }
            Command::GlobalDel => {
                self.variables.delete_global(&scope, unquote(argument));
            }
            Command::UserSet => {
                let Some(user) = ctx.event.user_id.clone() else {
                    return;
                };
                if let Some((name, value)) = split_name_value(argument) {
                    self.variables
                        .set_user(&scope, user, name, Value::Str(value.to_string()));
                }
            }
            Command::UserDel => {
                let Some(user) = ctx.event.user_id.clone() else {
                    return;
                };
                self.variables.delete_user(&scope, &user, unquote(argument));
            }
            Command::EphemeralSet => {
                if let Some((name, value)) = split_name_value(argument) {
                    ctx.ephemeral
                        .insert(name.to_string(), Value::Str(value.to_string()));
                }
            }
            _ => {}
        }
    }

    async fn apply_assignment(
        &self,
        scope_kind: &str,
        name: &str,
        op: &str,
        expr_text: &str,
        ctx: &mut ExecutionContext,
    ) {
        let right = match self.expr.evaluate(expr_text.trim(), ctx) {
            Ok(value) => value,
            Err(err) => {
                debug!(run_id = %ctx.run_id, expr = expr_text, error = %err,
                    "Assignment expression failed");
                Value::Bool(false)
            }
        };

        let value = if op == "=" {
            right
        } else {
            let current = self.current_value(scope_kind, name, ctx);
            match (compound_base(&current), right.as_f64()) {
                (Some(curr), Some(r)) => {
                    let result = match op {
                        "+=" => curr + r,
                        "-=" => curr - r,
                        "*=" => curr * r,
                        "/=" => {
                            if r == 0.0 {
                                // division by zero leaves the value untouched
                                return;
                            }
                            curr / r
                        }
                        "%=" => {
                            if r == 0.0 {
                                self.registry
                                    .report(
                                        ctx.clone(),
                                        format!("Error: modulo by zero assigning '{name}'."),
                                    )
                                    .await;
                                return;
                            }
                            // result takes the divisor's sign
                            curr - r * (curr / r).floor()
                        }
                        _ => return,
                    };
                    Value::from_f64_demoted(result)
                }
                // non-numeric operand: += concatenates, the rest replace
                _ if op == "+=" => Value::Str(format!("{current}{right}")),
                _ => right,
            }
        };

        self.store_value(scope_kind, name, value, ctx);
    }

    fn current_value(&self, scope_kind: &str, name: &str, ctx: &ExecutionContext) -> Value {
        let scope = &ctx.event.scope;
        let current = match scope_kind {
            "global" => self.variables.get_global(scope, name),
            "user" => ctx
                .event
                .user_id
                .as_deref()
                .and_then(|user| self.variables.get_user(scope, user, name)),
            _ => ctx.ephemeral.get(name).cloned(),
        };
        current.unwrap_or(Value::Int(0))
    }

    fn store_value(&self, scope_kind: &str, name: &str, value: Value, ctx: &mut ExecutionContext) {
        let scope = ctx.event.scope.clone();
        match scope_kind {
            "global" => self.variables.set_global(&scope, name, value),
            "user" => match ctx.event.user_id.clone() {
                Some(user) => self.variables.set_user(&scope, user, name, value),
                None => {
                    debug!(run_id = %ctx.run_id, name, "User assignment without acting user");
                }
            },
            _ => {
                ctx.ephemeral.insert(name.to_string(), value);
            }
        }
    }
}

/// Numeric base for compound assignment: absent, false-like, and the None
/// sentinel all read as 0
fn compound_base(current: &Value) -> Option<f64> {
    if let Value::Str(s) = current {
        if s == "None" {
            return Some(0.0);
        }
    }
    if !current.is_truthy() {
        return Some(0.0);
    }
    current.as_f64()
}

fn unquote(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'')
}

fn split_name_value(argument: &str) -> Option<(&str, &str)> {
    let argument = argument.trim();
    let at = argument.find(char::is_whitespace)?;
    let (name, value) = argument.split_at(at);
    Some((unquote(name), value.trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use varka_actions::ActionRegistry;
    use varka_core::{Conditional, EventContext, EventKind, NullResolver, ScopeId};
    use varka_store::{MemoryStore, VariableStore};

    use crate::resolver::EngineResolver;

    fn executor() -> (Executor, SharedVariableStore, SharedActionRegistry) {
        let variables = Arc::new(VariableStore::new(Arc::new(MemoryStore::new())));
        let registry = Arc::new(ActionRegistry::new());
        let resolver = Arc::new(EngineResolver::new(variables.clone(), Arc::new(NullResolver)));
        let config = EngineConfig {
            pacing_delay_ms: 0,
            ..EngineConfig::default()
        };
        (
            Executor::new(&config, variables.clone(), registry.clone(), resolver),
            variables,
            registry,
        )
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(EventContext::new(EventKind::Message, "guild-1").with_user("u1"))
    }

    fn scope() -> ScopeId {
        ScopeId::from("guild-1")
    }

    #[tokio::test]
    async fn test_increment_absent_variable() {
        let (executor, variables, _) = executor();
        let mut ctx = ctx();

        executor
            .execute_tree(&[Statement::Literal("global x += 1".into())], &mut ctx, 0)
            .await;
        assert_eq!(variables.get_global(&scope(), "x"), Some(Value::Int(1)));
    }

    #[tokio::test]
    async fn test_divide_by_zero_skips_write() {
        let (executor, variables, _) = executor();
        let mut ctx = ctx();
        variables.set_global(&scope(), "x", Value::Int(8));

        executor
            .execute_tree(&[Statement::Literal("global x /= 0".into())], &mut ctx, 0)
            .await;
        assert_eq!(variables.get_global(&scope(), "x"), Some(Value::Int(8)));
    }

    #[tokio::test]
    async fn test_whole_result_demotes_to_int() {
        let (executor, variables, _) = executor();
        let mut ctx = ctx();
        variables.set_global(&scope(), "x", Value::Int(5));

        executor
            .execute_tree(&[Statement::Literal("global x /= 2".into())], &mut ctx, 0)
            .await;
        assert_eq!(
            variables.get_global(&scope(), "x"),
            Some(Value::Float(2.5))
        );

        variables.set_global(&scope(), "y", Value::Int(6));
        executor
            .execute_tree(&[Statement::Literal("global y /= 2".into())], &mut ctx, 0)
            .await;
        assert_eq!(variables.get_global(&scope(), "y"), Some(Value::Int(3)));
    }

    #[tokio::test]
    async fn test_plus_assign_falls_back_to_concat() {
        let (executor, variables, _) = executor();
        let mut ctx = ctx();
        variables.set_global(&scope(), "name", Value::Str("ab".into()));

        executor
            .execute_tree(
                &[Statement::Literal("global name += 'c'".into())],
                &mut ctx,
                0,
            )
            .await;
        assert_eq!(
            variables.get_global(&scope(), "name"),
            Some(Value::Str("abc".into()))
        );
    }

    #[tokio::test]
    async fn test_plain_assign_stores_uncoerced() {
        let (executor, variables, _) = executor();
        let mut ctx = ctx();

        executor
            .execute_tree(
                &[Statement::Literal("global msg = 'hi there'".into())],
                &mut ctx,
                0,
            )
            .await;
        assert_eq!(
            variables.get_global(&scope(), "msg"),
            Some(Value::Str("hi there".into()))
        );
    }

    #[tokio::test]
    async fn test_ephemeral_visible_to_later_statements() {
        let (executor, variables, _) = executor();
        let mut ctx = ctx();

        let tree = [
            Statement::Literal("ephemeral n = 4".into()),
            Statement::Conditional(Conditional {
                condition: "ephemeral.n > 3".into(),
                then_branch: vec![Statement::Literal("global hit = 1".into())],
                else_branch: vec![Statement::Literal("global hit = 0".into())],
            }),
        ];
        executor.execute_tree(&tree, &mut ctx, 0).await;
        assert_eq!(variables.get_global(&scope(), "hit"), Some(Value::Int(1)));
    }

    #[tokio::test]
    async fn test_user_assignment_without_user_skipped() {
        let (executor, variables, _) = executor();
        let mut ctx =
            ExecutionContext::new(EventContext::new(EventKind::Message, "guild-1"));

        executor
            .execute_tree(&[Statement::Literal("user xp += 5".into())], &mut ctx, 0)
            .await;
        assert_eq!(variables.get_user(&scope(), "u1", "xp"), None);
    }

    #[tokio::test]
    async fn test_unknown_command_reported() {
        let (executor, _, registry) = executor();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry.set_reporter(move |_ctx, text| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(text);
            }
        });

        let mut ctx = ctx();
        executor
            .execute_tree(
                &[Statement::Literal("channel.explode now".into())],
                &mut ctx,
                0,
            )
            .await;
        assert!(seen.lock().unwrap()[0].contains("channel.explode"));
    }

    #[tokio::test]
    async fn test_substitution_reaches_dispatch() {
        let (executor, variables, registry) = executor();
        variables.set_global(&scope(), "who", Value::Str("world".into()));

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry.register(Command::ChannelSend, move |call: ActionCall| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(call.argument);
                Ok(varka_actions::Outcome::Done)
            }
        });

        let mut ctx = ctx();
        executor
            .execute_tree(
                &[Statement::Literal("channel.send hello {global.who}".into())],
                &mut ctx,
                0,
            )
            .await;
        assert_eq!(seen.lock().unwrap()[0], "hello world");
    }

    #[tokio::test]
    async fn test_endif_and_comments_are_noops() {
        let (executor, _, registry) = executor();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry.set_reporter(move |_ctx, text| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(text);
            }
        });

        let mut ctx = ctx();
        let tree = [
            Statement::Literal("ENDIF;".into()),
            Statement::Comment("// just a note".into()),
        ];
        executor.execute_tree(&tree, &mut ctx, 0).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_depth_cap_aborts_silently() {
        let (executor, variables, _) = executor();
        let mut ctx = ctx();

        // nest one conditional deeper than the cap allows
        let mut tree = vec![Statement::Literal("global deep = 1".into())];
        for _ in 0..12 {
            tree = vec![Statement::Conditional(Conditional {
                condition: "True".into(),
                then_branch: tree,
                else_branch: vec![],
            })];
        }
        executor.execute_tree(&tree, &mut ctx, 0).await;
        assert_eq!(variables.get_global(&scope(), "deep"), None);
    }
}
