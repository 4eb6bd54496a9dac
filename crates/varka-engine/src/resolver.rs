//! The engine's layered context resolver
//!
//! Resolution order for a dotted path:
//! 1. `ephemeral.` / `global.` / `user.` variable scopes (absent names read
//!    as 0, matching the original runtime);
//! 2. `event_type` and the `time.*` built-ins;
//! 3. `random.<a>,<b>`;
//! 4. the event's seeded fact map;
//! 5. the platform adapter's own resolver.
//!
//! Only a path none of these layers claim returns the absent sentinel.

use chrono::{Datelike, Timelike};
use rand::Rng;
use std::sync::Arc;

use varka_core::{ContextResolver, ExecutionContext, Value};
use varka_store::SharedVariableStore;

/// Resolver layering engine state in front of the platform adapter
pub struct EngineResolver {
    variables: SharedVariableStore,
    platform: Arc<dyn ContextResolver>,
}

impl EngineResolver {
    pub fn new(variables: SharedVariableStore, platform: Arc<dyn ContextResolver>) -> Self {
        Self {
            variables,
            platform,
        }
    }
}

impl ContextResolver for EngineResolver {
    fn resolve(&self, path: &str, ctx: &ExecutionContext) -> Option<Value> {
        if let Some(name) = path.strip_prefix("ephemeral.") {
            return Some(ctx.ephemeral.get(name).cloned().unwrap_or(Value::Int(0)));
        }
        if let Some(name) = path.strip_prefix("global.") {
            return Some(
                self.variables
                    .get_global(&ctx.event.scope, name)
                    .unwrap_or(Value::Int(0)),
            );
        }
        if let Some(name) = path.strip_prefix("user.") {
            let value = ctx.event.user_id.as_deref().and_then(|user| {
                self.variables.get_user(&ctx.event.scope, user, name)
            });
            return Some(value.unwrap_or(Value::Int(0)));
        }

        if path == "event_type" {
            return Some(Value::Str(ctx.event.kind.as_str().to_string()));
        }
        if let Some(value) = time_fact(path, ctx) {
            return Some(value);
        }
        if let Some(spec) = path.strip_prefix("random.") {
            return Some(random_value(spec));
        }

        if let Some(value) = ctx.event.facts.get(path) {
            return Some(value.clone());
        }

        self.platform.resolve(path, ctx)
    }
}

fn time_fact(path: &str, ctx: &ExecutionContext) -> Option<Value> {
    if !path.starts_with("time.") {
        return None;
    }
    let now = ctx.event.now();
    match path {
        "time.hour" => Some(Value::Int(i64::from(now.hour()))),
        "time.minute" => Some(Value::Int(i64::from(now.minute()))),
        "time.second" => Some(Value::Int(i64::from(now.second()))),
        "time.day" => Some(Value::Str(now.format("%A").to_string())),
        "time.month" => Some(Value::Str(now.format("%B").to_string())),
        "time.year" => Some(Value::Int(i64::from(now.year()))),
        "time.iso" => Some(Value::Str(now.to_rfc3339())),
        "time.timestamp" => Some(Value::Float(now.timestamp_millis() as f64 / 1000.0)),
        _ => None,
    }
}

/// `random.<a>,<b>` → uniform integer between the two bounds, either order;
/// malformed specs read as 0
fn random_value(spec: &str) -> Value {
    let Some((a, b)) = spec.split_once(',') else {
        return Value::Int(0);
    };
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(a), Ok(b)) => {
            let (lo, hi) = (a.min(b), a.max(b));
            Value::Int(rand::thread_rng().gen_range(lo..=hi))
        }
        _ => Value::Int(0),
    }
}
