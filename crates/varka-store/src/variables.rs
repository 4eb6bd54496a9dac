//! Scoped variable maps with dirty tracking
//!
//! Each scope owns one flat global map plus per-user flat maps, nested
//! under a `users` key in the persisted document. Writes mark the scope
//! dirty; `flush` pushes every dirty scope through the persistence store,
//! serialized per scope by an exclusive lock. Ephemeral variables never
//! land here — they live on the execution context and die with the run.

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use varka_core::{ScopeId, Value};

use crate::persist::PersistenceStore;

/// Persisted variable document for one scope
///
/// Global entries sit at the top level; per-user maps nest under `users`,
/// matching the original wire shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeVariables {
    #[serde(flatten)]
    pub globals: IndexMap<String, Value>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub users: IndexMap<String, IndexMap<String, Value>>,
}

/// In-memory variable state for every loaded scope
pub struct VariableStore {
    store: Arc<dyn PersistenceStore>,
    scopes: DashMap<ScopeId, ScopeVariables>,
    dirty: DashMap<ScopeId, ()>,
    locks: DashMap<ScopeId, Arc<Mutex<()>>>,
}

impl VariableStore {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self {
            store,
            scopes: DashMap::new(),
            dirty: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn scope_lock(&self, scope: &ScopeId) -> Arc<Mutex<()>> {
        self.locks
            .entry(scope.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load a scope's variables unless already resident
    ///
    /// An unavailable store degrades to an empty map and a logged error.
    pub async fn ensure_loaded(&self, scope: &ScopeId) {
        if self.scopes.contains_key(scope) {
            return;
        }
        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;
        if self.scopes.contains_key(scope) {
            return;
        }
        let loaded = match self.store.load_variables(scope).await {
            Ok(vars) => vars,
            Err(err) => {
                error!(scope = %scope, error = %err, "Failed to load variables");
                ScopeVariables::default()
            }
        };
        self.scopes.insert(scope.clone(), loaded);
    }

    pub fn get_global(&self, scope: &ScopeId, name: &str) -> Option<Value> {
        self.scopes
            .get(scope)
            .and_then(|vars| vars.globals.get(name).cloned())
    }

    pub fn set_global(&self, scope: &ScopeId, name: impl Into<String>, value: Value) {
        self.scopes
            .entry(scope.clone())
            .or_default()
            .globals
            .insert(name.into(), value);
        self.mark_dirty(scope);
    }

    pub fn delete_global(&self, scope: &ScopeId, name: &str) -> bool {
        let removed = self
            .scopes
            .get_mut(scope)
            .map(|mut vars| vars.globals.shift_remove(name).is_some())
            .unwrap_or(false);
        if removed {
            self.mark_dirty(scope);
        }
        removed
    }

    pub fn get_user(&self, scope: &ScopeId, user_id: &str, name: &str) -> Option<Value> {
        self.scopes.get(scope).and_then(|vars| {
            vars.users
                .get(user_id)
                .and_then(|user| user.get(name).cloned())
        })
    }

    pub fn set_user(
        &self,
        scope: &ScopeId,
        user_id: impl Into<String>,
        name: impl Into<String>,
        value: Value,
    ) {
        self.scopes
            .entry(scope.clone())
            .or_default()
            .users
            .entry(user_id.into())
            .or_default()
            .insert(name.into(), value);
        self.mark_dirty(scope);
    }

    pub fn delete_user(&self, scope: &ScopeId, user_id: &str, name: &str) -> bool {
        let removed = self
            .scopes
            .get_mut(scope)
            .map(|mut vars| {
                vars.users
                    .get_mut(user_id)
                    .map(|user| user.shift_remove(name).is_some())
                    .unwrap_or(false)
            })
            .unwrap_or(false);
        if removed {
            self.mark_dirty(scope);
        }
        removed
    }

    /// Snapshot of a scope's global map (for display and export)
    pub fn globals(&self, scope: &ScopeId) -> IndexMap<String, Value> {
        self.scopes
            .get(scope)
            .map(|vars| vars.globals.clone())
            .unwrap_or_default()
    }

    /// Merge module variables, writing only keys the scope does not have yet
    pub fn merge_absent(&self, scope: &ScopeId, incoming: &IndexMap<String, Value>) {
        let mut entry = self.scopes.entry(scope.clone()).or_default();
        let mut changed = false;
        for (key, value) in incoming {
            if !entry.globals.contains_key(key) {
                entry.globals.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        drop(entry);
        if changed {
            self.mark_dirty(scope);
        }
    }

    /// Drop every variable of a scope
    pub fn clear(&self, scope: &ScopeId) {
        self.scopes.insert(scope.clone(), ScopeVariables::default());
        self.mark_dirty(scope);
    }

    fn mark_dirty(&self, scope: &ScopeId) {
        self.dirty.insert(scope.clone(), ());
    }

    pub fn is_dirty(&self, scope: &ScopeId) -> bool {
        self.dirty.contains_key(scope)
    }

    /// Persist one scope; the dirty flag clears only on success
    pub async fn flush_scope(&self, scope: &ScopeId) {
        let Some(snapshot) = self.scopes.get(scope).map(|vars| vars.clone()) else {
            self.dirty.remove(scope);
            return;
        };
        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;
        match self.store.save_variables(scope, &snapshot).await {
            Ok(()) => {
                self.dirty.remove(scope);
                debug!(scope = %scope, "Flushed scope variables");
            }
            Err(err) => {
                error!(scope = %scope, error = %err, "Failed to save variables");
            }
        }
    }

    /// Persist every dirty scope (best effort)
    pub async fn flush(&self) {
        let dirty: Vec<ScopeId> = self.dirty.iter().map(|e| e.key().clone()).collect();
        if dirty.is_empty() {
            return;
        }
        info!(count = dirty.len(), "Flushing dirty scopes");
        for scope in dirty {
            self.flush_scope(&scope).await;
        }
    }
}

/// Thread-safe wrapper for VariableStore
pub type SharedVariableStore = Arc<VariableStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;

    fn store() -> (VariableStore, Arc<MemoryStore>) {
        let backing = Arc::new(MemoryStore::new());
        (VariableStore::new(backing.clone()), backing)
    }

    #[tokio::test]
    async fn test_set_marks_dirty_and_flush_clears() {
        let (vars, backing) = store();
        let scope = ScopeId::from("guild-1");

        vars.set_global(&scope, "count", Value::Int(1));
        assert!(vars.is_dirty(&scope));

        vars.flush().await;
        assert!(!vars.is_dirty(&scope));

        let persisted = backing.load_variables(&scope).await.unwrap();
        assert_eq!(persisted.globals.get("count"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn test_user_variables_nest_by_user() {
        let (vars, _) = store();
        let scope = ScopeId::from("guild-1");

        vars.set_user(&scope, "u1", "warnings", Value::Int(2));
        vars.set_user(&scope, "u2", "warnings", Value::Int(5));

        assert_eq!(vars.get_user(&scope, "u1", "warnings"), Some(Value::Int(2)));
        assert_eq!(vars.get_user(&scope, "u2", "warnings"), Some(Value::Int(5)));
        assert_eq!(vars.get_user(&scope, "u3", "warnings"), None);
    }

    #[tokio::test]
    async fn test_merge_absent_keeps_existing() {
        let (vars, _) = store();
        let scope = ScopeId::from("guild-1");

        vars.set_global(&scope, "greeting", Value::Str("hello".into()));

        let mut incoming = IndexMap::new();
        incoming.insert("greeting".to_string(), Value::Str("imported".into()));
        incoming.insert("fresh".to_string(), Value::Int(1));
        vars.merge_absent(&scope, &incoming);

        assert_eq!(
            vars.get_global(&scope, "greeting"),
            Some(Value::Str("hello".into()))
        );
        assert_eq!(vars.get_global(&scope, "fresh"), Some(Value::Int(1)));
    }

    #[tokio::test]
    async fn test_ensure_loaded_pulls_persisted_state() {
        let backing = Arc::new(MemoryStore::new());
        let scope = ScopeId::from("guild-1");
        let mut seeded = ScopeVariables::default();
        seeded.globals.insert("level".into(), Value::Int(9));
        backing.save_variables(&scope, &seeded).await.unwrap();

        let vars = VariableStore::new(backing);
        vars.ensure_loaded(&scope).await;
        assert_eq!(vars.get_global(&scope, "level"), Some(Value::Int(9)));
    }

    #[test]
    fn test_wire_shape_nests_users() {
        let mut vars = ScopeVariables::default();
        vars.globals.insert("count".into(), Value::Int(1));
        vars.users
            .entry("u1".to_string())
            .or_default()
            .insert("xp".into(), Value::Int(10));

        let json = serde_json::to_value(&vars).unwrap();
        assert_eq!(json["count"], serde_json::json!(1));
        assert_eq!(json["users"]["u1"]["xp"], serde_json::json!(10));
    }
}
