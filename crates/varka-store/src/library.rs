//! Per-scope script libraries
//!
//! [`ScriptLibrary`] holds the sorted script list for every loaded scope and
//! mediates all mutation: CRUD, enable/disable, module import/export, and
//! full-scope snapshot/restore. Every mutation validates against the
//! structural [`Limits`], re-sorts, and writes through to the persistence
//! store before returning.
//!
//! Scripts sort by descending priority, ties broken by ascending
//! lowercased id, so dispatch order is deterministic and user-predictable.

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use varka_core::{Limits, ScopeId, Script, ScriptBody, ValidateError, Value};

use crate::persist::{PersistenceStore, StoreError};

/// Errors from library operations
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("no script named '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Invalid(#[from] ValidateError),

    #[error("malformed module file: {0}")]
    BadModule(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for library operations
pub type LibraryResult<T> = Result<T, LibraryError>;

/// Module file header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

/// Shareable bundle of scripts plus seed variables
///
/// This is both the export format for a single script and the import format
/// for whole modules; snapshot/restore reuses it for a scope's full list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleFile {
    pub meta: ModuleMeta,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, Value>,

    pub scripts: Vec<Script>,
}

/// Default priority for scripts arriving through module import
const IMPORT_DEFAULT_PRIORITY: i64 = 10;

/// Outcome summary of a module import
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// (original id, stored id) for every imported script
    pub imported: Vec<(String, String)>,
    /// Seed variables merged into the scope (absent keys only)
    pub variables_merged: usize,
}

/// Sorted per-scope script lists with write-through persistence
pub struct ScriptLibrary {
    store: Arc<dyn PersistenceStore>,
    limits: Limits,
    scopes: DashMap<ScopeId, Vec<Script>>,
    locks: DashMap<ScopeId, Arc<Mutex<()>>>,
}

impl ScriptLibrary {
    pub fn new(store: Arc<dyn PersistenceStore>, limits: Limits) -> Self {
        Self {
            store,
            limits,
            scopes: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    fn scope_lock(&self, scope: &ScopeId) -> Arc<Mutex<()>> {
        self.locks
            .entry(scope.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn sort(scripts: &mut [Script]) {
        scripts.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.id.to_lowercase().cmp(&b.id.to_lowercase()))
        });
    }

    /// Load a scope's scripts unless already resident
    ///
    /// Records that fail structural validation are dropped with a warning
    /// rather than poisoning the whole scope.
    pub async fn ensure_loaded(&self, scope: &ScopeId) {
        if self.scopes.contains_key(scope) {
            return;
        }
        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;
        if self.scopes.contains_key(scope) {
            return;
        }
        let mut loaded = match self.store.load_scripts(scope).await {
            Ok(scripts) => scripts,
            Err(err) => {
                error!(scope = %scope, error = %err, "Failed to load scripts");
                Vec::new()
            }
        };
        loaded.retain(|script| match self.limits.validate_script(script) {
            Ok(()) => true,
            Err(err) => {
                warn!(scope = %scope, script = %script.id, error = %err,
                    "Dropping invalid persisted script");
                false
            }
        });
        Self::sort(&mut loaded);
        self.scopes.insert(scope.clone(), loaded);
    }

    /// Discard resident state and reload from the store
    pub async fn reload(&self, scope: &ScopeId) {
        self.scopes.remove(scope);
        self.ensure_loaded(scope).await;
    }

    /// Sorted snapshot of a scope's scripts
    pub fn scripts(&self, scope: &ScopeId) -> Vec<Script> {
        self.scopes
            .get(scope)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Look up one script by id, case-insensitively
    pub fn get(&self, scope: &ScopeId, id: &str) -> Option<Script> {
        self.scopes.get(scope).and_then(|scripts| {
            scripts
                .iter()
                .find(|s| s.id.eq_ignore_ascii_case(id))
                .cloned()
        })
    }

    fn contains_id(scripts: &[Script], id: &str) -> bool {
        scripts.iter().any(|s| s.id.eq_ignore_ascii_case(id))
    }

    async fn persist(&self, scope: &ScopeId) -> LibraryResult<()> {
        let snapshot = self.scripts(scope);
        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;
        self.store.save_scripts(scope, &snapshot).await?;
        Ok(())
    }

    /// Insert or replace a script, then re-sort and persist
    ///
    /// Replacement matches ids case-insensitively; a new script counts
    /// against the per-scope cap.
    pub async fn upsert(&self, scope: &ScopeId, mut script: Script) -> LibraryResult<()> {
        self.limits.validate_script(&script)?;
        script.scope = Some(scope.clone());
        {
            let mut scripts = self.scopes.entry(scope.clone()).or_default();
            match scripts
                .iter()
                .position(|s| s.id.eq_ignore_ascii_case(&script.id))
            {
                Some(idx) => scripts[idx] = script,
                None => {
                    if scripts.len() >= self.limits.max_scripts {
                        return Err(ValidateError::TooManyScripts {
                            max: self.limits.max_scripts,
                        }
                        .into());
                    }
                    scripts.push(script);
                }
            }
            Self::sort(&mut scripts);
        }
        self.persist(scope).await
    }

    /// Remove a script by id
    pub async fn remove(&self, scope: &ScopeId, id: &str) -> LibraryResult<()> {
        {
            let mut scripts = self
                .scopes
                .get_mut(scope)
                .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;
            let before = scripts.len();
            scripts.retain(|s| !s.id.eq_ignore_ascii_case(id));
            if scripts.len() == before {
                return Err(LibraryError::NotFound(id.to_string()));
            }
        }
        debug!(scope = %scope, script = id, "Removed script");
        self.persist(scope).await
    }

    /// Flip a script's enabled flag; returns the new state
    pub async fn toggle(&self, scope: &ScopeId, id: &str) -> LibraryResult<bool> {
        let enabled = {
            let mut scripts = self
                .scopes
                .get_mut(scope)
                .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;
            let script = scripts
                .iter_mut()
                .find(|s| s.id.eq_ignore_ascii_case(id))
                .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;
            script.enabled = !script.enabled;
            script.enabled
        };
        self.persist(scope).await?;
        Ok(enabled)
    }

    /// Replace a script's body in place, keeping id/priority/enabled
    ///
    /// Fails with `NotFound` when the script was deleted while an edit
    /// session held its text.
    pub async fn update_body(
        &self,
        scope: &ScopeId,
        id: &str,
        body: ScriptBody,
    ) -> LibraryResult<()> {
        self.limits.validate_body(&body)?;
        {
            let mut scripts = self
                .scopes
                .get_mut(scope)
                .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;
            let script = scripts
                .iter_mut()
                .find(|s| s.id.eq_ignore_ascii_case(id))
                .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;
            script.body = body;
        }
        self.persist(scope).await
    }

    /// Delete every script of a scope
    pub async fn clear(&self, scope: &ScopeId) -> LibraryResult<()> {
        self.scopes.insert(scope.clone(), Vec::new());
        self.persist(scope).await
    }

    /// Pick an id that does not collide within the scope
    ///
    /// `foo` taken → `foo_1`, then `foo_2`, and so on.
    fn free_id(scripts: &[Script], wanted: &str) -> String {
        if !Self::contains_id(scripts, wanted) {
            return wanted.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{wanted}_{n}");
            if !Self::contains_id(scripts, &candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Import a module: validate, merge, rename collisions
    ///
    /// Seed variables are returned on the report for the caller to merge
    /// into the variable store (absent keys only); the library itself does
    /// not touch variables.
    pub async fn import_module(
        &self,
        scope: &ScopeId,
        module: &ModuleFile,
    ) -> LibraryResult<ImportReport> {
        if module.meta.name.trim().is_empty() {
            return Err(LibraryError::BadModule("missing module name".into()));
        }
        if module.scripts.is_empty() {
            return Err(LibraryError::BadModule("module has no scripts".into()));
        }
        for script in &module.scripts {
            self.limits.validate_script(script)?;
        }

        let mut report = ImportReport {
            variables_merged: module.variables.len(),
            ..ImportReport::default()
        };
        {
            let mut scripts = self.scopes.entry(scope.clone()).or_default();
            if scripts.len() + module.scripts.len() > self.limits.max_scripts {
                return Err(ValidateError::TooManyScripts {
                    max: self.limits.max_scripts,
                }
                .into());
            }
            for incoming in &module.scripts {
                let stored_id = Self::free_id(&scripts, &incoming.id);
                let mut script = incoming.clone();
                report.imported.push((script.id.clone(), stored_id.clone()));
                script.id = stored_id;
                script.scope = Some(scope.clone());
                if script.priority == 0 {
                    script.priority = IMPORT_DEFAULT_PRIORITY;
                }
                scripts.push(script);
            }
            Self::sort(&mut scripts);
        }
        self.persist(scope).await?;
        info!(scope = %scope, module = %module.meta.name,
            count = report.imported.len(), "Imported module");
        Ok(report)
    }

    /// Export one script as a single-entry module
    pub fn export_module(&self, scope: &ScopeId, id: &str) -> LibraryResult<ModuleFile> {
        let script = self
            .get(scope, id)
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;
        Ok(ModuleFile {
            meta: ModuleMeta {
                name: script.id.clone(),
                ..ModuleMeta::default()
            },
            variables: IndexMap::new(),
            scripts: vec![script],
        })
    }

    /// Full-scope snapshot for backup
    pub fn snapshot(&self, scope: &ScopeId) -> ModuleFile {
        ModuleFile {
            meta: ModuleMeta {
                name: format!("{scope}-backup"),
                ..ModuleMeta::default()
            },
            variables: IndexMap::new(),
            scripts: self.scripts(scope),
        }
    }

    /// Merge a snapshot back in, renaming on collision
    pub async fn restore(&self, scope: &ScopeId, snapshot: &ModuleFile) -> LibraryResult<usize> {
        if snapshot.scripts.is_empty() {
            return Err(LibraryError::BadModule("backup has no scripts".into()));
        }
        for script in &snapshot.scripts {
            self.limits.validate_script(script)?;
        }
        let restored = {
            let mut scripts = self.scopes.entry(scope.clone()).or_default();
            if scripts.len() + snapshot.scripts.len() > self.limits.max_scripts {
                return Err(ValidateError::TooManyScripts {
                    max: self.limits.max_scripts,
                }
                .into());
            }
            for incoming in &snapshot.scripts {
                let mut script = incoming.clone();
                script.id = Self::free_id(&scripts, &incoming.id);
                script.scope = Some(scope.clone());
                scripts.push(script);
            }
            Self::sort(&mut scripts);
            snapshot.scripts.len()
        };
        self.persist(scope).await?;
        Ok(restored)
    }
}

/// Thread-safe wrapper for ScriptLibrary
pub type SharedScriptLibrary = Arc<ScriptLibrary>;
