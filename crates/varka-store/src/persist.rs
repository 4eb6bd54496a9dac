//! The persistence boundary
//!
//! Everything durable goes through [`PersistenceStore`]: scope-keyed script
//! lists and variable maps, JSON-serializable on the wire. Two
//! implementations ship with the engine: [`MemoryStore`] for tests and
//! ephemeral embeddings, and [`JsonFileStore`] keeping one document per
//! scope under a data directory.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

use varka_core::{ScopeId, Script};

use crate::variables::ScopeVariables;

/// Errors from the persistence boundary
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Scope-keyed durable storage for scripts and variables
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn load_scripts(&self, scope: &ScopeId) -> StoreResult<Vec<Script>>;
    async fn save_scripts(&self, scope: &ScopeId, scripts: &[Script]) -> StoreResult<()>;
    async fn load_variables(&self, scope: &ScopeId) -> StoreResult<ScopeVariables>;
    async fn save_variables(&self, scope: &ScopeId, variables: &ScopeVariables) -> StoreResult<()>;
}

/// In-memory store for tests and ephemeral embeddings
#[derive(Default)]
pub struct MemoryStore {
    scripts: DashMap<ScopeId, Vec<Script>>,
    variables: DashMap<ScopeId, ScopeVariables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn load_scripts(&self, scope: &ScopeId) -> StoreResult<Vec<Script>> {
        Ok(self.scripts.get(scope).map(|s| s.clone()).unwrap_or_default())
    }

    async fn save_scripts(&self, scope: &ScopeId, scripts: &[Script]) -> StoreResult<()> {
        self.scripts.insert(scope.clone(), scripts.to_vec());
        Ok(())
    }

    async fn load_variables(&self, scope: &ScopeId) -> StoreResult<ScopeVariables> {
        Ok(self
            .variables
            .get(scope)
            .map(|v| v.clone())
            .unwrap_or_default())
    }

    async fn save_variables(&self, scope: &ScopeId, variables: &ScopeVariables) -> StoreResult<()> {
        self.variables.insert(scope.clone(), variables.clone());
        Ok(())
    }
}

/// File-backed store: one JSON document per scope and kind
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn scripts_path(&self, scope: &ScopeId) -> PathBuf {
        self.dir.join(format!("{}.scripts.json", scope))
    }

    fn variables_path(&self, scope: &ScopeId) -> PathBuf {
        self.dir.join(format!("{}.variables.json", scope))
    }

    async fn read_json<T: serde::de::DeserializeOwned + Default>(
        path: &Path,
    ) -> StoreResult<T> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                trace!(path = %path.display(), "Loaded scope document");
                Ok(serde_json::from_slice(&bytes)?)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(path, bytes).await?;
        debug!(path = %path.display(), "Saved scope document");
        Ok(())
    }
}

#[async_trait]
impl PersistenceStore for JsonFileStore {
    async fn load_scripts(&self, scope: &ScopeId) -> StoreResult<Vec<Script>> {
        Self::read_json(&self.scripts_path(scope)).await
    }

    async fn save_scripts(&self, scope: &ScopeId, scripts: &[Script]) -> StoreResult<()> {
        Self::write_json(&self.scripts_path(scope), &scripts.to_vec()).await
    }

    async fn load_variables(&self, scope: &ScopeId) -> StoreResult<ScopeVariables> {
        Self::read_json(&self.variables_path(scope)).await
    }

    async fn save_variables(&self, scope: &ScopeId, variables: &ScopeVariables) -> StoreResult<()> {
        Self::write_json(&self.variables_path(scope), variables).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use varka_core::{ScriptBody, Statement, Value};

    fn sample_script() -> Script {
        Script::new(
            "greet",
            ScriptBody {
                condition: "event_type == 'member_join'".into(),
                actions: vec![Statement::Literal("channel.send \"welcome\"".into())],
                initialization: vec![],
            },
        )
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let scope = ScopeId::from("guild-1");

        assert!(store.load_scripts(&scope).await.unwrap().is_empty());

        store
            .save_scripts(&scope, &[sample_script()])
            .await
            .unwrap();
        let loaded = store.load_scripts(&scope).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "greet");
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let scope = ScopeId::from("guild-1");

        store
            .save_scripts(&scope, &[sample_script()])
            .await
            .unwrap();

        let mut vars = ScopeVariables::default();
        vars.globals.insert("count".into(), Value::Int(3));
        store.save_variables(&scope, &vars).await.unwrap();

        let scripts = store.load_scripts(&scope).await.unwrap();
        assert_eq!(scripts[0], sample_script());
        let loaded_vars = store.load_variables(&scope).await.unwrap();
        assert_eq!(loaded_vars.globals.get("count"), Some(&Value::Int(3)));
    }

    #[tokio::test]
    async fn test_file_store_missing_scope_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let scope = ScopeId::from("nowhere");
        assert!(store.load_scripts(&scope).await.unwrap().is_empty());
        assert_eq!(
            store.load_variables(&scope).await.unwrap(),
            ScopeVariables::default()
        );
    }
}
