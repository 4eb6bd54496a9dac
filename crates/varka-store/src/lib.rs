//! Persistence, variable scopes, and the script library for Varka
//!
//! Durable state is partitioned by scope and flows through the
//! [`PersistenceStore`] trait; [`VariableStore`] and [`ScriptLibrary`] are
//! the in-memory faces the engine works against, each write-through or
//! dirty-tracked as its access pattern demands.

pub mod library;
pub mod persist;
pub mod variables;

pub use library::{
    ImportReport, LibraryError, LibraryResult, ModuleFile, ModuleMeta, ScriptLibrary,
    SharedScriptLibrary,
};
pub use persist::{JsonFileStore, MemoryStore, PersistenceStore, StoreError, StoreResult};
pub use variables::{ScopeVariables, SharedVariableStore, VariableStore};
