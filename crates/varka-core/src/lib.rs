//! Core types for the Varka scripting engine
//!
//! This crate defines the types every other Varka crate builds on:
//!
//! - [`Value`] — the scalar tagged union scripts compute with, plus the
//!   canonical string coercion rule
//! - [`Statement`] / [`Conditional`] — the action-tree AST, persisted in the
//!   original JSON wire shape
//! - [`Script`] / [`ScriptBody`] — the persisted script record and its
//!   structural validation limits
//! - [`EventContext`] / [`ExecutionContext`] — the contexts threaded through
//!   evaluation and execution
//! - [`ContextResolver`] — the capability mapping dotted symbol paths to
//!   scalars

pub mod context;
pub mod script;
pub mod value;

pub use context::{
    ContextResolver, EventContext, EventKind, ExecutionContext, NullResolver, ScopeId,
};
pub use script::{
    Conditional, Limits, Script, ScriptBody, Statement, ValidateError, ValidateResult,
};
pub use value::Value;
