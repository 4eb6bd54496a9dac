//! The assembled Varka scripting engine
//!
//! This crate wires the other Varka crates into a running engine: the
//! [`Engine`] owns the script library, variable store, rate limiter, edit
//! sessions, and executor, and exposes `handle_event` as the single entry
//! point for platform events. Embedders supply a persistence store, an
//! action registry with platform handlers, and a [`ContextResolver`] for
//! platform facts.
//!
//! ```no_run
//! use std::sync::Arc;
//! use varka_actions::ActionRegistry;
//! use varka_core::{EventContext, EventKind, NullResolver};
//! use varka_engine::{Engine, EngineConfig};
//! use varka_store::MemoryStore;
//!
//! # async fn run() {
//! let engine = Engine::new(
//!     EngineConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ActionRegistry::new()),
//!     Arc::new(NullResolver),
//! );
//! engine
//!     .handle_event(EventContext::new(EventKind::Message, "guild-1"))
//!     .await;
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod executor;
pub mod rate_limit;
pub mod resolver;

pub use config::EngineConfig;
pub use engine::{Engine, EventReport};
pub use executor::Executor;
pub use rate_limit::RateLimiter;
pub use resolver::EngineResolver;

pub use varka_core::ContextResolver;
