//! Action dispatch table
//!
//! The registry maps each [`Command`] to an async handler supplied by the
//! embedding platform adapter. Dispatch failures and unregistered commands
//! are never swallowed: they are logged and echoed through the registry's
//! reporter, the embedder-provided channel for user-visible script errors.

use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

use varka_core::ExecutionContext;

use crate::command::Command;

/// Errors from action dispatch
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error("no handler registered for '{0}'")]
    NotRegistered(Command),

    #[error("action failed: {0}")]
    Failed(String),

    #[error("bad argument: {0}")]
    BadArgument(String),
}

/// What a completed action hands back
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The action ran; nothing to show
    Done,
    /// The action ran and produced user-visible text (e.g. `print`)
    Reply(String),
}

/// Result type for action handlers
pub type ActionResult = Result<Outcome, ActionError>;

/// Future type for async action handlers
pub type ActionFuture = Pin<Box<dyn Future<Output = ActionResult> + Send>>;

/// Action handler function type
pub type ActionHandler = Arc<dyn Fn(ActionCall) -> ActionFuture + Send + Sync>;

/// Future type for the reporter
pub type ReportFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// User-visible output channel supplied by the embedder
pub type Reporter = Arc<dyn Fn(ExecutionContext, String) -> ReportFuture + Send + Sync>;

/// One dispatched action: command, substituted argument, run context
#[derive(Clone)]
pub struct ActionCall {
    pub command: Command,
    pub argument: String,
    pub context: ExecutionContext,
}

impl ActionCall {
    pub fn new(command: Command, argument: impl Into<String>, context: ExecutionContext) -> Self {
        Self {
            command,
            argument: argument.into(),
            context,
        }
    }
}

/// The dispatch table from commands to platform handlers
pub struct ActionRegistry {
    handlers: DashMap<Command, ActionHandler>,
    reporter: RwLock<Option<Reporter>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            reporter: RwLock::new(None),
        }
    }

    /// Register a handler for one command
    pub fn register<F, Fut>(&self, command: Command, handler: F)
    where
        F: Fn(ActionCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        debug!(command = %command, "Registering action handler");
        let handler: ActionHandler = Arc::new(move |call| Box::pin(handler(call)) as ActionFuture);
        self.handlers.insert(command, handler);
    }

    /// Install the user-visible output channel
    pub fn set_reporter<F, Fut>(&self, reporter: F)
    where
        F: Fn(ExecutionContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let reporter: Reporter =
            Arc::new(move |ctx, text| Box::pin(reporter(ctx, text)) as ReportFuture);
        if let Ok(mut slot) = self.reporter.write() {
            *slot = Some(reporter);
        }
    }

    pub fn has_handler(&self, command: Command) -> bool {
        self.handlers.contains_key(&command)
    }

    /// Vocabulary entries with no handler and no engine-internal role
    ///
    /// A non-empty list means some script-invokable command would fall
    /// through to an error at runtime.
    pub fn unhandled_commands(&self) -> Vec<Command> {
        Command::ALL
            .iter()
            .filter(|c| !c.is_engine_internal() && !self.handlers.contains_key(c))
            .copied()
            .collect()
    }

    /// Echo text through the reporter, if one is installed
    pub async fn report(&self, ctx: ExecutionContext, text: impl Into<String>) {
        let reporter = match self.reporter.read() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        if let Some(reporter) = reporter {
            reporter(ctx, text.into()).await;
        }
    }

    /// Dispatch one call; failures are logged and echoed to the reporter
    pub async fn execute(&self, call: ActionCall) -> ActionResult {
        let handler = match self.handlers.get(&call.command) {
            Some(entry) => entry.value().clone(),
            None => {
                let err = ActionError::NotRegistered(call.command);
                warn!(command = %call.command, "No handler for command");
                self.report(call.context.clone(), format!("Error: {err}."))
                    .await;
                return Err(err);
            }
        };

        debug!(command = %call.command, run_id = %call.context.run_id, "Dispatching action");

        let ctx = call.context.clone();
        match handler(call).await {
            Ok(Outcome::Reply(text)) => {
                self.report(ctx, text.clone()).await;
                Ok(Outcome::Reply(text))
            }
            Ok(Outcome::Done) => Ok(Outcome::Done),
            Err(err) => {
                warn!(error = %err, "Action handler failed");
                self.report(ctx, format!("Error: {err}.")).await;
                Err(err)
            }
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for ActionRegistry
pub type SharedActionRegistry = Arc<ActionRegistry>;
