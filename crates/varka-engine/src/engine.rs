//! The per-event scheduler
//!
//! `handle_event` is the engine's single entry point for platform events:
//! it walks the owning scope's sorted script list, admits scripts through
//! the rate limiter, runs initialization synchronously, evaluates each
//! condition, and spawns triggered action trees onto a bounded in-flight
//! set. It returns after the selection pass; the trees run on their own.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use varka_actions::SharedActionRegistry;
use varka_core::{ContextResolver, EventContext, ExecutionContext, ScopeId};
use varka_editor::EditSessionManager;
use varka_store::{PersistenceStore, ScriptLibrary, VariableStore};

use crate::config::EngineConfig;
use crate::executor::Executor;
use crate::rate_limit::RateLimiter;
use crate::resolver::EngineResolver;

/// Summary of one `handle_event` selection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventReport {
    /// Scripts whose action trees were dispatched
    pub triggered: usize,
    /// Condition matches suppressed by the per-event trigger cap
    pub suppressed: usize,
    /// Scripts rejected by the rate limiter
    pub rate_limited: usize,
}

/// The assembled scripting engine
pub struct Engine {
    config: EngineConfig,
    library: Arc<ScriptLibrary>,
    variables: Arc<VariableStore>,
    registry: SharedActionRegistry,
    sessions: EditSessionManager,
    rate_limiter: RateLimiter,
    executor: Arc<Executor>,
    in_flight: Mutex<JoinSet<()>>,
}

impl Engine {
    /// Assemble an engine over a persistence store, action registry, and
    /// platform resolver
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn PersistenceStore>,
        registry: SharedActionRegistry,
        platform: Arc<dyn ContextResolver>,
    ) -> Self {
        let library = Arc::new(ScriptLibrary::new(store.clone(), config.limits.clone()));
        let variables = Arc::new(VariableStore::new(store));
        let resolver: Arc<dyn ContextResolver> =
            Arc::new(EngineResolver::new(variables.clone(), platform));
        let executor = Arc::new(Executor::new(
            &config,
            variables.clone(),
            registry.clone(),
            resolver,
        ));
        let rate_limiter = RateLimiter::new(&config);
        let sessions = EditSessionManager::new(library.clone());

        Self {
            config,
            library,
            variables,
            registry,
            sessions,
            rate_limiter,
            executor,
            in_flight: Mutex::new(JoinSet::new()),
        }
    }

    pub fn library(&self) -> &Arc<ScriptLibrary> {
        &self.library
    }

    pub fn variables(&self) -> &Arc<VariableStore> {
        &self.variables
    }

    pub fn registry(&self) -> &SharedActionRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &EditSessionManager {
        &self.sessions
    }

    /// Run the selection pass for one platform event
    ///
    /// Later scripts still run their initialization once the trigger cap is
    /// reached; only dispatch is suppressed.
    pub async fn handle_event(&self, event: EventContext) -> EventReport {
        let scope = event.scope.clone();
        self.variables.ensure_loaded(&scope).await;
        self.library.ensure_loaded(&scope).await;

        let mut report = EventReport::default();
        for script in self.library.scripts(&scope) {
            if !script.enabled {
                continue;
            }
            if !self.rate_limiter.try_admit(&scope, &script.id) {
                report.rate_limited += 1;
                continue;
            }

            let mut ctx = ExecutionContext::new(event.clone());
            self.executor
                .execute_tree(&script.body.initialization, &mut ctx, 0)
                .await;

            if !self.executor.evaluate_condition(&script.body.condition, &ctx) {
                continue;
            }

            if report.triggered >= self.config.max_triggers_per_event {
                debug!(scope = %scope, script = %script.id,
                    "Trigger cap reached, dispatch suppressed");
                report.suppressed += 1;
                continue;
            }

            if self.dispatch(&script.id, script.body.actions.clone(), ctx).await {
                report.triggered += 1;
            }
        }
        report
    }

    /// Spawn one action tree onto the in-flight set
    async fn dispatch(
        &self,
        script_id: &str,
        actions: Vec<varka_core::Statement>,
        mut ctx: ExecutionContext,
    ) -> bool {
        let mut in_flight = self.in_flight.lock().await;
        while in_flight.try_join_next().is_some() {}

        if in_flight.len() >= self.config.max_in_flight {
            // admission already debited; accepted loss
            warn!(script = %script_id, in_flight = in_flight.len(),
                "In-flight bound reached, dispatch refused");
            return false;
        }

        debug!(script = %script_id, run_id = %ctx.run_id, "Dispatching action tree");
        let executor = self.executor.clone();
        in_flight.spawn(async move {
            executor.execute_tree(&actions, &mut ctx, 0).await;
        });
        true
    }

    /// Wait for every in-flight action tree to finish
    pub async fn drain(&self) {
        let mut in_flight = self.in_flight.lock().await;
        while in_flight.join_next().await.is_some() {}
    }

    /// Drop rate-limiter cooldown stamps older than the configured horizon
    pub fn prune_cooldowns(&self) -> usize {
        self.rate_limiter.prune_cooldowns(self.config.cooldown_horizon())
    }

    /// Best-effort flush of dirty variable scopes (not a drain)
    pub async fn shutdown(&self) {
        info!("Engine shutting down, flushing dirty scopes");
        self.variables.flush().await;
    }

    /// Persist one scope's variables if dirty
    pub async fn flush_scope(&self, scope: &ScopeId) {
        if self.variables.is_dirty(scope) {
            self.variables.flush_scope(scope).await;
        }
    }
}
