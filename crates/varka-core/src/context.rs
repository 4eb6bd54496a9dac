//! Event and execution contexts
//!
//! An `EventContext` is what the platform adapter hands the engine for each
//! platform event: the event kind, owning scope, acting user, and a snapshot
//! of platform facts. An `ExecutionContext` wraps one of those for a single
//! script run and adds the run-local ephemeral variable map.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use crate::value::Value;

/// Identifier of a persistence/evaluation partition (one per community)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ScopeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The closed vocabulary of platform events scripts can react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    MessageEdit,
    MessageDelete,
    MemberJoin,
    MemberLeave,
    MemberBan,
    MemberUnban,
    ReactionAdd,
    ReactionRemove,
    VoiceUpdate,
    ChannelCreate,
    ChannelDelete,
    GuildUpdate,
}

impl EventKind {
    /// The `event_type` string scripts compare against
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::MessageEdit => "message_edit",
            EventKind::MessageDelete => "message_delete",
            EventKind::MemberJoin => "member_join",
            EventKind::MemberLeave => "member_leave",
            EventKind::MemberBan => "member_ban",
            EventKind::MemberUnban => "member_unban",
            EventKind::ReactionAdd => "reaction_add",
            EventKind::ReactionRemove => "reaction_remove",
            EventKind::VoiceUpdate => "voice_update",
            EventKind::ChannelCreate => "channel_create",
            EventKind::ChannelDelete => "channel_delete",
            EventKind::GuildUpdate => "guild_update",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single platform event as seen by the engine
///
/// The `facts` map carries path → value snapshots supplied by the platform
/// adapter (e.g. `message.length`, `member.is_admin`); anything not in the
/// map falls through to the adapter's own resolver.
#[derive(Debug, Clone)]
pub struct EventContext {
    /// What happened
    pub kind: EventKind,

    /// Owning scope
    pub scope: ScopeId,

    /// Acting user, when the event has one
    pub user_id: Option<String>,

    /// Channel the event happened in, when it has one
    pub channel_id: Option<String>,

    /// Snapshot of platform facts, keyed by dotted path
    pub facts: IndexMap<String, Value>,

    /// Override for the event time (for testing)
    pub time_override: Option<DateTime<Utc>>,
}

impl EventContext {
    pub fn new(kind: EventKind, scope: impl Into<ScopeId>) -> Self {
        Self {
            kind,
            scope: scope.into(),
            user_id: None,
            channel_id: None,
            facts: IndexMap::new(),
            time_override: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    /// Add a platform fact snapshot
    pub fn with_fact(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.facts.insert(path.into(), value.into());
        self
    }

    /// Set the event time (for testing)
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time_override = Some(time);
        self
    }

    /// Current time (or the override if set)
    pub fn now(&self) -> DateTime<Utc> {
        self.time_override.unwrap_or_else(Utc::now)
    }
}

/// Context threaded through one script run
///
/// Carries the triggering event plus the run-local ephemeral variable map,
/// which earlier statements of the same run can mutate for later ones.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The event that triggered this run
    pub event: EventContext,

    /// Run-local variables, discarded when the run ends
    pub ephemeral: IndexMap<String, Value>,

    /// Unique identifier for this run (ULID)
    pub run_id: String,
}

impl ExecutionContext {
    pub fn new(event: EventContext) -> Self {
        Self {
            event,
            ephemeral: IndexMap::new(),
            run_id: Ulid::new().to_string(),
        }
    }
}

/// Capability mapping a dotted symbol path to a scalar given an execution
/// context
///
/// `None` is the absent sentinel: it is distinguishable from every
/// legitimate falsy value and tells the caller the path resolved to
/// nothing at all.
pub trait ContextResolver: Send + Sync {
    fn resolve(&self, path: &str, ctx: &ExecutionContext) -> Option<Value>;
}

/// Resolver that knows nothing; every path is absent
pub struct NullResolver;

impl ContextResolver for NullResolver {
    fn resolve(&self, _path: &str, _ctx: &ExecutionContext) -> Option<Value> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_strings() {
        assert_eq!(EventKind::Message.as_str(), "message");
        assert_eq!(EventKind::VoiceUpdate.as_str(), "voice_update");
        let k: EventKind = serde_json::from_str("\"member_join\"").unwrap();
        assert_eq!(k, EventKind::MemberJoin);
    }

    #[test]
    fn test_time_override() {
        let t = Utc::now();
        let event = EventContext::new(EventKind::Message, "guild-1").with_time(t);
        assert_eq!(event.now(), t);
    }

    #[test]
    fn test_run_ids_unique() {
        let event = EventContext::new(EventKind::Message, "guild-1");
        let a = ExecutionContext::new(event.clone());
        let b = ExecutionContext::new(event);
        assert_ne!(a.run_id, b.run_id);
    }
}
