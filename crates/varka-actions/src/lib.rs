//! Command vocabulary and action dispatch for Varka
//!
//! Scripts invoke side effects as `<command> <argument>` lines. The
//! [`Command`] enum is the closed vocabulary of those lines; the
//! [`ActionRegistry`] maps each command to an async handler supplied by the
//! embedding platform adapter. [`table`] parses the loose key:value tables
//! rich commands take as payloads.

pub mod command;
pub mod registry;
pub mod table;

pub use command::{Command, UnknownCommand};
pub use registry::{
    ActionCall, ActionError, ActionRegistry, ActionResult, Outcome, SharedActionRegistry,
};
pub use table::{parse_color, parse_table, ArgTable, TableField};
