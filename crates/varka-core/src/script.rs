//! Statement-node AST and persisted script records
//!
//! A script's action tree is an ordered list of statement nodes; conditionals
//! own their branches as child lists, so execution is pure recursive descent
//! with no parent pointers. Comments survive parsing untouched so that the
//! line editor can show exactly what the author wrote.
//!
//! The persisted JSON shape keeps literal and comment statements as bare
//! strings and conditionals as `{"type":"if",...}` objects.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::ScopeId;

/// Structural validation errors for script bodies
#[derive(Debug, Clone, Error)]
pub enum ValidateError {
    #[error("condition exceeds {max} characters")]
    ConditionTooLong { max: usize },

    #[error("statement exceeds {max} characters")]
    StatementTooLong { max: usize },

    #[error("script has more than {max} actions")]
    TooManyActions { max: usize },

    #[error("scope already holds {max} scripts")]
    TooManyScripts { max: usize },

    #[error("script id must not be empty")]
    EmptyId,
}

/// Result type for structural validation
pub type ValidateResult = Result<(), ValidateError>;

/// One node of an action tree
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// An action, assignment, or other executable line
    Literal(String),
    /// A `//` line, preserved for display and editing only
    Comment(String),
    /// A nested if/else block
    Conditional(Conditional),
}

impl Statement {
    /// Classify a raw line: `//` prefix means comment
    pub fn from_text(text: impl Into<String>) -> Statement {
        let text = text.into();
        if text.trim_start().starts_with("//") {
            Statement::Comment(text)
        } else {
            Statement::Literal(text)
        }
    }

    /// The raw text of a literal or comment node
    pub fn text(&self) -> Option<&str> {
        match self {
            Statement::Literal(s) | Statement::Comment(s) => Some(s),
            Statement::Conditional(_) => None,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Statement::Comment(_))
    }
}

/// An if/else block with owned branches
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Conditional {
    /// Condition expression text
    pub condition: String,
    /// Statements run when the condition holds
    pub then_branch: Vec<Statement>,
    /// Statements run otherwise
    pub else_branch: Vec<Statement>,
}

impl Conditional {
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            then_branch: Vec::new(),
            else_branch: Vec::new(),
        }
    }
}

impl Serialize for Statement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Statement::Literal(s) | Statement::Comment(s) => serializer.serialize_str(s),
            Statement::Conditional(c) => {
                let mut node = serializer.serialize_struct("Conditional", 4)?;
                node.serialize_field("type", "if")?;
                node.serialize_field("condition", &c.condition)?;
                node.serialize_field("then", &c.then_branch)?;
                node.serialize_field("else", &c.else_branch)?;
                node.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Statement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct CondWire {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            condition: String,
            #[serde(default, rename = "then")]
            then_branch: Vec<Statement>,
            #[serde(default, rename = "else")]
            else_branch: Vec<Statement>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Node(CondWire),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Text(s) => Ok(Statement::from_text(s)),
            Wire::Node(node) => {
                if node.kind != "if" {
                    return Err(de::Error::custom(format!(
                        "unknown statement node type: {}",
                        node.kind
                    )));
                }
                Ok(Statement::Conditional(Conditional {
                    condition: node.condition,
                    then_branch: node.then_branch,
                    else_branch: node.else_branch,
                }))
            }
        }
    }
}

/// The executable parts of a script: condition, initialization, actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptBody {
    /// Condition expression checked per event (`"True"` means always)
    pub condition: String,

    /// Action tree dispatched when the condition holds
    pub actions: Vec<Statement>,

    /// Flat statements run unconditionally before the condition check
    #[serde(default)]
    pub initialization: Vec<Statement>,
}

impl ScriptBody {
    /// Body that runs its actions on every event
    pub fn unconditional(actions: Vec<Statement>) -> Self {
        Self {
            condition: "True".to_string(),
            actions,
            initialization: Vec::new(),
        }
    }
}

/// A persisted automation script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Unique per scope, case-insensitively
    pub id: String,

    #[serde(flatten)]
    pub body: ScriptBody,

    /// Disabled scripts are skipped by the scheduler
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Higher runs first; ties broken by ascending id
    #[serde(default)]
    pub priority: i64,

    /// Owning scope, stamped when persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeId>,
}

fn default_enabled() -> bool {
    true
}

impl Script {
    pub fn new(id: impl Into<String>, body: ScriptBody) -> Self {
        Self {
            id: id.into(),
            body,
            enabled: true,
            priority: 0,
            scope: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

/// Structural size limits enforced at create/import time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "default_max_scripts")]
    pub max_scripts: usize,

    #[serde(default = "default_max_condition_len")]
    pub max_condition_len: usize,

    #[serde(default = "default_max_statement_len")]
    pub max_statement_len: usize,

    #[serde(default = "default_max_actions")]
    pub max_actions: usize,
}

fn default_max_scripts() -> usize {
    100
}

fn default_max_condition_len() -> usize {
    4000
}

fn default_max_statement_len() -> usize {
    4000
}

fn default_max_actions() -> usize {
    50
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_scripts: default_max_scripts(),
            max_condition_len: default_max_condition_len(),
            max_statement_len: default_max_statement_len(),
            max_actions: default_max_actions(),
        }
    }
}

impl Limits {
    /// Validate a script body against the size limits
    pub fn validate_body(&self, body: &ScriptBody) -> ValidateResult {
        if body.condition.len() > self.max_condition_len {
            return Err(ValidateError::ConditionTooLong {
                max: self.max_condition_len,
            });
        }
        if body.actions.len() > self.max_actions {
            return Err(ValidateError::TooManyActions {
                max: self.max_actions,
            });
        }
        for stmt in body.initialization.iter().chain(body.actions.iter()) {
            self.validate_statement(stmt)?;
        }
        Ok(())
    }

    fn validate_statement(&self, stmt: &Statement) -> ValidateResult {
        match stmt {
            Statement::Literal(s) | Statement::Comment(s) => {
                if s.len() > self.max_statement_len {
                    return Err(ValidateError::StatementTooLong {
                        max: self.max_statement_len,
                    });
                }
            }
            Statement::Conditional(c) => {
                if c.condition.len() > self.max_condition_len {
                    return Err(ValidateError::ConditionTooLong {
                        max: self.max_condition_len,
                    });
                }
                for child in c.then_branch.iter().chain(c.else_branch.iter()) {
                    self.validate_statement(child)?;
                }
            }
        }
        Ok(())
    }

    /// Validate a full script record
    pub fn validate_script(&self, script: &Script) -> ValidateResult {
        if script.id.trim().is_empty() {
            return Err(ValidateError::EmptyId);
        }
        self.validate_body(&script.body)
    }
}
