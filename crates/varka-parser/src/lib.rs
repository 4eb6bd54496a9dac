//! Parsing pipeline for the Varka script language
//!
//! Raw text flows through [`tokenize`] into statement tokens, through
//! [`parse`] into a statement forest, and through [`compile`] into the
//! persisted condition/initialization/actions triple. [`render`] inverts
//! the pipeline for the line editor. No stage ever raises on malformed
//! input; bad nesting degrades by rule.

pub mod compile;
pub mod lexer;
pub mod parser;

pub use compile::{compile, render};
pub use lexer::tokenize;
pub use parser::parse;
