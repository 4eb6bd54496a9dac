//! Line editor and edit sessions for Varka scripts
//!
//! Scripts are edited as numbered text: [`line`] implements the directive
//! grammar over a newline-delimited buffer, and [`session`] holds one live
//! buffer per editor identity, compiling back through varka-parser on save.

pub mod line;
pub mod session;

pub use line::{apply_edit, render_with_numbers};
pub use session::{EditOutcome, EditSession, EditSessionManager, EditorError, EditorResult};
