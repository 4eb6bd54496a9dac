//! Interactive edit sessions
//!
//! One session per editor identity. `begin` renders the target script into a
//! text buffer; `input` then routes each line the editor sends: `exit` ends
//! the session, `save` compiles and writes back through the script library,
//! anything else is applied as a line-edit directive (or appended when it
//! is not one). A save that fails to validate keeps the session open so the
//! buffer is not lost.

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use varka_core::ScopeId;
use varka_parser::{compile, render};
use varka_store::{LibraryError, SharedScriptLibrary};

use crate::line::{apply_edit, render_with_numbers};

/// Errors from session management
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no active edit session")]
    NoSession,

    #[error("no script named '{0}'")]
    ScriptNotFound(String),
}

/// Result type for editor operations
pub type EditorResult<T> = Result<T, EditorError>;

/// What one line of editor input did
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// Session ended without saving
    Exited,
    /// Buffer compiled, validated, and written back; session ended
    Saved,
    /// Compile or validation failed; session stays open
    SaveFailed(String),
    /// Buffer changed (or input was out of range); numbered view attached
    Updated(String),
}

/// State of one editor identity's session
#[derive(Debug, Clone)]
pub struct EditSession {
    pub scope: ScopeId,
    pub script_id: String,
    /// Identity of the display message showing the buffer (embedder-owned)
    pub display_message: Option<String>,
    pub buffer: String,
}

/// All live edit sessions, keyed by editor identity
pub struct EditSessionManager {
    library: SharedScriptLibrary,
    sessions: DashMap<String, EditSession>,
}

impl EditSessionManager {
    pub fn new(library: SharedScriptLibrary) -> Self {
        Self {
            library,
            sessions: DashMap::new(),
        }
    }

    /// Start (or silently rebind) a session for an editor identity
    ///
    /// Returns the numbered view of the script's source.
    pub async fn begin(
        &self,
        editor: impl Into<String>,
        scope: &ScopeId,
        script_id: &str,
    ) -> EditorResult<String> {
        self.library.ensure_loaded(scope).await;
        let script = self
            .library
            .get(scope, script_id)
            .ok_or_else(|| EditorError::ScriptNotFound(script_id.to_string()))?;

        let buffer = render(&script.body);
        let view = render_with_numbers(&buffer);
        let editor = editor.into();

        debug!(editor = %editor, scope = %scope, script = %script.id, "Edit session started");
        self.sessions.insert(
            editor,
            EditSession {
                scope: scope.clone(),
                script_id: script.id,
                display_message: None,
                buffer,
            },
        );
        Ok(view)
    }

    pub fn session(&self, editor: &str) -> Option<EditSession> {
        self.sessions.get(editor).map(|s| s.clone())
    }

    pub fn has_session(&self, editor: &str) -> bool {
        self.sessions.contains_key(editor)
    }

    /// Record the display message showing the buffer
    pub fn set_display_message(&self, editor: &str, message: impl Into<String>) {
        if let Some(mut session) = self.sessions.get_mut(editor) {
            session.display_message = Some(message.into());
        }
    }

    /// Route one line of editor input
    pub async fn input(&self, editor: &str, text: &str) -> EditorResult<EditOutcome> {
        let trimmed = text.trim();

        if trimmed.eq_ignore_ascii_case("exit") {
            self.sessions
                .remove(editor)
                .ok_or(EditorError::NoSession)?;
            debug!(editor = %editor, "Edit session cancelled");
            return Ok(EditOutcome::Exited);
        }

        if trimmed.eq_ignore_ascii_case("save") {
            return self.save(editor).await;
        }

        let mut session = self.sessions.get_mut(editor).ok_or(EditorError::NoSession)?;
        session.buffer = match apply_edit(&session.buffer, text) {
            Some(updated) => updated,
            // not a directive: append as a new final line
            None if session.buffer.is_empty() => text.to_string(),
            None => format!("{}\n{}", session.buffer, text),
        };
        Ok(EditOutcome::Updated(render_with_numbers(&session.buffer)))
    }

    async fn save(&self, editor: &str) -> EditorResult<EditOutcome> {
        let (scope, script_id, buffer) = {
            let session = self.sessions.get(editor).ok_or(EditorError::NoSession)?;
            (
                session.scope.clone(),
                session.script_id.clone(),
                session.buffer.clone(),
            )
        };

        let body = compile(buffer.trim());
        match self.library.update_body(&scope, &script_id, body).await {
            Ok(()) => {
                self.sessions.remove(editor);
                info!(scope = %scope, script = %script_id, "Edit session saved");
                Ok(EditOutcome::Saved)
            }
            Err(err @ LibraryError::NotFound(_)) => {
                // deleted mid-edit; the buffer stays so nothing is lost
                warn!(scope = %scope, script = %script_id, "Script deleted while editing");
                Ok(EditOutcome::SaveFailed(err.to_string()))
            }
            Err(err) => {
                warn!(scope = %scope, script = %script_id, error = %err, "Save failed");
                Ok(EditOutcome::SaveFailed(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use varka_core::{Limits, Script, ScriptBody, Statement};
    use varka_store::{MemoryStore, ScriptLibrary};

    async fn manager_with_script() -> (EditSessionManager, ScopeId) {
        let library = Arc::new(ScriptLibrary::new(
            Arc::new(MemoryStore::new()),
            Limits::default(),
        ));
        let scope = ScopeId::from("guild-1");
        let script = Script::new(
            "greet",
            ScriptBody {
                condition: "event_type == 'member_join'".to_string(),
                actions: vec![Statement::Literal("channel.send welcome".into())],
                initialization: vec![],
            },
        );
        library.upsert(&scope, script).await.unwrap();
        (EditSessionManager::new(library), scope)
    }

    #[tokio::test]
    async fn test_begin_renders_numbered_view() {
        let (manager, scope) = manager_with_script().await;
        let view = manager.begin("editor-1", &scope, "greet").await.unwrap();
        assert_eq!(
            view,
            "1 if event_type == 'member_join' then\n2     channel.send welcome\n3 endif"
        );
    }

    #[tokio::test]
    async fn test_begin_rebinds_silently() {
        let (manager, scope) = manager_with_script().await;
        manager.begin("editor-1", &scope, "greet").await.unwrap();
        manager.input("editor-1", "2- ").await.unwrap();

        // a fresh begin discards the edited buffer without complaint
        manager.begin("editor-1", &scope, "greet").await.unwrap();
        let session = manager.session("editor-1").unwrap();
        assert!(session.buffer.contains("channel.send welcome"));
    }

    #[tokio::test]
    async fn test_directive_and_append_flow() {
        let (manager, scope) = manager_with_script().await;
        manager.begin("editor-1", &scope, "greet").await.unwrap();

        let outcome = manager
            .input("editor-1", "2 channel.send hello")
            .await
            .unwrap();
        assert!(matches!(outcome, EditOutcome::Updated(_)));

        manager.input("editor-1", "print done").await.unwrap();
        let session = manager.session("editor-1").unwrap();
        assert!(session.buffer.ends_with("print done"));
    }

    #[tokio::test]
    async fn test_save_writes_back_and_ends_session() {
        let (manager, scope) = manager_with_script().await;
        manager.begin("editor-1", &scope, "greet").await.unwrap();
        manager
            .input("editor-1", "2 channel.send goodbye")
            .await
            .unwrap();

        let outcome = manager.input("editor-1", "save").await.unwrap();
        assert_eq!(outcome, EditOutcome::Saved);
        assert!(!manager.has_session("editor-1"));

        let stored = manager.library.get(&scope, "greet").unwrap();
        assert_eq!(
            stored.body.actions,
            vec![Statement::Literal("channel.send goodbye".into())]
        );
    }

    #[tokio::test]
    async fn test_save_failure_keeps_session() {
        let (manager, scope) = manager_with_script().await;
        manager.begin("editor-1", &scope, "greet").await.unwrap();
        manager.library.remove(&scope, "greet").await.unwrap();

        let outcome = manager.input("editor-1", "save").await.unwrap();
        assert!(matches!(outcome, EditOutcome::SaveFailed(_)));
        assert!(manager.has_session("editor-1"));
    }

    #[tokio::test]
    async fn test_exit_discards() {
        let (manager, scope) = manager_with_script().await;
        manager.begin("editor-1", &scope, "greet").await.unwrap();
        assert_eq!(
            manager.input("editor-1", "EXIT").await.unwrap(),
            EditOutcome::Exited
        );
        assert!(!manager.has_session("editor-1"));
        assert!(matches!(
            manager.input("editor-1", "save").await.unwrap_err(),
            EditorError::NoSession
        ));
    }
}
