//! Answer generation over a completion model

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionError, CompletionModel, Message};
use serde_json::json;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::assistant::prompt::{build_system_prompt, Persona};
use crate::crawler::PageRecord;
use crate::error::Error as CrateError;
use crate::index::{Database, DbError, Role};

/// Stored messages sent along as chat history
pub const HISTORY_MESSAGES: usize = 8;

pub const TEMPERATURE: f64 = 0.8;

pub const MAX_TOKENS: u64 = 400;

/// Error type for answer generation
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The completion call failed
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    /// History could not be read or written
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// The model answered without any text
    #[error("Model returned an empty response")]
    EmptyResponse,
}

impl From<GenerationError> for CrateError {
    fn from(err: GenerationError) -> Self {
        CrateError::Generation(err.to_string())
    }
}

/// Turns a user message into a reply within a persistent session
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Answer `message` in `session_id`, with optional extra context for this turn
    async fn ask(
        &self,
        session_id: &str,
        message: &str,
        knowledge_context: Option<&str>,
    ) -> Result<String, GenerationError>;

    /// Forget a session's history
    async fn reset_session(&self, session_id: &str) -> Result<(), GenerationError>;

    /// Replace the knowledge the generator answers from
    async fn refresh_knowledge(&self, pages: &[PageRecord]);
}

/// Generator that places the corpus in the system prompt
pub struct PromptAnswerGenerator<M: CompletionModel> {
    model: M,
    db: Database,
    persona: Persona,
    system_prompt: RwLock<String>,
    sessions: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<M: CompletionModel> PromptAnswerGenerator<M> {
    pub fn new(model: M, db: Database, persona: Persona) -> Self {
        let system_prompt = build_system_prompt(&persona, &[]);
        Self {
            model,
            db,
            persona,
            system_prompt: RwLock::new(system_prompt),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Current system prompt
    pub async fn system_prompt(&self) -> String {
        self.system_prompt.read().await.clone()
    }

    /// Lock for `session_id`. Locks nobody holds are dropped on the way; a
    /// clone is only handed out under the map lock, so a count of one means idle.
    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, lock| Arc::strong_count(lock) > 1);
        sessions.entry(session_id.to_string()).or_default().clone()
    }
}

fn response_text<'a>(choice: impl Iterator<Item = &'a AssistantContent>) -> String {
    choice
        .filter_map(|content| match content {
            AssistantContent::Text(text) => Some(text.text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string()
}

#[async_trait]
impl<M> AnswerGenerator for PromptAnswerGenerator<M>
where
    M: CompletionModel + 'static,
{
    #[instrument(skip(self, message, knowledge_context))]
    async fn ask(
        &self,
        session_id: &str,
        message: &str,
        knowledge_context: Option<&str>,
    ) -> Result<String, GenerationError> {
        // Turns of one session are answered and stored in arrival order
        let lock = self.session_lock(session_id).await;
        let _turn = lock.lock().await;

        self.db.create_conversation(session_id, session_id).await?;
        let history: Vec<Message> = self
            .db
            .conversation_history(session_id, HISTORY_MESSAGES)
            .await?
            .into_iter()
            .map(|m| match m.role {
                Role::User => Message::user(m.content),
                Role::Assistant => Message::assistant(m.content),
            })
            .collect();

        let mut preamble = self.system_prompt().await;
        if let Some(context) = knowledge_context.filter(|c| !c.trim().is_empty()) {
            preamble.push_str("\n\n## CONTEXTO ADICIONAL\n");
            preamble.push_str(context);
        }

        debug!(history = history.len(), "Requesting completion");
        let response = self
            .model
            .completion_request(Message::user(message))
            .preamble(preamble)
            .messages(history)
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .additional_params(json!({
                "presence_penalty": 0.2,
                "frequency_penalty": 0.1,
            }))
            .send()
            .await?;

        let reply = response_text(response.choice.iter());
        if reply.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        self.db.save_message(session_id, Role::User, message).await?;
        self.db.save_message(session_id, Role::Assistant, &reply).await?;

        Ok(reply)
    }

    async fn reset_session(&self, session_id: &str) -> Result<(), GenerationError> {
        let lock = self.session_lock(session_id).await;
        let _turn = lock.lock().await;
        self.db.delete_conversation(session_id).await?;
        // Keep the lock if another turn is already waiting on it
        let mut sessions = self.sessions.lock().await;
        if Arc::strong_count(&lock) <= 2 {
            sessions.remove(session_id);
        }
        Ok(())
    }

    async fn refresh_knowledge(&self, pages: &[PageRecord]) {
        let prompt = build_system_prompt(&self.persona, pages);
        *self.system_prompt.write().await = prompt;
        debug!(pages = pages.len(), "Rebuilt system prompt");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::prompt::LOADING_PLACEHOLDER;
    use crate::model::mock_model::MockCompletionModel;
    use tempfile::TempDir;

    async fn generator() -> (PromptAnswerGenerator<MockCompletionModel>, MockCompletionModel, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new_from_path(&dir.path().join("chat.db").to_string_lossy())
            .await
            .unwrap();
        let model = MockCompletionModel::new();
        let persona = Persona {
            school_name: "Colegio San Agustín".to_string(),
            assistant_name: "Agustín".to_string(),
        };
        (PromptAnswerGenerator::new(model.clone(), db, persona), model, dir)
    }

    #[tokio::test]
    async fn test_ask_stores_turns_and_sends_history() {
        let (generator, model, _dir) = generator().await;
        model.set_text_response("  ¡Hola! Las clases empiezan en marzo.  ").await;

        let reply = generator.ask("chat-1", "¿Cuándo empiezan?", None).await.unwrap();
        assert_eq!(reply, "¡Hola! Las clases empiezan en marzo.");

        generator.ask("chat-1", "¿Y terminan?", None).await.unwrap();

        let requests = model.requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].history_len, 0);
        assert_eq!(requests[1].history_len, 2);
        assert_eq!(requests[1].temperature, Some(TEMPERATURE));
        assert_eq!(requests[1].max_tokens, Some(MAX_TOKENS));

        let stored = generator.db.conversation_history("chat-1", 10).await.unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[0].content, "¿Cuándo empiezan?");
        assert_eq!(stored[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let (generator, model, _dir) = generator().await;
        model.set_text_response("ok").await;

        for i in 0..6 {
            generator.ask("chat-1", &format!("pregunta {i}"), None).await.unwrap();
        }

        let requests = model.requests().await;
        assert_eq!(requests.last().unwrap().history_len, HISTORY_MESSAGES);
    }

    #[tokio::test]
    async fn test_refresh_knowledge_rebuilds_prompt() {
        let (generator, model, _dir) = generator().await;
        model.set_text_response("ok").await;
        assert!(generator.system_prompt().await.contains(LOADING_PLACEHOLDER));

        let pages = vec![PageRecord::new(
            "https://example.edu/aranceles",
            "Aranceles",
            "La cuota mensual se abona del 1 al 10.",
        )];
        generator.refresh_knowledge(&pages).await;
        generator.ask("chat-1", "¿Cuánto sale?", Some("Beca disponible")).await.unwrap();

        let preamble = model.requests().await[0].preamble.clone().unwrap();
        assert!(preamble.contains("### Aranceles"));
        assert!(preamble.contains("Beca disponible"));
        assert!(!preamble.contains(LOADING_PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_failed_completion_stores_nothing() {
        let (generator, model, _dir) = generator().await;
        model.set_failure("service unavailable").await;

        let err = generator.ask("chat-1", "hola", None).await.unwrap_err();
        assert!(matches!(err, GenerationError::Completion(_)));
        assert!(generator.db.conversation_history("chat-1", 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_reply_is_an_error() {
        let (generator, _model, _dir) = generator().await;
        let err = generator.ask("chat-1", "hola", None).await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_reset_session_clears_history() {
        let (generator, model, _dir) = generator().await;
        model.set_text_response("ok").await;
        generator.ask("chat-1", "hola", None).await.unwrap();

        generator.reset_session("chat-1").await.unwrap();
        generator.ask("chat-1", "hola de nuevo", None).await.unwrap();
        assert_eq!(model.requests().await[1].history_len, 0);
    }

    #[tokio::test]
    async fn test_idle_session_locks_are_dropped() {
        let (generator, model, _dir) = generator().await;
        model.set_text_response("ok").await;

        for session in ["chat-1", "chat-2", "chat-3"] {
            generator.ask(session, "hola", None).await.unwrap();
        }
        assert_eq!(generator.sessions.lock().await.len(), 1);

        generator.reset_session("chat-3").await.unwrap();
        assert!(generator.sessions.lock().await.is_empty());
    }
}
