//! Conversational layer on top of the hybrid retriever: per-session turn
//! history, answer generation, and the guarantee that the end user sees
//! either an answer with sources or a generic failure message, never an
//! upstream error.

pub mod session;

use std::sync::Arc;

use crate::llm::completion::{build_context_block, build_system_prompt};
use crate::llm::CompletionModel;
use crate::models::{ChatMessage, RetrievalRequest, ScoredDocument, SourceRef};
use crate::search::retriever::HybridRetriever;
use session::SessionStore;

/// Maximum characters accepted from one user question.
const MAX_QUESTION_LEN: usize = 2_000;
/// Prior turns included when prompting; older turns stay stored but are not
/// sent.
const MAX_PROMPT_TURNS: usize = 10;

const FAILURE_ANSWER: &str =
    "Sorry, something went wrong while answering your question. Please try again.";

/// Outcome of one conversational turn. Always a well-formed answer payload;
/// failures are absorbed into the apology form.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

pub struct ConversationEngine {
    retriever: Arc<HybridRetriever>,
    completion: Arc<dyn CompletionModel>,
    sessions: SessionStore,
    top_k: usize,
    min_score: f32,
}

impl ConversationEngine {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        completion: Arc<dyn CompletionModel>,
        sessions: SessionStore,
        top_k: usize,
        min_score: f32,
    ) -> Self {
        Self {
            retriever,
            completion,
            sessions,
            top_k,
            min_score,
        }
    }

    /// Answer one question within a session. History is appended only when
    /// the whole turn (retrieval + completion) succeeded.
    pub async fn ask(&self, session_id: &str, kb_scope: &str, question: &str) -> TurnOutcome {
        let question = truncate_to_char_boundary(question.trim(), MAX_QUESTION_LEN);
        if question.is_empty() {
            return TurnOutcome {
                answer: FAILURE_ANSWER.to_string(),
                sources: Vec::new(),
            };
        }

        let history = self.sessions.history(session_id);
        let prompt_history = if history.len() > MAX_PROMPT_TURNS {
            history[history.len() - MAX_PROMPT_TURNS..].to_vec()
        } else {
            history
        };

        match self.run_turn(kb_scope, &prompt_history, &question).await {
            Ok((answer, retrieved)) => {
                self.sessions.append_exchange(session_id, &question, &answer);
                let sources = retrieved.iter().map(SourceRef::from).collect();
                TurnOutcome { answer, sources }
            }
            Err(err) => {
                tracing::error!(
                    session_id,
                    kb_scope,
                    question = %question,
                    "turn failed: {err}"
                );
                TurnOutcome {
                    answer: FAILURE_ANSWER.to_string(),
                    sources: Vec::new(),
                }
            }
        }
    }

    async fn run_turn(
        &self,
        kb_scope: &str,
        history: &[ChatMessage],
        question: &str,
    ) -> crate::error::Result<(String, Vec<ScoredDocument>)> {
        let request = RetrievalRequest {
            query: question.to_string(),
            top_k: self.top_k,
            min_score: self.min_score,
            kb_scope: kb_scope.to_string(),
        };
        let retrieved = self.retriever.retrieve(&request).await?;

        let system_prompt = build_system_prompt(kb_scope);
        let context = build_context_block(&retrieved);
        let answer = self
            .completion
            .complete(&system_prompt, history, &context, question)
            .await?;

        Ok((answer, retrieved))
    }

    /// Forget a session's history. Idempotent.
    pub fn clear(&self, session_id: &str) {
        self.sessions.clear(session_id);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    fn history_len(&self, session_id: &str) -> usize {
        self.sessions.history(session_id).len()
    }
}

fn truncate_to_char_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
