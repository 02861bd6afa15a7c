use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

use crate::config::CompletionConfig;
use crate::error::{Result, RetrievalError};
use crate::models::{ChatMessage, ScoredDocument};

const SERVICE: &str = "completion service";

/// Generates the final answer text from system framing, prior turns,
/// retrieved context, and the new question.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        context: &str,
        question: &str,
    ) -> Result<String>;
}

/// System framing for a knowledge scope.
pub fn build_system_prompt(kb_scope: &str) -> String {
    format!(
        "You are a knowledge-base assistant answering questions about the \
         \"{kb_scope}\" domain. Each user message includes passages retrieved \
         from that knowledge base. Answer ONLY from the provided passages. \
         If they do not contain the answer, say what is missing instead of \
         guessing. Keep answers concise and cite passage titles when useful."
    )
}

/// Render retrieved passages into the context block placed ahead of the
/// question.
pub fn build_context_block(sources: &[ScoredDocument]) -> String {
    let mut ctx = String::from("Here are passages from the knowledge base:\n\n");

    if sources.is_empty() {
        ctx.push_str("(No relevant passages were found for this question.)\n");
    } else {
        for doc in sources {
            write!(ctx, "--- {} [{}] ---\n{}\n\n", doc.title, doc.id, doc.content).unwrap();
        }
    }

    ctx
}

/// Assemble the message array: system framing, prior turns, then the new
/// question with the context embedded in the user message so smaller models
/// attend to it.
pub fn build_messages(
    system_prompt: &str,
    history: &[ChatMessage],
    context: &str,
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage {
        role: "system".to_string(),
        content: system_prompt.to_string(),
    });
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: format!("{context}---\nQuestion: {question}"),
    });
    messages
}

// ─── OpenAI-compatible adapter ───────────────────────────

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Completion client for an OpenAI-compatible `/v1/chat/completions`
/// endpoint, non-streaming.
pub struct HttpCompletionModel {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl HttpCompletionModel {
    pub fn new(client: reqwest::Client, config: CompletionConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CompletionModel for HttpCompletionModel {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        context: &str,
        question: &str,
    ) -> Result<String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let req = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: build_messages(system_prompt, history, context, question),
            temperature: 0.3,
        };

        let mut builder = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&req);
        if let Some(key) = self.config.api_key.as_deref() {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| RetrievalError::from_transport(SERVICE, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RetrievalError::rejected(SERVICE, format!("{status}: {body}")));
        }

        let body: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| RetrievalError::unavailable(SERVICE, format!("unparseable response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RetrievalError::unavailable(SERVICE, "empty choices in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;

    fn source(id: &str, title: &str, content: &str) -> ScoredDocument {
        ScoredDocument::from_document(
            Document {
                id: id.into(),
                content: content.into(),
                title: title.into(),
            },
            1.0,
        )
    }

    #[test]
    fn test_context_block_lists_passages_with_titles() {
        let ctx = build_context_block(&[
            source("d1", "Refund policy", "Refunds within 30 days."),
            source("d2", "Shipping", "Ships in 2 days."),
        ]);
        assert!(ctx.contains("Refund policy [d1]"));
        assert!(ctx.contains("Refunds within 30 days."));
        assert!(ctx.contains("Shipping [d2]"));
    }

    #[test]
    fn test_context_block_empty_results() {
        let ctx = build_context_block(&[]);
        assert!(ctx.contains("No relevant passages"));
    }

    #[test]
    fn test_messages_structure() {
        let history = vec![ChatMessage::user("q1"), ChatMessage::assistant("a1")];
        let msgs = build_messages("sys", &history, "ctx\n", "q2");
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].role, "user");
        assert_eq!(msgs[2].role, "assistant");
        assert_eq!(msgs[3].role, "user");
        assert!(msgs[3].content.contains("ctx"));
        assert!(msgs[3].content.contains("Question: q2"));
    }

    #[test]
    fn test_messages_without_history() {
        let msgs = build_messages("sys", &[], "ctx\n", "hello");
        assert_eq!(msgs.len(), 2);
        assert!(msgs[1].content.contains("hello"));
    }

    #[test]
    fn test_system_prompt_names_the_scope() {
        let prompt = build_system_prompt("legal");
        assert!(prompt.contains("\"legal\""));
    }
}
