//! Conversational retrieval-augmented QA pipeline.
//!
//! One `ask` call runs three stages in order: condense the question
//! against past turns, retrieve context for the condensed question, and
//! generate the answer. History is only written after all three stages
//! succeed, so a failed exchange leaves the session exactly as it was.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;

use crate::core::llm::{CompletionOptions, GenerationError, GenerationService};
use crate::history::{render_prompt_lines, Message};
use crate::prompts::{fill_condenser, AnswerTemplate};
use crate::retrieval::{Retriever, RetrievalError, ScoredDocument};
use crate::storage::{HistoryStore, StoreError};

/// Pipeline stage, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Condense,
    Retrieve,
    Answer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Condense => "condense",
            Stage::Retrieve => "retrieve",
            Stage::Answer => "answer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("question condensation failed: {0}")]
    Condense(#[source] GenerationError),

    #[error("context retrieval failed: {0}")]
    Retrieve(#[source] RetrievalError),

    #[error("answer generation failed: {0}")]
    Answer(#[source] GenerationError),

    #[error("{0} stage timed out")]
    Timeout(Stage),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// How many context documents to retrieve per question.
    pub top_k: usize,
    /// Sampling temperature passed to the generation collaborator.
    pub temperature: f32,
    /// Time allowed for each collaborator call.
    pub call_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            temperature: 0.8,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// The orchestrator. Holds its collaborators explicitly and no per-call
/// state; every `ask` is independent given the same history snapshot.
pub struct ConversationalQaPipeline {
    generator: Arc<dyn GenerationService>,
    retriever: Arc<dyn Retriever>,
    store: Arc<dyn HistoryStore>,
    condenser_template: String,
    answer_template: AnswerTemplate,
    options: PipelineOptions,
}

impl ConversationalQaPipeline {
    pub fn new(
        generator: Arc<dyn GenerationService>,
        retriever: Arc<dyn Retriever>,
        store: Arc<dyn HistoryStore>,
        condenser_template: impl Into<String>,
        answer_template: AnswerTemplate,
        options: PipelineOptions,
    ) -> Self {
        Self {
            generator,
            retriever,
            store,
            condenser_template: condenser_template.into(),
            answer_template,
            options,
        }
    }

    /// Run one full exchange for a session.
    ///
    /// On success the raw user input and the generated answer are appended
    /// to the session history, in that order, and the answer is returned.
    /// On failure nothing is appended.
    pub async fn ask(&self, session_id: &str, input: &str) -> Result<String, PipelineError> {
        let question = sanitize_question(input);
        let history = self.store.list(session_id).await?;
        let past = history.past_messages();

        // With no past turns the question already stands alone.
        let condensed = if past.is_empty() {
            question.clone()
        } else {
            tracing::debug!("[Pipeline] Condensing question for session '{}'", session_id);
            let prompt = fill_condenser(
                &self.condenser_template,
                &render_prompt_lines(past),
                &question,
            );
            self.call_generator(&prompt, Stage::Condense, PipelineError::Condense)
                .await?
                .trim()
                .to_string()
        };

        let documents = timeout(
            self.options.call_timeout,
            self.retriever.top_k(&condensed, self.options.top_k),
        )
        .await
        .map_err(|_| PipelineError::Timeout(Stage::Retrieve))?
        .map_err(PipelineError::Retrieve)?;

        tracing::debug!(
            "[Pipeline] Answering with {} context documents for session '{}'",
            documents.len(),
            session_id
        );
        let prompt = self
            .answer_template
            .fill(&build_context_block(&documents), &condensed);
        let answer = self
            .call_generator(&prompt, Stage::Answer, PipelineError::Answer)
            .await?;

        self.store
            .append(
                session_id,
                &[Message::user(input), Message::assistant(answer.clone())],
            )
            .await?;

        Ok(answer)
    }

    async fn call_generator(
        &self,
        prompt: &str,
        stage: Stage,
        wrap: fn(GenerationError) -> PipelineError,
    ) -> Result<String, PipelineError> {
        let options = CompletionOptions {
            temperature: self.options.temperature,
            stop: None,
        };

        timeout(
            self.options.call_timeout,
            self.generator.complete(prompt, &options),
        )
        .await
        .map_err(|_| PipelineError::Timeout(stage))?
        .map_err(wrap)
    }
}

/// Trim the input and collapse newlines so the question occupies a single
/// template line.
pub fn sanitize_question(input: &str) -> String {
    input.trim().replace('\n', " ")
}

fn build_context_block(documents: &[ScoredDocument]) -> String {
    documents
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
