//! Ragchat - retrieval-augmented conversational question answering
//!
//! Each question is condensed against the session's prior turns, context
//! is retrieved from a vector index for the condensed question, and the
//! answer is generated from a persona-specialized prompt. Conversation
//! state persists per session behind a storage trait.

pub mod cli;
mod config;
pub mod core;
pub mod history;
pub mod pipeline;
pub mod prompts;
pub mod retrieval;
pub mod storage;
pub mod utils;

pub use config::{PromptsConfig, Settings};
pub use history::{ConversationHistory, Message, Role};
pub use pipeline::{ConversationalQaPipeline, PipelineError, PipelineOptions, Stage};
pub use prompts::{AnswerTemplate, Persona, PromptCatalog};
