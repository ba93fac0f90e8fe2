//! Integration tests for ragchat
//!
//! These tests drive full exchanges through the pipeline without
//! requiring API keys: generation is scripted and embeddings are
//! deterministic keyword vectors.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;

use ragchat::core::embedding::{EmbeddingError, EmbeddingService};
use ragchat::core::llm::{CompletionOptions, GenerationError, GenerationService};
use ragchat::retrieval::{EmbeddingRetriever, VectorIndex};
use ragchat::storage::durable::VersionedHistory;
use ragchat::storage::filesystem::FileStore;
use ragchat::storage::memory::InMemoryHistory;
use ragchat::storage::HistoryStore;
use ragchat::{
    ConversationalQaPipeline, Message, Persona, PipelineOptions, PromptCatalog, PromptsConfig,
    Role,
};

/// Embeds text as membership flags for a couple of topic words, which is
/// enough to make cosine retrieval pick the on-topic document.
struct KeywordEmbedder;

#[async_trait]
impl EmbeddingService for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = text.to_lowercase();
        Ok(vec![
            if text.contains("rust") { 1.0 } else { 0.0 },
            if text.contains("python") { 1.0 } else { 0.0 },
            0.1,
        ])
    }
}

struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    async fn seen_prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<String, GenerationError> {
        self.prompts.lock().await.push(prompt.to_string());
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or(GenerationError::EmptyResponse)
    }
}

fn prompts_config() -> PromptsConfig {
    PromptsConfig {
        question_generator_prompt: "Given the following conversation and a follow up question, \
             rephrase the follow up question to be a standalone question.\n\n\
             Chat History:\n{chat_history}\n\
             Follow Up Input: {question}\n\
             Standalone question:"
            .to_string(),
        qa_prompt: "You are {bot_name}, a {bot_role}. Answer in a {bot_style} style and keep a \
             {bot_tone} tone.\nUse the following pieces of context to answer the question at \
             the end.\n\n{context}\n\nQuestion: {question}\nHelpful answer:"
            .to_string(),
        bot_metadata: Persona {
            style: "concise".to_string(),
            role: "documentation assistant".to_string(),
            name: "Aria".to_string(),
            tone: "friendly".to_string(),
        },
    }
}

fn corpus_index() -> VectorIndex {
    let mut index = VectorIndex::new();
    index.add("Rust is a systems programming language.", vec![1.0, 0.0, 0.1]);
    index.add("Python is an interpreted language.", vec![0.0, 1.0, 0.1]);
    index
}

fn build_pipeline(
    generator: Arc<dyn GenerationService>,
    store: Arc<dyn HistoryStore>,
) -> ConversationalQaPipeline {
    let config = prompts_config();
    let catalog = PromptCatalog::load(&config).unwrap();
    let answer_template = catalog
        .render_answer_template(&config.bot_metadata)
        .unwrap();
    let retriever = Arc::new(EmbeddingRetriever::new(
        corpus_index(),
        Arc::new(KeywordEmbedder),
    ));

    ConversationalQaPipeline::new(
        generator,
        retriever,
        store,
        catalog.condenser_template(),
        answer_template,
        PipelineOptions {
            top_k: 1,
            temperature: 0.8,
            call_timeout: Duration::from_secs(5),
        },
    )
}

#[tokio::test]
async fn test_two_turn_conversation_with_retrieval() {
    let generator = Arc::new(ScriptedGenerator::new(vec![
        // Turn 1 skips condensation, so the first call is the answer.
        "Rust is a language for reliable systems software.",
        // Turn 2: condensation, then the answer.
        "What is Rust best suited for?",
        "Rust shines in systems programming.",
    ]));
    let store = Arc::new(InMemoryHistory::new());
    let pipeline = build_pipeline(generator.clone(), store.clone());

    let first = pipeline.ask("session-1", "What is Rust?").await.unwrap();
    assert_eq!(first, "Rust is a language for reliable systems software.");

    let second = pipeline
        .ask("session-1", "What is it best suited for?")
        .await
        .unwrap();
    assert_eq!(second, "Rust shines in systems programming.");

    let prompts = generator.seen_prompts().await;
    assert_eq!(prompts.len(), 3);

    // Turn 1: the answer prompt carries the on-topic retrieved document
    // and the persona, with every placeholder substituted.
    assert!(prompts[0].contains("Rust is a systems programming language."));
    assert!(prompts[0].contains("You are Aria, a documentation assistant."));
    assert!(prompts[0].contains("Question: What is Rust?"));
    assert!(!prompts[0].contains('{'));

    // Turn 2: condensation sees the first exchange as Human/AI lines.
    assert!(prompts[1].contains("Human: What is Rust?"));
    assert!(prompts[1].contains("AI: Rust is a language for reliable systems software."));
    assert!(prompts[1].contains("Follow Up Input: What is it best suited for?"));

    // Turn 2's answer is generated for the condensed question, with
    // retrieval keyed off it rather than the raw follow-up.
    assert!(prompts[2].contains("Question: What is Rust best suited for?"));
    assert!(prompts[2].contains("Rust is a systems programming language."));

    // History grew by exactly two per exchange, user turn first.
    let history = store.list("session-1").await.unwrap();
    let roles: Vec<Role> = history.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(history.messages()[2], Message::user("What is it best suited for?"));
}

#[tokio::test]
async fn test_failed_exchange_leaves_session_resumable() {
    // Script only the first turn; the second turn's condensation hits an
    // exhausted script and fails.
    let generator = Arc::new(ScriptedGenerator::new(vec!["First answer."]));
    let store = Arc::new(InMemoryHistory::new());
    let pipeline = build_pipeline(generator.clone(), store.clone());

    pipeline.ask("session-1", "What is Rust?").await.unwrap();
    let before = store.list("session-1").await.unwrap();

    pipeline
        .ask("session-1", "And what else?")
        .await
        .unwrap_err();
    assert_eq!(store.list("session-1").await.unwrap(), before);
}

#[tokio::test]
async fn test_conversation_survives_process_restart() {
    let temp_dir = TempDir::new().unwrap();
    let storage_dir = temp_dir.path().to_path_buf();

    // First "process": one exchange against the durable store.
    {
        let file_store = Arc::new(FileStore::new(storage_dir.clone()).await.unwrap());
        let store = Arc::new(VersionedHistory::new(file_store));
        let generator = Arc::new(ScriptedGenerator::new(vec!["Rust is a language."]));
        let pipeline = build_pipeline(generator, store);
        pipeline.ask("durable", "What is Rust?").await.unwrap();
    }

    // Second "process": the reloaded history feeds condensation.
    let file_store = Arc::new(FileStore::new(storage_dir).await.unwrap());
    let store = Arc::new(VersionedHistory::new(file_store));
    assert_eq!(store.list("durable").await.unwrap().len(), 2);

    let generator = Arc::new(ScriptedGenerator::new(vec![
        "What is Rust used for?",
        "Mostly systems work.",
    ]));
    let pipeline = build_pipeline(generator.clone(), store.clone());
    pipeline.ask("durable", "What is it used for?").await.unwrap();

    let prompts = generator.seen_prompts().await;
    assert!(prompts[0].contains("Human: What is Rust?"));
    assert!(prompts[0].contains("AI: Rust is a language."));

    assert_eq!(store.list("durable").await.unwrap().len(), 4);
}
