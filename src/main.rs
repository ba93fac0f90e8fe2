use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use ragchat::cli::{Cli, Commands};
use ragchat::core::embedding::{EmbeddingService, OpenAiEmbedder};
use ragchat::core::llm::OpenAiGenerator;
use ragchat::retrieval::index::split_chunks;
use ragchat::retrieval::{EmbeddingRetriever, VectorIndex};
use ragchat::storage::durable::VersionedHistory;
use ragchat::storage::filesystem::FileStore;
use ragchat::storage::memory::InMemoryHistory;
use ragchat::storage::HistoryStore;
use ragchat::{
    utils, ConversationalQaPipeline, PipelineError, PipelineOptions, PromptCatalog, Settings,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new().context("failed to load configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask { question } => handle_ask(settings, question).await,
        Commands::Interactive {
            memory,
            session_id,
            storage_dir,
        } => handle_interactive(settings, memory, session_id, storage_dir).await,
        Commands::Index { inputs, out } => handle_index(settings, inputs, out).await,
        Commands::History {
            session_id,
            storage_dir,
        } => handle_history(session_id, storage_dir).await,
    }
}

/// Wire the pipeline from configuration: prompt catalog, persona render,
/// provider clients, and the retrieval index.
async fn build_pipeline(
    settings: &Settings,
    store: Arc<dyn HistoryStore>,
) -> Result<ConversationalQaPipeline> {
    let api_key = Settings::api_key()?;

    let catalog = PromptCatalog::load(&settings.prompts).context("invalid prompt configuration")?;
    let answer_template = catalog
        .render_answer_template(&settings.prompts.bot_metadata)
        .context("invalid persona configuration")?;

    let index = if settings.retrieval.index_path.exists() {
        VectorIndex::load(&settings.retrieval.index_path).await?
    } else {
        tracing::warn!(
            "No index at {:?}, answering without retrieved context",
            settings.retrieval.index_path
        );
        VectorIndex::new()
    };

    let generator = Arc::new(OpenAiGenerator::new(api_key.clone(), settings.clone()));
    let embedder = Arc::new(OpenAiEmbedder::new(api_key, settings.clone()));
    let retriever = Arc::new(EmbeddingRetriever::new(index, embedder));

    let options = PipelineOptions {
        top_k: settings.retrieval.top_k,
        temperature: settings.llm.temperature,
        call_timeout: Duration::from_millis(settings.llm.request_timeout_ms),
    };

    Ok(ConversationalQaPipeline::new(
        generator,
        retriever,
        store,
        catalog.condenser_template(),
        answer_template,
        options,
    ))
}

async fn handle_ask(settings: Settings, question: String) -> Result<()> {
    let store = Arc::new(InMemoryHistory::new());
    let pipeline = build_pipeline(&settings, store).await?;

    utils::print_info("Sending request...");
    let answer = pipeline.ask("oneshot", &question).await?;
    println!("\n{}", answer);
    Ok(())
}

async fn handle_interactive(
    settings: Settings,
    memory: bool,
    session_id: String,
    storage_dir: PathBuf,
) -> Result<()> {
    let store: Arc<dyn HistoryStore> = if memory {
        utils::print_header("Interactive Mode (Persistent Memory)");
        utils::print_info(&format!("Session ID: {}", session_id));
        utils::print_info(&format!("Storage: {}", storage_dir.display()));
        let file_store = Arc::new(FileStore::new(storage_dir).await?);
        Arc::new(VersionedHistory::new(file_store))
    } else {
        utils::print_header("Interactive Mode (Ephemeral)");
        utils::print_info("Note: Conversation will not be saved");
        Arc::new(InMemoryHistory::new())
    };
    utils::print_info("Type your messages (/help for commands, Ctrl+D to exit)\n");

    let previous = store.list(&session_id).await?.len();
    if previous > 0 {
        utils::print_success(&format!(
            "Resumed session with {} previous messages",
            previous
        ));
    }

    let pipeline = build_pipeline(&settings, store.clone()).await?;

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        utils::print_prompt("You: ");
        let mut input = String::new();
        if reader.read_line(&mut input).await? == 0 {
            // End of input: clean exit.
            println!();
            return Ok(());
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input == "/clear" {
            store.delete(&session_id).await?;
            utils::print_success("Session history cleared\n");
            continue;
        }

        if input == "/count" {
            let count = store.list(&session_id).await?.len();
            utils::print_info(&format!("Messages in session: {}\n", count));
            continue;
        }

        if input == "/help" {
            println!("Special commands:");
            println!("  /clear  - Clear session history");
            println!("  /count  - Show message count");
            println!("  /help   - Show this help");
            println!("  Ctrl+D  - Exit\n");
            continue;
        }

        match pipeline.ask(&session_id, input).await {
            Ok(answer) => {
                utils::print_info("Assistant:");
                println!("{}\n", answer);
            }
            // A failed store means the next exchange would start from the
            // wrong history; stop instead of continuing on bad state.
            Err(e @ PipelineError::Store(_)) => return Err(e.into()),
            Err(e) => {
                utils::print_error(&format!("Exchange failed: {}. History unchanged.\n", e));
            }
        }
    }
}

async fn handle_index(settings: Settings, inputs: Vec<PathBuf>, out: PathBuf) -> Result<()> {
    let api_key = Settings::api_key()?;
    let embedder = OpenAiEmbedder::new(api_key, settings.clone());

    let mut index = VectorIndex::new();
    for path in &inputs {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {:?}", path))?;

        let chunks = split_chunks(&text);
        utils::print_info(&format!("Embedding {} chunks from {:?}", chunks.len(), path));

        for chunk in chunks {
            let embedding = embedder.embed(&chunk).await?;
            index.add(chunk, embedding);
        }
    }

    index.save(&out).await?;
    utils::print_success(&format!(
        "Indexed {} chunks into {}",
        index.len(),
        out.display()
    ));
    Ok(())
}

async fn handle_history(session_id: String, storage_dir: PathBuf) -> Result<()> {
    let file_store = Arc::new(FileStore::new(storage_dir).await?);
    let history = VersionedHistory::new(file_store).list(&session_id).await?;

    if history.is_empty() {
        utils::print_info(&format!("No messages for session '{}'", session_id));
        return Ok(());
    }

    for message in history.messages() {
        println!("{}: {}", message.role.prompt_label(), message.text);
    }
    Ok(())
}
