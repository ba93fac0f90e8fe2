use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ragchat")]
#[command(author, version, about = "Retrieval-augmented conversational QA", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question (ephemeral session)
    Ask { question: String },

    /// Start an interactive chat session
    Interactive {
        /// Enable persistent memory (saves conversation to disk)
        #[arg(short = 'm', long)]
        memory: bool,

        /// Session ID for persistent memory (default: "default")
        #[arg(long, default_value = "default")]
        session_id: String,

        /// Storage directory for persistent memory (default: "./sessions")
        #[arg(long, default_value = "./sessions")]
        storage_dir: PathBuf,
    },

    /// Build the retrieval index from text files
    Index {
        /// Files to index; blank lines separate chunks
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Where to write the index
        #[arg(short, long, default_value = "./index.json")]
        out: PathBuf,
    },

    /// Print a stored session transcript
    History {
        #[arg(long, default_value = "default")]
        session_id: String,

        #[arg(long, default_value = "./sessions")]
        storage_dir: PathBuf,
    },
}
