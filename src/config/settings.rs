use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::prompts::Persona;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub llm: LLMConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub prompts: PromptsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_ms: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub index_path: PathBuf,
}

/// Prompt templates plus the persona substituted into the answer
/// template. All fields are required; a partial prompts section is a
/// startup error, not something discovered mid-conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    pub question_generator_prompt: String,
    pub qa_prompt: String,
    pub bot_metadata: Persona,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn api_key() -> Result<String> {
        env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            llm: LLMConfig {
                model: "gpt-3.5-turbo".to_string(),
                max_tokens: 256,
                temperature: 0.8,
                request_timeout_ms: 5000,
                api_base: default_api_base(),
            },
            embedding: EmbeddingConfig {
                model: "text-embedding-ada-002".to_string(),
            },
            retrieval: RetrievalConfig {
                top_k: 4,
                index_path: PathBuf::from("./index.json"),
            },
            prompts: PromptsConfig {
                question_generator_prompt: "{chat_history} {question}".to_string(),
                qa_prompt: "{bot_style}{bot_role}{bot_name}{bot_tone}{context}{question}"
                    .to_string(),
                bot_metadata: Persona {
                    style: "casual".to_string(),
                    role: "assistant".to_string(),
                    name: "Bo".to_string(),
                    tone: "friendly".to_string(),
                },
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
