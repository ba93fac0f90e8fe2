//! Prompt templates and persona specialization.
//!
//! Information Hiding:
//! - Placeholder names and substitution rules encapsulated here
//! - Persona substitution happens exactly once: the result is an
//!   [`AnswerTemplate`], a distinct type that only exposes the final
//!   context/question fill step

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PromptsConfig;

const CHAT_HISTORY_PLACEHOLDER: &str = "{chat_history}";
const CONTEXT_PLACEHOLDER: &str = "{context}";
const QUESTION_PLACEHOLDER: &str = "{question}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("{template} template is empty")]
    EmptyTemplate { template: &'static str },

    #[error("placeholder `{placeholder}` not found in {template} template")]
    MissingPlaceholder {
        template: &'static str,
        placeholder: &'static str,
    },
}

/// Static identity presented in generated answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub style: String,
    pub role: String,
    pub name: String,
    pub tone: String,
}

/// The two prompt templates driving an exchange, as loaded from
/// configuration. Stateless after [`PromptCatalog::load`].
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    condenser: String,
    answer: String,
}

impl PromptCatalog {
    /// Validate and take ownership of the configured templates.
    ///
    /// The condenser template must carry both of the placeholders the
    /// pipeline fills; catching that here keeps a malformed template a
    /// startup failure instead of a bad prompt at question time.
    pub fn load(config: &PromptsConfig) -> Result<Self, TemplateError> {
        let condenser = config.question_generator_prompt.clone();
        let answer = config.qa_prompt.clone();

        if condenser.trim().is_empty() {
            return Err(TemplateError::EmptyTemplate {
                template: "condenser",
            });
        }
        if answer.trim().is_empty() {
            return Err(TemplateError::EmptyTemplate { template: "answer" });
        }

        require_placeholder(&condenser, "condenser", CHAT_HISTORY_PLACEHOLDER)?;
        require_placeholder(&condenser, "condenser", QUESTION_PLACEHOLDER)?;

        Ok(Self { condenser, answer })
    }

    /// The question-condensing template, unmodified.
    pub fn condenser_template(&self) -> &str {
        &self.condenser
    }

    /// Substitute the four persona placeholders into the answer template.
    ///
    /// Literal case-sensitive find-replace, one pass per field, order
    /// independent. A persona placeholder missing from the template is a
    /// hard error rather than a silent no-op: a template that ignores part
    /// of the configured persona is a configuration mistake. The `{context}`
    /// and `{question}` placeholders must survive substitution.
    pub fn render_answer_template(&self, persona: &Persona) -> Result<AnswerTemplate, TemplateError> {
        let substitutions: [(&'static str, &str); 4] = [
            ("{bot_style}", &persona.style),
            ("{bot_role}", &persona.role),
            ("{bot_name}", &persona.name),
            ("{bot_tone}", &persona.tone),
        ];

        let mut rendered = self.answer.clone();
        for (placeholder, value) in substitutions {
            if !rendered.contains(placeholder) {
                return Err(TemplateError::MissingPlaceholder {
                    template: "answer",
                    placeholder,
                });
            }
            rendered = rendered.replace(placeholder, value);
        }

        require_placeholder(&rendered, "answer", CONTEXT_PLACEHOLDER)?;
        require_placeholder(&rendered, "answer", QUESTION_PLACEHOLDER)?;

        Ok(AnswerTemplate(rendered))
    }
}

/// Answer template with the persona already substituted.
///
/// Only the final fill step is reachable from this type, so the persona
/// pass cannot be applied a second time.
#[derive(Debug, Clone)]
pub struct AnswerTemplate(String);

impl AnswerTemplate {
    /// Fill the retrieved-context block and the condensed question.
    pub fn fill(&self, context: &str, question: &str) -> String {
        self.0
            .replace(CONTEXT_PLACEHOLDER, context)
            .replace(QUESTION_PLACEHOLDER, question)
    }
}

/// Fill the condenser template with rendered history and the new question.
pub fn fill_condenser(template: &str, chat_history: &str, question: &str) -> String {
    template
        .replace(CHAT_HISTORY_PLACEHOLDER, chat_history)
        .replace(QUESTION_PLACEHOLDER, question)
}

fn require_placeholder(
    template_text: &str,
    template: &'static str,
    placeholder: &'static str,
) -> Result<(), TemplateError> {
    if template_text.contains(placeholder) {
        Ok(())
    } else {
        Err(TemplateError::MissingPlaceholder {
            template,
            placeholder,
        })
    }
}
