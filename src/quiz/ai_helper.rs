use std::future::Future;

use chatgpt::client::ChatGPT;
use chatgpt::config::{ChatGPTEngine, ModelConfiguration};
use chatgpt::types::CompletionResponse;

use crate::config::Config;
use crate::quiz::{parser::parse_question, ActiveQuiz, Question, QuestionError};

const TEMPERATURE: f32 = 0.7;
pub const QUESTION_MAX_TOKENS: u32 = 500;
pub const EXPLANATION_MAX_TOKENS: u32 = 400;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("completion request failed: {0}")]
    Request(String),
    #[error("completion service returned an empty reply")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("generated question is unusable: {0}")]
    Invalid(#[from] QuestionError),
}

/// A text completion backend: prompt in, generated text out.
pub trait Complete: Send + Sync {
    fn complete(&self, prompt: String) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

impl Complete for ChatGPT {
    async fn complete(&self, prompt: String) -> Result<String, GenerationError> {
        let response: CompletionResponse = self
            .send_message(prompt)
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;
        let content = response.message().content.trim();
        if content.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(content.to_string())
    }
}

/// Builds a client for the OpenAI-compatible endpoint in `config`.
pub fn chatgpt_client(config: &Config, model: &'static str, max_tokens: u32) -> chatgpt::Result<ChatGPT> {
    ChatGPT::new_with_config(
        config.api_key.clone(),
        ModelConfiguration {
            engine: ChatGPTEngine::Custom(model),
            temperature: TEMPERATURE,
            max_tokens: Some(max_tokens),
            api_url: config.api_url.clone(),
            timeout: config.request_timeout,
            ..Default::default()
        },
    )
}

pub struct QuizHelper<C> {
    questions: C,
    explanations: C,
}

impl<C: Complete> QuizHelper<C> {
    pub fn new(questions: C, explanations: C) -> Self {
        Self {
            questions,
            explanations,
        }
    }

    pub async fn generate_question(&self, topic: &str) -> Result<String, GenerationError> {
        log::debug!("Generating question about {:?}", topic);
        let prompt = format!("Generate a multiple-choice question about {topic}.

IMPORTANT: Follow this EXACT format (no extra text, no markdown, no additional formatting):

Question: [Your question here]
A) [Option A]
B) [Option B]
C) [Option C]
D) [Option D]
Correct Answer: [A/B/C/D]
Explanation: [Brief explanation why this answer is correct]

Make sure:
- Question is clear and specific about {topic}
- All 4 options are plausible
- Only one option is clearly correct
- Explanation is concise but informative
- Use exactly \"A)\", \"B)\", \"C)\", \"D)\" format for options
- Use exactly \"Correct Answer: X\" format");

        self.questions.complete(prompt).await
    }

    /// Generates, parses and validates a question ready to be shown.
    pub async fn new_quiz(&self, topic: &str) -> Result<ActiveQuiz, QuizError> {
        let raw = self.generate_question(topic).await?;
        log::debug!("Completion: {:?}", raw);
        let question = Question::try_from(parse_question(&raw))?;
        Ok(ActiveQuiz {
            topic: topic.to_string(),
            question,
        })
    }

    /// Expands the short explanation. Falls back to the short one if the
    /// completion fails, so callers always get something to show.
    pub async fn generate_detailed_explanation(&self, quiz: &ActiveQuiz) -> String {
        let question = &quiz.question;
        let prompt = format!(
            "Topic: {}
Question: {}
Correct Answer: {}
Basic Explanation: {}

Provide a detailed explanation that includes:
1. Why this answer is correct
2. Real-world applications and use cases
3. Common mistakes people make with this concept
4. Practical examples from actual projects

Keep it concise but informative (max 300 words).",
            quiz.topic,
            question.stem,
            question.choice(question.correct),
            question.explanation
        );

        match self.explanations.complete(prompt).await {
            Ok(detailed) => detailed,
            Err(e) => {
                log::warn!("Detailed explanation failed, using the short one: {}", e);
                format!("Basic explanation: {}", question.explanation)
            }
        }
    }
}
