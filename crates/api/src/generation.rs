//! Case-study generation via an OpenAI-compatible completion API
//!
//! Two completions per generation: the case study itself, then a short
//! social post derived from it. The social post is best-effort; its
//! failure never loses the case study.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Completion API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion API returned an error: {0}")]
    Api(String),

    #[error("Completion API returned no content")]
    Empty,
}

/// Form fields describing the project to write up.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudyInput {
    pub client_type: String,
    pub challenge: String,
    pub solution: String,
    pub result: String,
    pub tone: String,
    pub industry: String,
    pub client_quote: Option<String>,
}

impl CaseStudyInput {
    /// All required fields must be non-empty.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("clientType", &self.client_type),
            ("challenge", &self.challenge),
            ("solution", &self.solution),
            ("result", &self.result),
            ("tone", &self.tone),
            ("industry", &self.industry),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("Missing required fields: {}", missing.join(", ")))
        }
    }
}

/// Client for the chat-completions endpoint.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Generate the case study text from the form input.
    pub async fn generate_case_study(
        &self,
        input: &CaseStudyInput,
    ) -> Result<String, GenerationError> {
        self.complete(&case_study_prompt(input), 500).await
    }

    /// Generate a companion social post from a finished case study.
    pub async fn generate_social_post(
        &self,
        case_study: &str,
    ) -> Result<String, GenerationError> {
        self.complete(&social_post_prompt(case_study), 150).await
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature: 0.7,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(format!("{}: {}", status, body)));
        }

        let completion: ChatResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::Empty)
    }
}

fn case_study_prompt(input: &CaseStudyInput) -> String {
    let quote_line = input
        .client_quote
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .map(|q| format!("- Client Quote: \"{}\"\n", q))
        .unwrap_or_default();

    format!(
        "You are a professional case study copywriter. Write a persuasive and \
         well-structured case study using the following inputs:\n\
         - Client Type: {}\n\
         - Challenge: {}\n\
         - Solution: {}\n\
         - Result: {}\n\
         {}\n\
         Use a {} tone and write for the {} industry.\n\n\
         Structure it like this:\n\
         1. Headline that summarizes the result\n\
         2. Intro paragraph\n\
         3. Challenge, Solution, Result narrative (2-3 paragraphs)\n\
         4. Include the client quote in a blockquote if provided\n\
         5. End with a short Call to Action\n\n\
         Output should be 250-350 words.",
        input.client_type,
        input.challenge,
        input.solution,
        input.result,
        quote_line,
        input.tone,
        input.industry,
    )
}

fn social_post_prompt(case_study: &str) -> String {
    format!(
        "You are a copywriter crafting a short, engaging social media post based \
         on the following case study. Summarize the key challenge, solution, and \
         result in a persuasive, casual tone suitable for LinkedIn or Twitter. \
         Keep it under 280 characters.\n\n\
         Case Study:\n{}",
        case_study
    )
}
