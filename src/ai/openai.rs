//! OpenAI-compatible classifier
//!
//! Image inputs run a two-step exchange: a vision request that describes the
//! page, then a filename request on that description. Text inputs go straight
//! to the filename request.

use super::classifier::{ClassifierInput, ClassifyError, NamingClassifier};
use super::http_client::openai_client;
use super::prompts::{build_filename_prompt, build_vision_prompt};
use super::vision::{load_vision_jpeg, VISION_MIME};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const VISION_MAX_TOKENS: u32 = 300;
const FILENAME_MAX_TOKENS: u32 = 100;
const MAX_RETRIES: u32 = 3;

/// Classifier backed by a chat-completions endpoint
pub struct OpenAiClassifier {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClassifier {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: openai_client().clone(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Describe the stored page image
    async fn describe_image(&self, image: &std::path::Path, page_text: &str) -> Result<String, ClassifyError> {
        let jpeg = load_vision_jpeg(image)
            .await
            .map_err(|e| ClassifyError::Unexpected(e.to_string()))?;

        let request = self.build_vision_request(&jpeg, page_text);
        let response = self.send_request(&request).await?;
        let description = first_content(response)?;

        tracing::info!(
            "[OpenAI] Vision description received (length {})",
            description.chars().count()
        );
        Ok(description)
    }

    /// Ask for a filename for the given content
    async fn name_from_content(&self, content: &str) -> Result<String, ClassifyError> {
        tracing::info!(
            "[OpenAI] Generating filename with model {} based on content (length {})",
            self.model,
            content.chars().count()
        );

        let request = self.build_filename_request(content);
        let response = self.send_request(&request).await?;
        let label = first_content(response)?;

        tracing::info!("[OpenAI] Filename response: {}", label);
        Ok(label)
    }

    fn build_vision_request(&self, image_data: &[u8], page_text: &str) -> ChatRequest {
        let base64_image = base64::engine::general_purpose::STANDARD.encode(image_data);
        let data_url = format!("data:{};base64,{}", VISION_MIME, base64_image);

        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: build_vision_prompt(page_text),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrlContent { url: data_url },
                    },
                ]),
            }],
            max_tokens: VISION_MAX_TOKENS,
        }
    }

    fn build_filename_request(&self, content: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Text(build_filename_prompt(content)),
            }],
            max_tokens: FILENAME_MAX_TOKENS,
        }
    }

    /// Send request with retry logic
    async fn send_request(&self, request: &ChatRequest) -> Result<ChatResponse, ClassifyError> {
        let mut retry_delay = Duration::from_secs(2);
        let mut last_error = ClassifyError::service("no request attempted");

        for retry in 0..=MAX_RETRIES {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let resp = self
                .client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await;

            match resp {
                Ok(r) if r.status() == 429 => {
                    tracing::warn!("[OpenAI] Rate limited, retry {}/{}", retry + 1, MAX_RETRIES);
                    last_error = ClassifyError::Service {
                        status: Some(429),
                        message: "rate limited".to_string(),
                    };
                    continue;
                }
                Ok(r) if r.status().is_success() => {
                    return r
                        .json()
                        .await
                        .map_err(|e| ClassifyError::Unexpected(format!("Failed to parse response: {}", e)));
                }
                Ok(r) => {
                    let status = r.status();
                    let text = r.text().await.unwrap_or_default();
                    tracing::error!("[OpenAI] API error ({}): {}", status, text);
                    return Err(ClassifyError::Service {
                        status: Some(status.as_u16()),
                        message: text,
                    });
                }
                Err(e) => {
                    tracing::warn!("[OpenAI] Request failed, retry {}/{}: {}", retry + 1, MAX_RETRIES, e);
                    last_error = ClassifyError::service(format!("Request failed after retries: {}", e));
                    continue;
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl NamingClassifier for OpenAiClassifier {
    async fn classify(&self, input: ClassifierInput<'_>) -> Result<String, ClassifyError> {
        tracing::debug!("[OpenAI] Classifying {} input with {}", input.shape(), self.model);
        match input {
            ClassifierInput::ImageWithText { image, text } => {
                let description = self.describe_image(image, text).await?;
                self.name_from_content(&description).await
            }
            ClassifierInput::Text(text) => self.name_from_content(text).await,
        }
    }
}

/// Text of the first choice; blank or missing content is an empty response
fn first_content(response: ChatResponse) -> Result<String, ClassifyError> {
    if let Some(usage) = &response.usage {
        tracing::debug!("[OpenAI] Tokens used: {}", usage.total_tokens);
    }

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();

    let content = content.trim();
    if content.is_empty() {
        return Err(ClassifyError::EmptyResponse);
    }
    Ok(content.to_string())
}

// API request/response types

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrlContent },
}

#[derive(Serialize)]
struct ImageUrlContent {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}
