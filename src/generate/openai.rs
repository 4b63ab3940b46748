use crate::config::GenerationConfig;
use crate::error::{AdvisorError, Result};
use crate::prompt::GenerationRequest;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request structure for an OpenAI-compatible chat completions API
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

/// Plain text for text modality; typed content parts when an image
/// attachment rides along
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
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

/// Response structure from the chat completions API
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat completions client for the generation service
///
/// One attempt per call, bounded by the configured client timeout. Retry
/// policy lives with the caller, which substitutes the fallback reply
/// instead of retrying.
pub struct ChatClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(config: &GenerationConfig, api_key: String) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            max_tokens: config.max_output_tokens,
        })
    }

    /// Send one composed request and return the reply text
    pub async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let user_content = match &request.image {
            Some(image) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: request.user_text.clone(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!(
                            "data:{};base64,{}",
                            image.media_type,
                            STANDARD.encode(&image.data)
                        ),
                    },
                },
            ]),
            None => MessageContent::Text(request.user_text.clone()),
        };

        let payload = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: MessageContent::Text(request.system.clone()),
                },
                Message {
                    role: "user",
                    content: user_content,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| AdvisorError::Generation(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(AdvisorError::Generation(format!(
                "Generation API error {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::Generation(format!("Failed to parse response: {}", e)))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                AdvisorError::Generation("Empty reply from generation service".to_string())
            })
    }
}
