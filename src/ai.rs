//! Client for the external vision/chat AI collaborator.
//!
//! Two calls are made against an OpenAI-compatible chat-completions
//! endpoint: ingredient identification from an uploaded photo (vision
//! input) and pairing suggestions for a set of ingredient names (text
//! input). Both request `json_object` responses and parse the returned
//! content as JSON; the API layer passes the parsed value through to the
//! client verbatim.
//!
//! There are no retries and no timeout beyond the HTTP client's defaults; a
//! failure here surfaces to the caller as a generic 500 while the concrete
//! cause is only logged.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;

const MODEL: &str = "gpt-4o";

const IDENTIFY_SYSTEM_PROMPT: &str = "You are an expert at identifying food ingredients in images. Identify all visible ingredients in the image and provide their flavor profiles. Respond with JSON in this format: { 'identifiedIngredients': [{ 'name': string, 'confidence': number (between 0-1), 'flavorProfile': { 'sweet': number (0-100), 'salty': number (0-100), 'sour': number (0-100), 'bitter': number (0-100), 'umami': number (0-100) }, 'primaryTaste': string }] }";

const PAIRING_SYSTEM_PROMPT: &str = "You are a culinary expert specializing in flavor pairing. Given a set of ingredients, suggest other ingredients that would pair well with them and explain why. Respond with JSON in this format: { 'pairingRecommendations': [{ 'ingredient': string, 'pairsWith': string, 'affinityScore': number (1-100), 'pairingNotes': string, 'recipes': number, 'cuisineType': string }] }";

#[derive(Error, Debug)]
pub enum AiError {
    #[error("API key not configured (OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("malformed model response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("model returned no content")]
    EmptyResponse,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct AiClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
}

impl AiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: Client::new(),
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
        }
    }

    /// Sends an image to the vision model and returns the parsed JSON
    /// result (`identifiedIngredients` shape).
    pub async fn identify_ingredients(&self, image: &[u8]) -> Result<Value, AiError> {
        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(image));
        let request = ChatCompletionRequest {
            model: MODEL.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(IDENTIFY_SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: "Identify all food ingredients in this image.".to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url: data_url },
                        },
                    ]),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };
        self.chat(request).await
    }

    /// Asks the chat model for pairing suggestions covering the given
    /// ingredient names (`pairingRecommendations` shape).
    pub async fn pairing_recommendations(&self, ingredient_names: &str) -> Result<Value, AiError> {
        let request = ChatCompletionRequest {
            model: MODEL.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(PAIRING_SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Text(format!(
                        "Suggest ingredient pairings for the following ingredients: {ingredient_names}. \
                         For each ingredient, suggest at least 2 different ingredients that would pair well with it."
                    )),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };
        self.chat(request).await
    }

    async fn chat(&self, request: ChatCompletionRequest) -> Result<Value, AiError> {
        let api_key = self.api_key.as_ref().ok_or(AiError::MissingApiKey)?;

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api { status, body });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .ok_or(AiError::EmptyResponse)?;

        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vision_message_serializes_with_tagged_parts() {
        let message = ChatMessage {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: "look".to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/jpeg;base64,AAAA".to_string(),
                    },
                },
            ]),
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": "look" },
                    { "type": "image_url", "image_url": { "url": "data:image/jpeg;base64,AAAA" } }
                ]
            })
        );
    }

    #[test]
    fn plain_message_serializes_as_string_content() {
        let message = ChatMessage {
            role: "system",
            content: MessageContent::Text("hello".to_string()),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({ "role": "system", "content": "hello" }));
    }
}
