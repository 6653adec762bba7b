//! Chat-completion client used for composite splitting and lyric summaries.

use serde_json::{Value, json};

use crate::clients::http::HttpFetcher;
use crate::config::ModelConfig;
use crate::error::FetchError;

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a ModelConfig,
    pub system: &'a str,
    pub user: &'a str,
}

impl CompletionRequest<'_> {
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "model": self.model.name,
            "temperature": self.model.temperature,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": self.system},
                {"role": "user", "content": self.user},
            ],
        });
        if let Some(seed) = self.model.seed {
            body["seed"] = json!(seed);
        }
        body
    }
}

pub trait StructuredCompletion {
    /// Runs one completion whose reply must be a JSON object.
    fn complete_json(&self, request: &CompletionRequest<'_>) -> Result<Value, FetchError>;
}

pub struct OpenAiClient<'a> {
    http: &'a HttpFetcher,
    api_key: String,
    endpoint: String,
}

impl<'a> OpenAiClient<'a> {
    pub fn new(http: &'a HttpFetcher, api_key: String) -> Self {
        Self {
            http,
            api_key,
            endpoint: OPENAI_CHAT_URL.to_string(),
        }
    }
}

impl StructuredCompletion for OpenAiClient<'_> {
    fn complete_json(&self, request: &CompletionRequest<'_>) -> Result<Value, FetchError> {
        let response = self
            .http
            .post_json(&self.endpoint, &self.api_key, &request.to_body())?;
        parse_completion(&response)
    }
}

/// Extracts and decodes the JSON object carried in the first choice.
pub fn parse_completion(response: &Value) -> Result<Value, FetchError> {
    let content = response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::Shape("choices[0].message.content".to_string()))?;
    let parsed: Value = serde_json::from_str(content)?;
    if !parsed.is_object() {
        return Err(FetchError::Shape("completion is not a JSON object".to_string()));
    }
    Ok(parsed)
}
