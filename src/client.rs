use std::sync::Mutex;

use chrono::{DateTime, Local};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::DispatchError;

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 1000;
const PREVIEW_CHARS: usize = 200;

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionResponseMessage,
}

#[derive(Deserialize)]
struct CompletionResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

/// Status and a short body preview of the most recent call, for the debug panel.
#[derive(Debug, Clone, PartialEq)]
pub struct LastExchange {
    pub status: Option<u16>,
    pub body_preview: String,
    pub at: DateTime<Local>,
}

impl LastExchange {
    fn new(status: Option<u16>, body: &str) -> Self {
        Self {
            status,
            body_preview: body.chars().take(PREVIEW_CHARS).collect(),
            at: Local::now(),
        }
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
/// (OpenRouter by default).
pub struct CompletionClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    referer: String,
    app_title: String,
    last_exchange: Mutex<Option<LastExchange>>,
}

impl CompletionClient {
    pub fn new(config: &Config, api_key: &str) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DispatchError::connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            referer: config.referer.clone(),
            app_title: config.app_title.clone(),
            last_exchange: Mutex::new(None),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn last_exchange(&self) -> Option<LastExchange> {
        self.last_exchange.lock().ok().and_then(|guard| guard.clone())
    }

    fn record(&self, exchange: LastExchange) {
        if let Ok(mut guard) = self.last_exchange.lock() {
            *guard = Some(exchange);
        }
    }

    /// Send `content` as a single user message and return the first
    /// completion's text.
    pub async fn complete(&self, content: &str) -> Result<String, DispatchError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![CompletionMessage {
                role: "user",
                content,
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.app_title)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let err = DispatchError::from(e);
                self.record(LastExchange::new(None, &err.to_string()));
                return Err(err);
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let err = DispatchError::from(e);
                self.record(LastExchange::new(Some(status.as_u16()), &err.to_string()));
                return Err(err);
            }
        };
        debug!("Endpoint returned {}: {} bytes", status, body.len());
        self.record(LastExchange::new(Some(status.as_u16()), &body));

        if !status.is_success() {
            warn!("Completions API returned {status}");
            return Err(DispatchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| DispatchError::connection(format!("invalid response body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| DispatchError::connection("response contained no choices"))
    }
}
