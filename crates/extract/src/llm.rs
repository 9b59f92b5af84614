use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::LlmError;

/// Receives each streamed text delta as it arrives
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// A text completion service. Implementations return the fully accumulated response.
pub trait CompletionClient: Send + Sync {
    fn complete(
        &self,
        prompt: &str,
        max_tokens: usize,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    fn model(&self) -> &str;
}

impl<C: CompletionClient> CompletionClient for Arc<C> {
    fn complete(
        &self,
        prompt: &str,
        max_tokens: usize,
    ) -> impl Future<Output = Result<String, LlmError>> + Send {
        (**self).complete(prompt, max_tokens)
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
    /// Ask the server to constrain output to JSON
    pub force_json: bool,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:14b".to_string(),
            request_timeout_secs: 600,
            force_json: false,
        }
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    force_json: bool,
    client: reqwest::Client,
    progress: Option<ProgressFn>,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: usize,
}

/// One NDJSON line of a streamed `/api/generate` response
#[derive(Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            force_json: config.force_json,
            client,
            progress: None,
        })
    }

    /// Forward streamed deltas to `progress` (e.g. to echo tokens on a terminal)
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Feed one NDJSON line into the accumulator. Returns true on the final line.
    fn consume_line(&self, line: &[u8], text: &mut String) -> Result<bool, LlmError> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return Ok(false);
        }

        let chunk: OllamaChunk = serde_json::from_slice(line)
            .map_err(|e| LlmError::Stream(e.to_string()))?;

        if let Some(error) = chunk.error {
            return Err(LlmError::Service(error));
        }

        if !chunk.response.is_empty() {
            if let Some(progress) = &self.progress {
                progress(&chunk.response);
            }
            text.push_str(&chunk.response);
        }

        Ok(chunk.done)
    }
}

impl CompletionClient for OllamaClient {
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: true,
            format: self.force_json.then_some("json"),
            options: OllamaOptions {
                num_predict: max_tokens,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut text = String::new();
        let mut done = false;

        while let Some(bytes) = stream.next().await {
            pending.extend_from_slice(&bytes?);

            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                done |= self.consume_line(&line, &mut text)?;
            }
            if done {
                break;
            }
        }

        if !done && !pending.is_empty() {
            self.consume_line(&pending, &mut text)?;
        }

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                model: self.model.clone(),
            });
        }

        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
