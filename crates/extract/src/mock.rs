//! Scripted completion client for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::LlmError;
use crate::llm::CompletionClient;

type Responder = Arc<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>;
type Delay = Arc<dyn Fn(&str) -> Duration + Send + Sync>;

#[derive(Clone)]
pub struct MockClient {
    responder: Responder,
    delay: Option<Delay>,
    prompts: Arc<Mutex<Vec<(String, usize)>>>,
}

impl MockClient {
    /// Answer every prompt with `f(prompt)`
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(f),
            delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Hand out `responses` in call order; errors once they run out
    pub fn with_responses<S: Into<String>>(responses: Vec<S>) -> Self {
        let queue: Mutex<VecDeque<String>> =
            Mutex::new(responses.into_iter().map(Into::into).collect());
        Self::from_fn(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::Other("mock responses exhausted".into()))
        })
    }

    pub fn failing() -> Self {
        Self::from_fn(|_| Err(LlmError::Other("mock LLM error".into())))
    }

    /// Sleep `f(prompt)` before answering, to shuffle completion order
    pub fn with_delay<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Arc::new(f));
        self
    }

    /// Every prompt received so far, with its token budget
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl CompletionClient for MockClient {
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), max_tokens));

        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(prompt)).await;
        }

        (self.responder)(prompt)
    }

    fn model(&self) -> &str {
        "mock"
    }
}
