//! HTTP completion client and its test double.
//!
//! The concrete client speaks the Ollama generate protocol with `format` set
//! to a JSON schema, so the service constrains decoding to the requested
//! shape and the response body is directly parseable. Provider-specific
//! "reasoning budget" knobs are construction-time tuning, not part of the
//! [`CompletionClient`] contract.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::CompletionError;

/// Per-call tuning forwarded by the engines.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    /// Output token budget for this call.
    pub max_tokens: u32,
}

/// A structured completion plus the raw response text kept for the audit
/// transcript.
#[derive(Debug, Clone)]
pub struct Completion {
    pub value: serde_json::Value,
    pub raw: String,
}

/// `complete(prompt, output_schema) -> structured result matching schema`.
pub trait CompletionClient: Send + Sync {
    fn complete(
        &self,
        system: &str,
        prompt: &str,
        schema: &serde_json::Value,
        opts: &CompletionOptions,
    ) -> Result<Completion, CompletionError>;
}

/// Ollama-protocol client for structured completions.
pub struct OllamaCompletionClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    /// Opaque reasoning-budget toggle forwarded to the service.
    think: bool,
}

impl OllamaCompletionClient {
    pub fn new(
        base_url: &str,
        model: &str,
        timeout_secs: u64,
        think: bool,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CompletionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
            think,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for `/api/generate`.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    format: &'a serde_json::Value,
    stream: bool,
    think: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
}

/// Response body from `/api/generate`.
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl CompletionClient for OllamaCompletionClient {
    fn complete(
        &self,
        system: &str,
        prompt: &str,
        schema: &serde_json::Value,
        opts: &CompletionOptions,
    ) -> Result<Completion, CompletionError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            format: schema,
            stream: false,
            think: self.think,
            options: GenerateOptions {
                num_predict: opts.max_tokens,
            },
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                CompletionError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                CompletionError::HttpClient(format!(
                    "request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                CompletionError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| CompletionError::ResponseParsing(e.to_string()))?;

        let value: serde_json::Value = serde_json::from_str(&parsed.response)
            .map_err(|e| CompletionError::InvalidJson(e.to_string()))?;

        Ok(Completion {
            value,
            raw: parsed.response,
        })
    }
}

/// Mock completion client: replays a queue of canned responses and records
/// every prompt it was called with.
pub struct MockCompletionClient {
    responses: Mutex<VecDeque<serde_json::Value>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockCompletionClient {
    /// One canned response, replayed for every call.
    pub fn new(response: serde_json::Value) -> Self {
        Self::with_responses(vec![response])
    }

    /// A sequence of responses; the final one repeats once the queue drains.
    pub fn with_responses(responses: Vec<serde_json::Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl CompletionClient for MockCompletionClient {
    fn complete(
        &self,
        _system: &str,
        prompt: &str,
        _schema: &serde_json::Value,
        _opts: &CompletionOptions,
    ) -> Result<Completion, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let mut queue = self.responses.lock().unwrap();
        let value = if queue.len() > 1 {
            queue.pop_front().ok_or(CompletionError::Exhausted)?
        } else {
            queue.front().cloned().ok_or(CompletionError::Exhausted)?
        };

        let raw = value.to_string();
        Ok(Completion { value, raw })
    }
}
