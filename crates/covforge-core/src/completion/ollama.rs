//! Ollama-style `/api/generate` client.

use super::stream::StreamDecoder;
use super::TextCompletion;
use crate::config::CompletionConfig;
use crate::domain::{CovforgeError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Streams completions from an Ollama-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    endpoint: String,
    model: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("covforge/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether the server answers its model listing.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl TextCompletion for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
        };
        let mut response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CovforgeError::Completion(format!(
                "{} returned {}",
                url, status
            )));
        }

        let mut decoder = StreamDecoder::new();
        let mut chunks = 0usize;
        while let Some(chunk) = response.chunk().await? {
            chunks += 1;
            if decoder.feed(&chunk) {
                break;
            }
        }
        debug!(model = %self.model, chunks, "completion stream finished");
        Ok(decoder.finish())
    }
}
