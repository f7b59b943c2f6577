//! Gemini adapter for transcript analysis and clip selection.
//!
//! Talks to the `generateContent` REST endpoint with reqwest. The API key
//! is only required when a request is actually made.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompts::{analysis_prompt, timestamps_prompt};
use super::Analyst;
use crate::domain::{TimeRange, TimestampFile};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15 * 60);

pub struct Gemini {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

impl Gemini {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let key = self
            .api_key
            .as_deref()
            .context("GEMINI_API_KEY (or GOOGLE_API_KEY) is not set")?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        );

        debug!(model = %self.model, prompt_chars = prompt.len(), "Calling Gemini");

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini returned {}: {}", status, body.trim());
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        Ok(body.text().trim().to_string())
    }
}

/// Strip a surrounding markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn parse_timestamps(reply: &str) -> Result<Vec<TimeRange>> {
    let file: TimestampFile = serde_json::from_str(strip_code_fence(reply))
        .context("Timestamp reply is not the expected JSON")?;
    Ok(file.ranges())
}

#[async_trait]
impl Analyst for Gemini {
    async fn analyze(&self, transcript: &str, sections: Option<u32>) -> Result<String> {
        self.generate(analysis_prompt(transcript, sections)).await
    }

    async fn extract_timestamps(&self, subtitles: &str, analysis: &str) -> Result<Vec<TimeRange>> {
        let reply = self.generate(timestamps_prompt(subtitles, analysis)).await?;
        parse_timestamps(&reply)
    }
}
