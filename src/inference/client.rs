//! Generator backed by an OpenAI-compatible chat completions endpoint.

use super::{GenerationParams, Generator};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// HTTP generator client (llama.cpp server, vLLM, Ollama's OpenAI shim, ...).
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    base_url: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [MessagePayload<'a>; 2],
    max_tokens: u32,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
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

impl HttpGenerator {
    /// Create a new generator client.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
        params: GenerationParams,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                MessagePayload {
                    role: "system",
                    content: system_prompt,
                },
                MessagePayload {
                    role: "user",
                    content: user_message,
                },
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: false,
        };

        debug!(
            "Generation request to model {} ({} prompt chars)",
            self.model,
            system_prompt.len() + user_message.len()
        );

        let mut req = self.http.post(self.completions_url()).json(&request);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req.send().await.context("Generation request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Generation failed ({}): {}", status, body);
        }

        let body: ChatResponse = resp
            .json()
            .await
            .context("Failed to parse generation response")?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape_is_openai_compatible() {
        let request = ChatRequest {
            model: "m",
            messages: [
                MessagePayload {
                    role: "system",
                    content: "sys",
                },
                MessagePayload {
                    role: "user",
                    content: "hi",
                },
            ],
            max_tokens: 256,
            temperature: 0.1,
            stream: false,
        };
        let v = serde_json::to_value(&request).unwrap();
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "hi");
        assert_eq!(v["max_tokens"], 256);
    }

    #[test]
    fn missing_content_reads_as_empty() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        assert!(text.is_empty());
    }

    #[test]
    fn url_is_normalized() {
        let g = HttpGenerator::new("http://localhost:8080/", "", "m");
        assert_eq!(g.completions_url(), "http://localhost:8080/v1/chat/completions");
    }
}
