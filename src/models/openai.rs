use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;

use super::chat::{ChatBackend, ChatRequest};

#[derive(Clone, Debug)]
pub struct OpenAiCompatConfig {
    pub name: String,
    /// e.g. `https://api.groq.com/openai/v1`; `/chat/completions` is appended.
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Client for any `/chat/completions` endpoint speaking the OpenAI wire format
/// (Groq, OpenRouter, local gateways).
pub struct OpenAiCompatClient {
    name: String,
    url: String,
    http: Client,
}

impl OpenAiCompatClient {
    pub fn new(cfg: OpenAiCompatConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = cfg.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            let val = HeaderValue::from_str(&format!("Bearer {key}"))
                .context("api key is not a valid header value")?;
            headers.insert(AUTHORIZATION, val);
        }
        let http = Client::builder()
            .default_headers(headers)
            .timeout(cfg.timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            name: cfg.name,
            url: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            http,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ChatBackend for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&mut self, request: &ChatRequest) -> anyhow::Result<String> {
        let resp = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .with_context(|| format!("POST {}", self.url))?;
        let status = resp.status();
        let body = resp.text().context("read response body")?;
        if !status.is_success() {
            let head: String = body.chars().take(400).collect();
            return Err(anyhow!("http {status}: {head}"));
        }
        let parsed: CompletionResponse =
            serde_json::from_str(&body).context("parse completion response")?;
        completion_text(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn completion_text(resp: CompletionResponse) -> anyhow::Result<String> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow!("completion has no message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Cook: Aşçı"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(completion_text(parsed).expect("text"), "Cook: Aşçı");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let parsed: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).expect("parse");
        assert!(completion_text(parsed).is_err());
    }

    #[test]
    fn url_joins_base_without_double_slash() {
        let client = OpenAiCompatClient::new(OpenAiCompatConfig {
            name: "groq".to_string(),
            base_url: "https://api.groq.com/openai/v1/".to_string(),
            api_key: Some("k".to_string()),
            timeout: Duration::from_secs(5),
        })
        .expect("client");
        assert_eq!(client.url(), "https://api.groq.com/openai/v1/chat/completions");
    }
}
