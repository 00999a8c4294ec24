// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A generic HTTP adapter for providers that expose a JSON completion
//! endpoint: POST `{base_url}/v1/complete` with the ordered messages,
//! expecting back `{text, input_tokens?, output_tokens?}`. This is not a
//! vendor SDK — it is the one reference transport the engine ships so the
//! CLI can reach a real provider without bundling bespoke client code.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use parley_engine::{ErrorKind, ProviderAdapter, ProviderError, ProviderMessage, ProviderResponse, TokenUsage};

pub struct HttpAdapter {
    name: String,
    default_model: String,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpAdapter {
    pub fn new(
        name: impl Into<String>,
        default_model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self { name: name.into(), default_model: default_model.into(), base_url: base_url.into(), api_key, client }
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompleteResponse {
    text: String,
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

fn role_str(role: parley_engine::ProviderRole) -> &'static str {
    match role {
        parley_engine::ProviderRole::System => "system",
        parley_engine::ProviderRole::User => "user",
        parley_engine::ProviderRole::Assistant => "assistant",
    }
}

fn status_to_kind(status: StatusCode) -> ErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ErrorKind::RateLimited
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ErrorKind::Auth
    } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        ErrorKind::Timeout
    } else if status == StatusCode::PAYLOAD_TOO_LARGE {
        ErrorKind::ContextTooLarge
    } else if status.is_server_error() {
        ErrorKind::Transient
    } else {
        ErrorKind::InvalidInput
    }
}

#[async_trait]
impl ProviderAdapter for HttpAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn call(
        &self,
        model: &str,
        messages: &[ProviderMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = CompleteRequest {
            model,
            messages: messages.iter().map(|m| WireMessage { role: role_str(m.role), content: &m.content }).collect(),
            temperature,
            max_tokens,
        };

        let req = self.client.post(format!("{}/v1/complete", self.base_url)).json(&body);
        let resp = self
            .apply_auth(req)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(ProviderError::new(status_to_kind(status), detail));
        }

        let parsed: CompleteResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::new(ErrorKind::InvalidInput, format!("malformed response body: {e}")))?;

        Ok(ProviderResponse {
            text: parsed.text,
            usage: TokenUsage { input_tokens: parsed.input_tokens, output_tokens: parsed.output_tokens },
        })
    }
}

fn classify_transport_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::new(ErrorKind::Timeout, e.to_string())
    } else if e.is_connect() {
        ProviderError::new(ErrorKind::Transient, e.to_string())
    } else {
        ProviderError::new(ErrorKind::Transient, e.to_string())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
