use crate::error::ChatError;
use crate::models::{ChatMessage, Role};
use crate::traits::{LanguageModel, TokenStream};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::VecDeque;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini over the generativelanguage REST API.
pub struct GeminiModel {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f64,
}

impl GeminiModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            client: Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.api_base, self.model, method
        )
    }
}

/// Maps chat history onto the Gemini request shape. The first system turn
/// becomes the system instruction; assistant turns use the "model" role;
/// any further system turns are folded in as user text, which is all the
/// API allows mid-conversation.
fn build_request_body(messages: &[ChatMessage], temperature: f64) -> Value {
    let mut system_instruction: Option<&str> = None;
    let mut contents = Vec::new();

    for message in messages {
        match message.role {
            Role::System if system_instruction.is_none() => {
                system_instruction = Some(&message.content);
            }
            Role::System | Role::User => contents.push(json!({
                "role": "user",
                "parts": [{"text": message.content}],
            })),
            Role::Assistant => contents.push(json!({
                "role": "model",
                "parts": [{"text": message.content}],
            })),
        }
    }

    let mut body = json!({
        "contents": contents,
        "generationConfig": {"temperature": temperature},
    });
    if let Some(instruction) = system_instruction {
        body["systemInstruction"] = json!({"parts": [{"text": instruction}]});
    }
    body
}

/// Pulls the concatenated text parts out of one response (or stream chunk).
fn candidate_text(value: &Value) -> String {
    value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.pointer("/text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

struct SseState {
    body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    done: bool,
}

impl SseState {
    /// Drains complete `data:` lines from the buffer into the pending queue.
    /// The buffer holds raw bytes: a multi-byte character split across
    /// network chunks is decoded only once its line is complete, and a
    /// newline byte never falls inside a multi-byte sequence.
    fn drain_lines(&mut self) -> Result<(), ChatError> {
        while let Some(newline) = self.buffer.iter().position(|&byte| byte == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim();

            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();
            if payload.is_empty() {
                continue;
            }
            if payload == "[DONE]" {
                self.done = true;
                break;
            }

            let value: Value = serde_json::from_str(payload)?;
            let text = candidate_text(&value);
            if !text.is_empty() {
                self.pending.push_back(text);
            }
        }
        Ok(())
    }
}

/// Turns a server-sent-events response body into a fragment stream. Lazy and
/// single-pass: nothing is read until the consumer polls, and dropping the
/// stream drops the connection.
fn sse_fragment_stream(state: SseState) -> TokenStream {
    stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Ok(Some((fragment, state)));
            }
            if state.done {
                return Ok(None);
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.extend_from_slice(&bytes);
                    state.drain_lines()?;
                }
                Some(Err(error)) => return Err(ChatError::Http(error)),
                None => state.done = true,
            }
        }
    })
    .boxed()
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let response = self
            .client
            .post(self.endpoint("generateContent"))
            .query(&[("key", self.api_key.as_str())])
            .json(&build_request_body(messages, self.temperature))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::BackendResponse {
                backend: "gemini".to_string(),
                details: response.status().to_string(),
            });
        }

        let value: Value = response.json().await?;
        let text = candidate_text(&value);
        if text.is_empty() {
            return Err(ChatError::BackendResponse {
                backend: "gemini".to_string(),
                details: "response contained no candidate text".to_string(),
            });
        }
        Ok(text)
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, ChatError> {
        let response = self
            .client
            .post(self.endpoint("streamGenerateContent"))
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .json(&build_request_body(messages, self.temperature))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::BackendResponse {
                backend: "gemini".to_string(),
                details: response.status().to_string(),
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(sse_fragment_stream(SseState {
            body,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }))
    }
}
