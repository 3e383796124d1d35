// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI-compatible provider implementation
//!
//! Talks to any `/chat/completions` endpoint in the OpenAI format. The Qwen
//! models are served this way through DashScope's compatible mode.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, QuillError, Result};
use crate::llm::message::Message;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, ContentBlockDelta, ContentBlockResponse, EventStream,
    LlmProvider, StopReason, StreamEvent, ToolChoice, ToolDefinition, Usage,
};

/// DashScope compatible-mode endpoint
pub const DASHSCOPE_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Provider for OpenAI-compatible chat completion APIs
pub struct OpenAiCompatProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatProvider {
    /// Create a provider for the DashScope (Qwen) endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DASHSCOPE_BASE_URL)
    }

    /// Create with a custom base URL (without the `/chat/completions` suffix)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// System prompt first, then the history in order
    fn convert_messages(&self, messages: &[Message], system: Option<&str>) -> Vec<ChatMessage> {
        let mut result = Vec::with_capacity(messages.len() + 1);

        if let Some(sys) = system {
            result.push(ChatMessage {
                role: "system".to_string(),
                content: sys.to_string(),
            });
        }

        for m in messages {
            result.push(ChatMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            });
        }

        result
    }

    fn convert_tools(&self, tools: &[ToolDefinition]) -> Vec<ChatTool> {
        tools
            .iter()
            .map(|t| ChatTool {
                r#type: "function".to_string(),
                function: ChatFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: serde_json::json!({
                        "type": t.input_schema.schema_type,
                        "properties": t.input_schema.properties,
                        "required": t.input_schema.required,
                    }),
                },
            })
            .collect()
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> ChatRequest {
        let tool_choice = match &request.tool_choice {
            ToolChoice::Auto => ChatToolChoice::Auto,
            ToolChoice::None => ChatToolChoice::None,
            ToolChoice::Required => ChatToolChoice::Required,
            ToolChoice::Specific(name) => ChatToolChoice::Function { name: name.clone() },
        };

        ChatRequest {
            model: request.model.clone(),
            messages: self.convert_messages(&request.messages, request.system.as_deref()),
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(self.convert_tools(&request.tools))
            },
            tool_choice: if request.tools.is_empty() {
                None
            } else {
                Some(tool_choice)
            },
            stream: Some(stream),
        }
    }

    async fn send(&self, body: &ChatRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QuillError::Api(ApiError::Timeout)
                } else {
                    QuillError::Api(ApiError::Network(e.to_string()))
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error(status, &body));
        }
        Ok(response)
    }
}

/// Map an error response to an `ApiError`
fn parse_error(status: u16, body: &str) -> QuillError {
    let Ok(error_response) = serde_json::from_str::<ChatError>(body) else {
        return match status {
            401 | 403 => QuillError::Api(ApiError::AuthenticationFailed),
            429 => QuillError::Api(ApiError::RateLimited(60)),
            _ => QuillError::Api(ApiError::ServerError {
                status,
                message: body.to_string(),
            }),
        };
    };

    let message = error_response.error.message;
    let code = error_response.error.code.as_deref().unwrap_or("");

    match code {
        "invalid_api_key" | "authentication_error" | "InvalidApiKey" => {
            QuillError::Api(ApiError::AuthenticationFailed)
        }
        "rate_limit_exceeded" | "Throttling" => QuillError::Api(ApiError::RateLimited(60)),
        "context_length_exceeded" => {
            let (current, limit) = parse_token_counts(&message);
            QuillError::Api(ApiError::ContextTooLong { current, limit })
        }
        "model_not_found" => QuillError::Api(ApiError::ModelNotFound(message)),
        _ if status == 401 => QuillError::Api(ApiError::AuthenticationFailed),
        _ if status == 429 => QuillError::Api(ApiError::RateLimited(60)),
        _ => QuillError::Api(ApiError::ServerError { status, message }),
    }
}

/// Parse token counts from an error message
fn parse_token_counts(message: &str) -> (u32, u32) {
    let numbers: Vec<u32> = message
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|s| s.parse().ok())
        .collect();

    match numbers.as_slice() {
        [current, limit, ..] => (*current, *limit),
        [single] => (*single, 0),
        _ => (0, 0),
    }
}

/// Split complete SSE lines off the front of `buffer`.
///
/// Lines are cut on raw bytes so multi-byte characters split across network
/// chunks are decoded whole.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        lines.push(String::from_utf8_lossy(&line).trim().to_string());
    }
    lines
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "qwen"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = self.build_request(&request, false);
        tracing::debug!(target: "quill.llm", model = %body.model, "sending completion request");

        let response = self.send(&body).await?;
        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| QuillError::Api(ApiError::InvalidResponse(e.to_string())))?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            QuillError::Api(ApiError::InvalidResponse(
                "No choices in response".to_string(),
            ))
        })?;

        let mut content = Vec::new();

        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                content.push(ContentBlockResponse::Text { text });
            }
        }

        for tc in choice.message.tool_calls.unwrap_or_default() {
            let input = serde_json::from_str(&tc.function.arguments).map_err(|e| {
                QuillError::Api(ApiError::InvalidResponse(format!(
                    "tool call arguments for '{}' are not valid JSON: {}",
                    tc.function.name, e
                )))
            })?;
            content.push(ContentBlockResponse::ToolUse {
                id: tc.id,
                name: tc.function.name,
                input,
            });
        }

        Ok(CompletionResponse {
            id: api_response.id,
            model: api_response.model,
            content,
            stop_reason: choice
                .finish_reason
                .as_deref()
                .map(StopReason::from_finish_reason),
            usage: api_response
                .usage
                .map(|u| Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
        })
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<EventStream> {
        let body = self.build_request(&request, true);
        tracing::debug!(target: "quill.llm", model = %body.model, "opening completion stream");

        let response = self.send(&body).await?;
        let model = body.model.clone();
        let bytes = response.bytes_stream();

        let event_stream = async_stream::try_stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut started = false;
            let mut text_open = false;
            let mut tool_index: usize = 0;

            for await chunk in bytes {
                let chunk = chunk.map_err(|e| QuillError::Api(ApiError::StreamError(e.to_string())))?;
                buffer.extend_from_slice(&chunk);

                for line in drain_lines(&mut buffer) {
                    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                        continue;
                    };

                    if data == "[DONE]" {
                        if text_open {
                            yield StreamEvent::ContentBlockStop { index: 0 };
                            text_open = false;
                        }
                        yield StreamEvent::MessageStop;
                        continue;
                    }

                    if let Ok(error) = serde_json::from_str::<ChatError>(data) {
                        Err::<(), QuillError>(QuillError::Api(ApiError::StreamError(error.error.message)))?;
                    }

                    let chunk: ChatStreamChunk = match serde_json::from_str(data) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            tracing::debug!(target: "quill.llm", "skipping unparseable stream line: {}", e);
                            continue;
                        }
                    };

                    if !started {
                        started = true;
                        yield StreamEvent::MessageStart {
                            id: chunk.id.clone().unwrap_or_default(),
                            model: chunk.model.clone().unwrap_or_else(|| model.clone()),
                        };
                    }

                    let usage = chunk.usage.map(|u| Usage {
                        input_tokens: u.prompt_tokens,
                        output_tokens: u.completion_tokens,
                    });

                    let Some(choice) = chunk.choices.into_iter().next() else {
                        if usage.is_some() {
                            yield StreamEvent::MessageDelta { stop_reason: None, usage };
                        }
                        continue;
                    };

                    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                        if !text_open {
                            text_open = true;
                            yield StreamEvent::ContentBlockStart {
                                index: 0,
                                content_block: ContentBlockResponse::Text { text: String::new() },
                            };
                        }
                        yield StreamEvent::ContentBlockDelta {
                            index: 0,
                            delta: ContentBlockDelta::TextDelta { text },
                        };
                    }

                    for tc in choice.delta.tool_calls.unwrap_or_default() {
                        let Some(function) = tc.function else { continue };
                        if let Some(name) = function.name {
                            tool_index += 1;
                            yield StreamEvent::ContentBlockStart {
                                index: tool_index,
                                content_block: ContentBlockResponse::ToolUse {
                                    id: tc.id.unwrap_or_default(),
                                    name,
                                    input: serde_json::json!({}),
                                },
                            };
                        }
                        if let Some(args) = function.arguments.filter(|a| !a.is_empty()) {
                            yield StreamEvent::ContentBlockDelta {
                                index: tool_index,
                                delta: ContentBlockDelta::InputJsonDelta { partial_json: args },
                            };
                        }
                    }

                    if let Some(reason) = choice.finish_reason {
                        yield StreamEvent::MessageDelta {
                            stop_reason: Some(StopReason::from_finish_reason(&reason)),
                            usage,
                        };
                    }
                }
            }
        };

        Ok(Box::pin(event_stream))
    }
}

// OpenAI-compatible API types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ChatToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    r#type: String,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug)]
enum ChatToolChoice {
    Auto,
    None,
    Required,
    Function { name: String },
}

impl Serialize for ChatToolChoice {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ChatToolChoice::Auto => serializer.serialize_str("auto"),
            ChatToolChoice::None => serializer.serialize_str("none"),
            ChatToolChoice::Required => serializer.serialize_str("required"),
            ChatToolChoice::Function { name } => serde_json::json!({
                "type": "function",
                "function": { "name": name },
            })
            .serialize(serializer),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    #[serde(default)]
    id: String,
    function: ChatFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    error: ChatErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ChatErrorDetail {
    message: String,
    code: Option<String>,
}

// Streaming types
#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    id: Option<String>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    delta: ChatStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ChatStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamToolCall {
    id: Option<String>,
    function: Option<ChatStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
