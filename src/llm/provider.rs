// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! The model seam
//!
//! Everything above this module talks to a language model through
//! [`LlmProvider`]: role-tagged history plus a system prompt in, text out,
//! either all at once or as a stream of fragments. Forced tool calls are
//! only needed for reflection regeneration.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::llm::message::Message;

/// Stream of events produced by [`LlmProvider::complete_stream`]
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Selector this provider is registered under ("qwen", "mock")
    fn name(&self) -> &str;

    /// Wait for the whole response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Open a response stream. Errors before the first event are returned
    /// here; later ones arrive as stream items.
    async fn complete_stream(&self, request: CompletionRequest) -> Result<EventStream>;
}

/// One model invocation
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    /// Conversation history, oldest first
    pub messages: Vec<Message>,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            system: None,
            max_tokens: 4096,
            temperature: 0.0,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }
}

/// A finished buffered response
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    /// Model id reported by the backend
    pub model: String,
    pub content: Vec<ContentBlockResponse>,
    pub stop_reason: Option<StopReason>,
    pub usage: Usage,
}

impl CompletionResponse {
    /// All text blocks joined in order
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlockResponse::Text { text } => Some(text.as_str()),
                ContentBlockResponse::ToolUse { .. } => None,
            })
            .collect()
    }

    /// Arguments of the first call to `tool_name`
    pub fn tool_input(&self, tool_name: &str) -> Option<&serde_json::Value> {
        self.content.iter().find_map(|block| match block {
            ContentBlockResponse::ToolUse { name, input, .. } if name == tool_name => Some(input),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockResponse {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
}

impl StopReason {
    /// Map a chat-completions `finish_reason`
    pub fn from_finish_reason(reason: &str) -> Self {
        match reason {
            "length" => StopReason::MaxTokens,
            "tool_calls" | "function_call" => StopReason::ToolUse,
            _ => StopReason::EndTurn,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Incremental output of a streamed response.
///
/// Text arrives as [`ContentBlockDelta::TextDelta`] fragments with no
/// alignment to tags, words or lines.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    MessageStart {
        id: String,
        model: String,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlockResponse,
    },
    ContentBlockDelta {
        index: usize,
        delta: ContentBlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    /// Stop reason and usage, usually just before `MessageStop`
    MessageDelta {
        stop_reason: Option<StopReason>,
        usage: Option<Usage>,
    },
    MessageStop,
    /// Error reported in-band by the backend
    Error {
        error_type: String,
        message: String,
    },
}

impl StreamEvent {
    pub fn text_delta(&self) -> Option<&str> {
        match self {
            StreamEvent::ContentBlockDelta {
                delta: ContentBlockDelta::TextDelta { text },
                ..
            } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockDelta {
    TextDelta { text: String },
    /// Fragment of a tool call's JSON arguments
    InputJsonDelta { partial_json: String },
}

/// A function the model may be asked to call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// JSON Schema of a tool's arguments object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    /// Force a call to the named tool
    Specific(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(text: &str) -> ContentBlockResponse {
        ContentBlockResponse::Text {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_request_defaults() {
        let request = CompletionRequest::new("qwen-turbo", vec![Message::user("Hello")]);

        assert_eq!(request.model, "qwen-turbo");
        assert_eq!(request.max_tokens, 4096);
        assert!(request.temperature.abs() < f32::EPSILON);
        assert!(request.system.is_none());
        assert!(request.tools.is_empty());
        assert_eq!(request.tool_choice, ToolChoice::Auto);
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("qwen-plus", vec![])
            .with_system("You are an editor")
            .with_max_tokens(512)
            .with_temperature(0.3)
            .with_tool_choice(ToolChoice::Specific("generate_reflections".to_string()));

        assert_eq!(request.system.as_deref(), Some("You are an editor"));
        assert_eq!(request.max_tokens, 512);
        assert!((request.temperature - 0.3).abs() < 0.001);
        assert_eq!(
            request.tool_choice,
            ToolChoice::Specific("generate_reflections".to_string())
        );
    }

    #[test]
    fn test_text_skips_tool_calls() {
        let response = CompletionResponse {
            id: "r1".to_string(),
            model: "m".to_string(),
            content: vec![
                text("Hello "),
                ContentBlockResponse::ToolUse {
                    id: "t1".to_string(),
                    name: "noop".to_string(),
                    input: serde_json::json!({}),
                },
                text("world"),
            ],
            stop_reason: Some(StopReason::EndTurn),
            usage: Usage::default(),
        };
        assert_eq!(response.text(), "Hello world");
        assert!(response.tool_input("noop").is_some());
        assert!(response.tool_input("other").is_none());
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(StopReason::from_finish_reason("stop"), StopReason::EndTurn);
        assert_eq!(StopReason::from_finish_reason("length"), StopReason::MaxTokens);
        assert_eq!(StopReason::from_finish_reason("tool_calls"), StopReason::ToolUse);
        assert_eq!(StopReason::from_finish_reason("weird"), StopReason::EndTurn);
    }

    #[test]
    fn test_only_text_deltas_carry_text() {
        let event = StreamEvent::ContentBlockDelta {
            index: 0,
            delta: ContentBlockDelta::TextDelta {
                text: "hi".to_string(),
            },
        };
        assert_eq!(event.text_delta(), Some("hi"));

        let args = StreamEvent::ContentBlockDelta {
            index: 1,
            delta: ContentBlockDelta::InputJsonDelta {
                partial_json: "{".to_string(),
            },
        };
        assert_eq!(args.text_delta(), None);
        assert_eq!(StreamEvent::MessageStop.text_delta(), None);
    }

    #[test]
    fn test_usage_total() {
        let usage = Usage {
            input_tokens: 10,
            output_tokens: 5,
        };
        assert_eq!(usage.total_tokens(), 15);
    }
}
