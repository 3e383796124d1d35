// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scripted model backend
//!
//! A scripted implementation of [`LlmProvider`] used by unit and
//! integration tests and by the `mock` provider selector. Responses are
//! replayed in order, streamed in fixed-size character chunks, and calls can
//! be made to fail or stall on demand.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{ApiError, QuillError, Result};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, ContentBlockDelta, ContentBlockResponse, EventStream,
    LlmProvider, StopReason, StreamEvent, Usage,
};

/// Default number of characters per streamed chunk
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Replays canned responses instead of calling a model
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    responses: Arc<Mutex<Vec<MockResponse>>>,
    failures: Arc<Mutex<VecDeque<MockFailure>>>,
    call_count: Arc<AtomicUsize>,
    answered: Arc<AtomicUsize>,
    recorded_requests: Arc<Mutex<Vec<CompletionRequest>>>,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
}

/// One scripted answer
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub text: String,
    pub tool_calls: Vec<MockToolCall>,
    pub stop_reason: StopReason,
    pub usage: Usage,
    /// When streaming, fail after this many text chunks
    pub fail_after_chunks: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct MockToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// A scripted failure, consumed by the next call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockFailure {
    Timeout,
    Network(String),
    RateLimited,
    Server(u16),
    AuthenticationFailed,
}

impl From<MockFailure> for ApiError {
    fn from(failure: MockFailure) -> Self {
        match failure {
            MockFailure::Timeout => ApiError::Timeout,
            MockFailure::Network(message) => ApiError::Network(message),
            MockFailure::RateLimited => ApiError::RateLimited(0),
            MockFailure::Server(status) => ApiError::ServerError {
                status,
                message: "mock server error".to_string(),
            },
            MockFailure::AuthenticationFailed => ApiError::AuthenticationFailed,
        }
    }
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            text: "Nothing to change here.".to_string(),
            tool_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: 12,
                output_tokens: 8,
            },
            fail_after_chunks: None,
        }
    }
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock a mutex, recovering the data if a panicking test poisoned it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            answered: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: None,
        }
    }

    /// Report a different provider name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Answer every call with `text`
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_mock_responses(vec![MockResponse::text(text)])
    }

    /// Queue multiple responses (returned in order, the last one repeats)
    pub fn with_responses(self, texts: Vec<String>) -> Self {
        self.with_mock_responses(texts.into_iter().map(MockResponse::text).collect())
    }

    /// Queue fully specified responses
    pub fn with_mock_responses(self, responses: Vec<MockResponse>) -> Self {
        *lock(&self.responses) = responses;
        self
    }

    /// Answer with a single call to `name`
    pub fn with_tool_call(self, name: impl Into<String>, input: serde_json::Value) -> Self {
        self.with_mock_responses(vec![MockResponse {
            text: String::new(),
            tool_calls: vec![MockToolCall {
                id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                name: name.into(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
            ..Default::default()
        }])
    }

    /// Fail the next `times` calls with `failure` before answering normally
    pub fn with_failures(self, failure: MockFailure, times: usize) -> Self {
        lock(&self.failures).extend(std::iter::repeat(failure).take(times));
        self
    }

    /// Stream text in chunks of `chunk_size` characters
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sleep before each streamed chunk and before buffered answers
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Number of calls made so far, including failed ones
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request seen, oldest first
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        lock(&self.recorded_requests).clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        lock(&self.recorded_requests).last().cloned()
    }

    /// Forget recorded calls and rewind the script
    pub fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        self.answered.store(0, Ordering::SeqCst);
        lock(&self.recorded_requests).clear();
    }

    /// Record a call and pick its outcome. Failed calls do not consume
    /// scripted responses.
    fn next_response(&self, request: &CompletionRequest) -> Result<MockResponse> {
        lock(&self.recorded_requests).push(request.clone());
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = lock(&self.failures).pop_front() {
            return Err(QuillError::Api(failure.into()));
        }

        let index = self.answered.fetch_add(1, Ordering::SeqCst);
        let responses = lock(&self.responses);
        Ok(match responses.len() {
            0 => MockResponse::default(),
            n => responses[index.min(n - 1)].clone(),
        })
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let response = self.next_response(&request)?;
        if let Some(delay) = self.chunk_delay {
            tokio::time::sleep(delay).await;
        }

        let mut content = Vec::with_capacity(1 + response.tool_calls.len());
        if !response.text.is_empty() {
            content.push(ContentBlockResponse::Text {
                text: response.text,
            });
        }
        for tool_call in response.tool_calls {
            content.push(ContentBlockResponse::ToolUse {
                id: tool_call.id,
                name: tool_call.name,
                input: tool_call.input,
            });
        }

        Ok(CompletionResponse {
            id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            model: request.model,
            content,
            stop_reason: Some(response.stop_reason),
            usage: response.usage,
        })
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<EventStream> {
        let response = self.next_response(&request)?;
        let model = request.model.clone();
        let chunk_size = self.chunk_size;
        let delay = self.chunk_delay;

        let event_stream = async_stream::try_stream! {
            yield StreamEvent::MessageStart {
                id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
                model,
            };

            if !response.text.is_empty() {
                yield StreamEvent::ContentBlockStart {
                    index: 0,
                    content_block: ContentBlockResponse::Text { text: String::new() },
                };

                let chars: Vec<char> = response.text.chars().collect();
                for (sent, chunk) in chars.chunks(chunk_size).enumerate() {
                    if response.fail_after_chunks == Some(sent) {
                        Err::<(), QuillError>(QuillError::Api(ApiError::StreamError(
                            "mock stream interrupted".to_string(),
                        )))?;
                    }
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    yield StreamEvent::ContentBlockDelta {
                        index: 0,
                        delta: ContentBlockDelta::TextDelta { text: chunk.iter().collect() },
                    };
                }

                yield StreamEvent::ContentBlockStop { index: 0 };
            }

            let offset = usize::from(!response.text.is_empty());
            for (i, tool_call) in response.tool_calls.into_iter().enumerate() {
                let index = i + offset;
                yield StreamEvent::ContentBlockStart {
                    index,
                    content_block: ContentBlockResponse::ToolUse {
                        id: tool_call.id,
                        name: tool_call.name,
                        input: tool_call.input,
                    },
                };
                yield StreamEvent::ContentBlockStop { index };
            }

            yield StreamEvent::MessageDelta {
                stop_reason: Some(response.stop_reason),
                usage: Some(response.usage),
            };
            yield StreamEvent::MessageStop;
        };

        Ok(Box::pin(event_stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::Message;
    use futures::StreamExt;

    fn request() -> CompletionRequest {
        CompletionRequest::new("mock-model", vec![Message::user("Hello")])
    }

    async fn collect_text(provider: &MockProvider) -> Result<String> {
        let mut stream = provider.complete_stream(request()).await?;
        let mut text = String::new();
        while let Some(event) = stream.next().await {
            if let Some(delta) = event?.text_delta() {
                text.push_str(delta);
            }
        }
        Ok(text)
    }

    #[test]
    fn test_fresh_provider() {
        let provider = MockProvider::new();
        assert_eq!(provider.name(), "mock");
        assert_eq!(provider.call_count(), 0);
        assert_eq!(MockProvider::new().named("qwen").name(), "qwen");
    }

    #[tokio::test]
    async fn test_buffered_answer_is_recorded() {
        let provider = MockProvider::new().with_response("Looks good.");
        let response = provider.complete(request()).await.unwrap();

        assert_eq!(response.text(), "Looks good.");
        assert_eq!(response.model, "mock-model");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.last_request().unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_script_plays_in_order_then_repeats_last() {
        let provider =
            MockProvider::new().with_responses(vec!["first".to_string(), "second".to_string()]);

        assert_eq!(provider.complete(request()).await.unwrap().text(), "first");
        assert_eq!(provider.complete(request()).await.unwrap().text(), "second");
        assert_eq!(provider.complete(request()).await.unwrap().text(), "second");
    }

    #[tokio::test]
    async fn test_tool_call_answer() {
        let provider = MockProvider::new()
            .with_tool_call("generate_reflections", serde_json::json!({"general_facts": []}));
        let response = provider.complete(request()).await.unwrap();

        assert_eq!(response.stop_reason, Some(StopReason::ToolUse));
        assert!(response.tool_input("generate_reflections").is_some());
    }

    #[tokio::test]
    async fn test_stream_splits_into_fixed_chunks() {
        let provider = MockProvider::new()
            .with_response("abcdefgh")
            .with_chunk_size(3);
        let mut stream = provider.complete_stream(request()).await.unwrap();

        let mut deltas = Vec::new();
        while let Some(event) = stream.next().await {
            if let Some(text) = event.unwrap().text_delta() {
                deltas.push(text.to_string());
            }
        }
        assert_eq!(deltas, vec!["abc", "def", "gh"]);
    }

    #[tokio::test]
    async fn test_stream_breaks_after_n_chunks() {
        let provider = MockProvider::new()
            .with_mock_responses(vec![MockResponse {
                fail_after_chunks: Some(1),
                ..MockResponse::text("abcdefghijklmnop")
            }])
            .with_chunk_size(4);

        let err = collect_text(&provider).await.unwrap_err();
        assert!(matches!(err, QuillError::Api(ApiError::StreamError(_))));
    }

    #[tokio::test]
    async fn test_failures_precede_answers() {
        let provider = MockProvider::new()
            .with_response("ok")
            .with_failures(MockFailure::Server(503), 2);

        assert!(provider.complete(request()).await.is_err());
        assert!(provider.complete_stream(request()).await.is_err());
        assert_eq!(provider.complete(request()).await.unwrap().text(), "ok");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_reset_rewinds() {
        let provider = MockProvider::new();
        provider.complete(request()).await.unwrap();
        provider.reset();
        assert_eq!(provider.call_count(), 0);
        assert!(provider.recorded_requests().is_empty());
    }
}
