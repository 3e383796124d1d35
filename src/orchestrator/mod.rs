// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Turn orchestration
//!
//! A turn is routed to a node, a system prompt is composed for it, and the
//! model is invoked once. Buffered turns wait for the full response; streamed
//! turns push every fragment through a [`TagDemux`] and report channel
//! deltas as they arrive. Either way the edit channel is decoded and applied
//! only after the model has finished, so an abandoned or failed turn never
//! changes the article.

mod events;

pub use events::{
    AppliedEdit, AssistantStatus, TurnEvent, TurnOutcome, TurnRequest, TurnUpdate,
};

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use crate::article::Article;
use crate::assistant::AssistantConfig;
use crate::codec::DecodedEdit;
use crate::config::{ModelSize, Settings};
use crate::error::{ApiError, QuillError, Result};
use crate::llm::factory::ProviderFactory;
use crate::llm::provider::{CompletionRequest, LlmProvider, StreamEvent};
use crate::llm::retry::{with_retry, RetryConfig};
use crate::prompt::{build_system_prompt, PromptContext};
use crate::routing::{EditMode, NextStep, Router, TurnState};
use crate::stream::{ChannelBuffers, TagDemux, THINK_TAG};

/// Runs turns against one model
#[derive(Clone)]
pub struct TurnOrchestrator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    router: Router,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    retry: RetryConfig,
}

/// A routed turn, ready to be sent to the model
struct PreparedTurn {
    step: NextStep,
    article: Article,
    assistant_id: String,
    completion: CompletionRequest,
}

impl PreparedTurn {
    fn edit_tag(&self) -> Option<&'static str> {
        self.step.dialect().map(|dialect| dialect.tag())
    }
}

impl TurnOrchestrator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, settings: &Settings) -> Self {
        Self {
            provider,
            model: model.into(),
            router: Router::new(settings.turn.edit_mode),
            temperature: settings.turn.temperature,
            max_tokens: settings.turn.max_tokens,
            timeout: settings.turn.timeout(),
            retry: RetryConfig::from(&settings.resilience),
        }
    }

    /// Build an orchestrator for an assistant, resolving its provider
    /// selector through the factory
    pub fn for_assistant(settings: &Settings, assistant: &AssistantConfig) -> Result<Self> {
        let provider = ProviderFactory::create(&assistant.llm_provider, settings)?;
        let model = ProviderFactory::model_for(&assistant.llm_provider, ModelSize::Small, settings);
        Ok(Self::new(provider, model, settings))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn edit_mode(&self) -> EditMode {
        self.router.edit_mode()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run a turn and wait for the complete response
    pub async fn run(&self, assistant: &AssistantConfig, request: TurnRequest) -> Result<TurnOutcome> {
        let turn = self.prepare(assistant, request)?;

        let response = tokio::time::timeout(
            self.timeout,
            with_retry(
                || self.provider.complete(turn.completion.clone()),
                Some(self.retry.clone()),
                "turn completion",
            ),
        )
        .await
        .map_err(|_| QuillError::Api(ApiError::Timeout))??;

        let text = response.text();
        let mut demux = TagDemux::new(turn.step.stream_tags());
        let mut buffers = ChannelBuffers::new();
        buffers.absorb_all(&demux.feed(&text));
        let tail = demux.finish();
        buffers.absorb_all(&tail.segments);

        Ok(self.finalize(&turn, &buffers, tail.unterminated.as_deref()))
    }

    /// Run a turn as a stream of events.
    ///
    /// The stream always ends with [`TurnEvent::Done`], preceded by either
    /// [`TurnEvent::Completed`] or [`TurnEvent::Failed`]. Dropping it early
    /// abandons the turn without applying anything.
    pub fn run_stream(
        &self,
        assistant: &AssistantConfig,
        request: TurnRequest,
    ) -> impl Stream<Item = TurnEvent> + Send + 'static {
        let this = self.clone();
        let prepared = self.prepare(assistant, request);
        let assistant_id = assistant.assistant_id.clone();

        async_stream::stream! {
            yield TurnEvent::Update(TurnUpdate::thinking(assistant_id));

            let turn = match prepared {
                Ok(turn) => turn,
                Err(error) => {
                    tracing::warn!(target: "quill.orchestrator", "turn rejected: {}", error);
                    yield TurnEvent::failed(&error);
                    yield TurnEvent::Done;
                    return;
                }
            };

            let opened = tokio::time::timeout(
                this.timeout,
                with_retry(
                    || this.provider.complete_stream(turn.completion.clone()),
                    Some(this.retry.clone()),
                    "turn stream",
                ),
            )
            .await
            .map_err(|_| QuillError::Api(ApiError::Timeout))
            .and_then(|result| result);

            let mut events = match opened {
                Ok(events) => events,
                Err(error) => {
                    tracing::warn!(target: "quill.orchestrator", "failed to open model stream: {}", error);
                    yield TurnEvent::failed(&error);
                    yield TurnEvent::Done;
                    return;
                }
            };

            let target = turn.step.target().map(str::to_string);
            let edit_tag = turn.edit_tag();
            let mut demux = TagDemux::new(turn.step.stream_tags());
            let mut buffers = ChannelBuffers::new();

            loop {
                let event = match tokio::time::timeout(this.timeout, events.next()).await {
                    Err(_) => Err(QuillError::Api(ApiError::Timeout)),
                    Ok(None) => break,
                    Ok(Some(event)) => event,
                };
                let event = match event {
                    Ok(event) => event,
                    Err(error) => {
                        tracing::warn!(target: "quill.orchestrator", "model stream failed: {}", error);
                        yield TurnEvent::failed(&error);
                        yield TurnEvent::Done;
                        return;
                    }
                };

                match event {
                    StreamEvent::Error { error_type, message } => {
                        let error = QuillError::Api(ApiError::StreamError(format!(
                            "{}: {}",
                            error_type, message
                        )));
                        tracing::warn!(target: "quill.orchestrator", "model stream failed: {}", error);
                        yield TurnEvent::failed(&error);
                        yield TurnEvent::Done;
                        return;
                    }
                    StreamEvent::MessageStop => break,
                    other => {
                        let Some(fragment) = other.text_delta() else {
                            continue;
                        };
                        let segments = demux.feed(fragment);
                        buffers.absorb_all(&segments);
                        let update = TurnUpdate::from_segments(
                            &turn.assistant_id,
                            target.as_deref(),
                            edit_tag,
                            &segments,
                        );
                        yield TurnEvent::Update(update);
                    }
                }
            }

            let tail = demux.finish();
            buffers.absorb_all(&tail.segments);
            let update = TurnUpdate::from_segments(
                &turn.assistant_id,
                target.as_deref(),
                edit_tag,
                &tail.segments,
            );
            if !update.is_empty() {
                yield TurnEvent::Update(update);
            }

            let outcome = this.finalize(&turn, &buffers, tail.unterminated.as_deref());
            yield TurnEvent::Completed(outcome);
            yield TurnEvent::Done;
        }
    }

    fn prepare(&self, assistant: &AssistantConfig, request: TurnRequest) -> Result<PreparedTurn> {
        if request.assistant_id != assistant.assistant_id {
            return Err(QuillError::Config(format!(
                "no assistant configuration for '{}'",
                request.assistant_id
            )));
        }
        if request.messages.is_empty() {
            return Err(QuillError::InvalidInput(
                "a turn needs at least one message".to_string(),
            ));
        }
        if let Some(highlight) = &request.highlight {
            highlight.validate(&request.article)?;
        }

        let mut state = TurnState::new();
        self.router.decide(&mut state, &request.article);
        let step = state.take_next_step()?;

        let system = build_system_prompt(
            &step,
            &PromptContext {
                article: &request.article,
                highlight: request.highlight.as_ref(),
                other_articles: &request.other_articles,
                reference_articles: &request.reference_articles,
                assistant,
            },
        );
        tracing::debug!(
            target: "quill.orchestrator",
            "turn for '{}' on node {} with {} messages",
            request.article.name(),
            step.name(),
            request.messages.len()
        );

        let completion = CompletionRequest::new(self.model.clone(), request.messages)
            .with_system(system)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        Ok(PreparedTurn {
            step,
            article: request.article,
            assistant_id: request.assistant_id,
            completion,
        })
    }

    fn finalize(
        &self,
        turn: &PreparedTurn,
        buffers: &ChannelBuffers,
        unterminated: Option<&str>,
    ) -> TurnOutcome {
        let mut outcome = TurnOutcome {
            assistant_id: turn.assistant_id.clone(),
            target_article_name: turn.step.target().map(str::to_string),
            reply_text: buffers.plain().trim().to_string(),
            think_text: buffers.tagged(THINK_TAG).trim().to_string(),
            full_rewrite: None,
            applied_edit: None,
        };

        let Some(dialect) = turn.step.dialect() else {
            return outcome;
        };
        // Only the first closed block counts; later blocks are ignored
        let Some(body) = buffers.first_closed_block(dialect.tag()) else {
            if unterminated == Some(dialect.tag()) {
                tracing::debug!(
                    target: "quill.orchestrator",
                    "<{}> was never closed, treating the turn as having no edit",
                    dialect.tag()
                );
            }
            return outcome;
        };

        match dialect.decode_body(body) {
            DecodedEdit::None => {}
            DecodedEdit::FullRewrite(text) => outcome.full_rewrite = Some(text),
            DecodedEdit::Patch(script) => match turn.article.apply(&script) {
                Ok(edited) => {
                    tracing::info!(
                        target: "quill.orchestrator",
                        "applied {} line edits to '{}'",
                        script.len(),
                        turn.article.name()
                    );
                    outcome.applied_edit = Some(AppliedEdit {
                        content: edited.to_text(),
                        script,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        target: "quill.orchestrator",
                        "discarding patch for '{}': {}",
                        turn.article.name(),
                        error
                    );
                }
            },
        }
        outcome
    }
}
