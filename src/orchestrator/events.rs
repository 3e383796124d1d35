// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Request, outcome and event shapes of a turn

use serde::{Deserialize, Serialize};

use crate::article::{Article, EditScript, Highlight};
use crate::error::QuillError;
use crate::llm::message::Message;
use crate::stream::{Segment, THINK_TAG};

/// One user turn as sent by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub assistant_id: String,
    /// Full conversation so far, replayed as prompt history
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Highlight>,
    /// Article the user is working on
    pub article: Article,
    #[serde(default)]
    pub other_articles: Vec<Article>,
    #[serde(default)]
    pub reference_articles: Vec<Article>,
}

impl TurnRequest {
    pub fn new(assistant_id: impl Into<String>, article: Article, messages: Vec<Message>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            messages,
            highlight: None,
            article,
            other_articles: Vec::new(),
            reference_articles: Vec::new(),
        }
    }

    pub fn with_highlight(mut self, highlight: Highlight) -> Self {
        self.highlight = Some(highlight);
        self
    }

    pub fn with_other_articles(mut self, articles: Vec<Article>) -> Self {
        self.other_articles = articles;
        self
    }

    pub fn with_reference_articles(mut self, articles: Vec<Article>) -> Self {
        self.reference_articles = articles;
        self
    }
}

/// A line patch that was applied, with the resulting article text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEdit {
    pub script: EditScript,
    pub content: String,
}

/// Final result of a turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub assistant_id: String,
    /// Article the edit belongs to; `None` for reply-only turns
    pub target_article_name: Option<String>,
    pub reply_text: String,
    pub think_text: String,
    /// Replacement text produced by the full-rewrite node
    pub full_rewrite: Option<String>,
    /// Patch produced by the line-patch node, when it applied cleanly
    pub applied_edit: Option<AppliedEdit>,
}

impl TurnOutcome {
    pub fn has_edit(&self) -> bool {
        self.full_rewrite.is_some() || self.applied_edit.is_some()
    }
}

/// Assistant activity reported with each update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantStatus {
    Thinking,
    Responding,
}

/// Incremental progress of a streamed turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnUpdate {
    pub assistant_id: String,
    pub status: AssistantStatus,
    pub target_article_name: Option<String>,
    /// New reply text, including empty `<tag></tag>` markers for opened tags
    pub reply_delta: String,
    pub think_delta: String,
    pub edit_delta: String,
}

impl TurnUpdate {
    pub fn thinking(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            status: AssistantStatus::Thinking,
            target_article_name: None,
            reply_delta: String::new(),
            think_delta: String::new(),
            edit_delta: String::new(),
        }
    }

    /// Fold demultiplexed segments into one responding update
    pub fn from_segments(
        assistant_id: &str,
        target: Option<&str>,
        edit_tag: Option<&str>,
        segments: &[Segment],
    ) -> Self {
        let mut update = Self {
            assistant_id: assistant_id.to_string(),
            status: AssistantStatus::Responding,
            target_article_name: target.map(str::to_string),
            reply_delta: String::new(),
            think_delta: String::new(),
            edit_delta: String::new(),
        };
        for segment in segments {
            match segment {
                Segment::Plain(text) => update.reply_delta.push_str(text),
                Segment::Opened(tag) => update.reply_delta.push_str(&Segment::marker(tag)),
                Segment::Closed(_) => {}
                Segment::Tagged { tag, text } if tag == THINK_TAG => {
                    update.think_delta.push_str(text)
                }
                Segment::Tagged { tag, text } if Some(tag.as_str()) == edit_tag => {
                    update.edit_delta.push_str(text)
                }
                Segment::Tagged { text, .. } => update.reply_delta.push_str(text),
            }
        }
        update
    }

    pub fn is_empty(&self) -> bool {
        self.reply_delta.is_empty() && self.think_delta.is_empty() && self.edit_delta.is_empty()
    }
}

/// Event emitted by a streamed turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    Update(TurnUpdate),
    Completed(TurnOutcome),
    /// The turn failed; nothing was applied
    Failed { code: String, message: String },
    /// End of stream
    Done,
}

impl TurnEvent {
    pub fn failed(error: &QuillError) -> Self {
        TurnEvent::Failed {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::Done)
    }
}
