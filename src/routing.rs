// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Routing state machine
//!
//! A turn starts in the routing state and moves to exactly one terminal
//! node. Reference articles always get a reply only; editable articles go
//! to the editing node configured for the deployment.

use serde::{Deserialize, Serialize};

use crate::article::Article;
use crate::codec::{FullRewriteDialect, LinePatchDialect, PatchDialect};
use crate::error::{QuillError, Result};
use crate::stream::THINK_TAG;

/// How a deployment lets the assistant edit articles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// `<line_ADDR>` fragments inside `<edited_content>`
    #[default]
    LinePatch,
    /// Whole document inside `<@edited_article>`
    FullRewrite,
}

impl EditMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditMode::LinePatch => "line_patch",
            EditMode::FullRewrite => "full_rewrite",
        }
    }

    /// Dialect used to read edits in this mode
    pub fn dialect(&self) -> Box<dyn PatchDialect> {
        match self {
            EditMode::LinePatch => Box::new(LinePatchDialect),
            EditMode::FullRewrite => Box::new(FullRewriteDialect),
        }
    }
}

impl std::str::FromStr for EditMode {
    type Err = QuillError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "line_patch" => Ok(EditMode::LinePatch),
            "full_rewrite" => Ok(EditMode::FullRewrite),
            other => Err(QuillError::Config(format!(
                "unknown edit mode '{}', expected line_patch or full_rewrite",
                other
            ))),
        }
    }
}

/// Terminal node selected for a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NextStep {
    /// Answer without touching the article
    ReplyOnly,
    /// Answer and rewrite the target article in full
    ReplyWithFullRewrite { target: String },
    /// Answer and patch individual lines of the target article
    ReplyWithLinePatch { target: String },
}

impl NextStep {
    /// Article the produced edit belongs to
    pub fn target(&self) -> Option<&str> {
        match self {
            NextStep::ReplyOnly => None,
            NextStep::ReplyWithFullRewrite { target } | NextStep::ReplyWithLinePatch { target } => {
                Some(target)
            }
        }
    }

    pub fn edit_mode(&self) -> Option<EditMode> {
        match self {
            NextStep::ReplyOnly => None,
            NextStep::ReplyWithFullRewrite { .. } => Some(EditMode::FullRewrite),
            NextStep::ReplyWithLinePatch { .. } => Some(EditMode::LinePatch),
        }
    }

    pub fn dialect(&self) -> Option<Box<dyn PatchDialect>> {
        self.edit_mode().map(|mode| mode.dialect())
    }

    /// Tags the demultiplexer must recognize for this node
    pub fn stream_tags(&self) -> Vec<&'static str> {
        let mut tags = vec![THINK_TAG];
        if let Some(dialect) = self.dialect() {
            tags.push(dialect.tag());
        }
        tags
    }

    pub fn name(&self) -> &'static str {
        match self {
            NextStep::ReplyOnly => "reply_only",
            NextStep::ReplyWithFullRewrite { .. } => "reply_with_full_rewrite",
            NextStep::ReplyWithLinePatch { .. } => "reply_with_line_patch",
        }
    }
}

/// Per-turn routing register
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnState {
    next_step: Option<NextStep>,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_next_step(&mut self, step: NextStep) {
        self.next_step = Some(step);
    }

    /// Leave the routing state. Entering it without a decision is a
    /// configuration error.
    pub fn take_next_step(&mut self) -> Result<NextStep> {
        self.next_step
            .take()
            .ok_or_else(|| QuillError::Config("routing reached without a next step".to_string()))
    }
}

/// Selects the node handling a turn
#[derive(Debug, Clone, Copy, Default)]
pub struct Router {
    edit_mode: EditMode,
}

impl Router {
    pub fn new(edit_mode: EditMode) -> Self {
        Self { edit_mode }
    }

    pub fn edit_mode(&self) -> EditMode {
        self.edit_mode
    }

    /// Decide the node for a turn on `article`
    pub fn route(&self, article: &Article) -> NextStep {
        let step = if article.is_reference() {
            NextStep::ReplyOnly
        } else {
            let target = article.name().to_string();
            match self.edit_mode {
                EditMode::LinePatch => NextStep::ReplyWithLinePatch { target },
                EditMode::FullRewrite => NextStep::ReplyWithFullRewrite { target },
            }
        };
        tracing::debug!(
            target: "quill.routing",
            "routed article '{}' to {}",
            article.name(),
            step.name()
        );
        step
    }

    /// Record the decision for `article` in the turn state
    pub fn decide(&self, state: &mut TurnState, article: &Article) {
        state.set_next_step(self.route(article));
    }
}
