// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Quill - conversational editing backend for markdown articles.
//!
//! A turn is routed to a reply-only or editing node, the model is asked to
//! express edits in a line-tagged dialect, the streamed response is split
//! into reply, reasoning and edit channels as it arrives, and the decoded
//! edit is applied to the article in one step.
//!
//! Architecture highlights:
//! - `article`, `codec`: line model, tagged encoding, and the two patch dialects
//! - `stream`: tag demultiplexer for chunked model output
//! - `routing`, `prompt`, `orchestrator`: per-turn node selection and execution
//! - `llm`: provider abstraction, OpenAI-compatible provider, mock, retry
//! - `assistant`, `reflection`: assistant configuration and reflection memory
//! - `cli`, `embedded`: binary surface and JSONL event output

pub mod article;
pub mod assistant;
pub mod cli;
pub mod codec;
pub mod config;
pub mod embedded;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod reflection;
pub mod routing;
pub mod stream;

pub use error::{QuillError, Result};
