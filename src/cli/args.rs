// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Quill - conversational editing backend for markdown articles
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(version, about = "Conversational editing backend for markdown articles")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path (defaults to $QUILL_HOME/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one chat turn against the configured model
    Turn(TurnArgs),

    /// Regenerate an assistant's reflections from a finished conversation
    Reflect(ReflectArgs),

    /// Print the line-tagged view of a markdown file
    Tag(TagArgs),

    /// Apply a line patch to a markdown file and print the result
    Patch(PatchArgs),
}

/// Arguments for the turn subcommand
#[derive(clap::Args, Debug)]
pub struct TurnArgs {
    /// JSON file holding the turn request
    #[arg(long)]
    pub request: PathBuf,

    /// JSON file holding the assistant configuration
    #[arg(long)]
    pub assistant: PathBuf,

    /// Emit JSONL events as the response streams in
    #[arg(long)]
    pub stream: bool,
}

/// Arguments for the reflect subcommand
#[derive(clap::Args, Debug)]
pub struct ReflectArgs {
    /// JSON file holding the finished turn request (article and messages)
    #[arg(long)]
    pub request: PathBuf,

    /// JSON file holding the assistant configuration
    #[arg(long)]
    pub assistant: PathBuf,
}

/// Arguments for the tag subcommand
#[derive(clap::Args, Debug)]
pub struct TagArgs {
    /// Markdown file to tag
    pub file: PathBuf,
}

/// Arguments for the patch subcommand
#[derive(clap::Args, Debug)]
pub struct PatchArgs {
    /// Markdown file to patch
    pub article: PathBuf,

    /// File containing `<line_N>` fragments, optionally inside an
    /// `<edited_content>` block
    pub patch: PathBuf,
}
