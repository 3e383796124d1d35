// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Quill - conversational editing backend for markdown articles
//!
//! Entry point for the quill CLI.

use clap::Parser;

use quill::cli::{Cli, Commands};
use quill::config::Settings;
use quill::error::Result;

#[path = "main/commands.rs"]
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSONL on stdout stays clean.
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    if cli.verbose > 0 {
        for directive in ["quill.orchestrator=debug", "quill.routing=debug"] {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }
    if cli.verbose > 1 {
        for directive in ["quill.llm=debug", "quill.codec=debug", "quill.config=debug"] {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    match cli.command {
        Commands::Turn(args) => commands::run_turn(args, &settings).await,
        Commands::Reflect(args) => commands::run_reflect(args, &settings).await,
        Commands::Tag(args) => commands::run_tag(args),
        Commands::Patch(args) => commands::run_patch(args),
    }
}
