// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use futures::StreamExt;
use std::path::Path;

use quill::article::Article;
use quill::assistant::AssistantConfig;
use quill::cli::{PatchArgs, ReflectArgs, TagArgs, TurnArgs};
use quill::codec::{decode_patch, encode};
use quill::config::{ModelSize, Settings};
use quill::embedded::JsonLEmitter;
use quill::error::{ApiError, QuillError, Result};
use quill::llm::factory::ProviderFactory;
use quill::orchestrator::{TurnEvent, TurnOrchestrator, TurnRequest};
use quill::reflection;

fn read_request(path: &Path) -> Result<TurnRequest> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        QuillError::InvalidInput(format!("bad turn request {}: {}", path.display(), e))
    })
}

fn article_from_file(path: &Path) -> Result<Article> {
    let content = std::fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Article::editable(name, &content))
}

pub async fn run_turn(args: TurnArgs, settings: &Settings) -> Result<()> {
    let assistant = AssistantConfig::load_from(&args.assistant)?;
    let request = read_request(&args.request)?;
    let orchestrator = TurnOrchestrator::for_assistant(settings, &assistant)?;

    if !args.stream {
        let outcome = orchestrator.run(&assistant, request).await?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let mut emitter = JsonLEmitter::new(uuid::Uuid::new_v4().to_string());
    let mut events = Box::pin(orchestrator.run_stream(&assistant, request));
    let mut failure = None;
    while let Some(event) = events.next().await {
        if let TurnEvent::Failed { message, .. } = &event {
            failure = Some(message.clone());
        }
        emitter.emit_turn_event(&event)?;
    }

    match failure {
        Some(message) => Err(QuillError::Api(ApiError::StreamError(message))),
        None => Ok(()),
    }
}

pub async fn run_reflect(args: ReflectArgs, settings: &Settings) -> Result<()> {
    let assistant = AssistantConfig::load_from(&args.assistant)?;
    let request = read_request(&args.request)?;
    let provider = ProviderFactory::create(&assistant.llm_provider, settings)?;
    let model = ProviderFactory::model_for(&assistant.llm_provider, ModelSize::Small, settings);

    let reflections = reflection::regenerate(
        provider.as_ref(),
        &model,
        &assistant,
        Some(&request.article),
        &request.messages,
    )
    .await?;
    println!("{}", serde_json::to_string_pretty(&reflections)?);
    Ok(())
}

pub fn run_tag(args: TagArgs) -> Result<()> {
    let article = article_from_file(&args.file)?;
    print!("{}", encode(&article));
    Ok(())
}

pub fn run_patch(args: PatchArgs) -> Result<()> {
    let article = article_from_file(&args.article)?;
    let patch = std::fs::read_to_string(&args.patch)?;
    let script = decode_patch(&patch);
    let edited = article.apply(&script)?;
    println!("{}", edited.to_text());
    Ok(())
}
