// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider factory for creating LLM providers
//!
//! Maps the assistant configuration's provider selector onto a concrete
//! provider instance.

use std::sync::Arc;

use crate::config::{ModelSize, Settings};
use crate::error::{QuillError, Result};
use crate::llm::mock_provider::MockProvider;
use crate::llm::provider::LlmProvider;
use crate::llm::providers::OpenAiCompatProvider;

/// Factory for creating LLM providers
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create an LLM provider based on provider name and settings
    ///
    /// # Arguments
    /// * `provider_name` - One of: "qwen", "mock"
    /// * `settings` - Application settings containing provider configuration
    pub fn create(provider_name: &str, settings: &Settings) -> Result<Arc<dyn LlmProvider>> {
        match provider_name {
            "qwen" => Self::create_qwen(settings),
            "mock" => Ok(Arc::new(MockProvider::new())),
            other => Err(QuillError::Config(format!(
                "Unknown LLM provider '{}'. Supported: {}",
                other,
                Self::supported_providers().join(", ")
            ))),
        }
    }

    /// Create a Qwen provider on the OpenAI-compatible endpoint
    pub fn create_qwen(settings: &Settings) -> Result<Arc<dyn LlmProvider>> {
        let api_key = settings.get_qwen_api_key().ok_or_else(|| {
            QuillError::Config(format!(
                "No Qwen API key found. Set {} env var or providers.qwen.api_key in settings.",
                settings.providers.qwen.api_key_env
            ))
        })?;

        let provider = match settings.get_qwen_base_url() {
            Some(base_url) => OpenAiCompatProvider::with_base_url(api_key, base_url),
            None => OpenAiCompatProvider::new(api_key),
        };

        Ok(Arc::new(provider))
    }

    /// Get the model id a provider should use for a size selector
    pub fn model_for(provider_name: &str, size: ModelSize, settings: &Settings) -> String {
        match provider_name {
            "mock" => "mock-model".to_string(),
            _ => settings.providers.qwen.model_for(size).to_string(),
        }
    }

    /// List all supported provider names
    pub fn supported_providers() -> &'static [&'static str] {
        &["qwen", "mock"]
    }
}
