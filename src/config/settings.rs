// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Quill
//!
//! Handles loading and saving settings from ~/.quill/settings.json

use serde::{Deserialize, Serialize};

use crate::routing::EditMode;

mod io;
mod validation;

/// Main settings structure, stored in ~/.quill/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Turn handling: edit dialect, sampling, and limits
    #[serde(default)]
    pub turn: TurnConfig,

    /// Retry settings for model calls
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

/// Backends reachable through the provider factory
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProvidersConfig {
    /// Qwen models served through an OpenAI-compatible endpoint
    #[serde(default)]
    pub qwen: QwenConfig,
}

/// Qwen (DashScope) configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QwenConfig {
    /// Key stored in the file; the env var wins when both are set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Env var holding the key
    #[serde(default = "default_qwen_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model used for `ModelSize::Small`
    #[serde(default = "default_small_model")]
    pub small_model: String,

    /// Model used for `ModelSize::Large`
    #[serde(default = "default_large_model")]
    pub large_model: String,
}

/// Turn handling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnConfig {
    /// Editing node used for editable articles
    #[serde(default)]
    pub edit_mode: EditMode,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens in a response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on one model call, including retries
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Backoff for transient model failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResilienceConfig {
    /// Retries after the first failed model call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; each later retry waits twice as long
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Random spread applied to each delay, as a fraction in 0..=1
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

/// Model size selector, mapped to configured model ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    #[default]
    Small,
    Large,
}

fn default_qwen_api_key_env() -> String {
    "DASHSCOPE_API_KEY".to_string()
}

fn default_small_model() -> String {
    "qwen-turbo".to_string()
}

fn default_large_model() -> String {
    "qwen-plus".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8000
}

fn default_jitter() -> f64 {
    0.25
}

impl Default for QwenConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_qwen_api_key_env(),
            base_url: None,
            small_model: default_small_model(),
            large_model: default_large_model(),
        }
    }
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            edit_mode: EditMode::default(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl QwenConfig {
    /// Model id for a size selector
    pub fn model_for(&self, size: ModelSize) -> &str {
        match size {
            ModelSize::Small => &self.small_model,
            ModelSize::Large => &self.large_model,
        }
    }
}

impl TurnConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}
