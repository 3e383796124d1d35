// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Assistant configuration
//!
//! The per-assistant value object supplied by the caller with each turn.
//! Turns only read it; [`crate::reflection::regenerate`] produces a fresh
//! [`Reflections`] value that the caller stores.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{QuillError, Result};

/// Learned memory about the user, regenerated wholesale after conversations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflections {
    /// Style rules to follow when generating content
    #[serde(default)]
    pub style_guidelines: Vec<String>,
    /// Facts about the user to keep in mind
    #[serde(default)]
    pub general_facts: Vec<String>,
}

impl Reflections {
    pub fn is_empty(&self) -> bool {
        self.style_guidelines.is_empty() && self.general_facts.is_empty()
    }
}

/// Render reflections for inclusion in a prompt
pub fn format_reflections(reflections: &Reflections) -> String {
    if reflections.is_empty() {
        return "No reflections have been recorded yet.".to_string();
    }

    let mut out = String::new();
    push_section(&mut out, "Style guidelines", &reflections.style_guidelines);
    push_section(&mut out, "General facts about the user", &reflections.general_facts);
    out.trim_end().to_string()
}

fn push_section(out: &mut String, title: &str, items: &[String]) {
    out.push_str(title);
    out.push_str(":\n");
    if items.is_empty() {
        out.push_str("- (none)\n");
    }
    for item in items {
        out.push_str("- ");
        out.push_str(item);
        out.push('\n');
    }
    out.push('\n');
}

/// Configuration of one assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub assistant_id: String,
    pub assistant_name: String,
    /// Provider selector, resolved through the provider factory
    #[serde(default = "default_llm_provider")]
    pub llm_provider: String,
    #[serde(default)]
    pub reflections: Reflections,
    #[serde(default)]
    pub user_defined_rules: Vec<String>,
}

fn default_llm_provider() -> String {
    "qwen".to_string()
}

impl AssistantConfig {
    pub fn new(assistant_id: impl Into<String>, assistant_name: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            assistant_name: assistant_name.into(),
            llm_provider: default_llm_provider(),
            reflections: Reflections::default(),
            user_defined_rules: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.llm_provider = provider.into();
        self
    }

    pub fn with_reflections(mut self, reflections: Reflections) -> Self {
        self.reflections = reflections;
        self
    }

    pub fn with_rules(mut self, rules: Vec<String>) -> Self {
        self.user_defined_rules = rules;
        self
    }

    /// Load an assistant configuration from a JSON file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AssistantConfig = serde_json::from_str(&content)?;
        if config.assistant_id.trim().is_empty() {
            return Err(QuillError::Config(format!(
                "assistant configuration at {} has no assistant_id",
                path.display()
            )));
        }
        Ok(config)
    }
}
