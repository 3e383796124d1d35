// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{QuillError, Result};

use super::Settings;

/// Environment variable overriding the Qwen base URL
pub const QWEN_BASE_URL_ENV: &str = "DASHSCOPE_BASE_URL";

impl Settings {
    /// Get the API key for Qwen, checking env var first.
    pub fn get_qwen_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.providers.qwen.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.providers.qwen.api_key.clone())
    }

    /// Get the Qwen base URL, checking env var first.
    pub fn get_qwen_base_url(&self) -> Option<String> {
        std::env::var(QWEN_BASE_URL_ENV)
            .ok()
            .or_else(|| self.providers.qwen.base_url.clone())
    }

    /// Check if the given provider has a usable configuration.
    pub fn is_provider_configured(&self, provider: &str) -> bool {
        match provider {
            "mock" => true,
            "qwen" => self.get_qwen_api_key().is_some(),
            _ => false,
        }
    }

    /// Reject values no turn can run with.
    pub fn validate(&self) -> Result<()> {
        let turn = &self.turn;
        if !(0.0..=2.0).contains(&turn.temperature) {
            return Err(QuillError::Config(format!(
                "turn.temperature must be between 0 and 2, got {}",
                turn.temperature
            )));
        }
        if turn.timeout_secs == 0 {
            return Err(QuillError::Config(
                "turn.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if turn.max_tokens == 0 {
            return Err(QuillError::Config(
                "turn.max_tokens must be greater than zero".to_string(),
            ));
        }

        let resilience = &self.resilience;
        if !(0.0..=1.0).contains(&resilience.jitter) {
            return Err(QuillError::Config(format!(
                "resilience.jitter must be between 0 and 1, got {}",
                resilience.jitter
            )));
        }
        if resilience.base_delay_ms > resilience.max_delay_ms {
            return Err(QuillError::Config(
                "resilience.base_delay_ms cannot exceed resilience.max_delay_ms".to_string(),
            ));
        }

        let qwen = &self.providers.qwen;
        if qwen.small_model.trim().is_empty() || qwen.large_model.trim().is_empty() {
            return Err(QuillError::Config(
                "providers.qwen model ids cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
