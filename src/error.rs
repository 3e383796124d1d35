// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Quill
//!
//! Configuration problems abort a turn, model capability failures are
//! surfaced to the caller, and edit scripts that address missing lines are
//! rejected as a whole. Ambiguous model output is never an error: decoders
//! report "no edit" instead.

use thiserror::Error;

use crate::article::LineAddress;

/// Main error type for Quill operations
#[derive(Error, Debug)]
pub enum QuillError {
    /// Model capability failures (transport, timeout, bad responses)
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration errors, including a routing step with no decision
    #[error("Configuration error: {0}")]
    Config(String),

    /// An edit script addressed a line that does not exist
    #[error("Line address {address} is out of range for an article with {line_count} lines")]
    AddressOutOfRange {
        address: LineAddress,
        line_count: usize,
    },

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request, settings or assistant JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Ways a model call can fail
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Seconds the backend asked us to wait
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Context too long: {current} tokens exceeds limit of {limit}")]
    ContextTooLong { current: u32, limit: u32 },

    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered, but not in a shape we can use
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// No answer within the turn's time limit
    #[error("Request timed out")]
    Timeout,

    /// The response stream broke off or reported an error in-band
    #[error("Streaming error: {0}")]
    StreamError(String),
}

pub type Result<T> = std::result::Result<T, QuillError>;

impl QuillError {
    /// Short machine-readable code used in emitted error events
    pub fn code(&self) -> &'static str {
        match self {
            QuillError::Api(ApiError::Timeout) => "model_timeout",
            QuillError::Api(_) => "model_failure",
            QuillError::Config(_) => "configuration",
            QuillError::AddressOutOfRange { .. } => "address_out_of_range",
            QuillError::InvalidInput(_) => "invalid_input",
            QuillError::Io(_) => "io",
            QuillError::Json(_) => "json",
            QuillError::Http(_) => "http",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quill_error_config() {
        let err = QuillError::Config("no next step".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert_eq!(err.code(), "configuration");
    }

    #[test]
    fn test_quill_error_address_out_of_range() {
        let err = QuillError::AddressOutOfRange {
            address: LineAddress::Existing(7),
            line_count: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("7"));
        assert!(msg.contains("3 lines"));
        assert_eq!(err.code(), "address_out_of_range");
    }

    #[test]
    fn test_quill_error_insert_address_display() {
        let err = QuillError::AddressOutOfRange {
            address: LineAddress::Insert {
                after: 9,
                ordinal: 2,
            },
            line_count: 4,
        };
        assert!(err.to_string().contains("9.2"));
    }

    #[test]
    fn test_quill_error_invalid_input() {
        let err = QuillError::InvalidInput("bad highlight".to_string());
        assert!(err.to_string().contains("Invalid input"));
    }

    #[test]
    fn test_quill_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QuillError = io_err.into();
        assert!(err.to_string().contains("IO error"));
        assert_eq!(err.code(), "io");
    }

    #[test]
    fn test_api_error_timeout() {
        let err: QuillError = ApiError::Timeout.into();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(err.code(), "model_timeout");
    }

    #[test]
    fn test_api_error_server_error() {
        let err = ApiError::ServerError {
            status: 500,
            message: "internal server error".to_string(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("internal server error"));
    }

    #[test]
    fn test_model_failure_code() {
        let err: QuillError = ApiError::StreamError("closed".to_string()).into();
        assert_eq!(err.code(), "model_failure");
    }
}
