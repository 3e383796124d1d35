// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! JSONL output for streamed turns
//!
//! `quill turn --stream` writes one JSON object per line so an editor
//! frontend can spawn quill as a subprocess and render the reply, reasoning
//! and edit channels as they arrive.

use serde::{Deserialize, Serialize};
use std::io::{self, Stdout, Write};

use crate::orchestrator::{TurnEvent, TurnOutcome, TurnUpdate};

/// Base event structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseEvent<T> {
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: i64,
    pub session_id: String,
    pub data: T,
}

/// Error event data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: String,
    pub message: String,
}

/// End-of-stream event data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoneData {}

/// JSONL event emitter
pub struct JsonLEmitter<W: Write = Stdout> {
    session_id: String,
    out: W,
}

impl JsonLEmitter<Stdout> {
    /// Emitter writing to stdout
    pub fn new(session_id: String) -> Self {
        Self::with_writer(session_id, io::stdout())
    }
}

impl<W: Write> JsonLEmitter<W> {
    pub fn with_writer(session_id: String, out: W) -> Self {
        Self { session_id, out }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Give back the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit<T: Serialize>(&mut self, event_type: &str, data: T) -> io::Result<()> {
        let event = BaseEvent {
            event_type: event_type.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            session_id: self.session_id.clone(),
            data,
        };

        let json = serde_json::to_string(&event)?;
        writeln!(self.out, "{}", json)?;
        self.out.flush()
    }

    pub fn emit_update(&mut self, update: &TurnUpdate) -> io::Result<()> {
        self.emit("update", update)
    }

    pub fn emit_completed(&mut self, outcome: &TurnOutcome) -> io::Result<()> {
        self.emit("completed", outcome)
    }

    pub fn emit_error(&mut self, code: String, message: String) -> io::Result<()> {
        self.emit("error", ErrorData { code, message })
    }

    pub fn emit_done(&mut self) -> io::Result<()> {
        self.emit("done", DoneData::default())
    }

    /// Write one turn event
    pub fn emit_turn_event(&mut self, event: &TurnEvent) -> io::Result<()> {
        match event {
            TurnEvent::Update(update) => self.emit_update(update),
            TurnEvent::Completed(outcome) => self.emit_completed(outcome),
            TurnEvent::Failed { code, message } => self.emit_error(code.clone(), message.clone()),
            TurnEvent::Done => self.emit_done(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn lines(emitter: JsonLEmitter<Vec<u8>>) -> Vec<Value> {
        let bytes = emitter.into_inner();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_emit_turn_events_as_jsonl() {
        let mut emitter = JsonLEmitter::with_writer("s-1".to_string(), Vec::new());
        emitter
            .emit_turn_event(&TurnEvent::Update(TurnUpdate::thinking("a-1")))
            .unwrap();
        emitter
            .emit_turn_event(&TurnEvent::Failed {
                code: "model_timeout".to_string(),
                message: "Request timed out".to_string(),
            })
            .unwrap();
        emitter.emit_turn_event(&TurnEvent::Done).unwrap();

        let events = lines(emitter);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["type"], "update");
        assert_eq!(events[0]["session_id"], "s-1");
        assert_eq!(events[0]["data"]["status"], "thinking");
        assert_eq!(events[1]["type"], "error");
        assert_eq!(events[1]["data"]["code"], "model_timeout");
        assert_eq!(events[2]["type"], "done");
        assert!(events[2]["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_emit_completed_outcome() {
        let mut emitter = JsonLEmitter::with_writer("s-2".to_string(), Vec::new());
        let outcome = TurnOutcome {
            assistant_id: "a-1".to_string(),
            target_article_name: Some("notes.md".to_string()),
            reply_text: "Done.".to_string(),
            ..Default::default()
        };
        emitter.emit_completed(&outcome).unwrap();

        let events = lines(emitter);
        assert_eq!(events[0]["type"], "completed");
        assert_eq!(events[0]["data"]["target_article_name"], "notes.md");
        assert_eq!(events[0]["data"]["reply_text"], "Done.");
        assert!(events[0]["data"]["applied_edit"].is_null());
    }
}
