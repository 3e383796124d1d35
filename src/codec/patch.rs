// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Line-patch dialect: `<line_ADDR>content</line_ADDR>` fragments.

use regex::Regex;
use std::sync::LazyLock;

use super::{extract_block, DecodedEdit, PatchDialect};
use crate::article::{EditScript, LineAddress};

/// Sentinel tag name wrapping a line patch
pub const LINE_PATCH_TAG: &str = "edited_content";

/// Opening line tag. The matching close is located separately because the
/// regex engine has no backreferences.
static LINE_OPEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<line_(\d+(?:\.\d+)?)>").unwrap());

/// Decode a line patch into an edit script.
///
/// When the `<edited_content>` block is present only its inside is read; an
/// opened block that never closes yields an empty script. Text without the
/// block is scanned whole, which is how tagged views and already-extracted
/// edit channels are read.
pub fn decode_patch(text: &str) -> EditScript {
    let open = format!("<{}>", LINE_PATCH_TAG);
    if !text.contains(&open) {
        return parse_fragments(text);
    }
    match extract_block(text, LINE_PATCH_TAG) {
        Some(body) => parse_fragments(body),
        None => {
            tracing::debug!(target: "quill.codec", "edited_content block never closed, ignoring patch");
            EditScript::new()
        }
    }
}

fn parse_fragments(body: &str) -> EditScript {
    let mut script = EditScript::new();
    let mut cursor = 0;

    while let Some(caps) = LINE_OPEN_PATTERN.captures_at(body, cursor) {
        let (Some(whole), Some(addr)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        cursor = whole.end();

        let address: LineAddress = match addr.as_str().parse() {
            Ok(address) => address,
            Err(e) => {
                tracing::debug!(target: "quill.codec", "dropping fragment: {}", e);
                continue;
            }
        };

        let close = address.close_tag();
        let Some(offset) = body[whole.end()..].find(&close) else {
            tracing::debug!(target: "quill.codec", "dropping unterminated fragment for line {}", address);
            continue;
        };

        let content_end = whole.end() + offset;
        script.insert(address, &body[whole.end()..content_end]);
        cursor = content_end + close.len();
    }

    script
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinePatchDialect;

impl PatchDialect for LinePatchDialect {
    fn name(&self) -> &'static str {
        "line_patch"
    }

    fn tag(&self) -> &'static str {
        LINE_PATCH_TAG
    }

    fn decode(&self, text: &str) -> DecodedEdit {
        let script = decode_patch(text);
        if script.is_empty() {
            DecodedEdit::None
        } else {
            DecodedEdit::Patch(script)
        }
    }

    fn decode_body(&self, body: &str) -> DecodedEdit {
        let script = parse_fragments(body);
        if script.is_empty() {
            DecodedEdit::None
        } else {
            DecodedEdit::Patch(script)
        }
    }
}
