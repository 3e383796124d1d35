// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Full-document dialect: the model rewrites everything between sentinels.

use super::{extract_block, DecodedEdit, PatchDialect};

/// Sentinel tag name wrapping a full rewrite
pub const FULL_REWRITE_TAG: &str = "@edited_article";

/// Extract the rewritten document from a model response.
///
/// Returns `None` when a sentinel is missing or the block is blank; both
/// mean the model produced no rewrite.
pub fn decode_full(text: &str) -> Option<String> {
    let body = extract_block(text, FULL_REWRITE_TAG)?;
    non_blank(body)
}

fn non_blank(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FullRewriteDialect;

impl PatchDialect for FullRewriteDialect {
    fn name(&self) -> &'static str {
        "full_rewrite"
    }

    fn tag(&self) -> &'static str {
        FULL_REWRITE_TAG
    }

    fn decode(&self, text: &str) -> DecodedEdit {
        decode_full(text).map_or(DecodedEdit::None, DecodedEdit::FullRewrite)
    }

    fn decode_body(&self, body: &str) -> DecodedEdit {
        non_blank(body).map_or(DecodedEdit::None, DecodedEdit::FullRewrite)
    }
}
