// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tag codec
//!
//! Encodes articles into the `<line_i>` tagged form shown to the model and
//! decodes what the model writes back. Two patch dialects are supported:
//!
//! - [`FullRewriteDialect`]: the whole document (or excerpt) is rewritten
//!   between `<@edited_article>` sentinels.
//! - [`LinePatchDialect`]: `<line_ADDR>` fragments inside an
//!   `<edited_content>` block address individual lines.
//!
//! Decoding is lenient. Missing or empty blocks mean "no edit", and
//! malformed fragments are dropped rather than failing the whole patch.

mod full;
mod patch;

pub use full::{decode_full, FullRewriteDialect, FULL_REWRITE_TAG};
pub use patch::{decode_patch, LinePatchDialect, LINE_PATCH_TAG};

use crate::article::{Article, EditScript};

/// Encode an article into tagged lines using the same addressing scheme
/// [`decode_patch`] reads back
pub fn encode(article: &Article) -> String {
    article.tagged_view()
}

/// An edit recovered from model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEdit {
    /// Nothing usable was produced
    None,
    /// Replacement text for the whole document or highlighted excerpt
    FullRewrite(String),
    /// Line-addressed edit script
    Patch(EditScript),
}

impl DecodedEdit {
    pub fn is_none(&self) -> bool {
        matches!(self, DecodedEdit::None)
    }
}

/// A convention for how the model expresses edits
pub trait PatchDialect: Send + Sync {
    /// Dialect name for logs and configuration
    fn name(&self) -> &'static str;

    /// Name of the sentinel tag bounding the edit block, without brackets
    fn tag(&self) -> &'static str;

    /// Decode a complete model response that still contains the sentinels
    fn decode(&self, text: &str) -> DecodedEdit;

    /// Decode the body of an edit block whose sentinels were already removed
    /// (the accumulated edit channel of a streamed response)
    fn decode_body(&self, body: &str) -> DecodedEdit;

    fn open_tag(&self) -> String {
        format!("<{}>", self.tag())
    }

    fn close_tag(&self) -> String {
        format!("</{}>", self.tag())
    }
}

/// Text strictly between the first `<tag>` and the following `</tag>`.
///
/// `None` when either sentinel is missing.
pub(crate) fn extract_block<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(&text[start..end])
}
