// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Article line model
//!
//! An article is an ordered list of lines with stable 1-based identities.
//! Edits never mutate an article in place: [`Article::apply`] validates the
//! whole script against the current numbering and materializes a new
//! article in a single pass, so a rejected script leaves nothing behind.

mod address;

pub use address::{EditScript, LineAddress};

use serde::{Deserialize, Serialize};

use crate::error::{QuillError, Result};

/// Whether the assistant may rewrite an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArticleCategory {
    /// May be edited by the assistant
    #[default]
    Editable,
    /// Read-only context, never edited
    Reference,
}

/// A markdown document split into lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ArticleRecord", into = "ArticleRecord")]
pub struct Article {
    name: String,
    category: ArticleCategory,
    lines: Vec<String>,
}

/// Wire shape of an article: whole content plus file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArticleRecord {
    file_name: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    file_category: ArticleCategory,
}

impl From<ArticleRecord> for Article {
    fn from(record: ArticleRecord) -> Self {
        Article::new(record.file_name, record.file_category, &record.content)
    }
}

impl From<Article> for ArticleRecord {
    fn from(article: Article) -> Self {
        ArticleRecord {
            content: article.to_text(),
            file_name: article.name,
            file_category: article.category,
        }
    }
}

impl Article {
    /// Build an article from raw text. Empty text has no lines.
    pub fn new(name: impl Into<String>, category: ArticleCategory, content: &str) -> Self {
        let lines = if content.is_empty() {
            Vec::new()
        } else {
            content.split('\n').map(str::to_string).collect()
        };
        Self::from_lines(name, category, lines)
    }

    pub fn from_lines(name: impl Into<String>, category: ArticleCategory, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            category,
            lines,
        }
    }

    /// Convenience constructor for an editable article
    pub fn editable(name: impl Into<String>, content: &str) -> Self {
        Self::new(name, ArticleCategory::Editable, content)
    }

    /// Convenience constructor for a reference article
    pub fn reference(name: impl Into<String>, content: &str) -> Self {
        Self::new(name, ArticleCategory::Reference, content)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> ArticleCategory {
        self.category
    }

    pub fn is_reference(&self) -> bool {
        self.category == ArticleCategory::Reference
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Line by 1-based index
    pub fn line(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Materialize the article back into a single text blob
    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }

    /// Every line wrapped as `<line_i>...</line_i>`, one per output line
    pub fn tagged_view(&self) -> String {
        self.tagged_range(1, self.lines.len())
    }

    /// Tagged view of the inclusive 1-based range `start..=end`, clamped to
    /// the article
    pub fn tagged_range(&self, start: usize, end: usize) -> String {
        let start = start.max(1);
        let end = end.min(self.lines.len());
        let mut out = String::new();
        for index in start..=end {
            if let Some(line) = self.line(index) {
                out.push_str(&LineAddress::Existing(index).wrap(line));
                out.push('\n');
            }
        }
        out
    }

    /// Apply an edit script, producing a new article.
    ///
    /// Every address is checked against this article's numbering before
    /// anything is built; one out-of-range address rejects the whole script.
    /// Replacing a line with identical content is a no-op, empty content
    /// deletes it, and content spanning several lines expands in place. One
    /// newline directly after the opening tag and one directly before the
    /// closing tag are not content. A line that is already blank cannot be
    /// deleted, since empty content is identical to it.
    pub fn apply(&self, script: &EditScript) -> Result<Article> {
        let line_count = self.lines.len();
        if let Some(address) = script.addresses().find(|a| !a.in_range(line_count)) {
            return Err(QuillError::AddressOutOfRange {
                address: *address,
                line_count,
            });
        }

        let mut lines = Vec::with_capacity(line_count + script.len());
        push_insertions(&mut lines, script, 0);

        for (offset, original) in self.lines.iter().enumerate() {
            let index = offset + 1;
            match script.get(&LineAddress::Existing(index)).map(fragment_body) {
                None => lines.push(original.clone()),
                Some(content) if content == original.as_str() => lines.push(original.clone()),
                Some("") => {}
                Some(content) => lines.extend(content.lines().map(str::to_string)),
            }
            push_insertions(&mut lines, script, index);
        }

        Ok(Article {
            name: self.name.clone(),
            category: self.category,
            lines,
        })
    }
}

fn push_insertions(lines: &mut Vec<String>, script: &EditScript, after: usize) {
    for content in script.insertions_after(after) {
        lines.extend(fragment_body(content).lines().map(str::to_string));
    }
}

/// Fragment content without the newlines that only separate it from its tags
fn fragment_body(content: &str) -> &str {
    let content = content.strip_prefix('\n').unwrap_or(content);
    content.strip_suffix('\n').unwrap_or(content)
}

/// Text the user highlighted, with its inclusive 1-based line range
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub start_line: Option<usize>,
    #[serde(default)]
    pub end_line: Option<usize>,
}

impl Highlight {
    pub fn new(text: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            text: text.into(),
            start_line: Some(start_line),
            end_line: Some(end_line),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Line range, when both ends are known
    pub fn line_range(&self) -> Option<(usize, usize)> {
        self.start_line.zip(self.end_line)
    }

    /// Check the range against the article the highlight belongs to
    pub fn validate(&self, article: &Article) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        if let Some((start, end)) = self.line_range() {
            if start == 0 || start > end || end > article.line_count() {
                return Err(QuillError::InvalidInput(format!(
                    "highlight lines {}..={} do not fit article '{}' with {} lines",
                    start,
                    end,
                    article.name(),
                    article.line_count()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(after: usize, ordinal: u32) -> LineAddress {
        LineAddress::Insert { after, ordinal }
    }

    fn abc() -> Article {
        Article::editable("abc.md", "a\nb\nc")
    }

    #[test]
    fn test_new_splits_lines() {
        let article = abc();
        assert_eq!(article.lines(), &["a", "b", "c"]);
        assert_eq!(article.line(1), Some("a"));
        assert_eq!(article.line(0), None);
        assert_eq!(article.line(4), None);
    }

    #[test]
    fn test_empty_content_has_no_lines() {
        let article = Article::editable("empty.md", "");
        assert!(article.is_empty());
        assert_eq!(article.to_text(), "");
        assert_eq!(article.tagged_view(), "");
    }

    #[test]
    fn test_to_text_preserves_trailing_newline() {
        let article = Article::editable("t.md", "a\n\nb\n");
        assert_eq!(article.lines(), &["a", "", "b", ""]);
        assert_eq!(article.to_text(), "a\n\nb\n");
    }

    #[test]
    fn test_tagged_view() {
        assert_eq!(
            abc().tagged_view(),
            "<line_1>a</line_1>\n<line_2>b</line_2>\n<line_3>c</line_3>\n"
        );
    }

    #[test]
    fn test_tagged_range_is_clamped() {
        assert_eq!(
            abc().tagged_range(2, 9),
            "<line_2>b</line_2>\n<line_3>c</line_3>\n"
        );
    }

    #[test]
    fn test_apply_deletes_line() {
        let script = EditScript::new().with(LineAddress::Existing(2), "");
        let edited = abc().apply(&script).unwrap();
        assert_eq!(edited.lines(), &["a", "c"]);
    }

    #[test]
    fn test_apply_replaces_line() {
        let script = EditScript::new().with(LineAddress::Existing(3), "C");
        let edited = abc().apply(&script).unwrap();
        assert_eq!(edited.lines(), &["a", "b", "C"]);
        assert_eq!(edited.name(), "abc.md");
    }

    #[test]
    fn test_apply_insertion_ordering() {
        let script = EditScript::new()
            .with(insert(2, 2), "n22")
            .with(insert(0, 1), "n01")
            .with(insert(2, 1), "n21");
        let edited = abc().apply(&script).unwrap();
        assert_eq!(edited.lines(), &["n01", "a", "b", "n21", "n22", "c"]);
    }

    #[test]
    fn test_apply_append_after_last_line() {
        let script = EditScript::new().with(insert(3, 1), "d");
        let edited = abc().apply(&script).unwrap();
        assert_eq!(edited.lines(), &["a", "b", "c", "d"]);
    }

    #[test]
    fn test_apply_addresses_use_original_numbering() {
        // Deleting line 1 must not shift what "line 3" means.
        let script = EditScript::new()
            .with(LineAddress::Existing(1), "")
            .with(LineAddress::Existing(3), "C")
            .with(insert(1, 1), "after-a");
        let edited = abc().apply(&script).unwrap();
        assert_eq!(edited.lines(), &["after-a", "b", "C"]);
    }

    #[test]
    fn test_apply_replacement_with_newlines_expands() {
        let script = EditScript::new().with(LineAddress::Existing(2), "b1\nb2");
        let edited = abc().apply(&script).unwrap();
        assert_eq!(edited.lines(), &["a", "b1", "b2", "c"]);
    }

    #[test]
    fn test_apply_ignores_newlines_hugging_the_tags() {
        let article = Article::editable("two.md", "Old text\nKeep");
        let script = crate::codec::decode_patch(
            "<line_1>\nNew text\n</line_1>\n<line_2.1>\nAdded\n</line_2.1>",
        );
        let edited = article.apply(&script).unwrap();
        assert_eq!(edited.lines(), &["New text", "Keep", "Added"]);

        let script = EditScript::new().with(LineAddress::Existing(2), "\nKeep\n");
        assert_eq!(article.apply(&script).unwrap(), article);

        let script = EditScript::new().with(LineAddress::Existing(1), "\n\nspaced\n\n");
        assert_eq!(article.apply(&script).unwrap().lines(), &["", "spaced", "", "Keep"]);
    }

    #[test]
    fn test_apply_identical_empty_line_is_kept() {
        let article = Article::editable("gap.md", "a\n\nb");
        let script = EditScript::new().with(LineAddress::Existing(2), "");
        assert_eq!(article.apply(&script).unwrap(), article);
    }

    #[test]
    fn test_apply_empty_insertion_inserts_nothing() {
        let script = EditScript::new().with(insert(1, 1), "");
        assert_eq!(abc().apply(&script).unwrap(), abc());
    }

    #[test]
    fn test_apply_out_of_range_rejects_whole_script() {
        let article = abc();
        let script = EditScript::new()
            .with(LineAddress::Existing(1), "changed")
            .with(LineAddress::Existing(4), "nope");
        let err = article.apply(&script).unwrap_err();
        assert!(matches!(
            err,
            QuillError::AddressOutOfRange {
                address: LineAddress::Existing(4),
                line_count: 3
            }
        ));
        assert_eq!(article.lines(), &["a", "b", "c"]);
    }

    #[test]
    fn test_apply_line_zero_is_out_of_range() {
        let script = EditScript::new().with(LineAddress::Existing(0), "x");
        assert!(abc().apply(&script).is_err());
    }

    #[test]
    fn test_apply_insert_into_empty_article() {
        let article = Article::editable("new.md", "");
        let script = EditScript::new().with(insert(0, 1), "# Title");
        assert_eq!(article.apply(&script).unwrap().to_text(), "# Title");
    }

    #[test]
    fn test_article_wire_format() {
        let json = serde_json::json!({
            "file_name": "notes.md",
            "content": "one\ntwo",
            "file_category": "reference"
        });
        let article: Article = serde_json::from_value(json.clone()).unwrap();
        assert!(article.is_reference());
        assert_eq!(article.line_count(), 2);
        assert_eq!(serde_json::to_value(&article).unwrap(), json);
    }

    #[test]
    fn test_article_category_defaults_to_editable() {
        let article: Article = serde_json::from_str(r#"{"file_name": "a.md"}"#).unwrap();
        assert_eq!(article.category(), ArticleCategory::Editable);
        assert!(article.is_empty());
    }

    #[test]
    fn test_highlight_validate() {
        let article = abc();
        assert!(Highlight::new("b", 2, 2).validate(&article).is_ok());
        assert!(Highlight::new("b c", 2, 3).validate(&article).is_ok());
        assert!(Highlight::new("x", 3, 2).validate(&article).is_err());
        assert!(Highlight::new("x", 0, 1).validate(&article).is_err());
        assert!(Highlight::new("x", 2, 4).validate(&article).is_err());
        // An empty highlight carries no range to check.
        assert!(Highlight::new("", 5, 9).validate(&article).is_ok());
        assert!(Highlight::default().validate(&article).is_ok());
    }
}
