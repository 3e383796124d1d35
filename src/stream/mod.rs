// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming tag demultiplexer
//!
//! Model output arrives as arbitrary text fragments. [`TagDemux`] splits it
//! into the plain reply and one channel per recognized tag as it arrives,
//! and [`ChannelBuffers`] accumulates those channels for the final decode.

mod demux;

pub use demux::{DemuxTail, Segment, TagDemux};

use std::collections::BTreeMap;

/// Tag wrapping model reasoning
pub const THINK_TAG: &str = "think";

/// Accumulated text of every channel seen so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelBuffers {
    plain: String,
    tagged: BTreeMap<String, String>,
    blocks: BTreeMap<String, Vec<Block>>,
}

/// Body of one `<tag>...</tag>` occurrence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Block {
    text: String,
    closed: bool,
}

impl ChannelBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment to the channel it belongs to. Markers add no text
    /// but delimit the blocks of a tag.
    pub fn absorb(&mut self, segment: &Segment) {
        match segment {
            Segment::Plain(text) => self.plain.push_str(text),
            Segment::Tagged { tag, text } => {
                self.tagged.entry(tag.clone()).or_default().push_str(text);
                let blocks = self.blocks.entry(tag.clone()).or_default();
                match blocks.last_mut() {
                    Some(block) if !block.closed => block.text.push_str(text),
                    _ => blocks.push(Block {
                        text: text.clone(),
                        closed: false,
                    }),
                }
            }
            Segment::Opened(tag) => {
                self.blocks
                    .entry(tag.clone())
                    .or_default()
                    .push(Block::default());
            }
            Segment::Closed(tag) => {
                let last = self.blocks.get_mut(tag).and_then(|blocks| blocks.last_mut());
                if let Some(block) = last {
                    block.closed = true;
                }
            }
        }
    }

    pub fn absorb_all<'a>(&mut self, segments: impl IntoIterator<Item = &'a Segment>) {
        for segment in segments {
            self.absorb(segment);
        }
    }

    /// Default channel text
    pub fn plain(&self) -> &str {
        &self.plain
    }

    /// Text accumulated inside every `tag` block, empty if it never appeared
    pub fn tagged(&self, tag: &str) -> &str {
        self.tagged.get(tag).map(String::as_str).unwrap_or("")
    }

    /// Body of the first `tag` block that was closed. Later blocks and a
    /// block still open at the end of the stream are ignored.
    pub fn first_closed_block(&self, tag: &str) -> Option<&str> {
        self.blocks
            .get(tag)?
            .iter()
            .find(|block| block.closed)
            .map(|block| block.text.as_str())
    }

    /// Discard a channel's content
    pub fn clear_tag(&mut self, tag: &str) {
        self.tagged.remove(tag);
        self.blocks.remove(tag);
    }
}

/// Run a complete text through a fresh demultiplexer in one piece
pub fn split_complete<I, S>(tags: I, text: &str) -> (ChannelBuffers, Option<String>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut demux = TagDemux::new(tags);
    let mut buffers = ChannelBuffers::new();
    buffers.absorb_all(&demux.feed(text));
    let tail = demux.finish();
    buffers.absorb_all(&tail.segments);
    (buffers, tail.unterminated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_accumulate_per_channel() {
        let mut buffers = ChannelBuffers::new();
        buffers.absorb(&Segment::Plain("Hi ".to_string()));
        buffers.absorb(&Segment::Opened(THINK_TAG.to_string()));
        buffers.absorb(&Segment::Tagged {
            tag: THINK_TAG.to_string(),
            text: "a".to_string(),
        });
        buffers.absorb(&Segment::Tagged {
            tag: THINK_TAG.to_string(),
            text: "b".to_string(),
        });
        buffers.absorb(&Segment::Closed(THINK_TAG.to_string()));
        buffers.absorb(&Segment::Plain("there".to_string()));

        assert_eq!(buffers.plain(), "Hi there");
        assert_eq!(buffers.tagged(THINK_TAG), "ab");
        assert_eq!(buffers.tagged("edited_content"), "");
    }

    #[test]
    fn test_split_complete() {
        let (buffers, open) = split_complete(
            [THINK_TAG, "edited_content"],
            "<think>plan</think>Done.<edited_content><line_1>x</line_1></edited_content>",
        );
        assert_eq!(buffers.plain(), "Done.");
        assert_eq!(buffers.tagged(THINK_TAG), "plan");
        assert_eq!(buffers.tagged("edited_content"), "<line_1>x</line_1>");
        assert!(open.is_none());
    }

    #[test]
    fn test_clear_tag() {
        let (mut buffers, open) = split_complete(["edited_content"], "<edited_content>partial");
        assert_eq!(open.as_deref(), Some("edited_content"));
        buffers.clear_tag("edited_content");
        assert_eq!(buffers.tagged("edited_content"), "");
    }

    #[test]
    fn test_first_closed_block_ignores_later_blocks() {
        let (buffers, open) = split_complete(
            ["edited_content"],
            "<edited_content>one</edited_content> and <edited_content>two</edited_content>",
        );
        assert_eq!(open, None);
        assert_eq!(buffers.tagged("edited_content"), "onetwo");
        assert_eq!(buffers.first_closed_block("edited_content"), Some("one"));
    }

    #[test]
    fn test_first_closed_block_survives_unclosed_follower() {
        let (buffers, open) = split_complete(
            ["edited_content"],
            "<edited_content>one</edited_content> then <edited_content>trunc",
        );
        assert_eq!(open.as_deref(), Some("edited_content"));
        assert_eq!(buffers.first_closed_block("edited_content"), Some("one"));
    }

    #[test]
    fn test_unclosed_only_block_is_not_returned() {
        let (buffers, _) = split_complete(["edited_content"], "ok <edited_content>trunc");
        assert_eq!(buffers.first_closed_block("edited_content"), None);
        assert_eq!(buffers.first_closed_block("think"), None);
    }
}
