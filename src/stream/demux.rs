// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tag demultiplexer state machine
//!
//! The demultiplexer holds one register for the currently open tag and a
//! carry buffer for a bracket sequence cut off at a fragment boundary. The
//! carry only ever holds a strict prefix of a tag that could be recognized
//! in the current state, so it never exceeds the longest tag name plus the
//! `</` overhead.

/// A piece of demultiplexed output, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text for the default channel
    Plain(String),
    /// Text inside a recognized tag
    Tagged { tag: String, text: String },
    /// A recognized tag was opened. Consumers of the default channel render
    /// this as an empty `<tag></tag>` marker.
    Opened(String),
    /// The open tag was closed
    Closed(String),
}

impl Segment {
    /// Text carried by this segment, excluding synthetic markers
    pub fn text(&self) -> Option<&str> {
        match self {
            Segment::Plain(text) | Segment::Tagged { text, .. } => Some(text),
            Segment::Opened(_) | Segment::Closed(_) => None,
        }
    }

    /// Empty marker rendering of an opened tag, e.g. `<think></think>`
    pub fn marker(tag: &str) -> String {
        format!("<{tag}></{tag}>")
    }
}

/// Which channel is currently receiving text
#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Plain,
    Inside(String),
}

/// Result of looking for the next bracket pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// No bracket pair, and nothing worth holding back
    NoBracket,
    /// The buffer ends with the beginning of a tag that may still complete
    Partial { at: usize },
    /// A complete `<...>` spanning `start..end`
    Bracket { start: usize, end: usize },
}

/// What a complete bracket pair does to the state
#[derive(Debug, Clone, PartialEq, Eq)]
enum Transition {
    Open(String),
    Close(String),
    Literal,
}

/// Remaining output once the stream has ended
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DemuxTail {
    pub segments: Vec<Segment>,
    /// Tag still open when the stream ended
    pub unterminated: Option<String>,
}

/// Splits a chunked text stream into a default channel and one channel per
/// recognized tag
#[derive(Debug, Clone)]
pub struct TagDemux {
    tags: Vec<String>,
    state: State,
    carry: String,
}

impl TagDemux {
    /// Create a demultiplexer recognizing the given tag names (without
    /// brackets)
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            state: State::Plain,
            carry: String::new(),
        }
    }

    /// Tag currently open, if any
    pub fn current_tag(&self) -> Option<&str> {
        match &self.state {
            State::Plain => None,
            State::Inside(tag) => Some(tag),
        }
    }

    /// Longest sequence the carry buffer can ever hold
    pub fn max_carry_len(&self) -> usize {
        self.tags.iter().map(|t| t.len()).max().unwrap_or(0) + 2
    }

    /// Feed one fragment, returning the segments it completes
    pub fn feed(&mut self, fragment: &str) -> Vec<Segment> {
        let mut buf = std::mem::take(&mut self.carry);
        buf.push_str(fragment);

        let mut out = Vec::new();
        let mut pending = 0;
        let mut cursor = 0;

        loop {
            match self.scan(&buf, cursor) {
                Scan::NoBracket => {
                    self.flush(&mut out, &buf[pending..]);
                    break;
                }
                Scan::Partial { at } => {
                    self.flush(&mut out, &buf[pending..at]);
                    self.carry = buf[at..].to_string();
                    break;
                }
                Scan::Bracket { start, end } => {
                    match self.transition(&buf[start + 1..end - 1]) {
                        Transition::Open(tag) => {
                            self.flush(&mut out, &buf[pending..start]);
                            out.push(Segment::Opened(tag.clone()));
                            self.state = State::Inside(tag);
                            pending = end;
                            cursor = end;
                        }
                        Transition::Close(tag) => {
                            self.flush(&mut out, &buf[pending..start]);
                            out.push(Segment::Closed(tag));
                            self.state = State::Plain;
                            pending = end;
                            cursor = end;
                        }
                        Transition::Literal => cursor = start + 1,
                    }
                }
            }
        }

        out
    }

    /// End the stream, flushing anything held in the carry buffer
    pub fn finish(mut self) -> DemuxTail {
        let mut segments = Vec::new();
        let carry = std::mem::take(&mut self.carry);
        self.flush(&mut segments, &carry);
        DemuxTail {
            segments,
            unterminated: self.current_tag().map(str::to_string),
        }
    }

    fn scan(&self, buf: &str, from: usize) -> Scan {
        let bytes = buf.as_bytes();
        let Some(offset) = buf[from..].find('<') else {
            return Scan::NoBracket;
        };
        let mut start = from + offset;

        loop {
            match bytes[start + 1..]
                .iter()
                .position(|&b| b == b'<' || b == b'>')
            {
                Some(i) if bytes[start + 1 + i] == b'>' => {
                    return Scan::Bracket {
                        start,
                        end: start + i + 2,
                    };
                }
                // A second '<' before any '>': the first one is plain text.
                Some(i) => start += 1 + i,
                None if self.could_complete(&buf[start..]) => return Scan::Partial { at: start },
                None => return Scan::NoBracket,
            }
        }
    }

    fn transition(&self, inner: &str) -> Transition {
        match &self.state {
            State::Plain if self.tags.iter().any(|t| t == inner) => {
                Transition::Open(inner.to_string())
            }
            State::Inside(tag) if inner.strip_prefix('/') == Some(tag.as_str()) => {
                Transition::Close(tag.clone())
            }
            _ => Transition::Literal,
        }
    }

    /// Whether `tail` is the start of a tag recognized in the current state
    fn could_complete(&self, tail: &str) -> bool {
        match &self.state {
            State::Plain => self
                .tags
                .iter()
                .any(|t| format!("<{}>", t).starts_with(tail)),
            State::Inside(tag) => format!("</{}>", tag).starts_with(tail),
        }
    }

    fn flush(&self, out: &mut Vec<Segment>, text: &str) {
        if text.is_empty() {
            return;
        }
        out.push(match &self.state {
            State::Plain => Segment::Plain(text.to_string()),
            State::Inside(tag) => Segment::Tagged {
                tag: tag.clone(),
                text: text.to_string(),
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demux() -> TagDemux {
        TagDemux::new(["think", "edited_content"])
    }

    fn run(fragments: &[&str]) -> (Vec<Segment>, Option<String>) {
        let mut demux = demux();
        let mut segments = Vec::new();
        for fragment in fragments {
            segments.extend(demux.feed(fragment));
        }
        let tail = demux.finish();
        segments.extend(tail.segments);
        (segments, tail.unterminated)
    }

    fn plain(text: &str) -> Segment {
        Segment::Plain(text.to_string())
    }

    fn tagged(tag: &str, text: &str) -> Segment {
        Segment::Tagged {
            tag: tag.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_plain_text_passes_through() {
        let (segments, open) = run(&["hello ", "world"]);
        assert_eq!(segments, vec![plain("hello "), plain("world")]);
        assert!(open.is_none());
    }

    #[test]
    fn test_single_fragment_with_tags() {
        let (segments, _) = run(&["a<think>hm</think>b"]);
        assert_eq!(
            segments,
            vec![
                plain("a"),
                Segment::Opened("think".to_string()),
                tagged("think", "hm"),
                Segment::Closed("think".to_string()),
                plain("b"),
            ]
        );
    }

    #[test]
    fn test_tag_split_across_fragments() {
        let mut demux = demux();
        assert_eq!(demux.feed("ok <edi"), vec![plain("ok ")]);
        assert_eq!(
            demux.feed("ted_content><line_1>x</li"),
            vec![
                Segment::Opened("edited_content".to_string()),
                tagged("edited_content", "<line_1>x</li"),
            ]
        );
        assert_eq!(demux.current_tag(), Some("edited_content"));
        assert_eq!(demux.feed("ne_1></edited_"), vec![tagged("edited_content", "ne_1>")]);
        assert_eq!(
            demux.feed("content>"),
            vec![Segment::Closed("edited_content".to_string())]
        );
        assert!(demux.finish().unterminated.is_none());
    }

    #[test]
    fn test_unrecognized_tags_are_literal() {
        let (segments, _) = run(&["<b>bold</b> and <br>"]);
        assert_eq!(segments, vec![plain("<b>bold</b> and <br>")]);
    }

    #[test]
    fn test_non_tag_tail_is_not_held_back() {
        let mut demux = demux();
        assert_eq!(demux.feed("x < y"), vec![plain("x < y")]);
        assert_eq!(demux.feed("a <b"), vec![plain("a <b")]);
    }

    #[test]
    fn test_stray_open_bracket_before_tag() {
        let (segments, _) = run(&["1 <<think>z</think>"]);
        assert_eq!(
            segments,
            vec![
                plain("1 <"),
                Segment::Opened("think".to_string()),
                tagged("think", "z"),
                Segment::Closed("think".to_string()),
            ]
        );
    }

    #[test]
    fn test_other_open_tag_inside_is_literal() {
        let (segments, _) = run(&["<think>x<edited_content>y</think>"]);
        assert_eq!(segments[1], tagged("think", "x<edited_content>y"));
    }

    #[test]
    fn test_wrong_close_inside_is_literal() {
        let (segments, open) = run(&["<think>a</edited_content>b"]);
        assert_eq!(segments[1], tagged("think", "a</edited_content>b"));
        assert_eq!(open.as_deref(), Some("think"));
    }

    #[test]
    fn test_finish_flushes_carry() {
        let (segments, open) = run(&["end <thi"]);
        assert_eq!(segments, vec![plain("end "), plain("<thi")]);
        assert!(open.is_none());
    }

    #[test]
    fn test_finish_reports_unterminated_tag() {
        let (_, open) = run(&["<edited_content><line_1>a</line_1>"]);
        assert_eq!(open.as_deref(), Some("edited_content"));
    }

    #[test]
    fn test_carry_is_bounded() {
        let mut demux = demux();
        demux.feed("<edited_conten");
        assert!(demux.carry.len() <= demux.max_carry_len());
        demux.feed(">body</edited_conten");
        assert!(demux.carry.len() <= demux.max_carry_len());
    }

    #[test]
    fn test_byte_by_byte_feed() {
        let text = "r<think>t</think>s<edited_content>e</edited_content>";
        let mut demux = demux();
        let mut segments = Vec::new();
        for ch in text.chars() {
            segments.extend(demux.feed(&ch.to_string()));
        }
        segments.extend(demux.finish().segments);

        let reply: String = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Plain(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(reply, "rs");
        assert!(segments.contains(&tagged("think", "t")));
        assert!(segments.contains(&tagged("edited_content", "e")));
    }

    #[test]
    fn test_multibyte_text_around_tags() {
        let (segments, _) = run(&["café <th", "ink>naïve</think> ✓"]);
        assert_eq!(segments[0], plain("café "));
        assert_eq!(segments[2], tagged("think", "naïve"));
        assert_eq!(segments[4], plain(" ✓"));
    }

    #[test]
    fn test_marker_rendering() {
        assert_eq!(Segment::marker("edited_content"), "<edited_content></edited_content>");
    }
}
