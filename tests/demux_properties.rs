// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use proptest::prelude::*;
use quill::stream::{ChannelBuffers, Segment, TagDemux};

const TAGS: [&str; 2] = ["think", "edit"];

/// A piece of generated model output: plain text, or text wrapped in a tag
#[derive(Debug, Clone)]
struct Piece {
    tag: Option<&'static str>,
    text: String,
}

fn arb_piece() -> impl Strategy<Value = Piece> {
    (0usize..3, "[thinkedx</> ]{0,10}").prop_map(|(kind, text)| Piece {
        tag: match kind {
            0 => None,
            1 => Some(TAGS[0]),
            _ => Some(TAGS[1]),
        },
        text,
    })
}

fn render(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .map(|piece| match piece.tag {
            None => piece.text.clone(),
            Some(tag) => format!("<{tag}>{}</{tag}>", piece.text),
        })
        .collect()
}

/// Plain runs must not spell a recognized open tag, and tagged text must not
/// spell its own close tag; otherwise the rendering is not the intended
/// structure.
fn well_formed(pieces: &[Piece]) -> bool {
    let mut plain_run = String::new();
    for piece in pieces {
        match piece.tag {
            None => plain_run.push_str(&piece.text),
            Some(tag) => {
                if TAGS.iter().any(|t| plain_run.contains(&format!("<{t}>"))) {
                    return false;
                }
                plain_run.clear();
                if piece.text.contains(&format!("</{tag}>")) {
                    return false;
                }
            }
        }
    }
    !TAGS.iter().any(|t| plain_run.contains(&format!("<{t}>")))
}

fn split_by_sizes(text: &str, sizes: &[usize]) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut fragments = Vec::new();
    let mut at = 0;
    let mut sizes = sizes.iter().cycle();
    while at < chars.len() {
        let size = sizes.next().copied().unwrap_or(1).max(1);
        let end = (at + size).min(chars.len());
        fragments.push(chars[at..end].iter().collect());
        at = end;
    }
    fragments
}

fn run(fragments: &[String]) -> (Vec<Segment>, Option<String>) {
    let mut demux = TagDemux::new(TAGS);
    let mut segments = Vec::new();
    for fragment in fragments {
        segments.extend(demux.feed(fragment));
    }
    let tail = demux.finish();
    segments.extend(tail.segments);
    (segments, tail.unterminated)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_reassembly_is_lossless(
        pieces in prop::collection::vec(arb_piece(), 0..8),
        sizes in prop::collection::vec(1usize..8, 1..6),
    ) {
        prop_assume!(well_formed(&pieces));
        let raw = render(&pieces);
        let (segments, unterminated) = run(&split_by_sizes(&raw, &sizes));

        let reassembled: String = segments.iter().filter_map(Segment::text).collect();
        let expected: String = pieces.iter().map(|p| p.text.as_str()).collect();
        prop_assert_eq!(reassembled, expected);
        prop_assert_eq!(unterminated, None);
    }

    #[test]
    fn prop_channels_match_pieces(
        pieces in prop::collection::vec(arb_piece(), 0..8),
        sizes in prop::collection::vec(1usize..8, 1..6),
    ) {
        prop_assume!(well_formed(&pieces));
        let raw = render(&pieces);
        let (segments, _) = run(&split_by_sizes(&raw, &sizes));

        let mut buffers = ChannelBuffers::new();
        buffers.absorb_all(&segments);

        let expected_plain: String = pieces.iter().filter(|p| p.tag.is_none()).map(|p| p.text.as_str()).collect();
        prop_assert_eq!(buffers.plain(), expected_plain.as_str());
        for tag in TAGS {
            let expected: String = pieces.iter().filter(|p| p.tag == Some(tag)).map(|p| p.text.as_str()).collect();
            prop_assert_eq!(buffers.tagged(tag), expected.as_str());
        }

        let opened = segments.iter().filter(|s| matches!(s, Segment::Opened(_))).count();
        prop_assert_eq!(opened, pieces.iter().filter(|p| p.tag.is_some()).count());
    }

    #[test]
    fn prop_fragmentation_does_not_change_output(
        pieces in prop::collection::vec(arb_piece(), 0..8),
        sizes in prop::collection::vec(1usize..8, 1..6),
    ) {
        prop_assume!(well_formed(&pieces));
        let raw = render(&pieces);

        let mut whole = ChannelBuffers::new();
        whole.absorb_all(&run(&[raw.clone()]).0);
        let mut chunked = ChannelBuffers::new();
        chunked.absorb_all(&run(&split_by_sizes(&raw, &sizes)).0);

        prop_assert_eq!(whole, chunked);
    }
}

#[test]
fn test_unclosed_tag_is_reported() {
    let (segments, unterminated) = run(&["before<edit>par".to_string(), "tial".to_string()]);
    assert_eq!(unterminated.as_deref(), Some("edit"));
    let text: String = segments.iter().filter_map(Segment::text).collect();
    assert_eq!(text, "beforepartial");
}
