// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Line addresses and edit scripts
//!
//! An address is either an existing 1-based line (`3`) or a fractional
//! insertion point (`3.1`, the first new line after line 3). `0.n` inserts
//! before the first line. The textual form is the one shown to the model in
//! `<line_ADDR>` tags, so `Display` and `FromStr` must stay exact inverses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::QuillError;

/// Address of a line targeted by an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LineAddress {
    /// An existing line, 1-based
    Existing(usize),
    /// The `ordinal`-th new line inserted after existing line `after`
    Insert { after: usize, ordinal: u32 },
}

impl LineAddress {
    /// Opening tag for this address, e.g. `<line_2.1>`
    pub fn open_tag(&self) -> String {
        format!("<line_{}>", self)
    }

    /// Closing tag for this address, e.g. `</line_2.1>`
    pub fn close_tag(&self) -> String {
        format!("</line_{}>", self)
    }

    /// Wrap content in this address's tags
    pub fn wrap(&self, content: &str) -> String {
        format!("{}{}{}", self.open_tag(), content, self.close_tag())
    }

    pub fn is_insertion(&self) -> bool {
        matches!(self, LineAddress::Insert { .. })
    }

    /// Whether the address can be applied to an article of `line_count` lines
    pub fn in_range(&self, line_count: usize) -> bool {
        match *self {
            LineAddress::Existing(index) => index >= 1 && index <= line_count,
            LineAddress::Insert { after, .. } => after <= line_count,
        }
    }
}

impl fmt::Display for LineAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineAddress::Existing(index) => write!(f, "{}", index),
            LineAddress::Insert { after, ordinal } => write!(f, "{}.{}", after, ordinal),
        }
    }
}

impl FromStr for LineAddress {
    type Err = QuillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || QuillError::InvalidInput(format!("invalid line address: {:?}", s));
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

        match s.split_once('.') {
            None if all_digits(s) => s
                .parse()
                .map(LineAddress::Existing)
                .map_err(|_| invalid()),
            Some((after, ordinal)) if all_digits(after) && all_digits(ordinal) => {
                Ok(LineAddress::Insert {
                    after: after.parse().map_err(|_| invalid())?,
                    ordinal: ordinal.parse().map_err(|_| invalid())?,
                })
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for LineAddress {
    type Error = QuillError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LineAddress> for String {
    fn from(address: LineAddress) -> Self {
        address.to_string()
    }
}

/// Mapping from line address to new content; empty content deletes a line.
///
/// All addresses in one script refer to the line numbering of the article
/// the script is applied to, never to a partially edited intermediate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditScript {
    entries: BTreeMap<LineAddress, String>,
}

impl EditScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content for an address, returning the content it replaced
    pub fn insert(&mut self, address: LineAddress, content: impl Into<String>) -> Option<String> {
        self.entries.insert(address, content.into())
    }

    /// Builder-style variant of [`EditScript::insert`]
    pub fn with(mut self, address: LineAddress, content: impl Into<String>) -> Self {
        self.insert(address, content);
        self
    }

    pub fn get(&self, address: &LineAddress) -> Option<&str> {
        self.entries.get(address).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in address order: existing lines first, then insertions
    /// ordered by `(after, ordinal)`
    pub fn iter(&self) -> impl Iterator<Item = (&LineAddress, &str)> {
        self.entries.iter().map(|(a, c)| (a, c.as_str()))
    }

    pub fn addresses(&self) -> impl Iterator<Item = &LineAddress> {
        self.entries.keys()
    }

    /// Insertions placed after existing line `after`, in ordinal order
    pub fn insertions_after(&self, after: usize) -> impl Iterator<Item = &str> {
        self.entries
            .range(
                LineAddress::Insert {
                    after,
                    ordinal: u32::MIN,
                }..=LineAddress::Insert {
                    after,
                    ordinal: u32::MAX,
                },
            )
            .map(|(_, content)| content.as_str())
    }

    /// Render the script back into `<line_ADDR>` fragments, one per line
    pub fn to_tagged(&self) -> String {
        self.entries
            .iter()
            .map(|(address, content)| address.wrap(content) + "\n")
            .collect()
    }
}

impl FromIterator<(LineAddress, String)> for EditScript {
    fn from_iter<I: IntoIterator<Item = (LineAddress, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
