//! Conflict-marker scanner.
//!
//! Recognizes the standard three-way merge marker syntax:
//!
//! ```text
//! <<<<<<< HEAD
//! current side
//! ||||||| base            (optional, diff3 style)
//! common ancestor
//! =======
//! incoming side
//! >>>>>>> branch
//! ```
//!
//! The scanner is a single linear pass over the lines of the input with four
//! states. It yields borrowed segments so that both the parser and the
//! resolver can reproduce untouched text byte-for-byte.

use crate::types::MergeConflict;

pub const START_MARKER: &str = "<<<<<<< ";
pub const BASE_MARKER: &str = "||||||| ";
pub const SEPARATOR: &str = "=======";
pub const END_MARKER: &str = ">>>>>>> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    Current,
    Base,
    Incoming,
}

/// A conflict block as byte ranges borrowed from the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConflictSpan<'a> {
    pub current: &'a str,
    pub base: Option<&'a str>,
    pub incoming: &'a str,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    /// Text outside any complete conflict block, verbatim.
    Text(&'a str),
    Conflict(ConflictSpan<'a>),
}

/// Split `text` into plain segments and conflict blocks.
///
/// A block whose start marker is never closed is returned as plain text, so
/// concatenating every `Text` segment with every block's raw lines always
/// rebuilds the input.
pub(crate) fn scan(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut state = State::Outside;
    // Start of the pending plain run (or of the open block, while inside one).
    let mut plain_start = 0;
    let mut section_start = 0;
    let mut current = (0, 0);
    let mut base: Option<(usize, usize)> = None;
    let mut block_line = 0;
    let mut offset = 0;

    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let next = offset + line.len();
        let marker = strip_line_ending(line);

        match state {
            State::Outside if marker.starts_with(START_MARKER) => {
                if plain_start < offset {
                    segments.push(Segment::Text(&text[plain_start..offset]));
                }
                plain_start = offset;
                section_start = next;
                base = None;
                block_line = idx;
                state = State::Current;
            }
            State::Current if marker.starts_with(BASE_MARKER) => {
                current = (section_start, offset);
                section_start = next;
                state = State::Base;
            }
            State::Current if marker == SEPARATOR => {
                current = (section_start, offset);
                section_start = next;
                state = State::Incoming;
            }
            State::Base if marker == SEPARATOR => {
                base = Some((section_start, offset));
                section_start = next;
                state = State::Incoming;
            }
            State::Incoming if marker.starts_with(END_MARKER) => {
                segments.push(Segment::Conflict(ConflictSpan {
                    current: &text[current.0..current.1],
                    base: base.map(|(start, end)| &text[start..end]),
                    incoming: &text[section_start..offset],
                    line: block_line,
                }));
                plain_start = next;
                state = State::Outside;
            }
            _ => {}
        }

        offset = next;
    }

    if plain_start < text.len() {
        segments.push(Segment::Text(&text[plain_start..]));
    }

    segments
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Extract every complete conflict block from `text`, in document order.
///
/// Unterminated blocks are dropped silently; this is not an error.
pub fn extract_conflicts(text: &str) -> Vec<MergeConflict> {
    scan(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Conflict(span) => Some(MergeConflict {
                current: span.current.to_string(),
                incoming: span.incoming.to_string(),
                base: span.base.map(str::to_string),
                position: span.line,
            }),
            Segment::Text(_) => None,
        })
        .collect()
}

/// Whether `text` contains at least one complete conflict block.
pub fn has_conflicts(text: &str) -> bool {
    scan(text)
        .iter()
        .any(|segment| matches!(segment, Segment::Conflict(_)))
}
