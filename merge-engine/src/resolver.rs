//! Side-picking conflict resolver.
//!
//! Rewrites a conflicted file by keeping one side of every complete conflict
//! block and dropping the other side together with all marker lines. Text
//! outside conflict blocks (including unterminated blocks) is copied through
//! untouched; no re-encoding or line-ending normalization happens.

use crate::parser::{self, Segment};
use crate::types::Choice;

/// Resolve every conflict in `text` by keeping the `choice` side.
pub fn resolve(text: &str, choice: Choice) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in parser::scan(text) {
        match segment {
            Segment::Text(plain) => out.push_str(plain),
            Segment::Conflict(span) => out.push_str(match choice {
                Choice::Current => span.current,
                Choice::Incoming => span.incoming,
            }),
        }
    }
    out
}
