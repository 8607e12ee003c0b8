//! Pattern matching for SSH key text.
//!
//! A pattern is an arbitrary regular expression tested against both the
//! fingerprint and the authorized key text of every candidate.

mod cell;
mod pattern;

pub use cell::{PatternCell, PatternReader, PatternUpdate};
pub use pattern::{MatchResult, Pattern};
