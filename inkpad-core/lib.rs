//! Text primitives shared by the inkpad crates.

pub mod chars;
pub mod line_ending;
pub mod link;

/// Placeholder char used for non-text atoms (images) in plain-text
/// projections of a document.
pub const OBJECT_REPLACEMENT: char = '\u{FFFC}';
