//! The patch parser (§4.9): two accepted surface dialects, both lowering to
//! the same typed [`document::PatchDocument`].

pub mod document;
pub mod line_dialect;
pub mod yaml;

use crate::error::DriftPatchError;
use document::PatchDocument;

/// Auto-detects which dialect a patch document is written in by sniffing
/// its first non-blank line, then parses with the matching parser.
pub fn parse(text: &str) -> Result<PatchDocument, DriftPatchError> {
    if line_dialect::looks_like_line_dialect(text) {
        line_dialect::parse(text)
    } else {
        yaml::parse(text)
    }
}
