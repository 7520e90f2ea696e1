//! Reflows inserted/replacement content to the indentation of the location
//! it is being written into (§4.3).

use crate::line_index::split_logical_lines;

/// Leading horizontal whitespace of a single original (un-trimmed) buffer
/// line.
pub fn effective_indent(original_line: &str) -> &str {
    let trimmed_start = original_line.trim_start();
    &original_line[..original_line.len() - trimmed_start.len()]
}

/// Prepend `indent` to every non-blank line of `content`, leaving blank
/// lines blank and preserving content's own relative indentation.
///
/// Splits on `split_logical_lines`, not `str::lines`, so a `content` that is
/// itself a single blank line (including the empty string) still reindents
/// to one blank output line instead of vanishing.
pub fn reindent_content(content: &str, indent: &str) -> Vec<String> {
    split_logical_lines(content)
        .into_iter()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect()
}
