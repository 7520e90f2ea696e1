//! Decides whether a modification's intended effect is already present in
//! the buffer, so the transaction driver can silently skip it (§4.4).

use crate::locator::LineRange;

/// Byte-identical comparison after trailing-whitespace normalization, line
/// by line (finalize() strips trailing horizontal whitespace, so the
/// comparison must too, or a previously-applied edit with trailing spaces
/// would never be recognized as already-applied).
fn lines_match(buffer_lines: &[String], expected_lines: &[String]) -> bool {
    if buffer_lines.len() != expected_lines.len() {
        return false;
    }
    buffer_lines
        .iter()
        .zip(expected_lines.iter())
        .all(|(actual, expected)| actual.trim_end() == expected.trim_end())
}

/// REPLACE is a no-op when the located region already equals the indented
/// content.
pub fn replace_is_noop(buffer: &[String], range: LineRange, content_lines: &[String]) -> bool {
    lines_match(&buffer[range.start..=range.end], content_lines)
}

/// INSERT_AFTER is a no-op when the lines immediately following the
/// snippet's last line already equal the indented content.
pub fn insert_after_is_noop(
    buffer: &[String],
    snippet_range: LineRange,
    content_lines: &[String],
) -> bool {
    let start = snippet_range.end + 1;
    let end = start + content_lines.len();
    if end > buffer.len() {
        return false;
    }
    lines_match(&buffer[start..end], content_lines)
}

/// INSERT_BEFORE is a no-op when the lines immediately preceding the
/// snippet's first line already equal the indented content.
pub fn insert_before_is_noop(
    buffer: &[String],
    snippet_range: LineRange,
    content_lines: &[String],
) -> bool {
    if content_lines.len() > snippet_range.start {
        return false;
    }
    let end = snippet_range.start;
    let start = end - content_lines.len();
    lines_match(&buffer[start..end], content_lines)
}

/// CREATE_FILE is a no-op when the target exists with byte-identical
/// content.
pub fn create_file_is_noop(existing: Option<&[u8]>, content: &[u8]) -> bool {
    existing.is_some_and(|bytes| bytes == content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn replace_is_noop_when_region_already_matches_content() {
        let buffer = buf("def f():\n    print(\"b\")\n");
        assert!(replace_is_noop(
            &buffer,
            LineRange { start: 1, end: 1 },
            &["    print(\"b\")".to_string()]
        ));
    }

    #[test]
    fn replace_is_noop_tolerates_trailing_whitespace_drift() {
        let buffer = buf("x = 1  \n");
        assert!(replace_is_noop(
            &buffer,
            LineRange { start: 0, end: 0 },
            &["x = 1".to_string()]
        ));
    }

    #[test]
    fn insert_after_is_noop_when_already_present() {
        let buffer = buf("a\nx\nb\n");
        assert!(insert_after_is_noop(
            &buffer,
            LineRange { start: 0, end: 0 },
            &["x".to_string()]
        ));
        assert!(!insert_after_is_noop(
            &buffer,
            LineRange { start: 0, end: 0 },
            &["y".to_string()]
        ));
    }

    #[test]
    fn insert_before_is_noop_when_already_present() {
        let buffer = buf("a\nx\nb\n");
        assert!(insert_before_is_noop(
            &buffer,
            LineRange { start: 2, end: 2 },
            &["x".to_string()]
        ));
    }

    #[test]
    fn create_file_is_noop_only_on_byte_identical_existing_content() {
        assert!(create_file_is_noop(Some(b"same"), b"same"));
        assert!(!create_file_is_noop(Some(b"different"), b"same"));
        assert!(!create_file_is_noop(None, b"same"));
    }
}
