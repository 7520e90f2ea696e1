//! Line normalization: the shared discipline the locator uses to compare
//! snippet/anchor text against a target file's buffer.
//!
//! A normalized line is a source line with leading and trailing horizontal
//! whitespace trimmed; blank lines (empty after trim) are dropped entirely.
//! Matching therefore depends only on trimmed, non-blank content, which is
//! what makes the locator resilient to reindentation and blank-line churn.

/// A buffer's lines with blank lines removed and trimmed, plus a mapping
/// back to each surviving line's index in the original (un-normalized)
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLines {
    pub lines: Vec<String>,
    pub origins: Vec<usize>,
}

impl NormalizedLines {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

pub fn is_blank_line(line: &str) -> bool {
    line.trim().is_empty()
}

/// Normalize a target file's buffer (one entry per original line, no
/// newline characters).
pub fn normalize_buffer(lines: &[String]) -> NormalizedLines {
    let mut normalized = Vec::new();
    let mut origins = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            normalized.push(trimmed.to_string());
            origins.push(index);
        }
    }
    NormalizedLines {
        lines: normalized,
        origins,
    }
}

/// Normalize a snippet/anchor/content pattern supplied by the patch document
/// into the same trimmed, non-blank line sequence used for the buffer.
pub fn normalize_pattern(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits raw `content` (as supplied in a patch document) into logical
/// lines: a single trailing line terminator (`\n` or `\r\n`) is treated as
/// terminating the content, not as an extra trailing blank line — the same
/// discipline `FileSession` uses when reading an existing file from disk.
/// Unlike `str::lines`, a wholly-empty or newline-only `content` still
/// yields one (blank) line rather than none, since `content` standing for
/// "one blank line" is a deliberate patch author choice, distinct from
/// `DELETE`.
pub fn split_logical_lines(content: &str) -> Vec<String> {
    let body = content
        .strip_suffix('\n')
        .map(|body| body.strip_suffix('\r').unwrap_or(body))
        .unwrap_or(content);
    body.split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_buffer_drops_blank_lines_and_tracks_origins() {
        let lines = vec![
            "def f():".to_string(),
            "".to_string(),
            "    print(\"a\")  ".to_string(),
            "   ".to_string(),
        ];
        let normalized = normalize_buffer(&lines);
        assert_eq!(normalized.lines, vec!["def f():", "print(\"a\")"]);
        assert_eq!(normalized.origins, vec![0, 2]);
    }

    #[test]
    fn normalize_pattern_trims_each_line_and_drops_blanks() {
        let pattern = normalize_pattern("  a line  \n\n  another  \n   \n");
        assert_eq!(pattern, vec!["a line", "another"]);
    }

    #[test]
    fn all_whitespace_pattern_normalizes_to_empty() {
        assert!(normalize_pattern("   \n\t\n  ").is_empty());
    }

    #[test]
    fn split_logical_lines_treats_a_single_trailing_newline_as_a_terminator() {
        assert_eq!(split_logical_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_logical_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(split_logical_lines("a\r\nb\r\n"), vec!["a", "b"]);
    }

    #[test]
    fn split_logical_lines_of_blank_content_yields_one_blank_line() {
        assert_eq!(split_logical_lines(""), vec![""]);
        assert_eq!(split_logical_lines("\n"), vec![""]);
    }

    #[test]
    fn split_logical_lines_keeps_an_interior_blank_line() {
        assert_eq!(split_logical_lines("a\n\nb\n"), vec!["a", "", "b"]);
    }
}
