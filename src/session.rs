//! Per-file in-memory buffer a transaction mutates before commit (§4.6).

use std::path::{Path, PathBuf};

use crate::error::DriftPatchError;
use crate::line_index::split_logical_lines;
use crate::patch::document::NewlineStyle;

#[derive(Debug)]
pub struct FileSession {
    pub path: PathBuf,
    pub buffer: Vec<String>,
    pub newline: NewlineStyle,
    pub had_terminal_newline: bool,
    /// `None` for a session created fresh by `CREATE_FILE` against a path
    /// that did not previously exist.
    pub original_bytes: Option<Vec<u8>>,
    pub dirty: bool,
}

impl FileSession {
    pub fn load(path: &Path) -> Result<Self, DriftPatchError> {
        let bytes = std::fs::read(path).map_err(|error| DriftPatchError::io(path, error))?;
        let text = String::from_utf8(bytes.clone()).map_err(|error| {
            DriftPatchError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, error))
        })?;

        let newline = detect_dominant_newline(&text);
        let (buffer, had_terminal_newline) = split_buffer_lines(&text, newline);

        Ok(Self {
            path: path.to_path_buf(),
            buffer,
            newline,
            had_terminal_newline,
            original_bytes: Some(bytes),
            dirty: false,
        })
    }

    pub fn new_for_create(path: &Path, content: &str, newline: Option<NewlineStyle>) -> Self {
        let newline = newline.unwrap_or(NewlineStyle::Lf);
        // An empty `content` means a genuinely empty file, not "one blank
        // line" — unlike `split_logical_lines`, which treats those as
        // distinct. A non-empty `content` that already ends in a newline
        // (a plausible YAML block-scalar value) must not gain an extra
        // trailing blank line on top of `had_terminal_newline` below.
        let buffer: Vec<String> = if content.is_empty() {
            Vec::new()
        } else {
            split_logical_lines(content)
        };

        Self {
            path: path.to_path_buf(),
            buffer,
            newline,
            had_terminal_newline: true,
            original_bytes: None,
            dirty: true,
        }
    }

    /// Strip trailing horizontal whitespace from every line, rejoin using
    /// the session's detected line ending, and restore the original
    /// terminal-newline presence/absence.
    pub fn finalize(&self) -> Vec<u8> {
        let terminator = self.newline.as_str();
        let mut output = String::new();
        for (index, line) in self.buffer.iter().enumerate() {
            output.push_str(line.trim_end_matches([' ', '\t']));
            if index + 1 < self.buffer.len() {
                output.push_str(terminator);
            }
        }
        if self.had_terminal_newline && !self.buffer.is_empty() {
            output.push_str(terminator);
        }
        output.into_bytes()
    }
}

fn detect_dominant_newline(text: &str) -> NewlineStyle {
    let crlf_count = text.matches("\r\n").count();
    let total_lf = text.matches('\n').count();
    let total_cr = text.matches('\r').count();
    let lone_lf = total_lf.saturating_sub(crlf_count);
    let lone_cr = total_cr.saturating_sub(crlf_count);

    if crlf_count > 0 && crlf_count >= lone_lf && crlf_count >= lone_cr {
        NewlineStyle::CrLf
    } else if lone_cr > lone_lf {
        NewlineStyle::Cr
    } else {
        NewlineStyle::Lf
    }
}

fn split_buffer_lines(text: &str, newline: NewlineStyle) -> (Vec<String>, bool) {
    if text.is_empty() {
        return (Vec::new(), false);
    }

    let terminator = newline.as_str();
    let had_terminal_newline = text.ends_with(terminator);
    let body = if had_terminal_newline {
        &text[..text.len() - terminator.len()]
    } else {
        text
    };

    let buffer = if body.is_empty() && had_terminal_newline {
        Vec::new()
    } else {
        body.split(terminator).map(str::to_string).collect()
    };

    (buffer, had_terminal_newline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_dominant_newline_prefers_crlf_when_present() {
        assert_eq!(detect_dominant_newline("a\r\nb\r\n"), NewlineStyle::CrLf);
        assert_eq!(detect_dominant_newline("a\nb\n"), NewlineStyle::Lf);
        assert_eq!(detect_dominant_newline("a\rb\r"), NewlineStyle::Cr);
    }

    #[test]
    fn split_buffer_lines_tracks_terminal_newline_presence() {
        let (buffer, had_terminal) = split_buffer_lines("a\nb\n", NewlineStyle::Lf);
        assert_eq!(buffer, vec!["a", "b"]);
        assert!(had_terminal);

        let (buffer, had_terminal) = split_buffer_lines("a\nb", NewlineStyle::Lf);
        assert_eq!(buffer, vec!["a", "b"]);
        assert!(!had_terminal);
    }

    #[test]
    fn finalize_strips_trailing_horizontal_whitespace_and_preserves_terminal_newline() {
        let session = FileSession {
            path: PathBuf::from("f.py"),
            buffer: vec!["def f():".to_string(), "    print(\"a\")  \t".to_string()],
            newline: NewlineStyle::Lf,
            had_terminal_newline: true,
            original_bytes: None,
            dirty: true,
        };
        let finalized = session.finalize();
        assert_eq!(finalized, b"def f():\n    print(\"a\")\n".to_vec());
    }

    #[test]
    fn finalize_omits_terminal_newline_when_original_lacked_one() {
        let session = FileSession {
            path: PathBuf::from("f.py"),
            buffer: vec!["a".to_string(), "b".to_string()],
            newline: NewlineStyle::Lf,
            had_terminal_newline: false,
            original_bytes: None,
            dirty: true,
        };
        assert_eq!(session.finalize(), b"a\nb".to_vec());
    }

    #[test]
    fn new_for_create_always_receives_a_terminal_newline() {
        let session = FileSession::new_for_create(Path::new("new.txt"), "hello", None);
        assert_eq!(session.finalize(), b"hello\n".to_vec());
    }

    #[test]
    fn new_for_create_does_not_double_up_a_content_string_s_own_trailing_newline() {
        let session = FileSession::new_for_create(Path::new("new.txt"), "hello\n", None);
        assert_eq!(session.finalize(), b"hello\n".to_vec());
    }

    #[test]
    fn new_for_create_with_empty_content_yields_a_genuinely_empty_file() {
        let session = FileSession::new_for_create(Path::new("new.txt"), "", None);
        assert_eq!(session.finalize(), Vec::<u8>::new());
    }
}
