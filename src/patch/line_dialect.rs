//! The line-prefixed patch dialect (§4.9, §9 open question, resolved).
//!
//! Some upstream tooling emits patches as plain directive lines instead of
//! YAML. Every directive line in a document is prefixed with the same
//! short random hex token, chosen once per document and declared in the
//! document's header line, so the parser can tell a directive apart from
//! snippet/content text that happens to look like one:
//!
//! ```text
//! #!driftpatch:a1b2c3d4
//! a1b2c3d4 VERSION 2.0
//! a1b2c3d4 FILE src/app.py
//! a1b2c3d4 MODIFICATION REPLACE
//! a1b2c3d4 ANCHOR function configure() {
//! a1b2c3d4 BEGIN_SNIPPET
//! setting: "default"
//! a1b2c3d4 END_SNIPPET
//! a1b2c3d4 BEGIN_CONTENT
//! setting: "overridden"
//! a1b2c3d4 END_CONTENT
//! a1b2c3d4 END_MODIFICATION
//! a1b2c3d4 END_FILE
//! ```
//!
//! `DELETE` omits `BEGIN_CONTENT`/`END_CONTENT`; `CREATE_FILE` omits the
//! snippet block entirely; a range locator uses
//! `BEGIN_START_SNIPPET`/`END_START_SNIPPET` and
//! `BEGIN_END_SNIPPET`/`END_END_SNIPPET` instead of a single snippet block.
//! Lowers to the same [`PatchDocument`] the YAML dialect produces.

use std::path::PathBuf;

use crate::error::DriftPatchError;
use crate::patch::document::{
    Action, FileChange, Modification, NewlineStyle, PatchDocument, SnippetLocator,
};

/// True when the document's first non-blank line looks like this dialect's
/// header, so `patch::mod` can sniff which parser to use.
pub fn looks_like_line_dialect(text: &str) -> bool {
    text.lines()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| line.trim_start().starts_with("#!driftpatch:"))
}

struct Directive {
    keyword: String,
    args: String,
    line_number: usize,
}

struct Cursor<'a> {
    lines: Vec<&'a str>,
    position: usize,
    token: String,
}

impl<'a> Cursor<'a> {
    fn next_directive(&mut self) -> Result<Option<Directive>, DriftPatchError> {
        while self.position < self.lines.len() {
            let line = self.lines[self.position];
            let line_number = self.position + 1;
            if line.trim().is_empty() {
                self.position += 1;
                continue;
            }
            let prefix = format!("{} ", self.token);
            match line.strip_prefix(prefix.as_str()) {
                Some(rest) => {
                    self.position += 1;
                    let (keyword, args) = match rest.split_once(' ') {
                        Some((keyword, args)) => (keyword.to_string(), args.trim().to_string()),
                        None => (rest.trim().to_string(), String::new()),
                    };
                    return Ok(Some(Directive {
                        keyword,
                        args,
                        line_number,
                    }));
                }
                None => {
                    return Err(DriftPatchError::malformed(format!(
                        "line {line_number}: expected a directive prefixed with '{}'",
                        self.token
                    )));
                }
            }
        }
        Ok(None)
    }

    fn expect_directive(&mut self, expected: &str) -> Result<Directive, DriftPatchError> {
        match self.next_directive()? {
            Some(directive) if directive.keyword == expected => Ok(directive),
            Some(directive) => Err(DriftPatchError::malformed(format!(
                "line {}: expected '{expected}', found '{}'",
                directive.line_number, directive.keyword
            ))),
            None => Err(DriftPatchError::malformed(format!(
                "expected '{expected}' before end of document"
            ))),
        }
    }

    /// Reads raw body lines (unprefixed, verbatim) until the matching
    /// `END_<section>` directive.
    fn read_body(&mut self, end_keyword: &str) -> Result<String, DriftPatchError> {
        let mut collected = Vec::new();
        loop {
            if self.position >= self.lines.len() {
                return Err(DriftPatchError::malformed(format!(
                    "expected '{end_keyword}' before end of document"
                )));
            }
            let line = self.lines[self.position];
            let prefix = format!("{} {end_keyword}", self.token);
            if line == prefix || line.starts_with(&format!("{prefix} ")) {
                self.position += 1;
                break;
            }
            collected.push(line);
            self.position += 1;
        }
        Ok(collected.join("\n"))
    }
}

fn parse_locator(
    cursor: &mut Cursor<'_>,
    pending_keyword: &mut Option<Directive>,
) -> Result<SnippetLocator, DriftPatchError> {
    let directive = match pending_keyword.take() {
        Some(directive) => directive,
        None => cursor.next_directive()?.ok_or_else(|| {
            DriftPatchError::malformed("expected a snippet or start_snippet block")
        })?,
    };

    match directive.keyword.as_str() {
        "BEGIN_SNIPPET" => {
            let snippet = cursor.read_body("END_SNIPPET")?;
            Ok(SnippetLocator::Point(snippet))
        }
        "BEGIN_START_SNIPPET" => {
            let start = cursor.read_body("END_START_SNIPPET")?;
            cursor.expect_directive("BEGIN_END_SNIPPET")?;
            let end = cursor.read_body("END_END_SNIPPET")?;
            Ok(SnippetLocator::Range { start, end })
        }
        other => Err(DriftPatchError::malformed(format!(
            "line {}: expected 'BEGIN_SNIPPET' or 'BEGIN_START_SNIPPET', found '{other}'",
            directive.line_number
        ))),
    }
}

fn parse_modification(cursor: &mut Cursor<'_>, action_name: String) -> Result<Modification, DriftPatchError> {
    let mut anchor = None;
    let mut leading = 0usize;
    let mut trailing = 0usize;
    let mut pending: Option<Directive> = None;

    loop {
        let directive = cursor
            .next_directive()?
            .ok_or_else(|| DriftPatchError::malformed("expected 'END_MODIFICATION' before end of document"))?;

        match directive.keyword.as_str() {
            "ANCHOR" => anchor = Some(directive.args.clone()),
            "INCLUDE_LEADING_BLANK_LINES" => {
                leading = parse_blank_line_count(&directive)?;
            }
            "INCLUDE_TRAILING_BLANK_LINES" => {
                trailing = parse_blank_line_count(&directive)?;
            }
            "BEGIN_SNIPPET" | "BEGIN_START_SNIPPET" | "BEGIN_CONTENT" => {
                pending = Some(directive);
                break;
            }
            "END_MODIFICATION" if action_name == "CREATE_FILE" => {
                return Err(DriftPatchError::malformed(
                    "CREATE_FILE requires a BEGIN_CONTENT block",
                ));
            }
            other => {
                return Err(DriftPatchError::malformed(format!(
                    "line {}: unexpected directive '{other}' inside a modification",
                    directive.line_number
                )));
            }
        }
    }

    let action = match action_name.as_str() {
        "REPLACE" => {
            let locator = parse_locator(cursor, &mut pending)?;
            let content = read_content_block(cursor)?;
            Action::Replace { locator, content }
        }
        "DELETE" => {
            let locator = parse_locator(cursor, &mut pending)?;
            Action::Delete { locator }
        }
        "INSERT_AFTER" | "INSERT_BEFORE" => {
            let snippet = match pending.take() {
                Some(directive) if directive.keyword == "BEGIN_SNIPPET" => {
                    cursor.read_body("END_SNIPPET")?
                }
                Some(directive) => {
                    return Err(DriftPatchError::malformed(format!(
                        "line {}: INSERT_AFTER/INSERT_BEFORE accept only a point snippet",
                        directive.line_number
                    )));
                }
                None => {
                    return Err(DriftPatchError::malformed(
                        "expected a BEGIN_SNIPPET block",
                    ));
                }
            };
            let content = read_content_block(cursor)?;
            if action_name == "INSERT_AFTER" {
                Action::InsertAfter { snippet, content }
            } else {
                Action::InsertBefore { snippet, content }
            }
        }
        "CREATE_FILE" => {
            let content = match pending.take() {
                Some(directive) if directive.keyword == "BEGIN_CONTENT" => {
                    cursor.read_body("END_CONTENT")?
                }
                _ => {
                    return Err(DriftPatchError::malformed(
                        "CREATE_FILE requires a BEGIN_CONTENT block",
                    ));
                }
            };
            Action::CreateFile { content }
        }
        other => {
            return Err(DriftPatchError::malformed(format!(
                "'{other}' is not a recognized action"
            )));
        }
    };

    cursor.expect_directive("END_MODIFICATION")?;

    Ok(Modification {
        action,
        anchor,
        include_leading_blank_lines: leading,
        include_trailing_blank_lines: trailing,
    })
}

/// Reads the `BEGIN_CONTENT`/`END_CONTENT` block that follows a snippet (or
/// immediately opens a `CREATE_FILE` modification, handled separately).
fn read_content_block(cursor: &mut Cursor<'_>) -> Result<String, DriftPatchError> {
    cursor.expect_directive("BEGIN_CONTENT")?;
    cursor.read_body("END_CONTENT")
}

fn parse_blank_line_count(directive: &Directive) -> Result<usize, DriftPatchError> {
    directive.args.parse::<usize>().map_err(|_| {
        DriftPatchError::malformed(format!(
            "line {}: '{}' is not a non-negative integer",
            directive.line_number, directive.args
        ))
    })
}

fn parse_file_change(cursor: &mut Cursor<'_>, file_args: &str) -> Result<FileChange, DriftPatchError> {
    let mut parts = file_args.splitn(2, "NEWLINE=");
    let file_path = parts.next().unwrap_or("").trim().to_string();
    let newline = match parts.next() {
        Some(value) => Some(NewlineStyle::parse(value.trim()).ok_or_else(|| {
            DriftPatchError::malformed(format!(
                "'{}' is not a recognized newline style (expected LF, CRLF, or CR)",
                value.trim()
            ))
        })?),
        None => None,
    };

    let mut modifications = Vec::new();
    loop {
        let directive = cursor
            .next_directive()?
            .ok_or_else(|| DriftPatchError::malformed("expected 'END_FILE' before end of document"))?;
        match directive.keyword.as_str() {
            "MODIFICATION" => {
                modifications.push(parse_modification(cursor, directive.args)?);
            }
            "END_FILE" => break,
            other => {
                return Err(DriftPatchError::malformed(format!(
                    "line {}: unexpected directive '{other}' inside a file change",
                    directive.line_number
                )));
            }
        }
    }

    Ok(FileChange {
        file_path: PathBuf::from(file_path),
        modifications,
        newline,
    })
}

pub fn parse(text: &str) -> Result<PatchDocument, DriftPatchError> {
    let lines: Vec<&str> = text.lines().collect();
    let (header_index, header) = lines
        .iter()
        .enumerate()
        .find(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| (index, *line))
        .ok_or_else(|| DriftPatchError::malformed("patch document is empty"))?;
    let token = header
        .trim_start()
        .strip_prefix("#!driftpatch:")
        .filter(|candidate| {
            !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_hexdigit())
        })
        .ok_or_else(|| {
            DriftPatchError::malformed("expected a '#!driftpatch:<hex-token>' header line")
        })?
        .to_string();

    let mut cursor = Cursor {
        lines,
        position: header_index + 1,
        token,
    };

    let mut version = None;
    let mut changes = Vec::new();

    while let Some(directive) = cursor.next_directive()? {
        match directive.keyword.as_str() {
            "VERSION" => version = Some(directive.args),
            "FILE" => changes.push(parse_file_change(&mut cursor, &directive.args)?),
            other => {
                return Err(DriftPatchError::malformed(format!(
                    "line {}: unexpected top-level directive '{other}'",
                    directive.line_number
                )));
            }
        }
    }

    let version = version
        .ok_or_else(|| DriftPatchError::malformed("missing 'VERSION' directive"))?;

    Ok(PatchDocument { version, changes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_like_line_dialect_detects_the_header() {
        assert!(looks_like_line_dialect("#!driftpatch:a1b2c3d4\n..."));
        assert!(!looks_like_line_dialect("version: \"2.0\"\nchanges: []\n"));
    }

    #[test]
    fn parses_a_point_replace_with_anchor() {
        let text = concat!(
            "#!driftpatch:a1b2c3d4\n",
            "a1b2c3d4 VERSION 2.0\n",
            "a1b2c3d4 FILE config.txt\n",
            "a1b2c3d4 MODIFICATION REPLACE\n",
            "a1b2c3d4 ANCHOR function configure() {\n",
            "a1b2c3d4 BEGIN_SNIPPET\n",
            "setting: \"default\"\n",
            "a1b2c3d4 END_SNIPPET\n",
            "a1b2c3d4 BEGIN_CONTENT\n",
            "setting: \"overridden\"\n",
            "a1b2c3d4 END_CONTENT\n",
            "a1b2c3d4 END_MODIFICATION\n",
            "a1b2c3d4 END_FILE\n",
        );

        let document = parse(text).unwrap();
        assert_eq!(document.version, "2.0");
        assert_eq!(document.changes.len(), 1);
        let modification = &document.changes[0].modifications[0];
        assert_eq!(modification.anchor.as_deref(), Some("function configure() {"));
        match &modification.action {
            Action::Replace { locator, content } => {
                assert_eq!(locator, &SnippetLocator::Point("setting: \"default\"".to_string()));
                assert_eq!(content, "setting: \"overridden\"");
            }
            other => panic!("expected Replace, got {other:?}"),
        }
    }

    #[test]
    fn parses_a_range_delete_with_trailing_blank_lines() {
        let text = concat!(
            "#!driftpatch:ff00ff00\n",
            "ff00ff00 VERSION 2.0\n",
            "ff00ff00 FILE f.py\n",
            "ff00ff00 MODIFICATION DELETE\n",
            "ff00ff00 INCLUDE_TRAILING_BLANK_LINES 1\n",
            "ff00ff00 BEGIN_START_SNIPPET\n",
            "def get_pi():\n",
            "ff00ff00 END_START_SNIPPET\n",
            "ff00ff00 BEGIN_END_SNIPPET\n",
            "return 3.14\n",
            "ff00ff00 END_END_SNIPPET\n",
            "ff00ff00 END_MODIFICATION\n",
            "ff00ff00 END_FILE\n",
        );

        let document = parse(text).unwrap();
        let modification = &document.changes[0].modifications[0];
        assert_eq!(modification.include_trailing_blank_lines, 1);
        assert!(matches!(
            modification.action,
            Action::Delete {
                locator: SnippetLocator::Range { .. }
            }
        ));
    }

    #[test]
    fn parses_create_file_with_no_snippet() {
        let text = concat!(
            "#!driftpatch:12345678\n",
            "12345678 VERSION 2.0\n",
            "12345678 FILE new.txt\n",
            "12345678 MODIFICATION CREATE_FILE\n",
            "12345678 BEGIN_CONTENT\n",
            "hello\n",
            "12345678 END_CONTENT\n",
            "12345678 END_MODIFICATION\n",
            "12345678 END_FILE\n",
        );

        let document = parse(text).unwrap();
        assert!(matches!(
            document.changes[0].modifications[0].action,
            Action::CreateFile { .. }
        ));
    }

    #[test]
    fn rejects_a_line_that_is_neither_blank_nor_a_directive() {
        let text = concat!(
            "#!driftpatch:a1b2c3d4\n",
            "a1b2c3d4 VERSION 2.0\n",
            "this line is not a directive\n",
        );
        let error = parse(text).unwrap_err();
        assert!(matches!(error, DriftPatchError::MalformedPatch { .. }));
    }
}
