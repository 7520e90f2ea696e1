//! Resolves anchors and snippets to byte/line ranges in a file buffer under
//! the normalized matching discipline of [`crate::line_index`].

use crate::error::DriftPatchError;
use crate::line_index::{normalize_buffer, normalize_pattern};

/// An inclusive range of original (un-normalized) buffer line indices,
/// 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn single(line: usize) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Where a snippet search is allowed to look: the whole buffer, or the
/// region strictly after an anchor's last matched line.
#[derive(Debug, Clone, Copy)]
pub enum Scope {
    WholeFile,
    After(usize),
}

/// Context passed to every locate call so errors can name the offending
/// file and 1-based modification index (§7).
#[derive(Debug, Clone, Copy)]
pub struct LocateContext<'a> {
    pub file: &'a str,
    pub modification: usize,
}

fn require_nonempty_pattern(
    pattern: &[String],
    context: LocateContext<'_>,
) -> Result<(), DriftPatchError> {
    if pattern.is_empty() {
        return Err(DriftPatchError::EmptyPattern {
            file: context.file.to_string(),
            modification: context.modification,
        });
    }
    Ok(())
}

/// All contiguous matches of `pattern` inside `normalized`, returned as
/// (first, last) inclusive indices into the *normalized* sequence.
fn find_normalized_matches(normalized: &[String], pattern: &[String]) -> Vec<(usize, usize)> {
    if pattern.is_empty() || normalized.len() < pattern.len() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for start in 0..=(normalized.len() - pattern.len()) {
        if normalized[start..start + pattern.len()] == *pattern {
            matches.push((start, start + pattern.len() - 1));
        }
    }
    matches
}

/// Restrict a buffer's normalized view to lines at-or-after `scope`, keeping
/// the mapping back to original buffer indices intact.
fn scoped_normalized_lines(
    buffer: &[String],
    scope: Scope,
) -> crate::line_index::NormalizedLines {
    match scope {
        Scope::WholeFile => normalize_buffer(buffer),
        Scope::After(anchor_last_line) => {
            let tail_start = anchor_last_line + 1;
            if tail_start >= buffer.len() {
                crate::line_index::NormalizedLines {
                    lines: Vec::new(),
                    origins: Vec::new(),
                }
            } else {
                let mut normalized = normalize_buffer(&buffer[tail_start..]);
                for origin in &mut normalized.origins {
                    *origin += tail_start;
                }
                normalized
            }
        }
    }
}

pub fn locate_anchor(
    buffer: &[String],
    anchor_text: &str,
    context: LocateContext<'_>,
) -> Result<LineRange, DriftPatchError> {
    let pattern = normalize_pattern(anchor_text);
    require_nonempty_pattern(&pattern, context)?;

    let normalized = normalize_buffer(buffer);
    let matches = find_normalized_matches(&normalized.lines, &pattern);

    match matches.as_slice() {
        [] => Err(DriftPatchError::AnchorNotFound {
            file: context.file.to_string(),
            modification: context.modification,
            anchor: anchor_text.to_string(),
        }),
        [(first, last)] => Ok(LineRange {
            start: normalized.origins[*first],
            end: normalized.origins[*last],
        }),
        multiple => Err(DriftPatchError::AnchorAmbiguous {
            file: context.file.to_string(),
            modification: context.modification,
            anchor: anchor_text.to_string(),
            count: multiple.len(),
        }),
    }
}

pub fn locate_snippet(
    buffer: &[String],
    snippet_text: &str,
    scope: Scope,
    context: LocateContext<'_>,
) -> Result<LineRange, DriftPatchError> {
    let pattern = normalize_pattern(snippet_text);
    require_nonempty_pattern(&pattern, context)?;

    let normalized = scoped_normalized_lines(buffer, scope);
    let matches = find_normalized_matches(&normalized.lines, &pattern);

    let is_anchored = matches!(scope, Scope::After(_));
    if is_anchored {
        match matches.first() {
            Some((first, last)) => Ok(LineRange {
                start: normalized.origins[*first],
                end: normalized.origins[*last],
            }),
            None => Err(DriftPatchError::SnippetNotFound {
                file: context.file.to_string(),
                modification: context.modification,
            }),
        }
    } else {
        match matches.as_slice() {
            [] => Err(DriftPatchError::SnippetNotFound {
                file: context.file.to_string(),
                modification: context.modification,
            }),
            [(first, last)] => Ok(LineRange {
                start: normalized.origins[*first],
                end: normalized.origins[*last],
            }),
            multiple => Err(DriftPatchError::SnippetAmbiguous {
                file: context.file.to_string(),
                modification: context.modification,
                count: multiple.len(),
            }),
        }
    }
}

pub fn locate_range(
    buffer: &[String],
    start_snippet: &str,
    end_snippet: &str,
    scope: Scope,
    context: LocateContext<'_>,
) -> Result<LineRange, DriftPatchError> {
    let start_range = locate_snippet(buffer, start_snippet, scope, context)?;
    let end_pattern = normalize_pattern(end_snippet);
    require_nonempty_pattern(&end_pattern, context)?;

    let normalized = normalize_buffer(buffer);
    let candidates: Vec<(usize, usize)> = find_normalized_matches(&normalized.lines, &end_pattern)
        .into_iter()
        .filter(|(first, _last)| normalized.origins[*first] > start_range.end)
        .collect();

    match candidates.first() {
        Some((_first, last)) => Ok(LineRange {
            start: start_range.start,
            end: normalized.origins[*last],
        }),
        None => Err(DriftPatchError::EndSnippetNotFound {
            file: context.file.to_string(),
            modification: context.modification,
        }),
    }
}

/// Expand a located range upward/downward through up to `leading`/`trailing`
/// contiguous blank lines immediately surrounding it.
pub fn expand_with_blank_lines(
    buffer: &[String],
    range: LineRange,
    leading: usize,
    trailing: usize,
) -> LineRange {
    let mut start = range.start;
    for _ in 0..leading {
        if start == 0 {
            break;
        }
        let candidate = start - 1;
        if crate::line_index::is_blank_line(&buffer[candidate]) {
            start = candidate;
        } else {
            break;
        }
    }

    let mut end = range.end;
    for _ in 0..trailing {
        let candidate = end + 1;
        if candidate >= buffer.len() {
            break;
        }
        if crate::line_index::is_blank_line(&buffer[candidate]) {
            end = candidate;
        } else {
            break;
        }
    }

    LineRange { start, end }
}
