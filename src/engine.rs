//! The transaction driver (§4.7): parses a patch, opens file-sessions
//! lazily, and drives locate → idempotency check → mutate across every
//! modification in document order. Any unrecovered error aborts before a
//! single byte reaches disk; callers hand the resolved sessions to
//! [`crate::commit`] to make them durable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::DriftPatchError;
use crate::idempotency::{
    create_file_is_noop, insert_after_is_noop, insert_before_is_noop, replace_is_noop,
};
use crate::indent::{effective_indent, reindent_content};
use crate::locator::{
    expand_with_blank_lines, locate_anchor, locate_range, locate_snippet, LineRange,
    LocateContext, Scope,
};
use crate::mutator::{delete_range, insert_after, insert_before, replace_range};
use crate::patch::document::{
    validate_relative_path, Action, FileChange, Modification, PatchDocument, SnippetLocator,
};
use crate::session::FileSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationOutcome {
    Applied,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ModificationReport {
    pub file: PathBuf,
    pub index: usize,
    pub action: &'static str,
    pub outcome: ModificationOutcome,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub file: PathBuf,
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct TransactionReport {
    pub modifications: Vec<ModificationReport>,
    pub files: Vec<FileReport>,
}

/// Drives one patch document against a target tree rooted at `root`,
/// entirely in memory. Never touches disk beyond the reads needed to load
/// each file-session.
pub struct Transaction {
    root: PathBuf,
}

impl Transaction {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Parses nothing (the caller already has a [`PatchDocument`]);
    /// validates, then resolves every modification against lazily-opened
    /// file-sessions. Returns the finalized sessions (keyed by relative
    /// path, sorted for deterministic commit ordering) plus a report for
    /// `--dry-run`/`--verbose` rendering.
    pub fn resolve(
        &self,
        document: &PatchDocument,
    ) -> Result<(Vec<FileSession>, TransactionReport), DriftPatchError> {
        validate_document(document)?;

        let mut sessions: HashMap<PathBuf, FileSession> = HashMap::new();
        let mut created_files: Vec<PathBuf> = Vec::new();
        let mut modification_reports = Vec::new();

        for change in &document.changes {
            let absolute_path = self.root.join(&change.file_path);
            let file_label = change.file_path.display().to_string();

            for (zero_based_index, modification) in change.modifications.iter().enumerate() {
                let modification_index = zero_based_index + 1;
                let context = LocateContext {
                    file: &file_label,
                    modification: modification_index,
                };

                if !sessions.contains_key(&change.file_path) {
                    let session = open_session(&absolute_path, modification, change, context)?;
                    if session.original_bytes.is_none() {
                        created_files.push(change.file_path.clone());
                    }
                    sessions.insert(change.file_path.clone(), session);
                }

                let session = sessions
                    .get_mut(&change.file_path)
                    .expect("session inserted immediately above if absent");
                let outcome = apply_modification(session, modification, context)?;

                modification_reports.push(ModificationReport {
                    file: change.file_path.clone(),
                    index: modification_index,
                    action: modification.action.name(),
                    outcome,
                });
            }
        }

        let files = sessions
            .keys()
            .map(|path| FileReport {
                file: path.clone(),
                created: created_files.contains(path),
            })
            .collect();

        let mut ordered: Vec<FileSession> = sessions.into_values().collect();
        ordered.sort_by(|a, b| a.path.cmp(&b.path));

        Ok((
            ordered,
            TransactionReport {
                modifications: modification_reports,
                files,
            },
        ))
    }
}

fn validate_document(document: &PatchDocument) -> Result<(), DriftPatchError> {
    for change in &document.changes {
        validate_relative_path(&change.file_path).map_err(DriftPatchError::malformed)?;
    }
    Ok(())
}

/// Opens the session for a file the first time any of its modifications is
/// visited. `CREATE_FILE` against an existing path is checked here, before
/// the session is even inserted, since a mismatch must abort before any
/// other modification for the file is considered.
fn open_session(
    absolute_path: &Path,
    modification: &Modification,
    change: &FileChange,
    context: LocateContext<'_>,
) -> Result<FileSession, DriftPatchError> {
    if let Action::CreateFile { content } = &modification.action {
        if absolute_path.exists() {
            let existing =
                std::fs::read(absolute_path).map_err(|error| DriftPatchError::io(absolute_path, error))?;
            if create_file_is_noop(Some(&existing), content.as_bytes()) {
                return FileSession::load(absolute_path);
            }
            return Err(DriftPatchError::FileExistsMismatch {
                file: context.file.to_string(),
                modification: context.modification,
            });
        }
        return Ok(FileSession::new_for_create(absolute_path, content, change.newline));
    }

    if !absolute_path.exists() {
        return Err(DriftPatchError::FileNotFound {
            file: context.file.to_string(),
            modification: context.modification,
        });
    }
    FileSession::load(absolute_path)
}

fn apply_modification(
    session: &mut FileSession,
    modification: &Modification,
    context: LocateContext<'_>,
) -> Result<ModificationOutcome, DriftPatchError> {
    match &modification.action {
        Action::CreateFile { content } => match &session.original_bytes {
            Some(original) if create_file_is_noop(Some(original), content.as_bytes()) => {
                Ok(ModificationOutcome::Skipped)
            }
            Some(_) => Err(DriftPatchError::FileExistsMismatch {
                file: context.file.to_string(),
                modification: context.modification,
            }),
            None => Ok(ModificationOutcome::Applied),
        },
        Action::Delete { locator } => apply_delete(session, locator, modification, context),
        Action::Replace { locator, content } => {
            apply_replace(session, locator, content, modification, context)
        }
        Action::InsertAfter { snippet, content } => {
            apply_insert_after(session, snippet, content, modification, context)
        }
        Action::InsertBefore { snippet, content } => {
            apply_insert_before(session, snippet, content, modification, context)
        }
    }
}

fn resolve_scope(
    buffer: &[String],
    anchor: Option<&str>,
    context: LocateContext<'_>,
) -> Result<Scope, DriftPatchError> {
    match anchor {
        Some(anchor_text) => Ok(Scope::After(locate_anchor(buffer, anchor_text, context)?.end)),
        None => Ok(Scope::WholeFile),
    }
}

fn range_for_locator(
    buffer: &[String],
    locator: &SnippetLocator,
    anchor: Option<&str>,
    context: LocateContext<'_>,
) -> Result<LineRange, DriftPatchError> {
    let scope = resolve_scope(buffer, anchor, context)?;
    match locator {
        SnippetLocator::Point(snippet) => locate_snippet(buffer, snippet, scope, context),
        SnippetLocator::Range { start, end } => locate_range(buffer, start, end, scope, context),
    }
}

/// `DELETE`'s skip condition is "not locatable", not "found but rejected":
/// an ambiguous match or an empty-after-normalization pattern is a real
/// patch defect and must still fail the transaction.
fn is_not_found(error: &DriftPatchError) -> bool {
    matches!(
        error,
        DriftPatchError::AnchorNotFound { .. }
            | DriftPatchError::SnippetNotFound { .. }
            | DriftPatchError::EndSnippetNotFound { .. }
    )
}

/// A `REPLACE` that has already been applied no longer contains its own
/// `snippet`/`start_snippet`..`end_snippet` — the buffer now holds `content`
/// in its place, so re-locating the pre-image fails. Narrower than
/// `is_not_found`: an unresolvable anchor is still a hard failure, since the
/// anchor text is untouched by a prior application and its absence signals a
/// real structural mismatch, not a completed edit.
fn is_snippet_not_found(error: &DriftPatchError) -> bool {
    matches!(
        error,
        DriftPatchError::SnippetNotFound { .. } | DriftPatchError::EndSnippetNotFound { .. }
    )
}

fn apply_delete(
    session: &mut FileSession,
    locator: &SnippetLocator,
    modification: &Modification,
    context: LocateContext<'_>,
) -> Result<ModificationOutcome, DriftPatchError> {
    match range_for_locator(&session.buffer, locator, modification.anchor.as_deref(), context) {
        Ok(range) => {
            let expanded = expand_with_blank_lines(
                &session.buffer,
                range,
                modification.include_leading_blank_lines,
                modification.include_trailing_blank_lines,
            );
            delete_range(&mut session.buffer, expanded);
            session.dirty = true;
            Ok(ModificationOutcome::Applied)
        }
        Err(error) if is_not_found(&error) => Ok(ModificationOutcome::Skipped),
        Err(error) => Err(error),
    }
}

fn apply_replace(
    session: &mut FileSession,
    locator: &SnippetLocator,
    content: &str,
    modification: &Modification,
    context: LocateContext<'_>,
) -> Result<ModificationOutcome, DriftPatchError> {
    let anchor = modification.anchor.as_deref();
    let range = match range_for_locator(&session.buffer, locator, anchor, context) {
        Ok(range) => range,
        Err(error) if is_snippet_not_found(&error) => {
            // The snippet is gone because a prior run already replaced it;
            // confirm `content` is discoverable, still within the same
            // anchor scope, before treating this as an already-applied
            // no-op rather than masking a genuine SnippetNotFound. This
            // can't confirm `content` sits at the *exact* former location
            // (the pre-image is gone), so it trusts a unique match within
            // scope the same way the spec's own idempotency table does for
            // every other action.
            let scope = resolve_scope(&session.buffer, anchor, context)?;
            return match locate_snippet(&session.buffer, content, scope, context) {
                Ok(_) => Ok(ModificationOutcome::Skipped),
                // `content` truly isn't there either: report the original
                // SnippetNotFound. A *different* failure (e.g. `content`
                // matching ambiguously) is more actionable than the stale
                // original error, so surface it instead.
                Err(fallback_error) if is_not_found(&fallback_error) => Err(error),
                Err(fallback_error) => Err(fallback_error),
            };
        }
        Err(error) => return Err(error),
    };
    let indent = effective_indent(&session.buffer[range.start]);
    let expanded = expand_with_blank_lines(
        &session.buffer,
        range,
        modification.include_leading_blank_lines,
        modification.include_trailing_blank_lines,
    );
    let content_lines = reindent_content(content, indent);

    if replace_is_noop(&session.buffer, expanded, &content_lines) {
        return Ok(ModificationOutcome::Skipped);
    }

    replace_range(&mut session.buffer, expanded, content_lines);
    session.dirty = true;
    Ok(ModificationOutcome::Applied)
}

fn apply_insert_after(
    session: &mut FileSession,
    snippet: &str,
    content: &str,
    modification: &Modification,
    context: LocateContext<'_>,
) -> Result<ModificationOutcome, DriftPatchError> {
    let scope = resolve_scope(&session.buffer, modification.anchor.as_deref(), context)?;
    let range = locate_snippet(&session.buffer, snippet, scope, context)?;
    let indent = effective_indent(&session.buffer[range.start]);
    let content_lines = reindent_content(content, indent);

    if insert_after_is_noop(&session.buffer, range, &content_lines) {
        return Ok(ModificationOutcome::Skipped);
    }

    insert_after(&mut session.buffer, range, content_lines);
    session.dirty = true;
    Ok(ModificationOutcome::Applied)
}

fn apply_insert_before(
    session: &mut FileSession,
    snippet: &str,
    content: &str,
    modification: &Modification,
    context: LocateContext<'_>,
) -> Result<ModificationOutcome, DriftPatchError> {
    let scope = resolve_scope(&session.buffer, modification.anchor.as_deref(), context)?;
    let range = locate_snippet(&session.buffer, snippet, scope, context)?;
    let indent = effective_indent(&session.buffer[range.start]);
    let content_lines = reindent_content(content, indent);

    if insert_before_is_noop(&session.buffer, range, &content_lines) {
        return Ok(ModificationOutcome::Skipped);
    }

    insert_before(&mut session.buffer, range, content_lines);
    session.dirty = true;
    Ok(ModificationOutcome::Applied)
}
