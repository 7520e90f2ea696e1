use std::path::Path;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// All failure kinds the engine can produce, from document parsing through commit.
#[derive(Debug, Error, Diagnostic)]
pub enum DriftPatchError {
    #[error("malformed patch document: {message}")]
    MalformedPatch { message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("[{file}#{modification}] file not found")]
    FileNotFound { file: String, modification: usize },

    #[error("[{file}#{modification}] CREATE_FILE target exists with different content")]
    FileExistsMismatch { file: String, modification: usize },

    #[error("[{file}#{modification}] anchor not found: '{anchor}'")]
    AnchorNotFound {
        file: String,
        modification: usize,
        anchor: String,
    },

    #[error("[{file}#{modification}] anchor '{anchor}' matches {count} locations, expected exactly one")]
    AnchorAmbiguous {
        file: String,
        modification: usize,
        anchor: String,
        count: usize,
    },

    #[error("[{file}#{modification}] snippet not found")]
    SnippetNotFound { file: String, modification: usize },

    #[error("[{file}#{modification}] snippet matches {count} locations, expected exactly one")]
    SnippetAmbiguous {
        file: String,
        modification: usize,
        count: usize,
    },

    #[error("[{file}#{modification}] end_snippet not found after the start_snippet match")]
    EndSnippetNotFound { file: String, modification: usize },

    #[error("[{file}#{modification}] pattern is empty after normalization")]
    EmptyPattern { file: String, modification: usize },

    #[error("failed to read or write '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is busy: another apply is in progress")]
    ResourceBusy { path: String },

    #[error("'{path}' changed on disk during apply; aborting the transaction")]
    FileChangedDuringApply { path: String },

    #[error("commit failed and rollback did not fully succeed: {message}")]
    RollbackFailed { message: String },
}

impl DriftPatchError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPatch {
            message: message.into(),
        }
    }

    /// Stable machine-readable kind tag, used by `--format json`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPatch { .. } => "malformed_patch",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::FileNotFound { .. } => "file_not_found",
            Self::FileExistsMismatch { .. } => "file_exists_mismatch",
            Self::AnchorNotFound { .. } => "anchor_not_found",
            Self::AnchorAmbiguous { .. } => "anchor_ambiguous",
            Self::SnippetNotFound { .. } => "snippet_not_found",
            Self::SnippetAmbiguous { .. } => "snippet_ambiguous",
            Self::EndSnippetNotFound { .. } => "end_snippet_not_found",
            Self::EmptyPattern { .. } => "empty_pattern",
            Self::Io { .. } => "io_error",
            Self::ResourceBusy { .. } => "resource_busy",
            Self::FileChangedDuringApply { .. } => "file_changed_during_apply",
            Self::RollbackFailed { .. } => "rollback_failed",
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorBody {
                r#type: self.kind().to_string(),
                message: self.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub r#type: String,
    pub message: String,
}
