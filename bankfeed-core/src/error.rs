//! Error taxonomy of an import run, built with thiserror.
//!
//! Scope of each error:
//! - `ParseError`: the file's CSV structure; fatal for that file
//! - `RowError`: a single row; skipped or fatal per `RowPolicies`
//! - `SubmissionError`: the POST; fatal for the file, which is kept
//! - `SourceError`: listing, reading or disposing source files

use std::path::PathBuf;
use thiserror::Error;

use crate::config::Column;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no header row found")]
    MissingHeader,

    #[error("header is missing required column(s): {}", join(.missing))]
    MissingColumns { missing: Vec<Column> },

    #[error("line {line}: expected {expected} fields, found {found}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("delimiter {0:?} is not a single-byte ASCII character")]
    UnsupportedDelimiter(char),

    #[error("malformed CSV{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Malformed { line: Option<u64>, message: String },
}

fn join(columns: &[Column]) -> String {
    columns
        .iter()
        .map(Column::name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: no account mapping for {account:?}")]
pub struct UnmappedAccountError {
    pub line: u64,
    pub account: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: invalid amount {value:?}")]
pub struct InvalidAmountError {
    pub line: u64,
    pub value: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: date {value:?} does not match format {format:?}")]
pub struct InvalidDateError {
    pub line: u64,
    pub value: String,
    pub format: String,
}

/// Why a single row could not become a transaction
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowError {
    #[error(transparent)]
    UnmappedAccount(#[from] UnmappedAccountError),
    #[error(transparent)]
    InvalidAmount(#[from] InvalidAmountError),
    #[error(transparent)]
    InvalidDate(#[from] InvalidDateError),
}

impl RowError {
    pub fn line(&self) -> u64 {
        match self {
            RowError::UnmappedAccount(e) => e.line,
            RowError::InvalidAmount(e) => e.line,
            RowError::InvalidDate(e) => e.line,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("service rejected batch with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("could not encode batch: {0}")]
    Encode(String),
}

impl SubmissionError {
    /// HTTP status, when the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            SubmissionError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("listing {}: {source}", .path.display())]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("disposing of {}: {source}", .path.display())]
    Dispose {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything that can sink a single source file
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("row rejected: {0}")]
    Row(#[from] RowError),

    #[error("submission failed: {0}")]
    Submission(#[from] SubmissionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_lists_all() {
        let err = ParseError::MissingColumns {
            missing: vec![Column::Amount, Column::Account],
        };
        assert_eq!(
            err.to_string(),
            "header is missing required column(s): amount, account"
        );
    }

    #[test]
    fn test_malformed_message_with_and_without_line() {
        let with = ParseError::Malformed {
            line: Some(4),
            message: "bad quote".to_string(),
        };
        let without = ParseError::Malformed {
            line: None,
            message: "bad quote".to_string(),
        };
        assert_eq!(with.to_string(), "malformed CSV at line 4: bad quote");
        assert_eq!(without.to_string(), "malformed CSV: bad quote");
    }

    #[test]
    fn test_submission_status() {
        let err = SubmissionError::Rejected {
            status: 401,
            body: "unauthorized".to_string(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(SubmissionError::Transport("reset".into()).status(), None);

        let wrapped = ImportError::from(err);
        assert!(wrapped.to_string().contains("HTTP 401"));
    }

    #[test]
    fn test_row_error_line() {
        let err: RowError = UnmappedAccountError {
            line: 7,
            account: "Brokerage".to_string(),
        }
        .into();
        assert_eq!(err.line(), 7);
        assert_eq!(err.to_string(), "line 7: no account mapping for \"Brokerage\"");
    }
}
