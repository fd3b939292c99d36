//! bankfeed-core: configuration, transaction types and the error taxonomy
//! shared by the ingest and sync crates.

pub mod account;
pub mod config;
pub mod error;
pub mod transaction;

pub use account::AccountMap;
pub use config::{
    AccessToken, AmountFormat, AmountSign, Column, ColumnAliases, CsvLayout, ImportConfig,
    RowPolicies, RowPolicy, DEFAULT_BASE_URL,
};
pub use error::{
    ImportError, InvalidAmountError, InvalidDateError, ParseError, RowError, SourceError,
    SubmissionError, UnmappedAccountError,
};
pub use transaction::{SubmissionBatch, TransactionRecord};
