//! Transaction records and the per-file submission batch

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One bank-statement line, normalized for the budgeting service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// 1-based line in the source file
    pub line: u64,
    pub date: NaiveDate,
    pub payee: String,
    /// Negative = outflow, positive = inflow
    pub amount: Decimal,
    /// Account name as it appeared in the export
    pub source_account: String,
    /// Resolved budget account id; never empty
    pub account_id: String,
    pub memo: Option<String>,
}

impl TransactionRecord {
    pub fn is_outflow(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }
}

/// All records derived from one source file, in row order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionBatch {
    pub budget_id: String,
    /// Name of the source artifact, for logs and reports
    pub source: String,
    pub transactions: Vec<TransactionRecord>,
}

impl SubmissionBatch {
    pub fn new(
        budget_id: impl Into<String>,
        source: impl Into<String>,
        transactions: Vec<TransactionRecord>,
    ) -> Self {
        Self {
            budget_id: budget_id.into(),
            source: source.into(),
            transactions,
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Sum of all amounts; handy for run summaries
    pub fn net_amount(&self) -> Decimal {
        self.transactions.iter().map(|t| t.amount).sum()
    }
}
