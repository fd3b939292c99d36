//! JSON body for `POST /budgets/{id}/transactions`:
//!
//! {"transactions":[{"date":"2024-01-05","amount":-4.5,"payee_name":"Coffee Shop","account_id":"acct-123"}]}

use bankfeed_core::{AmountFormat, SubmissionBatch, SubmissionError, TransactionRecord};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::value::RawValue;

#[derive(Serialize)]
struct Envelope<'a> {
    transactions: Vec<WireTransaction<'a>>,
}

#[derive(Serialize)]
struct WireTransaction<'a> {
    date: NaiveDate,
    amount: WireAmount,
    payee_name: &'a str,
    account_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    memo: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireAmount {
    /// Exact decimal digits, never routed through f64
    Decimal(Box<RawValue>),
    Milliunits(i64),
}

impl<'a> WireTransaction<'a> {
    fn from_record(record: &'a TransactionRecord, format: AmountFormat) -> Result<Self, SubmissionError> {
        let amount = match format {
            AmountFormat::Decimal => WireAmount::Decimal(
                RawValue::from_string(decimal_number(record.amount))
                    .map_err(|e| SubmissionError::Encode(format!("line {}: {e}", record.line)))?,
            ),
            AmountFormat::Milliunits => to_milliunits(record.amount)
                .map(WireAmount::Milliunits)
                .ok_or_else(|| {
                    SubmissionError::Encode(format!(
                        "line {}: amount {} does not fit the milliunits wire format",
                        record.line, record.amount
                    ))
                })?,
        };

        Ok(Self {
            date: record.date,
            amount,
            payee_name: &record.payee,
            account_id: &record.account_id,
            memo: record.memo.as_deref(),
        })
    }
}

/// Serialize a batch to the service's transaction-list envelope.
/// Output depends only on the batch and format, so equal inputs give equal bytes.
pub fn encode_batch(batch: &SubmissionBatch, format: AmountFormat) -> Result<Vec<u8>, SubmissionError> {
    let transactions = batch
        .transactions
        .iter()
        .map(|record| WireTransaction::from_record(record, format))
        .collect::<Result<Vec<_>, _>>()?;

    serde_json::to_vec(&Envelope { transactions })
        .map_err(|e| SubmissionError::Encode(e.to_string()))
}

/// JSON number text for an amount: every significant digit kept, trailing
/// fraction zeros dropped (`-4.50` → `-4.5`), never exponent notation
fn decimal_number(amount: Decimal) -> String {
    amount.normalize().to_string()
}

/// Currency units → thousandths, rounding half away from zero
pub fn to_milliunits(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::from(1000))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}
