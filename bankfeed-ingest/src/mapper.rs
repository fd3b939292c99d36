//! Rows → transaction records.
//!
//! Each row resolves its account through the configured `AccountMap`, parses
//! its amount and date, and either becomes a `TransactionRecord` or a
//! `RowError` that the row policies decide about.

use bankfeed_core::{
    AmountSign, Column, ImportConfig, ImportError, InvalidAmountError, InvalidDateError,
    ParseError, RowError, RowPolicy, TransactionRecord, UnmappedAccountError,
};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::csv_rows::Row;

// Optional sign, then plain digits or comma-grouped thousands, then an optional fraction
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?$|^[+-]?\.\d+$")
        .expect("amount pattern compiles")
});

/// Mapper output for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedRows {
    /// In source row order
    pub records: Vec<TransactionRecord>,
    /// Rows dropped under a `skip` policy
    pub skipped: Vec<RowError>,
}

pub struct TransactionMapper<'a> {
    config: &'a ImportConfig,
}

impl<'a> TransactionMapper<'a> {
    pub fn new(config: &'a ImportConfig) -> Self {
        Self { config }
    }

    /// Map a row stream. A `ParseError` from the stream is always fatal;
    /// row errors are skipped or fatal according to `RowPolicies`.
    pub fn map_rows<I>(&self, rows: I) -> Result<MappedRows, ImportError>
    where
        I: IntoIterator<Item = Result<Row, ParseError>>,
    {
        let mut out = MappedRows::default();

        for row in rows {
            let row = row?;
            match self.map_row(&row) {
                Ok(record) => out.records.push(record),
                Err(err) => match self.policy_for(&err) {
                    RowPolicy::Skip => {
                        tracing::warn!(%err, "skipping row");
                        out.skipped.push(err);
                    }
                    RowPolicy::FailFile => return Err(err.into()),
                },
            }
        }

        tracing::debug!(
            records = out.records.len(),
            skipped = out.skipped.len(),
            "mapped rows"
        );
        Ok(out)
    }

    /// Turn one row into a record. A row can be wrong in several ways at
    /// once; the error returned is the first one whose policy is `fail-file`,
    /// else the first found (account, amount, date order).
    pub fn map_row(&self, row: &Row) -> Result<TransactionRecord, RowError> {
        let field = |c: Column| row.get(c).unwrap_or_default();

        let account = field(Column::Account);
        let account_id = self.config.accounts.resolve(account).ok_or_else(|| {
            RowError::from(UnmappedAccountError {
                line: row.line,
                account: account.to_string(),
            })
        });

        let raw_amount = field(Column::Amount);
        let amount = parse_amount(raw_amount)
            .map(|amount| match self.config.layout.sign {
                AmountSign::Inverted => -amount,
                AmountSign::AsExported => amount,
            })
            .ok_or_else(|| {
                RowError::from(InvalidAmountError {
                    line: row.line,
                    value: raw_amount.to_string(),
                })
            });

        let raw_date = field(Column::Date);
        let date_format = &self.config.layout.date_format;
        let date = NaiveDate::parse_from_str(raw_date, date_format).map_err(|_| {
            RowError::from(InvalidDateError {
                line: row.line,
                value: raw_date.to_string(),
                format: date_format.clone(),
            })
        });

        let (account_id, amount, date) = match (account_id, amount, date) {
            (Ok(account_id), Ok(amount), Ok(date)) => (account_id, amount, date),
            (account_id, amount, date) => {
                let mut errors: Vec<RowError> = [account_id.err(), amount.err(), date.err()]
                    .into_iter()
                    .flatten()
                    .collect();
                let decisive = errors
                    .iter()
                    .position(|e| self.policy_for(e) == RowPolicy::FailFile)
                    .unwrap_or(0);
                return Err(errors.swap_remove(decisive));
            }
        };

        let memo = row
            .get(Column::Memo)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        Ok(TransactionRecord {
            line: row.line,
            date,
            payee: field(Column::Payee).to_string(),
            amount,
            source_account: account.to_string(),
            account_id: account_id.to_string(),
            memo,
        })
    }

    fn policy_for(&self, err: &RowError) -> RowPolicy {
        let policies = &self.config.policies;
        match err {
            RowError::UnmappedAccount(_) => policies.unmapped_account,
            RowError::InvalidAmount(_) => policies.invalid_amount,
            RowError::InvalidDate(_) => policies.invalid_date,
        }
    }
}

/// Parse a bank-export amount: `-4.50`, `+12`, `1,234.56`, `.99`.
/// Currency symbols, exponents and stray separators are rejected.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if !AMOUNT_RE.is_match(raw) {
        return None;
    }
    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    let normalized = match cleaned.strip_prefix('-') {
        Some(rest) if rest.starts_with('.') => format!("-0{rest}"),
        _ if cleaned.starts_with('.') => format!("0{cleaned}"),
        _ => cleaned.to_string(),
    };
    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_rows::CsvParser;
    use bankfeed_core::{AccountMap, RowPolicies};

    fn config() -> ImportConfig {
        ImportConfig::new(
            "bud-1",
            "token",
            AccountMap::new()
                .with("Checking", "acct-123")
                .with("Visa", "acct-456"),
        )
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn map(cfg: &ImportConfig, text: &str) -> Result<MappedRows, ImportError> {
        let rows = CsvParser::new(text, &cfg.layout).rows()?;
        TransactionMapper::new(cfg).map_rows(rows)
    }

    #[test]
    fn test_maps_every_row_in_order() {
        let cfg = config();
        let text = "date,payee,amount,account,memo\n\
                    2024-01-05,Coffee Shop,-4.50,Checking,latte\n\
                    2024-01-06,Payroll,2000.00,Checking,\n\
                    2024-01-07,Bookshop,-12.99,Visa,gift\n";
        let mapped = map(&cfg, text).unwrap();

        assert!(mapped.skipped.is_empty());
        let payees: Vec<_> = mapped.records.iter().map(|r| r.payee.as_str()).collect();
        assert_eq!(payees, vec!["Coffee Shop", "Payroll", "Bookshop"]);

        let first = &mapped.records[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(first.amount, dec("-4.50"));
        assert_eq!(first.account_id, "acct-123");
        assert_eq!(first.source_account, "Checking");
        assert_eq!(first.memo.as_deref(), Some("latte"));
        assert_eq!(mapped.records[1].memo, None);
        assert_eq!(mapped.records[2].account_id, "acct-456");
    }

    #[test]
    fn test_unmapped_account_is_skipped_by_default() {
        let cfg = config();
        let text = "date,payee,amount,account\n\
                    2024-01-05,Coffee Shop,-4.50,Checking\n\
                    2024-01-06,Broker,-100.00,Brokerage\n";
        let mapped = map(&cfg, text).unwrap();

        assert_eq!(mapped.records.len(), 1);
        assert!(mapped.records.iter().all(|r| !r.account_id.is_empty()));
        assert_eq!(
            mapped.skipped,
            vec![RowError::UnmappedAccount(UnmappedAccountError {
                line: 3,
                account: "Brokerage".to_string(),
            })]
        );
    }

    #[test]
    fn test_unmapped_account_can_fail_the_file() {
        let cfg = config().with_policies(RowPolicies::strict());
        let text = "date,payee,amount,account\n2024-01-06,Broker,-100.00,Brokerage\n";
        let err = map(&cfg, text).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Row(RowError::UnmappedAccount(UnmappedAccountError { line: 2, .. }))
        ));
    }

    #[test]
    fn test_invalid_amount() {
        let cfg = config();
        let text = "date,payee,amount,account\n\
                    2024-01-05,Coffee Shop,four fifty,Checking\n\
                    2024-01-06,Bakery,-3.00,Checking\n";
        let mapped = map(&cfg, text).unwrap();
        assert_eq!(mapped.records.len(), 1);
        assert_eq!(
            mapped.skipped,
            vec![RowError::InvalidAmount(InvalidAmountError {
                line: 2,
                value: "four fifty".to_string(),
            })]
        );

        let strict = config().with_policies(RowPolicies::strict());
        assert!(matches!(
            map(&strict, text),
            Err(ImportError::Row(RowError::InvalidAmount(_)))
        ));
    }

    #[test]
    fn test_invalid_date_respects_format() {
        let mut cfg = config();
        cfg.layout.date_format = "%m/%d/%Y".to_string();
        let text = "date,payee,amount,account\n\
                    01/05/2024,Coffee Shop,-4.50,Checking\n\
                    2024-01-06,Bakery,-3.00,Checking\n";
        let mapped = map(&cfg, text).unwrap();
        assert_eq!(mapped.records.len(), 1);
        assert_eq!(
            mapped.records[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert!(matches!(
            mapped.skipped[0],
            RowError::InvalidDate(InvalidDateError { line: 3, .. })
        ));
    }

    #[test]
    fn test_fail_file_wins_over_skip_on_the_same_row() {
        // unmapped account and a bad amount on one row
        let text = "date,payee,amount,account\n\
                    2024-01-05,Coffee Shop,-4.50,Checking\n\
                    2024-01-06,Broker,lots,Brokerage\n";

        let lenient = config();
        let mapped = map(&lenient, text).unwrap();
        assert_eq!(mapped.records.len(), 1);
        assert!(matches!(mapped.skipped[..], [RowError::UnmappedAccount(_)]));

        let cfg = config().with_policies(RowPolicies {
            invalid_amount: RowPolicy::FailFile,
            ..RowPolicies::default()
        });
        assert_eq!(
            map(&cfg, text),
            Err(ImportError::Row(RowError::InvalidAmount(InvalidAmountError {
                line: 3,
                value: "lots".to_string(),
            })))
        );
    }

    #[test]
    fn test_inverted_sign() {
        let mut cfg = config();
        cfg.layout.sign = AmountSign::Inverted;
        let text = "date,payee,amount,account\n\
                    2024-01-05,Bookshop,12.99,Visa\n\
                    2024-01-09,Refund,-5.00,Visa\n";
        let mapped = map(&cfg, text).unwrap();
        assert_eq!(mapped.records[0].amount, dec("-12.99"));
        assert!(mapped.records[0].is_outflow());
        assert_eq!(mapped.records[1].amount, dec("5.00"));
    }

    #[test]
    fn test_parse_error_in_stream_is_fatal() {
        let cfg = config();
        let text = "date,payee,amount,account\n\
                    2024-01-05,Coffee Shop,-4.50,Checking\n\
                    2024-01-06,Bakery\n";
        assert_eq!(
            map(&cfg, text),
            Err(ImportError::Parse(ParseError::ColumnCount {
                line: 3,
                expected: 4,
                found: 2
            }))
        );
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("-4.50"), Some(dec("-4.50")));
        assert_eq!(parse_amount("+12"), Some(dec("12")));
        assert_eq!(parse_amount("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("-1,000,000"), Some(dec("-1000000")));
        assert_eq!(parse_amount(".99"), Some(dec("0.99")));
        assert_eq!(parse_amount(" 7.1 "), Some(dec("7.1")));

        for bad in ["", "-", "abc", "$4.50", "1e5", "1,23.00", "12,34", "4.50.1", "1_000", "- 4"] {
            assert_eq!(parse_amount(bad), None, "{bad:?} should be rejected");
        }
    }
}
