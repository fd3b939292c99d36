//! The import configuration value.
//!
//! One `ImportConfig` is built per run and handed to every stage by shared
//! reference; nothing downstream mutates it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::AccountMap;

/// YNAB's public API root
pub const DEFAULT_BASE_URL: &str = "https://api.youneedabudget.com/v1";

/// Everything one import run needs, minus the source selector
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    pub budget_id: String,
    pub access_token: AccessToken,
    /// Service root, without the `/budgets/...` suffix
    pub base_url: String,
    pub accounts: AccountMap,
    pub layout: CsvLayout,
    pub policies: RowPolicies,
    pub amount_format: AmountFormat,
}

impl ImportConfig {
    pub fn new(
        budget_id: impl Into<String>,
        access_token: impl Into<AccessToken>,
        accounts: AccountMap,
    ) -> Self {
        Self {
            budget_id: budget_id.into(),
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            accounts,
            layout: CsvLayout::default(),
            policies: RowPolicies::default(),
            amount_format: AmountFormat::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_layout(mut self, layout: CsvLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_policies(mut self, policies: RowPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_amount_format(mut self, amount_format: AmountFormat) -> Self {
        self.amount_format = amount_format;
        self
    }
}

/// Bearer credential for the budgeting service. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

impl From<String> for AccessToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccessToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Canonical columns of a bank export
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Date,
    Payee,
    Amount,
    Account,
    Memo,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Date,
        Column::Payee,
        Column::Amount,
        Column::Account,
        Column::Memo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::Payee => "payee",
            Column::Amount => "amount",
            Column::Account => "account",
            Column::Memo => "memo",
        }
    }

    /// Memo is the only column an export may leave out
    pub fn is_required(&self) -> bool {
        !matches!(self, Column::Memo)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header names accepted for each canonical column (case-insensitive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub date: Vec<String>,
    pub payee: Vec<String>,
    pub amount: Vec<String>,
    pub account: Vec<String>,
    pub memo: Vec<String>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        fn names(v: &[&str]) -> Vec<String> {
            v.iter().map(|s| s.to_string()).collect()
        }
        Self {
            date: names(&["date"]),
            payee: names(&["payee", "payee_name", "description"]),
            amount: names(&["amount"]),
            account: names(&["account", "account_name"]),
            memo: names(&["memo", "notes"]),
        }
    }
}

impl ColumnAliases {
    pub fn for_column(&self, column: Column) -> &[String] {
        match column {
            Column::Date => &self.date,
            Column::Payee => &self.payee,
            Column::Amount => &self.amount,
            Column::Account => &self.account,
            Column::Memo => &self.memo,
        }
    }

    /// Which canonical column a header cell names, if any
    pub fn identify(&self, header: &str) -> Option<Column> {
        let header = header.trim();
        Column::ALL.into_iter().find(|c| {
            self.for_column(*c)
                .iter()
                .any(|alias| alias.trim().eq_ignore_ascii_case(header))
        })
    }
}

/// How a bank's CSV export is laid out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvLayout {
    pub delimiter: char,
    /// chrono format string for the date column
    pub date_format: String,
    pub sign: AmountSign,
    pub columns: ColumnAliases,
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self {
            delimiter: ',',
            date_format: "%Y-%m-%d".to_string(),
            sign: AmountSign::default(),
            columns: ColumnAliases::default(),
        }
    }
}

/// Sign convention of the export. The service wants negative = outflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmountSign {
    #[default]
    AsExported,
    /// Export lists outflows as positive numbers (common for credit cards)
    Inverted,
}

/// Numeric convention of the `amount` field on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmountFormat {
    /// JSON number in currency units, e.g. `-4.5`
    #[default]
    Decimal,
    /// Integer thousandths of a currency unit, e.g. `-4500`
    Milliunits,
}

/// What to do with a row that cannot become a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowPolicy {
    /// Drop the row, keep the rest of the batch
    #[default]
    Skip,
    /// Abandon the whole file
    FailFile,
}

/// One policy per row error kind. When a row breaks several rules at once,
/// any `fail-file` among them decides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowPolicies {
    pub unmapped_account: RowPolicy,
    pub invalid_amount: RowPolicy,
    pub invalid_date: RowPolicy,
}

impl RowPolicies {
    /// Every row error aborts the file
    pub fn strict() -> Self {
        Self {
            unmapped_account: RowPolicy::FailFile,
            invalid_amount: RowPolicy::FailFile,
            invalid_date: RowPolicy::FailFile,
        }
    }
}
