use anyhow::{bail, Context, Result};
use bankfeed_core::{
    AccessToken, AccountMap, AmountFormat, CsvLayout, ImportConfig, RowPolicies, DEFAULT_BASE_URL,
};
use bankfeed_ingest::Disposal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// On-disk config (`~/.bankfeed/config.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub budget: BudgetSection,
    #[serde(default)]
    pub accounts: AccountMap,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub csv: CsvLayout,
    #[serde(default)]
    pub policy: RowPolicies,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSection {
    pub id: String,
    /// May instead come from `--access-token` / `BANKFEED_ACCESS_TOKEN`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<AccessToken>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Folder scanned by `bankfeed run`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,
    /// Empty string accepts every file
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub disposal: Disposal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default)]
    pub amount_format: AmountFormat,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            folder: None,
            extension: default_extension(),
            disposal: Disposal::default(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_extension() -> String {
    "csv".to_string()
}

/// Written by `bankfeed init`
pub const TEMPLATE: &str = r#"# bankfeed configuration

[budget]
id = "your-budget-id"
# Personal access token. Can also be supplied via BANKFEED_ACCESS_TOKEN.
# access_token = "..."
base_url = "https://api.youneedabudget.com/v1"
# timeout_secs = 30

# Account name as it appears in the CSV = budget account id
[accounts]
# "Checking" = "00000000-0000-0000-0000-000000000000"

[source]
# folder = "/home/me/Drive/bank-exports"
extension = "csv"
# "delete" removes imported files, "trash" moves them into .trash/
disposal = "delete"

[csv]
delimiter = ","
date_format = "%Y-%m-%d"
# "inverted" when the bank exports outflows as positive numbers
sign = "as-exported"

# Header names accepted per column (case-insensitive)
[csv.columns]
date = ["date"]
payee = ["payee", "payee_name", "description"]
amount = ["amount"]
account = ["account", "account_name"]
memo = ["memo", "notes"]

# "skip" drops the row, "fail-file" abandons the whole file
[policy]
unmapped_account = "skip"
invalid_amount = "skip"
invalid_date = "skip"

[output]
# "decimal" (-4.5) or "milliunits" (-4500)
amount_format = "decimal"
"#;

impl Config {
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse config")
    }

    /// Resolve into the importer's configuration. `token_override` beats the file.
    pub fn import_config(&self, token_override: Option<String>) -> Result<ImportConfig> {
        let token = token_override
            .map(AccessToken::from)
            .or_else(|| self.budget.access_token.clone())
            .filter(|t| !t.is_empty());

        let Some(token) = token else {
            bail!("no access token: set [budget].access_token or BANKFEED_ACCESS_TOKEN");
        };
        self.build(token)
    }

    /// Same as `import_config` but a token is not required (nothing is sent)
    pub fn offline_config(&self) -> Result<ImportConfig> {
        let token = self
            .budget
            .access_token
            .clone()
            .unwrap_or_else(|| AccessToken::from(""));
        self.build(token)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.budget.timeout_secs.map(Duration::from_secs)
    }

    /// `None` when every file should be picked up
    pub fn extension(&self) -> Option<&str> {
        Some(self.source.extension.as_str()).filter(|e| !e.is_empty())
    }

    fn build(&self, token: AccessToken) -> Result<ImportConfig> {
        if self.budget.id.trim().is_empty() {
            bail!("[budget].id is empty");
        }
        if self.accounts.is_empty() {
            tracing::warn!("no [accounts] configured; every row will be unmapped");
        }

        Ok(ImportConfig::new(self.budget.id.trim(), token, self.accounts.clone())
            .with_base_url(self.budget.base_url.clone())
            .with_layout(self.csv.clone())
            .with_policies(self.policy)
            .with_amount_format(self.output.amount_format))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        bail!(
            "config not found: {} (run: bankfeed init)",
            path.display()
        );
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Config::parse(&s).with_context(|| format!("in {}", path.display()))
}

pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    fs::write(path, TEMPLATE).with_context(|| format!("write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
