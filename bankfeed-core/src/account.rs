//! Source-account name → budget account id lookup

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps the account names found in bank exports to the budgeting service's
/// account identifiers. Lookups are exact: no trimming, no case folding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountMap(BTreeMap<String, String>);

impl AccountMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for tests and inline configs
    pub fn with(mut self, name: impl Into<String>, account_id: impl Into<String>) -> Self {
        self.0.insert(name.into(), account_id.into());
        self
    }

    /// Resolve a source account name. Entries mapped to an empty id count as missing.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AccountMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
