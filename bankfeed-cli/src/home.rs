use anyhow::{Context, Result};
use std::path::PathBuf;

pub fn bankfeed_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".bankfeed"))
}

/// `--config` / `BANKFEED_CONFIG` wins; otherwise `~/.bankfeed/config.toml`
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(p) => Ok(p),
        None => Ok(bankfeed_home()?.join("config.toml")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let p = PathBuf::from("/etc/bankfeed.toml");
        assert_eq!(config_path(Some(p.clone())).unwrap(), p);
    }
}
