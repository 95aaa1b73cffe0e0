use serde::{Deserialize, Serialize};

const APP_NAME: &str = "ipwho";
const FILE_NAME: Option<&str> = None;

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct UserConfig {
  pub shodan_api_key: Option<String>,
  pub abuseipdb_api_key: Option<String>,
}

impl UserConfig {
  /// Copies over any key present in `other`; returns whether anything changed.
  pub fn absorb(&mut self, other: &Self) -> bool {
    let mut changed = false;
    if let Some(k) = &other.shodan_api_key {
      self.shodan_api_key = Some(k.clone());
      changed = true;
    }
    if let Some(k) = &other.abuseipdb_api_key {
      self.abuseipdb_api_key = Some(k.clone());
      changed = true;
    }
    changed
  }
}

/// Read ~/.config/ipwho/default-config.toml (or OS equivalent).
pub fn load() -> UserConfig {
  confy::load(APP_NAME, FILE_NAME).unwrap_or_default()
}

pub fn store(cfg: &UserConfig) -> anyhow::Result<()> {
  confy::store(APP_NAME, FILE_NAME, cfg).map_err(Into::into)
}
