//! Runtime configuration handed to the dispatcher and its providers.

use crate::{cli::Cli, user_config::UserConfig};
use std::{env, fmt, path::PathBuf, time::Duration};

pub const SHODAN_KEY_ENV: &str = "SHODAN_API_KEY";
pub const ABUSEIPDB_KEY_ENV: &str = "ABUSEIPDB_API_KEY";

pub const DEFAULT_OUTPUT_DIR: &str = "outputs";
pub const DEFAULT_GEOIP_URL: &str = "http://ip-api.com";
pub const DEFAULT_SHODAN_URL: &str = "https://api.shodan.io";
pub const DEFAULT_ABUSEIPDB_URL: &str = "https://api.abuseipdb.com";
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct Config {
  pub shodan_api_key: Option<String>,
  pub abuseipdb_api_key: Option<String>,
  pub output_dir: PathBuf,
  pub geoip_base_url: String,
  pub shodan_base_url: String,
  pub abuseipdb_base_url: String,
  pub abuseipdb_max_age_days: u32,
  pub nmap_program: PathBuf,
  pub scan_timeout: Duration,
  pub http_timeout: Duration,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      shodan_api_key: None,
      abuseipdb_api_key: None,
      output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
      geoip_base_url: DEFAULT_GEOIP_URL.to_string(),
      shodan_base_url: DEFAULT_SHODAN_URL.to_string(),
      abuseipdb_base_url: DEFAULT_ABUSEIPDB_URL.to_string(),
      abuseipdb_max_age_days: 90,
      nmap_program: PathBuf::from("nmap"),
      scan_timeout: DEFAULT_SCAN_TIMEOUT,
      http_timeout: DEFAULT_HTTP_TIMEOUT,
    }
  }
}

impl Config {
  /// Merges API keys: flag, then environment, then the user config file.
  #[must_use]
  pub fn resolve(cli: &Cli, stored: &UserConfig) -> Self {
    Self {
      shodan_api_key: pick_key(
        cli.shodan_api_key.as_deref(),
        SHODAN_KEY_ENV,
        stored.shodan_api_key.as_deref(),
      ),
      abuseipdb_api_key: pick_key(
        cli.abuseipdb_api_key.as_deref(),
        ABUSEIPDB_KEY_ENV,
        stored.abuseipdb_api_key.as_deref(),
      ),
      ..Self::default()
    }
  }
}

fn pick_key(
  flag: Option<&str>,
  env_var: &str,
  stored: Option<&str>,
) -> Option<String> {
  flag
    .map(str::to_owned)
    .or_else(|| env::var(env_var).ok())
    .or_else(|| stored.map(str::to_owned))
    .filter(|k| !k.trim().is_empty())
}

fn mask(key: Option<&String>) -> String {
  match key {
    Some(k) if k.chars().count() > 4 => {
      let start = k.char_indices().rev().nth(3).map_or(0, |(i, _)| i);
      format!("****{}", &k[start..])
    }
    Some(_) => "****".to_string(),
    None => "(not set)".to_string(),
  }
}

impl fmt::Debug for Config {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Config")
      .field("shodan_api_key", &mask(self.shodan_api_key.as_ref()))
      .field("abuseipdb_api_key", &mask(self.abuseipdb_api_key.as_ref()))
      .field("output_dir", &self.output_dir)
      .field("geoip_base_url", &self.geoip_base_url)
      .field("shodan_base_url", &self.shodan_base_url)
      .field("abuseipdb_base_url", &self.abuseipdb_base_url)
      .field("abuseipdb_max_age_days", &self.abuseipdb_max_age_days)
      .field("nmap_program", &self.nmap_program)
      .field("scan_timeout", &self.scan_timeout)
      .field("http_timeout", &self.http_timeout)
      .finish()
  }
}
