//! Lookup providers.
//!
//! Every provider takes an IP address and hands back a [`ProviderResult`]:
//! either its formatted text block or a one-line error. Failures never leave
//! the provider boundary, so the dispatcher has nothing to catch.

use crate::report::ProviderResult;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod abuseipdb;
pub mod geo;
pub mod portscan;
pub mod shodan;
pub mod whois;

/// The lookups this tool knows how to run.
///
/// Declaration order is the canonical report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderKind {
  Whois,
  GeoIp,
  Shodan,
  AbuseIpDb,
  PortScan,
}

impl ProviderKind {
  /// All providers, in canonical report order.
  pub const ALL: [Self; 5] = [
    Self::Whois,
    Self::GeoIp,
    Self::Shodan,
    Self::AbuseIpDb,
    Self::PortScan,
  ];

  /// Label used in error lines (`[ERROR] <label> lookup failed: ...`).
  #[must_use]
  pub const fn label(self) -> &'static str {
    match self {
      Self::Whois => "WHOIS",
      Self::GeoIp => "GeoIP",
      Self::Shodan => "Shodan",
      Self::AbuseIpDb => "AbuseIPDB",
      Self::PortScan => "Nmap",
    }
  }
}

impl fmt::Display for ProviderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Everything that can go wrong inside a single provider.
#[derive(Debug, Error)]
pub enum LookupError {
  /// Carries no URL: query strings may hold API keys.
  #[error("{0}")]
  Network(reqwest::Error),
  #[error("{0}")]
  NotFound(String),
  #[error("no API key configured (set {0})")]
  MissingApiKey(&'static str),
  #[error("{status} - {body}")]
  Api { status: u16, body: String },
  #[error("unexpected response: {0}")]
  Decode(String),
  #[error("timed out after {}s", .0.as_secs())]
  Timeout(std::time::Duration),
  #[error("{0}")]
  Process(String),
  #[error("{0}")]
  Resolve(String),
}

impl From<reqwest::Error> for LookupError {
  fn from(e: reqwest::Error) -> Self {
    Self::Network(e.without_url())
  }
}

/// A single lookup against one IP address.
///
/// Implementations must not panic and must not return early with an error:
/// the result slot always carries text, successful or not.
#[async_trait]
pub trait Provider: Send + Sync {
  fn kind(&self) -> ProviderKind;

  async fn lookup(&self, ip: &str) -> ProviderResult;
}

/// Turns a provider's outcome into its report slot.
pub(crate) fn finish(
  kind: ProviderKind,
  outcome: Result<String, LookupError>,
) -> ProviderResult {
  match outcome {
    Ok(text) => ProviderResult::ok(kind, text),
    Err(e) => {
      tracing::debug!(provider = %kind, error = ?e, "lookup failed");
      ProviderResult::error(kind, format!("{kind} lookup failed: {e}"))
    }
  }
}
