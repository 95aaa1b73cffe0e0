//! Turns the CLI flags into a lookup request.

use crate::{cli::Cli, providers::ProviderKind};
use std::{collections::BTreeSet, net::IpAddr};

/// What to look up and how loudly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
  ip_address: String,
  enabled: BTreeSet<ProviderKind>,
  verbose: bool,
}

impl LookupRequest {
  pub fn new(
    ip_address: impl Into<String>,
    enabled: impl IntoIterator<Item = ProviderKind>,
    verbose: bool,
  ) -> Self {
    Self {
      ip_address: ip_address.into().trim().to_string(),
      enabled: enabled.into_iter().collect(),
      verbose,
    }
  }

  /// The target exactly as given; providers report malformed input themselves.
  #[must_use]
  pub fn ip_address(&self) -> &str {
    &self.ip_address
  }

  /// Whether the target parses as an IPv4/IPv6 address. Only used to warn.
  #[must_use]
  pub fn is_plausible_ip(&self) -> bool {
    self.ip_address.parse::<IpAddr>().is_ok()
  }

  /// Enabled providers in canonical order.
  pub fn enabled(&self) -> impl Iterator<Item = ProviderKind> + '_ {
    self.enabled.iter().copied()
  }

  #[must_use]
  pub fn is_enabled(&self, kind: ProviderKind) -> bool {
    self.enabled.contains(&kind)
  }

  #[must_use]
  pub const fn verbose(&self) -> bool {
    self.verbose
  }
}

/// Maps the boolean lookup flags onto the set of providers to run.
#[must_use]
pub fn resolve(cli: &Cli) -> BTreeSet<ProviderKind> {
  if cli.all {
    return ProviderKind::ALL.into_iter().collect();
  }

  [
    (cli.whois, ProviderKind::Whois),
    (cli.geoip, ProviderKind::GeoIp),
    (cli.shodan, ProviderKind::Shodan),
    (cli.abuseipdb, ProviderKind::AbuseIpDb),
    (cli.nmap, ProviderKind::PortScan),
  ]
  .into_iter()
  .filter_map(|(on, kind)| on.then_some(kind))
  .collect()
}

/// Builds the request for a parsed command line.
#[must_use]
pub fn request_from_cli(cli: &Cli) -> LookupRequest {
  LookupRequest::new(
    cli.ip.clone().unwrap_or_default(),
    resolve(cli),
    cli.verbose,
  )
}
