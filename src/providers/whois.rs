//! IP WHOIS: origin ASN, registry network and reverse DNS.
//!
//! The registry half (ASN, country, network) and the reverse-DNS half run
//! side by side and fail independently. A missing PTR record only changes
//! the hostname line; it never discards the registry data.

use super::{finish, LookupError, Provider, ProviderKind};
use crate::report::{field, section, ProviderResult};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hickory_resolver::{Resolver, TokioResolver};
use icann_rdap_client::prelude::*;
use icann_rdap_common::response::RdapResponse;
use serde::Deserialize;
use std::{fmt::Write as _, net::IpAddr, str::FromStr, sync::Arc};
use tracing::{debug, info};

const NO_PTR: &str = "No PTR record found";

/// Registry facts about the network an address belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsnRecord {
  pub asn: String,
  pub cidr: Option<String>,
  pub country: Option<String>,
  pub registry: Option<String>,
  pub network_name: Option<String>,
}

#[async_trait]
pub trait Registry: Send + Sync {
  async fn lookup(&self, ip: IpAddr) -> Result<AsnRecord, LookupError>;
}

#[async_trait]
pub trait ReverseDns: Send + Sync {
  /// `Ok(None)` when the address has no PTR record.
  async fn hostname(&self, ip: IpAddr) -> Result<Option<String>, LookupError>;
}

/// Builds the system resolver shared by the registry and PTR halves.
///
/// # Errors
///
/// Returns an error if the system resolver configuration cannot be read.
pub fn system_resolver() -> Result<Arc<TokioResolver>, LookupError> {
  Ok(Arc::new(
    Resolver::builder_tokio()
      .map_err(|e| LookupError::Resolve(e.to_string()))?
      .build(),
  ))
}

/// Team Cymru origin lookup over DNS, enriched with the RDAP network name.
#[derive(Clone)]
pub struct CymruRdapRegistry {
  resolver: Arc<TokioResolver>,
}

impl CymruRdapRegistry {
  pub const fn new(resolver: Arc<TokioResolver>) -> Self {
    Self { resolver }
  }
}

#[async_trait]
impl Registry for CymruRdapRegistry {
  async fn lookup(&self, ip: IpAddr) -> Result<AsnRecord, LookupError> {
    let (origin, network) =
      tokio::join!(cymru_origin(&self.resolver, ip), rdap_network(ip));

    if let Err(e) = &network {
      debug!(%ip, error = %e, "RDAP network query failed");
    }
    Ok(merge(origin?, network.ok()))
  }
}

/// Fills the origin record from the RDAP network, origin data first.
fn merge(mut record: AsnRecord, network: Option<RdapNetwork>) -> AsnRecord {
  let Some(net) = network else {
    return record;
  };

  let range = net.range();
  record.network_name = net.name.or(net.handle);
  if record.country.is_none() {
    record.country = net.country;
  }
  if record.cidr.is_none() {
    record.cidr = range;
  }
  record
}

/// PTR lookups through the system resolver.
#[derive(Clone)]
pub struct SystemReverseDns {
  resolver: Arc<TokioResolver>,
}

impl SystemReverseDns {
  pub const fn new(resolver: Arc<TokioResolver>) -> Self {
    Self { resolver }
  }
}

#[async_trait]
impl ReverseDns for SystemReverseDns {
  async fn hostname(&self, ip: IpAddr) -> Result<Option<String>, LookupError> {
    let answer = self
      .resolver
      .reverse_lookup(ip)
      .await
      .map_err(|e| LookupError::Resolve(e.to_string()))?;

    Ok(
      answer
        .iter()
        .next()
        .map(|ptr| ptr.to_string().trim_end_matches('.').to_string()),
    )
  }
}

/// Name to query for the origin TXT record of `ip`.
#[must_use]
pub fn cymru_origin_name(ip: IpAddr) -> String {
  match ip {
    IpAddr::V4(v4) => {
      let [a, b, c, d] = v4.octets();
      format!("{d}.{c}.{b}.{a}.origin.asn.cymru.com.")
    }
    IpAddr::V6(v6) => {
      let mut name = String::with_capacity(96);
      for byte in v6.octets().iter().rev() {
        let _ = write!(name, "{:x}.{:x}.", byte & 0x0f, byte >> 4);
      }
      name.push_str("origin6.asn.cymru.com.");
      name
    }
  }
}

/// Parses `"15169 | 8.8.8.0/24 | US | arin | 2014-03-14"`.
///
/// Multi-origin prefixes list several ASNs in the first column; the first wins.
#[must_use]
pub fn parse_origin(txt: &str) -> Option<AsnRecord> {
  let cols: Vec<&str> = txt
    .trim()
    .trim_matches('"')
    .split('|')
    .map(str::trim)
    .collect();
  let asn = cols.first()?.split_whitespace().next()?;
  if asn.is_empty() || !asn.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }

  let non_empty = |i: usize| {
    cols
      .get(i)
      .filter(|s| !s.is_empty())
      .map(|s| (*s).to_string())
  };

  Some(AsnRecord {
    asn: asn.to_string(),
    cidr: non_empty(1),
    country: non_empty(2),
    registry: non_empty(3),
    network_name: None,
  })
}

async fn cymru_origin(
  resolver: &TokioResolver,
  ip: IpAddr,
) -> Result<AsnRecord, LookupError> {
  let name = cymru_origin_name(ip);
  let answer = resolver
    .txt_lookup(name.as_str())
    .await
    .map_err(|e| {
      LookupError::NotFound(format!("no ASN record for {ip}: {e}"))
    })?;

  answer
    .iter()
    .map(|txt| {
      txt
        .txt_data()
        .iter()
        .map(|chunk| String::from_utf8_lossy(chunk))
        .collect::<String>()
    })
    .find_map(|line| parse_origin(&line))
    .ok_or_else(|| LookupError::NotFound(format!("no ASN record for {ip}")))
}

/// The part of an RDAP ip network object we care about.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RdapNetwork {
  handle: Option<String>,
  name: Option<String>,
  country: Option<String>,
  start_address: Option<String>,
  end_address: Option<String>,
}

impl RdapNetwork {
  fn range(&self) -> Option<String> {
    match (&self.start_address, &self.end_address) {
      (Some(start), Some(end)) => Some(format!("{start} - {end}")),
      _ => None,
    }
  }
}

async fn rdap_network(ip: IpAddr) -> Result<RdapNetwork> {
  let query = QueryType::from_str(&ip.to_string())?;
  let client = create_client(&ClientConfig::default())?;
  let store = MemoryBootstrapStore::new();

  let resp = rdap_bootstrapped_request(&query, &client, &store, |_| {}).await?;

  match &resp.rdap {
    RdapResponse::Network(net) => {
      Ok(serde_json::from_value(serde_json::to_value(net)?)?)
    }
    _ => Err(anyhow!("RDAP response for {ip} was not an ip network")),
  }
}

pub struct WhoisProvider<R, D> {
  registry: R,
  rdns: D,
}

impl WhoisProvider<CymruRdapRegistry, SystemReverseDns> {
  /// Both halves share one system resolver.
  ///
  /// # Errors
  ///
  /// Returns an error if the system resolver cannot be built.
  pub fn system() -> Result<Self, LookupError> {
    Ok(Self::with_resolver(system_resolver()?))
  }

  #[must_use]
  pub fn with_resolver(resolver: Arc<TokioResolver>) -> Self {
    Self::new(
      CymruRdapRegistry::new(Arc::clone(&resolver)),
      SystemReverseDns::new(resolver),
    )
  }
}

impl<R: Registry, D: ReverseDns> WhoisProvider<R, D> {
  pub const fn new(registry: R, rdns: D) -> Self {
    Self { registry, rdns }
  }

  async fn fetch(&self, target: &str) -> Result<String, LookupError> {
    let ip = IpAddr::from_str(target).map_err(|_| {
      LookupError::Resolve(format!(
        "'{target}' does not appear to be an IPv4 or IPv6 address"
      ))
    })?;

    let (record, hostname) =
      tokio::join!(self.registry.lookup(ip), self.rdns.hostname(ip));
    let record = record?;

    let hostname = match hostname {
      Ok(Some(name)) => name,
      Ok(None) => NO_PTR.to_string(),
      Err(e) => {
        debug!(%ip, error = %e, "reverse DNS failed");
        NO_PTR.to_string()
      }
    };

    let mut out = section("WHOIS Information");
    let _ = writeln!(out, "IP Address: {ip}");
    let _ = writeln!(out, "Hostname: {hostname}");
    let _ = writeln!(out, "ASN: AS{}", record.asn);
    out.push_str(&field("Country", record.country.as_deref()));
    out.push_str(&field("Network", record.network_name.as_deref()));
    out.push_str(&field("CIDR", record.cidr.as_deref()));
    Ok(out)
  }
}

#[async_trait]
impl<R: Registry, D: ReverseDns> Provider for WhoisProvider<R, D> {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Whois
  }

  async fn lookup(&self, ip: &str) -> ProviderResult {
    info!("Performing WHOIS lookup for {ip}...");
    finish(self.kind(), self.fetch(ip).await)
  }
}
