//! Fan-out / fan-in of the enabled providers.

use crate::{
  config::Config,
  options::LookupRequest,
  providers::{
    abuseipdb::AbuseIpDbProvider,
    geo::GeoProvider,
    portscan::{NmapRunner, PortScanProvider},
    shodan::ShodanProvider,
    whois::WhoisProvider,
    Provider, ProviderKind,
  },
  report::{AggregateReport, ProviderResult},
};
use futures::future::join_all;
use reqwest::Client;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, info, warn};

/// Holds one provider per kind and runs the enabled ones concurrently.
#[derive(Default, Clone)]
pub struct Dispatcher {
  providers: BTreeMap<ProviderKind, Arc<dyn Provider>>,
}

impl Dispatcher {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// The real providers, wired from `config`.
  #[must_use]
  pub fn from_config(config: &Config, client: &Client) -> Self {
    let dispatcher = match WhoisProvider::system() {
      Ok(whois) => Self::new().with(whois),
      Err(e) => {
        warn!(error = %e, "system resolver unavailable; WHOIS disabled");
        Self::new()
      }
    };

    dispatcher
      .with(GeoProvider::new(client.clone(), &config.geoip_base_url))
      .with(ShodanProvider::new(
        client.clone(),
        &config.shodan_base_url,
        config.shodan_api_key.clone(),
      ))
      .with(AbuseIpDbProvider::new(
        client.clone(),
        &config.abuseipdb_base_url,
        config.abuseipdb_api_key.clone(),
        config.abuseipdb_max_age_days,
      ))
      .with(PortScanProvider::new(
        NmapRunner::new(&config.nmap_program),
        config.scan_timeout,
      ))
  }

  /// Registers `provider`, replacing any earlier one of the same kind.
  #[must_use]
  pub fn with(mut self, provider: impl Provider + 'static) -> Self {
    self.providers.insert(provider.kind(), Arc::new(provider));
    self
  }

  /// Runs every enabled provider against the request's address.
  ///
  /// All tasks are spawned before any is awaited, and every one runs to its
  /// own completion. The report is assembled in canonical order.
  pub async fn run(&self, request: &LookupRequest) -> AggregateReport {
    let ip: Arc<str> = Arc::from(request.ip_address());

    let tasks: Vec<_> = request
      .enabled()
      .map(|kind| {
        let provider = self.providers.get(&kind).cloned();
        let ip = Arc::clone(&ip);
        let handle = tokio::spawn(async move {
          match provider {
            Some(p) => p.lookup(&ip).await,
            None => ProviderResult::error(
              kind,
              format!("{kind} lookup failed: provider not available"),
            ),
          }
        });
        (kind, handle)
      })
      .collect();

    info!(count = tasks.len(), ip = %ip, "lookups dispatched");

    let (kinds, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    let results = join_all(handles)
      .await
      .into_iter()
      .zip(kinds)
      .map(|(joined, kind)| {
        joined.unwrap_or_else(|e| {
          debug!(provider = %kind, error = %e, "lookup task aborted");
          ProviderResult::error(kind, format!("{kind} lookup failed: {e}"))
        })
      })
      .collect();

    AggregateReport::from_results(results)
  }
}
