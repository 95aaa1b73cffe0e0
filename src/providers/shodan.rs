use super::{finish, LookupError, Provider, ProviderKind};
use crate::config::SHODAN_KEY_ENV;
use crate::report::{field, section, ProviderResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

/// The parts of `/shodan/host/{ip}` we report on.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostInfo {
  /// Set instead of the host fields when the query failed.
  pub error: Option<String>,
  pub ports: Option<Vec<u16>>,
  pub org: Option<String>,
  #[serde(default)]
  pub hostnames: Vec<String>,
}

impl HostInfo {
  fn render(&self) -> String {
    let mut out = section("Shodan Information");
    if let Some(err) = &self.error {
      out.push_str(&format!("Error: {err}\n"));
      return out;
    }

    let ports = self.ports.as_ref().map(|p| {
      let mut p = p.clone();
      p.sort_unstable();
      p.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    });
    out.push_str(&field("Open Ports", ports.as_deref()));
    out.push_str(&field("Organization", self.org.as_deref()));
    out.push_str(&field("Hostnames", Some(&self.hostnames.join(", "))));
    out
  }
}

pub struct ShodanProvider {
  client: Client,
  base_url: String,
  api_key: Option<String>,
}

impl ShodanProvider {
  pub fn new(
    client: Client,
    base_url: impl Into<String>,
    api_key: Option<String>,
  ) -> Self {
    Self {
      client,
      base_url: base_url.into(),
      api_key,
    }
  }

  /// Queries Shodan for a host.
  ///
  /// Shodan reports unknown hosts and bad keys through an `error` field with
  /// a non-2xx status, so the body is decoded regardless of status.
  ///
  /// # Errors
  ///
  /// Returns an error if no key is configured, the request fails, or the
  /// body is not the expected JSON.
  pub async fn fetch_host(&self, ip: &str) -> Result<HostInfo, LookupError> {
    let key = self
      .api_key
      .as_deref()
      .ok_or(LookupError::MissingApiKey(SHODAN_KEY_ENV))?;
    let url =
      format!("{}/shodan/host/{ip}", self.base_url.trim_end_matches('/'));

    let response = self.client.get(&url).query(&[("key", key)]).send().await?;
    let status = response.status();
    let body = response.text().await?;

    serde_json::from_str::<HostInfo>(&body).map_err(|_| LookupError::Api {
      status: status.as_u16(),
      body,
    })
  }
}

#[async_trait]
impl Provider for ShodanProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Shodan
  }

  async fn lookup(&self, ip: &str) -> ProviderResult {
    info!("Querying Shodan for {ip}...");
    let outcome = self.fetch_host(ip).await.map(|h| h.render());
    finish(self.kind(), outcome)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn mock(status: u16, body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/shodan/host/1.2.3.4"))
      .and(query_param("key", "secret"))
      .respond_with(ResponseTemplate::new(status).set_body_json(body))
      .mount(&server)
      .await;
    server
  }

  #[tokio::test]
  async fn reports_open_ports() {
    let server = mock(
      200,
      json!({
        "ip_str": "1.2.3.4",
        "ports": [443, 22, 80],
        "org": "Example Org",
        "hostnames": ["a.example.com"]
      }),
    )
    .await;
    let provider =
      ShodanProvider::new(Client::new(), server.uri(), Some("secret".into()));

    let result = provider.lookup("1.2.3.4").await;
    assert!(!result.is_error);
    assert_eq!(
      result.text,
      "\n[ Shodan Information ]\nOpen Ports: 22, 80, 443\n\
       Organization: Example Org\nHostnames: a.example.com\n"
    );
  }

  #[tokio::test]
  async fn error_field_is_reported_in_the_block() {
    let server =
      mock(404, json!({ "error": "No information available for that IP." }))
        .await;
    let provider =
      ShodanProvider::new(Client::new(), server.uri(), Some("secret".into()));

    let result = provider.lookup("1.2.3.4").await;
    assert_eq!(
      result.text,
      "\n[ Shodan Information ]\nError: No information available for that IP.\n"
    );
  }

  #[tokio::test]
  async fn non_json_body_is_an_error_line() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
      .mount(&server)
      .await;
    let provider =
      ShodanProvider::new(Client::new(), server.uri(), Some("secret".into()));

    let result = provider.lookup("1.2.3.4").await;
    assert!(result.is_error);
    assert_eq!(
      result.text,
      "[ERROR] Shodan lookup failed: 502 - bad gateway\n"
    );
  }

  #[tokio::test]
  async fn network_errors_do_not_leak_the_key() {
    let provider = ShodanProvider::new(
      Client::new(),
      "http://127.0.0.1:9",
      Some("SUPERSECRETKEY".into()),
    );

    let result = provider.lookup("1.2.3.4").await;
    assert!(result.is_error);
    assert!(result.text.starts_with("[ERROR] Shodan lookup failed:"));
    assert!(!result.text.contains("SUPERSECRETKEY"));
    assert!(!result.text.contains("key="));
  }

  #[tokio::test]
  async fn missing_key_skips_the_request() {
    let server = MockServer::start().await;
    let provider = ShodanProvider::new(Client::new(), server.uri(), None);

    let result = provider.lookup("1.2.3.4").await;
    assert!(result.is_error);
    assert!(result.text.contains("SHODAN_API_KEY"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
  }
}
