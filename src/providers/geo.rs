//! IP geolocation service using ip-api.com.

use super::{finish, LookupError, Provider, ProviderKind};
use crate::report::{field, section, ProviderResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

/// Geolocation data from ip-api.com
///
/// Fields are based on the `ip-api.com` JSON response structure.
/// Everything but `status` is optional; absent values render as "N/A".
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Info {
  /// Request status ("success" or "fail")
  #[serde(default)]
  pub status: String,

  /// Failure message (if status is "fail")
  pub message: Option<String>,

  /// Country name
  pub country: Option<String>,

  /// City name
  pub city: Option<String>,

  /// Region/State name
  pub region_name: Option<String>,

  /// Internet Service Provider
  pub isp: Option<String>,
}

impl Info {
  fn render(&self) -> String {
    let mut out = section("GeoIP Information");
    out.push_str(&field("Country", self.country.as_deref()));
    out.push_str(&field("City", self.city.as_deref()));
    out.push_str(&field("Region", self.region_name.as_deref()));
    out.push_str(&field("ISP", self.isp.as_deref()));
    out
  }
}

pub struct GeoProvider {
  client: Client,
  base_url: String,
}

impl GeoProvider {
  pub fn new(client: Client, base_url: impl Into<String>) -> Self {
    Self {
      client,
      base_url: base_url.into(),
    }
  }

  /// Fetches geolocation for an IP address.
  ///
  /// # Errors
  /// - Failed HTTP request
  /// - Deserialization error
  /// - API failure response
  pub async fn fetch_geo_info(&self, ip: &str) -> Result<Info, LookupError> {
    let url = format!("{}/json/{ip}", self.base_url.trim_end_matches('/'));

    let response = self.client.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(LookupError::Api {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
      });
    }

    let geo_info = response
      .json::<Info>()
      .await
      .map_err(|e| LookupError::Decode(e.to_string()))?;

    // ip-api omits `status` on some proxies; treat that as success.
    if geo_info.status == "fail" {
      let message = geo_info
        .message
        .unwrap_or_else(|| "Unknown API error".to_string());
      return Err(LookupError::NotFound(message));
    }

    Ok(geo_info)
  }
}

#[async_trait]
impl Provider for GeoProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::GeoIp
  }

  async fn lookup(&self, ip: &str) -> ProviderResult {
    info!("Performing GeoIP lookup for {ip}...");
    let outcome = self.fetch_geo_info(ip).await.map(|i| i.render());
    finish(self.kind(), outcome)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn provider_for(body: serde_json::Value) -> (MockServer, GeoProvider) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/json/8.8.8.8"))
      .respond_with(ResponseTemplate::new(200).set_body_json(body))
      .mount(&server)
      .await;
    let provider = GeoProvider::new(Client::new(), server.uri());
    (server, provider)
  }

  #[tokio::test]
  async fn renders_country_and_city() {
    let (_server, provider) = provider_for(json!({
      "status": "success",
      "country": "United States",
      "city": "Ashburn",
      "regionName": "Virginia",
      "isp": "Google LLC",
      "query": "8.8.8.8"
    }))
    .await;

    let result = provider.lookup("8.8.8.8").await;
    assert!(!result.is_error);
    assert_eq!(
      result.text,
      "\n[ GeoIP Information ]\nCountry: United States\nCity: Ashburn\n\
       Region: Virginia\nISP: Google LLC\n"
    );
  }

  #[tokio::test]
  async fn missing_fields_render_placeholder() {
    let (_server, provider) =
      provider_for(json!({ "status": "success", "country": "Portugal" }))
        .await;

    let result = provider.lookup("8.8.8.8").await;
    assert!(result.text.contains("Country: Portugal\n"));
    assert!(result.text.contains("City: N/A\n"));
  }

  #[tokio::test]
  async fn api_failure_becomes_error_line() {
    let (_server, provider) = provider_for(
      json!({ "status": "fail", "message": "private range", "query": "8.8.8.8" }),
    )
    .await;

    let result = provider.lookup("8.8.8.8").await;
    assert!(result.is_error);
    assert_eq!(result.text, "[ERROR] GeoIP lookup failed: private range\n");
  }

  #[tokio::test]
  async fn unreachable_endpoint_is_reported_not_raised() {
    let provider = GeoProvider::new(Client::new(), "http://127.0.0.1:9");
    let result = provider.lookup("8.8.8.8").await;
    assert!(result.is_error);
    assert!(result.text.starts_with("[ERROR] GeoIP lookup failed:"));
  }
}
