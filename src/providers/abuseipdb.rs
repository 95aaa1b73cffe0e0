use super::{finish, LookupError, Provider, ProviderKind};
use crate::config::ABUSEIPDB_KEY_ENV;
use crate::report::{field, section, ProviderResult};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
struct ApiResponse {
  data: Option<Report>,
}

/// The fields of an `/api/v2/check` report that end up in the output.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Report {
  pub abuse_confidence_score: Option<u32>,
  pub total_reports: Option<u32>,
  pub country_code: Option<String>,
  pub isp: Option<String>,
  pub usage_type: Option<String>,
  pub last_reported_at: Option<String>,
}

impl Report {
  fn render(&self) -> String {
    let score = self.abuse_confidence_score.map(|s| s.to_string());
    let total = self.total_reports.map(|t| t.to_string());

    let mut out = section("AbuseIPDB Information");
    out.push_str(&field("Abuse Confidence Score", score.as_deref()));
    out.push_str(&field("Total Reports", total.as_deref()));
    out.push_str(&field("Country Code", self.country_code.as_deref()));
    out.push_str(&field("ISP", self.isp.as_deref()));
    out.push_str(&field("Usage Type", self.usage_type.as_deref()));
    out.push_str(&field("Last Reported", self.last_reported_at.as_deref()));
    out
  }
}

pub struct AbuseIpDbProvider {
  client: Client,
  base_url: String,
  api_key: Option<String>,
  max_age_days: u32,
}

impl AbuseIpDbProvider {
  pub fn new(
    client: Client,
    base_url: impl Into<String>,
    api_key: Option<String>,
    max_age_days: u32,
  ) -> Self {
    Self {
      client,
      base_url: base_url.into(),
      api_key,
      max_age_days,
    }
  }

  /// Runs an `AbuseIPDB` check and renders the block.
  ///
  /// A non-200 reply and a reply without `data` both still render a block,
  /// as they describe the remote answer rather than a local failure.
  ///
  /// # Errors
  ///
  /// Returns an error if no key is configured, the request fails, or a 200
  /// reply is not valid JSON.
  pub async fn check(&self, ip: &str) -> Result<String, LookupError> {
    let key = self
      .api_key
      .as_deref()
      .ok_or(LookupError::MissingApiKey(ABUSEIPDB_KEY_ENV))?;
    let url = format!("{}/api/v2/check", self.base_url.trim_end_matches('/'));
    let max_age = self.max_age_days.to_string();

    let response = self
      .client
      .get(&url)
      .header(header::ACCEPT, "application/json")
      .header("Key", key)
      .query(&[
        ("ipAddress", ip),
        ("maxAgeInDays", max_age.as_str()),
        ("verbose", "true"),
      ])
      .send()
      .await?;

    let status = response.status();
    let body = response.text().await?;
    let mut out = section("AbuseIPDB Information");

    if status != reqwest::StatusCode::OK {
      out.push_str(&format!("Error: {} - {body}\n", status.as_u16()));
      return Ok(out);
    }

    let parsed: ApiResponse = serde_json::from_str(&body)
      .map_err(|e| LookupError::Decode(e.to_string()))?;

    match parsed.data {
      Some(report) => Ok(report.render()),
      None => {
        out.push_str("No data found for this IP.\n");
        Ok(out)
      }
    }
  }
}

#[async_trait]
impl Provider for AbuseIpDbProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::AbuseIpDb
  }

  async fn lookup(&self, ip: &str) -> ProviderResult {
    info!("Checking AbuseIPDB for {ip}...");
    finish(self.kind(), self.check(ip).await)
  }
}
