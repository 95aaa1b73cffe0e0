use crate::providers::ProviderKind;
use std::fmt;

/// Header printed ahead of every report, saved or not.
#[must_use]
pub fn banner() -> String {
  format!(
    "\nOSINT - IP Lookup [Version {}]\n(c) Lyxt. All rights reserved.\n",
    env!("CARGO_PKG_VERSION")
  )
}

/// Outcome of a single provider invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResult {
  pub provider: ProviderKind,
  pub text: String,
  pub is_error: bool,
}

impl ProviderResult {
  pub fn ok(provider: ProviderKind, text: impl Into<String>) -> Self {
    Self {
      provider,
      text: text.into(),
      is_error: false,
    }
  }

  /// Builds an error slot; `detail` becomes `[ERROR] <detail>`.
  pub fn error(provider: ProviderKind, detail: impl fmt::Display) -> Self {
    Self {
      provider,
      text: format!("[ERROR] {detail}\n"),
      is_error: true,
    }
  }
}

/// Provider results in canonical order.
#[derive(Debug, Default, Clone)]
pub struct AggregateReport {
  results: Vec<ProviderResult>,
}

impl AggregateReport {
  /// Orders `results` canonically, whatever order they arrived in.
  #[must_use]
  pub fn from_results(mut results: Vec<ProviderResult>) -> Self {
    results.sort_by_key(|r| r.provider);
    Self { results }
  }

  #[must_use]
  pub fn results(&self) -> &[ProviderResult] {
    &self.results
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.results.is_empty()
  }

  #[must_use]
  pub fn error_count(&self) -> usize {
    self.results.iter().filter(|r| r.is_error).count()
  }

  /// Banner followed by the report body; this is what gets printed and saved.
  #[must_use]
  pub fn render(&self) -> String {
    let mut out = banner();
    out.push_str(&self.to_string());
    out
  }
}

impl fmt::Display for AggregateReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for r in &self.results {
      f.write_str(&r.text)?;
    }
    Ok(())
  }
}

/// Helper for `Key: value` lines with the usual placeholder.
pub(crate) fn field(key: &str, value: Option<&str>) -> String {
  format!("{key}: {}\n", value.filter(|v| !v.is_empty()).unwrap_or("N/A"))
}

/// Opens a provider block: `\n[ <title> ]\n`.
pub(crate) fn section(title: &str) -> String {
  format!("\n[ {title} ]\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn results_are_reordered_canonically() {
    let report = AggregateReport::from_results(vec![
      ProviderResult::ok(ProviderKind::PortScan, "scan\n"),
      ProviderResult::ok(ProviderKind::Whois, "whois\n"),
      ProviderResult::error(ProviderKind::Shodan, "Shodan lookup failed: x"),
    ]);

    let kinds: Vec<_> = report.results().iter().map(|r| r.provider).collect();
    assert_eq!(
      kinds,
      vec![
        ProviderKind::Whois,
        ProviderKind::Shodan,
        ProviderKind::PortScan
      ]
    );
    assert_eq!(
      report.to_string(),
      "whois\n[ERROR] Shodan lookup failed: x\nscan\n"
    );
    assert_eq!(report.error_count(), 1);
  }

  #[test]
  fn empty_report_renders_only_the_banner() {
    let report = AggregateReport::default();
    assert!(report.is_empty());
    assert_eq!(report.render(), banner());
    assert!(banner().ends_with("]\n(c) Lyxt. All rights reserved.\n"));
  }

  #[test]
  fn field_falls_back_to_placeholder() {
    assert_eq!(field("City", None), "City: N/A\n");
    assert_eq!(field("City", Some("")), "City: N/A\n");
    assert_eq!(field("City", Some("Lisbon")), "City: Lisbon\n");
  }
}
