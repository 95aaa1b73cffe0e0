use clap::Parser;
use std::ffi::OsString;

#[derive(Parser, Debug, Clone)]
#[command(name = "ipwho", author = "Lyxt", version)]
#[command(
  about = "Perform OSINT lookups on an IP address.",
  long_about = "Runs WHOIS, GeoIP, Shodan, AbuseIPDB and Nmap lookups against a single IP address concurrently and prints the combined report, optionally saving it under the output directory."
)]
pub struct Cli {
  /// Target IP address.
  #[arg(required_unless_present = "config_show")]
  pub ip: Option<String>,

  /// Perform WHOIS lookup.
  #[arg(short, long)]
  pub whois: bool,

  /// Perform GeoIP lookup.
  #[arg(short, long)]
  pub geoip: bool,

  /// Perform Shodan lookup (also accepted as `-sd`).
  #[arg(short, long)]
  pub shodan: bool,

  /// Check IP reputation on `AbuseIPDB` (also accepted as `-aip`).
  #[arg(short, long)]
  pub abuseipdb: bool,

  /// Run Nmap scan (-sV -Pn --top-ports 100 -T4).
  #[arg(short, long)]
  pub nmap: bool,

  /// Enable every lookup.
  #[arg(short = 'A', long)]
  pub all: bool,

  /// Enable verbose output.
  #[arg(short, long)]
  pub verbose: bool,

  /// Save results to a file under the output directory.
  #[arg(short, long, value_name = "NAME", allow_hyphen_values = true)]
  pub output: Option<String>,

  /// Shodan API key.
  /// Overrides the `SHODAN_API_KEY` environment variable if both are set.
  #[arg(long = "shodan-api-key", value_name = "API_KEY")]
  pub shodan_api_key: Option<String>,

  /// `AbuseIPDB` API key.
  /// Overrides the `ABUSEIPDB_API_KEY` environment variable if both are set.
  #[arg(long = "abuseipdb-api-key", value_name = "API_KEY")]
  pub abuseipdb_api_key: Option<String>,

  /// Persist any api-key flags that are present into the user config file.
  #[arg(long)]
  pub save_keys: bool,

  /// Print the current merged configuration and exit.
  #[arg(long)]
  pub config_show: bool,
}

impl Cli {
  /// Parses the process arguments, accepting the legacy `-sd` / `-aip` forms.
  #[must_use]
  pub fn parse_normalized() -> Self {
    Self::parse_from(normalize_args(std::env::args_os()))
  }
}

/// Rewrites multi-letter short flags that clap cannot express.
///
/// The value following `-o`/`--output` is left alone.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
  I: IntoIterator<Item = T>,
  T: Into<OsString>,
{
  let mut takes_value = false;
  args
    .into_iter()
    .map(Into::into)
    .map(|arg| {
      let is_value = std::mem::replace(
        &mut takes_value,
        matches!(arg.to_str(), Some("-o" | "--output")),
      );
      match arg.to_str() {
        Some("-sd") if !is_value => OsString::from("--shodan"),
        Some("-aip") if !is_value => OsString::from("--abuseipdb"),
        _ => arg,
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
    let argv = std::iter::once("ipwho").chain(args.iter().copied());
    Cli::try_parse_from(normalize_args(argv))
  }

  #[test]
  fn test_basic_target() {
    let cli = parse(&["8.8.8.8"]).expect("Should parse basic target");
    assert_eq!(cli.ip.as_deref(), Some("8.8.8.8"));
    assert!(!cli.whois);
    assert!(!cli.geoip);
    assert!(!cli.shodan);
    assert!(!cli.abuseipdb);
    assert!(!cli.nmap);
    assert!(!cli.verbose);
    assert!(cli.output.is_none());
  }

  #[test]
  fn test_legacy_short_flags() {
    let cli = parse(&["1.1.1.1", "-w", "-g", "-sd", "-aip", "-n", "-v"])
      .expect("Should parse legacy short flags");
    assert!(cli.whois);
    assert!(cli.geoip);
    assert!(cli.shodan);
    assert!(cli.abuseipdb);
    assert!(cli.nmap);
    assert!(cli.verbose);
  }

  #[test]
  fn test_long_flags() {
    let cli = parse(&["1.1.1.1", "--shodan", "--abuseipdb", "--output", "r"])
      .expect("Should parse long flags");
    assert!(cli.shodan);
    assert!(cli.abuseipdb);
    assert_eq!(cli.output.as_deref(), Some("r"));
  }

  #[test]
  fn test_normalization_leaves_values_alone() {
    let args = normalize_args(["ipwho", "-o", "-sd.txt", "8.8.8.8"]);
    assert_eq!(args[2], OsString::from("-sd.txt"));
  }

  #[test]
  fn test_output_value_is_not_rewritten() {
    let args = normalize_args(["ipwho", "8.8.8.8", "-o", "-sd", "-aip"]);
    assert_eq!(args[3], OsString::from("-sd"));
    assert_eq!(args[4], OsString::from("--abuseipdb"));

    let args = normalize_args(["ipwho", "--output", "-aip", "-sd"]);
    assert_eq!(args[2], OsString::from("-aip"));
    assert_eq!(args[3], OsString::from("--shodan"));

    let cli = parse(&["8.8.8.8", "-o", "-sd", "-w"])
      .expect("Should accept -sd as an output name");
    assert_eq!(cli.output.as_deref(), Some("-sd"));
    assert!(!cli.shodan);
    assert!(cli.whois);
  }

  #[test]
  fn test_api_key_flags() {
    let cli = parse(&[
      "8.8.8.8",
      "-sd",
      "--shodan-api-key",
      "s123",
      "--abuseipdb-api-key",
      "a456",
    ])
    .expect("Should parse api key flags");
    assert_eq!(cli.shodan_api_key.as_deref(), Some("s123"));
    assert_eq!(cli.abuseipdb_api_key.as_deref(), Some("a456"));
  }

  #[test]
  fn test_missing_target_arg_fails() {
    let result = parse(&["-w"]);
    assert!(
      matches!(
        result.unwrap_err().kind(),
        clap::error::ErrorKind::MissingRequiredArgument
      ),
      "Error kind should be MissingRequiredArgument"
    );
  }

  #[test]
  fn test_config_show_needs_no_target() {
    let cli = parse(&["--config-show"]).expect("Should parse --config-show");
    assert!(cli.config_show);
    assert!(cli.ip.is_none());
  }
}
