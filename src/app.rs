use crate::cli::Cli;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::options::{self, LookupRequest};
use crate::output::OutputTarget;
use crate::report::AggregateReport;
use crate::user_config::{self, UserConfig};
use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub struct App {
  cli: Cli,
  config: Config,
  client: Client,
}

impl App {
  pub fn new() -> Result<Self> {
    let cli = Cli::parse_normalized();
    init_tracing(cli.verbose);

    let mut stored = user_config::load();
    if cli.save_keys {
      save_keys(&cli, &mut stored)?;
    }

    let config = Config::resolve(&cli, &stored);
    let client = Client::builder()
      .user_agent(format!("ipwho/{}", env!("CARGO_PKG_VERSION")))
      .timeout(config.http_timeout)
      .build()?;

    Ok(Self {
      cli,
      config,
      client,
    })
  }

  pub async fn run(&self) -> Result<()> {
    if self.cli.config_show {
      println!("{:#?}", self.config);
      return Ok(());
    }

    let request = options::request_from_cli(&self.cli);
    if !request.is_plausible_ip() {
      warn!(
        ip = request.ip_address(),
        "target does not parse as an IP address; lookups may fail"
      );
    }

    let report = self.lookup(&request).await;
    let text = report.render();
    println!("{text}");

    if let Some(name) = &self.cli.output {
      self.save(name, &text);
    }
    Ok(())
  }

  async fn lookup(&self, request: &LookupRequest) -> AggregateReport {
    let dispatcher = Dispatcher::from_config(&self.config, &self.client);
    let enabled = request.enabled().count();

    let spinner = progress(request.verbose(), enabled);
    let report = dispatcher.run(request).await;
    spinner.finish_and_clear();

    info!(
      lookups = enabled,
      failed = report.error_count(),
      "lookups finished"
    );
    report
  }

  fn save(&self, name: &str, text: &str) {
    let saved = OutputTarget::new(&self.config.output_dir, name)
      .and_then(|target| target.save(text));

    match saved {
      Ok(path) => println!(
        "{} Results saved to {}",
        style("[INFO]").green(),
        path.display()
      ),
      Err(e) => eprintln!("{} {e}", style("[ERROR]").red().bold()),
    }
  }
}

/// `RUST_LOG` wins; otherwise `-v` turns on this crate's progress lines.
fn init_tracing(verbose: bool) {
  let default = if verbose { "warn,ipwho=info" } else { "warn" };
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default));

  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .without_time()
    .try_init();
}

/// Spinner on stderr while lookups run; hidden when verbose or not a tty.
fn progress(verbose: bool, lookups: usize) -> ProgressBar {
  if verbose || lookups == 0 || !console::user_attended_stderr() {
    return ProgressBar::hidden();
  }

  let pb = ProgressBar::new_spinner();
  if let Ok(s) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
    pb.set_style(s);
  }
  pb.set_message(format!("Running {lookups} lookup(s)..."));
  pb.enable_steady_tick(Duration::from_millis(100));
  pb
}

fn save_keys(cli: &Cli, stored: &mut UserConfig) -> Result<()> {
  let incoming = UserConfig {
    shodan_api_key: cli.shodan_api_key.clone(),
    abuseipdb_api_key: cli.abuseipdb_api_key.clone(),
  };
  if stored.absorb(&incoming) {
    user_config::store(stored)?;
    info!("API keys saved to the user config file");
  } else {
    warn!("--save-keys given without any --*-api-key flag; nothing saved");
  }
  Ok(())
}
