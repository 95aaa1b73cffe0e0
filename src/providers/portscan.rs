//! Port scan via an external `nmap` process.

use super::{LookupError, Provider, ProviderKind};
use crate::report::{section, ProviderResult};
use async_trait::async_trait;
use std::{path::PathBuf, process::Stdio, time::Duration};
use tokio::{process::Command, time::timeout};
use tracing::{debug, info};

/// Fixed scan profile: version detection, no host discovery, top 100 ports,
/// aggressive timing.
pub const NMAP_ARGS: [&str; 5] = ["-sV", "-Pn", "--top-ports", "100", "-T4"];

/// Something that scans a host and returns the scanner's stdout.
#[async_trait]
pub trait ScanRunner: Send + Sync {
  async fn scan(&self, ip: &str) -> Result<String, LookupError>;
}

/// Runs the real `nmap` binary.
pub struct NmapRunner {
  program: PathBuf,
}

impl NmapRunner {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
    }
  }
}

#[async_trait]
impl ScanRunner for NmapRunner {
  async fn scan(&self, ip: &str) -> Result<String, LookupError> {
    let output = Command::new(&self.program)
      .args(NMAP_ARGS)
      .arg(ip)
      .stdin(Stdio::null())
      .kill_on_drop(true)
      .output()
      .await
      .map_err(|e| {
        LookupError::Process(format!("{}: {e}", self.program.display()))
      })?;

    if !output.status.success() {
      debug!(
        status = %output.status,
        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
        "nmap exited unsuccessfully"
      );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}

/// Wraps a [`ScanRunner`] with the hard wall-clock limit.
pub struct PortScanProvider<R> {
  runner: R,
  limit: Duration,
}

impl<R: ScanRunner> PortScanProvider<R> {
  pub const fn new(runner: R, limit: Duration) -> Self {
    Self { runner, limit }
  }

  async fn run(&self, ip: &str) -> Result<String, LookupError> {
    timeout(self.limit, self.runner.scan(ip))
      .await
      .map_err(|_| LookupError::Timeout(self.limit))?
  }
}

#[async_trait]
impl<R: ScanRunner> Provider for PortScanProvider<R> {
  fn kind(&self) -> ProviderKind {
    ProviderKind::PortScan
  }

  async fn lookup(&self, ip: &str) -> ProviderResult {
    info!("Running Nmap scan on {ip}...");
    match self.run(ip).await {
      Ok(stdout) => {
        let mut text = section("Nmap Scan Results");
        text.push_str(&stdout);
        text.push('\n');
        ProviderResult::ok(self.kind(), text)
      }
      // Dropping the timed-out future kills the child (`kill_on_drop`).
      Err(LookupError::Timeout(limit)) => {
        let secs = limit.as_secs();
        ProviderResult::error(
          self.kind(),
          format!("Nmap scan timed out after {secs}s (took too long)."),
        )
      }
      Err(e) => {
        ProviderResult::error(self.kind(), format!("Nmap scan failed: {e}"))
      }
    }
  }
}
