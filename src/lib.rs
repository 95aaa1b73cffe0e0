#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::module_name_repetitions)]

use anyhow::Result;

mod app;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod options;
pub mod output;
pub mod providers;
pub mod report;
pub mod user_config;

/// Runs the main application logic.
///
/// Parses the command line, resolves which lookups to run, fans them out
/// concurrently, prints the banner plus the combined report and, if asked,
/// saves the same text under the output directory.
///
/// Lookup and save failures are reported as text; they never make this
/// function fail.
///
/// # Errors
///
/// Returns an error if initialization fails (building the HTTP client or
/// persisting keys with `--save-keys`).
pub async fn run() -> Result<()> {
  let app = app::App::new()?;
  app.run().await
}
