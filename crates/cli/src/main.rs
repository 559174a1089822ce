//! Main entry point for the civroute CLI
//!
//! Operator tooling for the authority assignment engine: catalog maintenance,
//! report intake simulation, admin reassignment, retry and audit history.

mod cli;
mod commands;
mod logging;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        eprintln!("❌ Error: {e:#}");

        let caller_error = e
            .downcast_ref::<assignment_core::Error>()
            .is_some_and(assignment_core::Error::is_client_error);
        std::process::exit(if caller_error { 2 } else { 1 });
    }
}
