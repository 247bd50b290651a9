//! # eduk8s CLI
//!
//! This is the binary entry point for the `eduk8s` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Handling top-level application errors and translating them into user-friendly
//!   output.
//!
//! The provisioning logic lives in the `eduk8s` library crate; the binary is a
//! thin wrapper that connects it to a cluster and prints results.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
