//! # Completions Command Implementation
//!
//! Writes a shell completion script for `eduk8s` to stdout, generated with
//! `clap_complete` from the same definitions the parser uses.
//!
//! ```bash
//! eduk8s completions bash > ~/.local/share/bash-completion/completions/eduk8s
//! eduk8s completions zsh > ~/.zfunc/_eduk8s
//! ```

use std::io;

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute the `completions` command.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(args.shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
