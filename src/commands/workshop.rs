//! # Workshop Command Implementation
//!
//! This module implements the `workshop` subcommands, which manage the
//! Workshop definitions sessions are deployed from:
//!
//! - **import**: Creates a workshop from a YAML file.
//! - **enable** / **disable**: Controls whether sessions can be deployed.
//! - **delete**: Removes a workshop and, through ownership, its sessions.
//! - **list**: Shows every workshop with its image and whether it is enabled.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use eduk8s::output::format_columns;
use eduk8s::suggestions;
use eduk8s::workshop;

use super::GlobalArgs;

/// Manage workshop definitions
#[derive(Args, Debug)]
pub struct WorkshopArgs {
    /// Namespace the workshops are defined in
    #[arg(long, global = true, value_name = "NAMESPACE")]
    pub namespace: Option<String>,

    #[command(subcommand)]
    pub command: WorkshopCommand,
}

#[derive(Subcommand, Debug)]
pub enum WorkshopCommand {
    /// Import a workshop definition from a file
    Import {
        /// YAML file holding a Workshop document
        #[arg(short = 'f', long = "filename", value_name = "FILE")]
        file: PathBuf,

        /// Import under this name instead of the one in the file
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
    },

    /// Allow sessions of a workshop to be deployed
    Enable {
        /// Name of the workshop
        name: String,
    },

    /// Stop sessions of a workshop from being deployed
    Disable {
        /// Name of the workshop
        name: String,
    },

    /// Delete a workshop definition
    Delete {
        /// Name of the workshop
        name: String,
    },

    /// List workshop definitions
    List,
}

/// Execute the `workshop` command.
pub fn execute(args: WorkshopArgs, global: &GlobalArgs) -> Result<()> {
    let settings = global.settings()?;
    let namespace = super::namespace(args.namespace, &settings);

    match args.command {
        WorkshopCommand::Import { file, name } => {
            if !file.exists() {
                anyhow::bail!("Workshop file not found: {}", file.display());
            }
            let body = workshop::read_document(&file).map_err(|e| {
                anyhow::anyhow!("Failed to read workshop from {}: {}", file.display(), e)
            })?;
            let cluster = super::connect()?;
            let created = workshop::import(&cluster, body, name.as_deref(), &namespace)
                .map_err(suggestions::explain)?;
            println!("workshop.training.eduk8s.io/{} created", created);
        }
        WorkshopCommand::Enable { name } => {
            let cluster = super::connect()?;
            workshop::set_enabled(&cluster, &name, &namespace, true)
                .map_err(suggestions::explain)?;
            println!("workshop.training.eduk8s.io/{} updated", name);
        }
        WorkshopCommand::Disable { name } => {
            let cluster = super::connect()?;
            workshop::set_enabled(&cluster, &name, &namespace, false)
                .map_err(suggestions::explain)?;
            println!("workshop.training.eduk8s.io/{} updated", name);
        }
        WorkshopCommand::Delete { name } => {
            let cluster = super::connect()?;
            workshop::delete(&cluster, &name, &namespace).map_err(suggestions::explain)?;
            println!("workshop.training.eduk8s.io/{} deleted", name);
        }
        WorkshopCommand::List => {
            let cluster = super::connect()?;
            let workshops = workshop::list(&cluster, &namespace).map_err(suggestions::explain)?;
            if workshops.is_empty() {
                println!("No workshops found.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = workshops
                .iter()
                .map(|w| vec![w.name.clone(), w.image().to_string(), w.enabled.to_string()])
                .collect();
            println!(
                "{}",
                format_columns(&["NAME", "IMAGE", "ENABLED"], &rows).join("\n")
            );
        }
    }
    Ok(())
}
