//! # Session Command Implementation
//!
//! This module implements the `session` subcommands:
//!
//! - **list**: Shows every active session with its image and URL.
//! - **deploy**: Provisions a new session of an enabled workshop and prints how
//!   to reach it. A generated password is printed here and nowhere else.
//! - **delete**: Deletes a session; the cluster removes everything it owns.

use anyhow::Result;
use clap::{Args, Subcommand};

use eduk8s::output::{emoji, format_columns, OutputConfig};
use eduk8s::phases::orchestrator::{self, DeployRequest, ProvisionOptions};
use eduk8s::phases::workload::ConnectionInfo;
use eduk8s::session;
use eduk8s::suggestions;

use super::GlobalArgs;

/// Manage workshop sessions
#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// List active workshop sessions
    List,

    /// Deploy an instance of a workshop
    Deploy(DeployArgs),

    /// Delete an instance of a workshop
    Delete {
        /// Name of the session to delete
        name: String,
    },
}

/// Deploy an instance of a workshop
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Name of the workshop to deploy
    pub name: String,

    /// Namespace the workshop is defined in
    #[arg(long, value_name = "NAMESPACE")]
    pub namespace: Option<String>,

    /// Protect the workshop with basic auth for this user
    #[arg(long, value_name = "USERNAME")]
    pub username: Option<String>,

    /// Password for --username; generated when omitted
    #[arg(long, value_name = "PASSWORD", requires = "username")]
    pub password: Option<String>,

    /// Expose the session on this host
    #[arg(long, value_name = "HOST", value_parser = parse_host)]
    pub hostname: Option<String>,

    /// Expose the session as <SESSION>.<DOMAIN> when no hostname is given
    #[arg(long, value_name = "DOMAIN", value_parser = parse_host, conflicts_with = "hostname")]
    pub domain: Option<String>,
}

/// Accepts a bare DNS name or address, nothing URL-shaped.
fn parse_host(value: &str) -> std::result::Result<String, String> {
    if value.contains(['/', ':', '@']) {
        return Err(format!("'{}' must be a host name, not a URL", value));
    }
    url::Host::parse(value)
        .map(|host| host.to_string())
        .map_err(|err| format!("'{}' is not a valid host name: {}", value, err))
}

/// Execute the `session` command.
pub fn execute(args: SessionArgs, global: &GlobalArgs) -> Result<()> {
    let settings = global.settings()?;
    match args.command {
        SessionCommand::List => {
            let cluster = super::connect()?;
            let sessions = session::list(&cluster).map_err(suggestions::explain)?;
            if sessions.is_empty() {
                println!("No active workshop sessions found.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = sessions
                .into_iter()
                .map(|s| vec![s.name, s.image, s.url])
                .collect();
            println!("{}", format_columns(&["NAME", "IMAGE", "URL"], &rows).join("\n"));
            Ok(())
        }
        SessionCommand::Deploy(deploy) => {
            let budgets = settings.budget_table().map_err(suggestions::explain)?;
            let options = ProvisionOptions {
                session_retries: settings.session_retries(),
                default_role: settings.default_role().to_string(),
                ingress_class: settings.ingress_class.clone(),
            };
            let request = DeployRequest {
                workshop: deploy.name,
                namespace: super::namespace(deploy.namespace, &settings),
                username: deploy.username,
                password: deploy.password,
                hostname: deploy.hostname,
                domain: deploy.domain,
            };
            let cluster = super::connect()?;
            let info = orchestrator::deploy(&cluster, &budgets, options, &request)
                .map_err(suggestions::explain)?;
            let out = OutputConfig::from_env_and_flag(&global.color);
            print!("{}", render_connection(&info, &out));
            Ok(())
        }
        SessionCommand::Delete { name } => {
            let cluster = super::connect()?;
            session::delete(&cluster, &name).map_err(suggestions::explain)?;
            println!("session.training.eduk8s.io/{} deleted", name);
            Ok(())
        }
    }
}

fn render_connection(info: &ConnectionInfo, out: &OutputConfig) -> String {
    let mut text = format!("session.training.eduk8s.io/{} created\n", info.session_name);
    text.push_str(&format!("\n  Namespace: {}\n", info.namespace));
    text.push_str(&format!("  Service:   {}:{}\n", info.service, info.port));
    if let Some(url) = &info.url {
        text.push_str(&format!("  URL:       {}\n", url));
    }
    if let Some(credentials) = &info.credentials {
        text.push_str(&format!("  Username:  {}\n", credentials.username));
        text.push_str(&format!("  Password:  {}\n", credentials.password));
        if credentials.generated {
            text.push_str(&format!(
                "\n{} The password was generated and will not be shown again.\n",
                emoji(out, "🔑", "[NOTE]")
            ));
        }
    }
    text
}
