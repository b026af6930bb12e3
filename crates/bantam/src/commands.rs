/// `delete` subcommand.
mod delete;

/// `deploy` subcommand.
mod deploy;

/// `domains` subcommand.
mod domains;

/// `list` subcommand.
mod list;

/// `login` subcommand.
mod login;

/// `logout` subcommand.
mod logout;

/// `whoami` subcommand.
mod whoami;

pub(crate) use delete::delete;
pub(crate) use deploy::deploy;
pub(crate) use domains::domains;
pub(crate) use list::list;
pub(crate) use login::login;
pub(crate) use logout::logout;
pub(crate) use whoami::whoami;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CLI configuration.
#[derive(Parser)]
#[command(name = "bantam", version, about = "Bantam CLI - Deploy and manage your static sites")]
pub(crate) struct Cli {
    /// Print debug logs to stderr.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Session file path.
    #[arg(long, global = true, env = "BANTAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Selected subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

/// Supported subcommands.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Deploy a file or directory to Bantam.
    Deploy(Deploy),

    /// Authenticate with your Bantam account.
    Login(Login),

    /// Log out from your Bantam account.
    Logout,

    /// List your projects.
    #[command(visible_alias = "ls")]
    List(List),

    /// Delete a project.
    #[command(visible_alias = "rm")]
    Delete(Delete),

    /// Display information about the current user.
    Whoami,

    /// List your custom domains.
    Domains(Domains),
}

/// `deploy` subcommand configuration.
#[derive(Args)]
#[command(after_help = "Examples:
  $ bantam deploy                        # Deploy to random subdomain on bantam.site
  $ bantam deploy -s myapp               # Deploy to myapp.bantam.site
  $ bantam deploy -d example.com         # Deploy to apex domain (example.com)
  $ bantam deploy -d app.example.com     # Deploy to subdomain (requires wildcard)")]
pub struct Deploy {
    /// Path to file or directory to deploy.
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Custom subdomain on bantam.site (e.g., -s myapp for myapp.bantam.site).
    #[arg(short, long)]
    subdomain: Option<String>,

    /// Custom domain (e.g., example.com or app.example.com).
    #[arg(short, long)]
    domain: Option<String>,

    /// Create a permanent project (requires authentication).
    #[arg(short, long)]
    permanent: bool,

    /// Number of days before project expires.
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    expiry_days: Option<u32>,

    /// Skip confirmation prompts.
    #[arg(short, long)]
    yes: bool,
}

/// `login` subcommand configuration.
#[derive(Args)]
pub struct Login {
    /// Use a personal access token instead of the interactive prompt.
    #[arg(short, long)]
    token: Option<String>,
}

/// `list` subcommand configuration.
#[derive(Args)]
pub struct List {
    /// Show detailed information.
    #[arg(short, long)]
    long: bool,

    /// Show all projects including expired ones.
    #[arg(short, long)]
    all: bool,
}

/// `delete` subcommand configuration.
#[derive(Args)]
pub struct Delete {
    /// Project ID (use "bantam list --long" to see IDs).
    project_id: String,

    /// Skip confirmation prompts.
    #[arg(short, long)]
    yes: bool,
}

/// `domains` subcommand configuration.
#[derive(Args)]
pub struct Domains {
    /// Show detailed domain information.
    #[arg(long)]
    verbose: bool,
}
