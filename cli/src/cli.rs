//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::infra::default_install_deps;
use crate::output::OutputContext;

/// Provision a DigitalOcean droplet running Chain Core
#[derive(Parser, Debug)]
#[command(
    name = "chaincore-installer",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deploy Chain Core with a personal access token
    Deploy(commands::deploy::DeployArgs),

    /// Run the one-click installer web server
    Serve(commands::serve::ServeArgs),

    /// Show the state of an installer job
    Status(commands::status::StatusArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Default log level when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        match self.command {
            Command::Serve(_) => "info",
            _ => "warn",
        }
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli { no_color, quiet, json, command } = self;
        let ctx = OutputContext::new(no_color, quiet);
        match command {
            Command::Version => {
                commands::version::run(json);
                Ok(())
            }
            Command::Deploy(args) => {
                commands::deploy::run(&ctx, &args, &default_install_deps(), json).await
            }
            Command::Serve(args) => commands::serve::run(&args, default_install_deps()).await,
            Command::Status(args) => commands::status::run(&ctx, &args, json).await,
        }
    }
}
