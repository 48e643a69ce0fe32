//! Chain Core installer: one-click Chain Core on DigitalOcean

use anyhow::Error;
use chaincore_installer::cli::Cli;
use chaincore_installer::domain::{DeployError, JobError};
use chaincore_installer::output::{OutputContext, json};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = cli.default_log_level();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let as_json = cli.json;
    let no_color = cli.no_color;
    if let Err(e) = cli.run().await {
        if as_json {
            match json::format_error(&format!("{e:#}"), error_code(&e)) {
                Ok(out) => println!("{out}"),
                Err(_) => eprintln!("Error: {e:#}"),
            }
        } else {
            OutputContext::new(no_color, false).error(&format!("Error: {e:#}"));
        }
        std::process::exit(1);
    }
}

fn error_code(err: &Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<JobError>() {
        e.code()
    } else if let Some(e) = err.downcast_ref::<DeployError>() {
        e.code()
    } else {
        "error"
    }
}
