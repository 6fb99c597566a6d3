//! commsync CLI - inspect and reconcile offline-first sync data
//!
//! Resolves and merges record versions, exchanges access tokens for sync
//! grants, and smoke-tests a sync session from the environment.

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::grant::run_grant;
use crate::commands::merge::run_merge;
use crate::commands::reconcile::run_reconcile;
use crate::commands::resolve::run_resolve;
use crate::commands::session::run_session;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "commsync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            local,
            remote,
            json,
        } => run_resolve(&local, &remote, json)?,
        Commands::Merge {
            local,
            remote,
            list_fields,
            scalar_only,
        } => run_merge(&local, &remote, &list_fields, scalar_only)?,
        Commands::Reconcile {
            local,
            remote,
            strategy,
            list_fields,
            output,
            json,
        } => run_reconcile(
            &local,
            &remote,
            strategy.into(),
            &list_fields,
            output.as_deref(),
            json,
        )?,
        Commands::Grant {
            auth_url,
            token,
            client_id,
            json,
        } => run_grant(&auth_url, &token, &client_id, json).await?,
        Commands::Session {
            access_token,
            peers,
            json,
        } => run_session(access_token, &peers, json).await?,
    }

    Ok(())
}
