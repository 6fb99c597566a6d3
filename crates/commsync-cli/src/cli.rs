use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use commsync_core::ReconcileStrategy;

#[derive(Parser)]
#[command(name = "commsync")]
#[command(about = "Inspect and reconcile offline-first sync data")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pick the last-write-wins winner between two versions of a record
    Resolve {
        /// Local record (JSON file, `-` for stdin)
        local: PathBuf,
        /// Remote record (JSON file)
        remote: PathBuf,
        /// Print only the winning record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Merge two versions of a record field by field
    Merge {
        /// Local record (JSON file, `-` for stdin)
        local: PathBuf,
        /// Remote record (JSON file)
        remote: PathBuf,
        /// Field merged as a set union (repeatable; defaults to `skills`)
        #[arg(long = "list-field", value_name = "FIELD")]
        list_fields: Vec<String>,
        /// Treat every field as a scalar
        #[arg(long, conflicts_with = "list_fields")]
        scalar_only: bool,
    },
    /// Reconcile a local and a remote batch of records
    Reconcile {
        /// Local records (JSON array or single record)
        local: PathBuf,
        /// Remote records (JSON array or single record)
        remote: PathBuf,
        /// Resolution strategy for records present on both sides
        #[arg(long, value_enum, default_value_t = StrategyArg::Lww)]
        strategy: StrategyArg,
        /// Field merged as a set union (repeatable; defaults to `skills`)
        #[arg(long = "list-field", value_name = "FIELD")]
        list_fields: Vec<String>,
        /// Write reconciled records to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Output records and conflicts as JSON
        #[arg(long)]
        json: bool,
    },
    /// Exchange an access token for a sync permission grant
    Grant {
        /// Auth webhook URL
        #[arg(long, env = "COMMSYNC_AUTH_URL", value_name = "URL")]
        auth_url: String,
        /// Platform access token
        #[arg(long, env = "COMMSYNC_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
        /// Client identifier sent with the exchange
        #[arg(long, default_value = "commsync-cli")]
        client_id: String,
        /// Output the grant as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start a sync session from the environment, report its status, and stop it
    Session {
        /// Platform access token (enables authenticated mode with COMMSYNC_AUTH_URL)
        #[arg(long, env = "COMMSYNC_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,
        /// Simulated remote peer (repeatable)
        #[arg(long = "peer", value_name = "ID")]
        peers: Vec<String>,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StrategyArg {
    Lww,
    FieldMerge,
}

impl From<StrategyArg> for ReconcileStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Lww => Self::LastWriteWins,
            StrategyArg::FieldMerge => Self::FieldMerge,
        }
    }
}
