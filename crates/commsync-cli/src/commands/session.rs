use std::sync::Arc;
use std::time::Duration;

use commsync_core::sync::{LoopbackTransportFactory, StaticTokenProvider, TokenProvider};
use commsync_core::util::normalize_text_option;
use commsync_core::{SessionConfig, SyncEnvConfig, SyncSessionManager, SyncStatus};
use serde::Serialize;

use crate::error::CliError;

/// Grants lapsing inside this window are reported as expiring.
const EXPIRY_WARNING_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub app_id: String,
    pub mode: &'static str,
    pub syncing: bool,
    pub status: SyncStatus,
    pub expiring_soon: bool,
    pub status_after_stop: SyncStatus,
}

pub async fn run_session(
    access_token: Option<String>,
    peers: &[String],
    as_json: bool,
) -> Result<(), CliError> {
    let token_provider = normalize_text_option(access_token)
        .map(|token| Arc::new(StaticTokenProvider::new(token)) as Arc<dyn TokenProvider>);
    let config = SyncEnvConfig::from_env().into_session_config(token_provider)?;
    let report = session_report(config, peers).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("session: {}", report.session_id);
    println!("app: {} ({})", report.app_id, report.mode);
    println!("status: {}", report.status);
    if !report.syncing {
        println!("sync did not start; see logs for details");
    }
    if report.expiring_soon {
        println!("credentials expire within {}s", EXPIRY_WARNING_WINDOW.as_secs());
    }
    Ok(())
}

/// Start a session against an in-process transport with `peers` visible,
/// capture its state, then stop it.
pub async fn session_report(
    config: SessionConfig,
    peers: &[String],
) -> Result<SessionReport, CliError> {
    let factory = Arc::new(LoopbackTransportFactory::new());
    for peer in peers {
        factory.peer_joined(peer.as_str());
    }

    let manager = SyncSessionManager::new(factory);
    let session = manager.init_session(config).await?;
    let status = manager.sync_status().await;
    let syncing = session.is_syncing();
    let expiring_soon = session.expiring_soon(EXPIRY_WARNING_WINDOW).await;

    manager.stop_session().await;

    Ok(SessionReport {
        session_id: session.id().to_string(),
        app_id: session.identity().app_id().to_string(),
        mode: session.identity().mode(),
        syncing,
        status,
        expiring_soon,
        status_after_stop: manager.sync_status().await,
    })
}
