use commsync_core::{PermissionGrant, WebhookAuthClient};

use crate::error::CliError;

pub async fn run_grant(
    auth_url: &str,
    token: &str,
    client_id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let client = WebhookAuthClient::new(auth_url)?;
    let grant = client.exchange_token(token, client_id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&grant)?);
        return Ok(());
    }

    for line in format_grant_lines(&grant) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_grant_lines(grant: &PermissionGrant) -> Vec<String> {
    let expires = chrono::DateTime::from_timestamp(grant.expires_at, 0).map_or_else(
        || grant.expires_at.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );

    let mut lines = vec![
        format!("user: {}", grant.user_id),
        format!("expires: {expires}"),
    ];
    lines.push(format!("read: {}", render_patterns(&grant.permissions.read)));
    lines.push(format!(
        "write: {}",
        render_patterns(&grant.permissions.write)
    ));
    lines
}

fn render_patterns(patterns: &[String]) -> String {
    if patterns.is_empty() {
        "(none)".to_string()
    } else {
        patterns.join(" ")
    }
}
