//! Authorization commands.

use std::path::Path;

use chrono::{DateTime, SecondsFormat};
use tracing::info;

use gmcp_auth::tokens::now_millis;
use gmcp_auth::{CredentialManager, CredentialRecord, TokenStore};
use gmcp_core::Settings;

use crate::error::CliResult;

/// Reuses, refreshes or obtains a session for the configured service.
///
/// Runs the same startup path a broker process would, so a successful login
/// leaves a token file the broker picks up without prompting.
pub async fn login(settings: &Settings, open_browser: bool) -> CliResult<()> {
    settings.validate()?;

    let manager = CredentialManager::new(
        settings.credentials_path.clone(),
        settings.tokens_path.clone(),
        settings.scopes(),
    )
    .with_browser(open_browser);

    println!("Authorizing Google {} access...", settings.service);
    let client = manager.obtain_client().await?;
    let record = client.snapshot().await;

    info!("{} session ready", settings.service);
    println!();
    println!("Authentication successful!");
    println!("Tokens are stored in {}", settings.tokens_path.display());
    if let Some(expiry) = record.expiry_date {
        println!("Access token valid until {}", format_millis(expiry));
    }
    Ok(())
}

/// Reports the stored session without contacting Google.
pub fn status(tokens_path: &Path) -> CliResult<()> {
    println!("Token file: {}", tokens_path.display());
    let record = TokenStore::new(tokens_path).load();
    for line in describe_session(record.as_ref(), now_millis()) {
        println!("{}", line);
    }
    Ok(())
}

/// Human-readable summary of a stored record.
pub fn describe_session(record: Option<&CredentialRecord>, now_ms: i64) -> Vec<String> {
    let Some(record) = record else {
        return vec!["No stored session. Run `gmcp auth login` to authorize.".to_string()];
    };

    let mut lines = Vec::new();
    lines.push(format!(
        "Refresh token: {}",
        if record.refresh_token.is_some() {
            "present"
        } else {
            "missing (next use will require authorization)"
        }
    ));

    let scopes = record.scopes();
    if !scopes.is_empty() {
        lines.push(format!("Scopes: {}", scopes.join(" ")));
    }

    match record.expiry_date {
        Some(expiry) if record.is_stale(now_ms) => lines.push(format!(
            "Access token: expired at {} (refreshed on next use)",
            format_millis(expiry)
        )),
        Some(expiry) => lines.push(format!("Access token: valid until {}", format_millis(expiry))),
        None => lines.push("Access token: no expiry recorded".to_string()),
    }
    lines
}

fn format_millis(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| ms.to_string())
}
