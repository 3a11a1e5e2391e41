//! Best-effort release poll at startup.

use tracing::{debug, info};

const RELEASES_URL: &str = "https://api.github.com/repos/hearth-rs/hearth/releases/latest";

/// Ask the release feed for the newest version and log when we are behind.
/// Never fails startup; every error path is a debug-level note.
pub async fn poll_latest() {
    let client = match reqwest::Client::builder()
        .user_agent(concat!("hearth/", env!("CARGO_PKG_VERSION")))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            debug!("version poll skipped: {e}");
            return;
        }
    };
    let response = match client.get(RELEASES_URL).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            debug!(status = %response.status(), "version poll got no release info");
            return;
        }
        Err(e) => {
            debug!("version poll failed: {e}");
            return;
        }
    };
    let body: serde_json::Value = match response.json().await {
        Ok(body) => body,
        Err(e) => {
            debug!("version poll returned no json: {e}");
            return;
        }
    };
    let Some(latest) = body["tag_name"].as_str().map(|t| t.trim_start_matches('v')) else {
        return;
    };
    let current = env!("CARGO_PKG_VERSION");
    if latest != current {
        info!(current, latest, "a newer hearth release is available");
    } else {
        debug!(current, "hearth is up to date");
    }
}
