//! GitHub release lookup
//!
//! Fetches the release descriptor from the releases API and picks the
//! download URL of the configured asset.

use crate::config::APP_NAME;
use crate::types::{GitHubAsset, GitHubRelease};
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Releases API returned {status} for {url}")]
    Status { url: String, status: StatusCode },
    #[error("Could not parse release response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// User-Agent sent with every request; the GitHub API rejects requests
/// without one.
pub fn user_agent() -> String {
    format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION"))
}

pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(user_agent()).build()
}

pub async fn get_release_info(
    client: &reqwest::Client,
    api_url: &str,
) -> Result<GitHubRelease, ReleaseError> {
    tracing::debug!("Fetching release info from: {}", api_url);

    let mut request = client
        .get(api_url)
        .header("Accept", "application/vnd.github.v3+json");

    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        request = request.header("Authorization", format!("token {}", token));
        tracing::debug!("Using GITHUB_TOKEN");
    }

    let request_error = |source| ReleaseError::Request {
        url: api_url.to_string(),
        source,
    };

    let response = request.send().await.map_err(request_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(ReleaseError::Status {
            url: api_url.to_string(),
            status,
        });
    }

    let body = response.text().await.map_err(request_error)?;
    parse_release(&body)
}

pub fn parse_release(body: &str) -> Result<GitHubRelease, ReleaseError> {
    Ok(serde_json::from_str(body)?)
}

/// Download URL of the first asset named exactly `asset_name`.
pub fn find_asset_url(assets: &[GitHubAsset], asset_name: &str) -> Option<String> {
    assets
        .iter()
        .find(|asset| asset.name == asset_name)
        .map(|asset| asset.browser_download_url.clone())
}

/// Resolves the download URL for `asset_name` in the release at `api_url`.
///
/// Every failure is reported to the user and collapses into `None`; the caller
/// treats that as a recoverable abort.
pub async fn resolve_download_url(
    client: &reqwest::Client,
    api_url: &str,
    asset_name: &str,
) -> Option<String> {
    let release = match get_release_info(client, api_url).await {
        Ok(release) => release,
        Err(e) => {
            println!("{}", e);
            tracing::error!("Release lookup failed: {:?}", e);
            return None;
        }
    };

    if let Some(tag) = &release.tag_name {
        tracing::info!("Latest release is {}", tag);
    }

    let url = find_asset_url(&release.assets, asset_name);
    match &url {
        Some(url) => tracing::info!("Found asset '{}' at {}", asset_name, url),
        None => {
            println!("Asset '{}' was not found in the latest release.", asset_name);
            tracing::debug!(
                "Available assets: {:?}",
                release.assets.iter().map(|a| &a.name).collect::<Vec<_>>()
            );
        }
    }
    url
}
