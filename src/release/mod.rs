use serde::Deserialize;

use crate::config::ToolSpec;
use crate::error::SyncError;
use crate::networking::NetworkClient;

/// Latest release of a tool as reported by the GitHub releases API.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDescriptor {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    /// `sha256:<hex>` when GitHub has computed one.
    #[serde(default)]
    pub digest: Option<String>,
}

impl ReleaseDescriptor {
    /// Exact-name lookup; no case folding or globbing.
    pub fn find_asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

impl ReleaseAsset {
    /// Hex SHA-256 from the digest field, if present and in a known format.
    pub fn sha256(&self) -> Option<&str> {
        self.digest
            .as_deref()
            .and_then(|digest| digest.strip_prefix("sha256:"))
            .map(str::trim)
            .filter(|hex| !hex.is_empty())
    }
}

pub fn latest_release_url(api_base: &str, tool: &ToolSpec) -> String {
    format!(
        "{}/repos/{}/{}/releases/latest",
        api_base.trim_end_matches('/'),
        tool.owner,
        tool.repo
    )
}

/// Query the latest release of `tool`. Never cached.
///
/// # Errors
/// `SyncError::UpstreamUnavailable` on network failure, timeout, non-2xx status or
/// an unexpected body.
pub async fn fetch_latest(
    network: &NetworkClient,
    api_base: &str,
    tool: &ToolSpec,
) -> Result<ReleaseDescriptor, SyncError> {
    let url = latest_release_url(api_base, tool);
    network
        .fetch_json(&url)
        .await
        .map_err(|reason| SyncError::UpstreamUnavailable {
            repo: format!("{}/{}", tool.owner, tool.repo),
            reason,
        })
}
