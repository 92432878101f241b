use std::path::Path;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::AppConfig;
use crate::util::{format_speed, progress_percent};

const USER_AGENT: &str = concat!("unpacker-kit/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct ProgressUpdate {
    /// Tool whose asset is being fetched.
    pub stage: String,
    pub progress: f32,
    pub speed: String,
    pub downloaded: u64,
    pub total: Option<u64>,
}

pub type ProgressCallback<'a> = Option<&'a mut (dyn FnMut(ProgressUpdate) + Send)>;

pub fn emit_progress(cb: &mut ProgressCallback<'_>, update: ProgressUpdate) {
    if let Some(callback) = cb.as_deref_mut() {
        callback(update);
    }
}

#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
    request_timeout: Duration,
    download_timeout: Duration,
    token: Option<String>,
}

impl NetworkClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Self {
            client,
            request_timeout: config.request_timeout(),
            download_timeout: config.download_timeout(),
            token,
        }
    }

    /// GET a JSON document from the GitHub API, bounded by the request timeout.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, String> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .timeout(self.request_timeout);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("server returned status {}", response.status()));
        }
        response
            .json()
            .await
            .map_err(|e| format!("invalid response body: {e}"))
    }

    /// Download `url` into `dest`, reporting progress under `stage`. Returns the byte count.
    ///
    /// `dest` may be left partially written on error; callers own its cleanup.
    pub async fn download_to_path(
        &self,
        url: &str,
        dest: &Path,
        stage: &str,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<u64, String> {
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| format!("download request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("download status error: {e}"))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create download dir: {e}"))?;
        }
        let mut file = File::create(dest)
            .await
            .map_err(|e| format!("failed to create file: {e}"))?;

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_tick = Instant::now();
        let mut last_bytes = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("stream error: {e}"))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("write error: {e}"))?;
            downloaded += chunk.len() as u64;

            let since = last_tick.elapsed().as_secs_f32();
            if since > 0.2 {
                let speed = (downloaded - last_bytes) as f32 / since;
                emit_progress(
                    progress,
                    ProgressUpdate {
                        stage: stage.to_owned(),
                        progress: progress_percent(downloaded, total),
                        speed: format_speed(speed),
                        downloaded,
                        total,
                    },
                );
                last_tick = Instant::now();
                last_bytes = downloaded;
            }
        }

        emit_progress(
            progress,
            ProgressUpdate {
                stage: stage.to_owned(),
                progress: 100.0,
                speed: format_speed(0.0),
                downloaded,
                total,
            },
        );

        file.flush()
            .await
            .map_err(|e| format!("flush error: {e}"))?;

        if let Some(total) = total
            && downloaded < total
        {
            return Err(format!(
                "download incomplete: received {} of {} bytes",
                downloaded, total
            ));
        }

        debug!("download: {} bytes from {}", downloaded, url);
        Ok(downloaded)
    }
}
