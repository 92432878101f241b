use std::io;
use std::path::Path;

use log::{debug, error, info, warn};

use crate::archive::{self, ArchiveKind};
use crate::config::{AppConfig, ToolSpec};
use crate::env;
use crate::error::{LedgerError, SyncError};
use crate::ledger::Ledger;
use crate::networking::{NetworkClient, ProgressCallback};
use crate::release::{self, ReleaseDescriptor};
use crate::util::mirrored_url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolStatus {
    UpToDate {
        tag: String,
    },
    Updated {
        previous: Option<String>,
        tag: String,
    },
}

#[derive(Debug)]
pub struct ToolReport {
    pub tool: String,
    pub outcome: Result<ToolStatus, SyncError>,
}

/// Result of one pass over every configured tool.
#[derive(Debug)]
pub struct SyncOutcome {
    pub ledger: Ledger,
    pub reports: Vec<ToolReport>,
}

impl SyncOutcome {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &SyncError)> {
        self.reports.iter().filter_map(|report| match &report.outcome {
            Err(err) => Some((report.tool.as_str(), err)),
            Ok(_) => None,
        })
    }

    pub fn updated(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| matches!(report.outcome, Ok(ToolStatus::Updated { .. })))
            .count()
    }
}

/// Keeps the installed tools in step with their latest upstream releases.
pub struct ReleaseSynchronizer {
    config: AppConfig,
    network: NetworkClient,
}

impl ReleaseSynchronizer {
    pub fn new(config: AppConfig) -> Self {
        let network = NetworkClient::new(&config);
        Self { config, network }
    }

    /// Load the ledger, update every tool in order, then persist the ledger once.
    ///
    /// # Errors
    /// Only ledger problems abort the run; per-tool failures are listed in the outcome.
    pub async fn synchronize(
        &self,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<SyncOutcome, LedgerError> {
        let dir = &self.config.unpacker_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| LedgerError::Io {
                path: dir.clone(),
                source,
            })?;

        let ledger_path = self.config.ledger_path();
        let ledger = Ledger::load(&ledger_path).await?;
        if ledger.is_empty() {
            debug!("sync: no tools recorded yet in {}", ledger_path.display());
        } else {
            debug!("sync: ledger has {} entries", ledger.len());
        }

        let outcome = self.run(ledger, progress).await;
        outcome.ledger.persist(&ledger_path).await?;
        Ok(outcome)
    }

    /// Process tools strictly one after another, threading the ledger through.
    pub async fn run(&self, ledger: Ledger, progress: &mut ProgressCallback<'_>) -> SyncOutcome {
        let mut ledger = ledger;
        let mut reports = Vec::with_capacity(self.config.tools.len());

        for tool in &self.config.tools {
            let outcome = self.sync_tool(tool, ledger.get(&tool.name), progress).await;
            match &outcome {
                Ok(ToolStatus::Updated { tag, .. }) => {
                    ledger = ledger.with_tag(&tool.name, tag);
                }
                Ok(ToolStatus::UpToDate { .. }) => {}
                Err(err) => error!("sync: {}: {err}", tool.name),
            }
            reports.push(ToolReport {
                tool: tool.name.clone(),
                outcome,
            });
        }

        SyncOutcome { ledger, reports }
    }

    async fn sync_tool(
        &self,
        tool: &ToolSpec,
        recorded: Option<&str>,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<ToolStatus, SyncError> {
        let release = release::fetch_latest(&self.network, &self.config.api_base, tool).await?;
        let tag = release.tag_name.clone();

        if recorded == Some(tag.as_str()) {
            info!("sync: skipped, already latest for {} ({tag})", tool.repo);
            return Ok(ToolStatus::UpToDate { tag });
        }

        self.install(tool, &release, progress).await?;
        info!(
            "sync: {} updated {} -> {tag}",
            tool.name,
            recorded.unwrap_or("none")
        );
        Ok(ToolStatus::Updated {
            previous: recorded.map(str::to_owned),
            tag,
        })
    }

    /// Download, verify and extract the tool's asset, then drop the scratch archive.
    async fn install(
        &self,
        tool: &ToolSpec,
        release: &ReleaseDescriptor,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<(), SyncError> {
        let asset = release
            .find_asset(&tool.asset)
            .ok_or_else(|| SyncError::AssetNotFound {
                repo: tool.repo.clone(),
                tag: release.tag_name.clone(),
                asset: tool.asset.clone(),
            })?;
        let kind = ArchiveKind::from_name(&asset.name).ok_or_else(|| SyncError::Install {
            asset: asset.name.clone(),
            reason: "unsupported archive format".into(),
        })?;

        let dir = &self.config.unpacker_dir;
        let scratch = env::scratch_archive_path(dir, &asset.name);
        let url = mirrored_url(
            self.config.download_mirror.as_deref(),
            &asset.browser_download_url,
        );

        info!("sync: downloading {} {} ...", tool.repo, release.tag_name);
        if let Err(reason) = self
            .network
            .download_to_path(&url, &scratch, &tool.name, progress)
            .await
        {
            discard(&scratch).await;
            return Err(SyncError::Download { url, reason });
        }

        if let Some(expected) = asset.sha256()
            && let Err(reason) = archive::verify_sha256(&scratch, expected)
        {
            discard(&scratch).await;
            return Err(SyncError::Download { url, reason });
        }

        info!("sync: extracting {} ...", asset.name);
        let (archive_path, dest) = (scratch.clone(), dir.clone());
        let extracted =
            tokio::task::spawn_blocking(move || archive::extract(&archive_path, &dest, kind))
                .await
                .unwrap_or_else(|err| Err(format!("extraction task failed: {err}")));
        if let Err(reason) = extracted {
            discard(&scratch).await;
            return Err(SyncError::Install {
                asset: asset.name.clone(),
                reason,
            });
        }

        discard(&scratch).await;
        info!("sync: cleaned {}", asset.name);
        Ok(())
    }
}

/// Best-effort removal of a scratch archive; failures are only logged.
async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!("sync: could not remove {}: {err}", path.display()),
    }
}
