use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::LedgerError;

/// Last successfully installed release tag per tool.
///
/// Updates produce a new value; a ledger handed out earlier never changes underneath
/// its holder. Keys are kept sorted so the persisted file is stable across runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    tags: BTreeMap<String, String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the ledger at `path`. A missing file is an empty ledger; unparseable
    /// content is reported, never discarded.
    pub async fn load(path: &Path) -> Result<Self, LedgerError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("ledger: {} absent, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(LedgerError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let tags = serde_json::from_slice(&bytes).map_err(|source| LedgerError::CorruptState {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { tags })
    }

    pub fn get(&self, tool: &str) -> Option<&str> {
        self.tags.get(tool).map(String::as_str)
    }

    /// Return a copy of this ledger with `tool` recorded at `tag`.
    #[must_use]
    pub fn with_tag(&self, tool: &str, tag: &str) -> Self {
        let mut tags = self.tags.clone();
        tags.insert(tool.to_owned(), tag.to_owned());
        Self { tags }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Replace the file at `path` with this ledger.
    ///
    /// The content is written and synced to a sibling temp file first, then renamed
    /// over the destination, so an interrupted write leaves the old file readable.
    pub async fn persist(&self, path: &Path) -> Result<(), LedgerError> {
        let staged = self.stage(path).await?;
        fs::rename(&staged, path)
            .await
            .map_err(|source| LedgerError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("ledger: wrote {} entries to {}", self.tags.len(), path.display());
        Ok(())
    }

    async fn stage(&self, path: &Path) -> Result<PathBuf, LedgerError> {
        let staged = temp_path(path);
        let io_err = |source: io::Error| LedgerError::Io {
            path: staged.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let mut body = serde_json::to_vec_pretty(&self.tags)
            .map_err(|err| io_err(io::Error::new(io::ErrorKind::InvalidData, err)))?;
        body.push(b'\n');

        let mut file = fs::File::create(&staged).await.map_err(io_err)?;
        file.write_all(&body).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        Ok(staged)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
