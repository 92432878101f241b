use std::path::PathBuf;

use thiserror::Error;

use crate::unpack::LOCALES;

/// Failure to read or write the installed-version ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger file exists but is not a JSON object of strings.
    #[error("version ledger at {} is corrupt: {source}", path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("version ledger I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-tool synchronization failure. Reported and skipped; the run continues.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("upstream release for {repo} unavailable: {reason}")]
    UpstreamUnavailable { repo: String, reason: String },

    #[error("asset {asset} not found in release {tag} of {repo}")]
    AssetNotFound {
        repo: String,
        tag: String,
        asset: String,
    },

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("failed to install {asset}: {reason}")]
    Install { asset: String, reason: String },
}

/// Failure of a single extraction run. Always fatal for that run.
#[derive(Debug, Error)]
pub enum UnpackError {
    #[error("unknown locale {0:?}; expected one of [{}]", LOCALES.join("|"))]
    InvalidLocale(String),

    #[error("no game path configured for region {region} (gamePath.{region} in the config file)")]
    DataSourceNotConfigured { region: &'static str },

    #[error("game path for {locale} not found, check the config file (gamePath: {})", path.display())]
    MissingDataSource { locale: String, path: PathBuf },

    #[error("unpacker executable not found, run `unpacker-kit update` first (unpackerPath: {})", path.display())]
    UnpackerNotInstalled { path: PathBuf },

    #[error("failed to prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start unpacker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("unpacker exited with {}", exit_label(*code))]
    Subprocess { code: Option<i32> },
}

/// Failure to load the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_owned(),
    }
}
