use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::env;
use crate::error::ConfigError;

/// A tool published as a GitHub release asset.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ToolSpec {
    /// Ledger key.
    pub name: String,
    pub owner: String,
    pub repo: String,
    /// Exact file name of the release asset to install.
    pub asset: String,
}

impl ToolSpec {
    pub fn new(name: &str, owner: &str, repo: &str, asset: &str) -> Self {
        Self {
            name: name.to_owned(),
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            asset: asset.to_owned(),
        }
    }
}

/// Settings shared by `update` and `unpack`. Passed explicitly, never read globally.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Region (`chs`, `global`, `tc`) to game install root.
    pub game_path: BTreeMap<String, PathBuf>,
    pub unpacker_dir: PathBuf,
    pub unpacker_binary: String,
    pub output_root: PathBuf,
    pub api_base: String,
    /// Prefix prepended to asset download URLs, e.g. a GitHub proxy.
    pub download_mirror: Option<String>,
    pub request_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub tools: Vec<ToolSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game_path: BTreeMap::new(),
            unpacker_dir: env::default_unpacker_dir(),
            unpacker_binary: env::default_unpacker_binary(),
            output_root: env::default_output_root(),
            api_base: env::GITHUB_API_URL.to_owned(),
            download_mirror: None,
            request_timeout_secs: 30,
            download_timeout_secs: 10 * 60,
            tools: default_tools(),
        }
    }
}

impl AppConfig {
    /// Read the config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("config: {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            "config: loaded {} ({} tools, {} game paths)",
            path.display(),
            config.tools.len(),
            config.game_path.len()
        );
        Ok(config)
    }

    pub fn unpacker_path(&self) -> PathBuf {
        self.unpacker_dir.join(&self.unpacker_binary)
    }

    pub fn ledger_path(&self) -> PathBuf {
        env::ledger_path(&self.unpacker_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

fn default_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("dumpcsv", "Souma-Sumire", "dumpcsv", "DumpCsv.zip"),
        ToolSpec::new(
            "saintcoinach",
            "Souma-Sumire",
            "SaintCoinach-hexcode",
            "SaintCoinach.Cmd.zip",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.tools.len(), 2);
        assert_eq!(config.tools[0].name, "dumpcsv");
        assert_eq!(config.unpacker_path(), Path::new("tools/unpacker/DumpCsv.exe"));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn reads_camel_case_keys_and_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "gamePath": { "global": "C:/Game", "chs": "D:/Game" },
                "downloadMirror": "https://ghfast.top/"
            }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.game_path.get("global"), Some(&PathBuf::from("C:/Game")));
        assert_eq!(config.download_mirror.as_deref(), Some("https://ghfast.top/"));
        assert_eq!(config.api_base, "https://api.github.com");
        assert_eq!(config.unpacker_binary, "DumpCsv.exe");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
