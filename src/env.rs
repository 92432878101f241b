use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Ledger file name, stored next to the installed tools.
pub const LEDGER_FILE: &str = "version.json";

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Literal mode argument understood by the unpacker.
pub const UNPACK_MODE: &str = "rawexd";

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Install directory of the unpacker toolchain, relative to the working directory.
pub fn default_unpacker_dir() -> PathBuf {
    Path::new("tools").join("unpacker")
}

pub fn default_unpacker_binary() -> String {
    "DumpCsv.exe".to_owned()
}

/// Extracted data lands two levels above the working directory, one folder per locale.
pub fn default_output_root() -> PathBuf {
    Path::new("..").join("..")
}

pub fn ledger_path(unpacker_dir: &Path) -> PathBuf {
    unpacker_dir.join(LEDGER_FILE)
}

/// Scratch location for a downloaded archive, colocated with the install directory.
pub fn scratch_archive_path(unpacker_dir: &Path, asset: &str) -> PathBuf {
    unpacker_dir.join(format!(".{asset}.download"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_archive_is_hidden_inside_install_dir() {
        let dir = Path::new("tools").join("unpacker");
        let scratch = scratch_archive_path(&dir, "DumpCsv.zip");
        assert_eq!(scratch.parent(), Some(dir.as_path()));
        assert_eq!(
            scratch.file_name().and_then(|n| n.to_str()),
            Some(".DumpCsv.zip.download")
        );
    }

    #[test]
    fn ledger_lives_next_to_tools() {
        assert_eq!(
            ledger_path(Path::new("x")),
            Path::new("x").join("version.json")
        );
    }
}
