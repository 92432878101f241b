use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;

use log::{debug, info, warn};
use tokio::process::Command;

use crate::config::AppConfig;
use crate::env;
use crate::error::UnpackError;

/// Locale codes accepted by `unpack`, in display order.
pub const LOCALES: &[&str] = &["chs", "en", "ja", "tc"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Locale {
    Chs,
    En,
    Ja,
    Tc,
}

impl Locale {
    pub fn code(self) -> &'static str {
        match self {
            Locale::Chs => "chs",
            Locale::En => "en",
            Locale::Ja => "ja",
            Locale::Tc => "tc",
        }
    }

    /// Game server whose client ships this language.
    pub fn region(self) -> &'static str {
        match self {
            Locale::Chs => "chs",
            Locale::En | Locale::Ja => "global",
            Locale::Tc => "tc",
        }
    }
}

impl FromStr for Locale {
    type Err = UnpackError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "chs" => Ok(Locale::Chs),
            "en" => Ok(Locale::En),
            "ja" => Ok(Locale::Ja),
            "tc" => Ok(Locale::Tc),
            other => Err(UnpackError::InvalidLocale(other.to_owned())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Everything needed to start the unpacker for one locale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub data_source: PathBuf,
    pub locale: Locale,
    pub output: PathBuf,
    pub working_dir: PathBuf,
}

impl Invocation {
    pub fn args(&self) -> [&OsStr; 4] {
        [
            self.data_source.as_os_str(),
            OsStr::new(self.locale.code()),
            OsStr::new(env::UNPACK_MODE),
            self.output.as_os_str(),
        ]
    }
}

/// Runs the installed unpacker against a locale's game data.
pub struct ExtractionRunner {
    config: AppConfig,
}

impl ExtractionRunner {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Validate `locale`, prepare the output directory and run the unpacker to completion.
    pub async fn run(&self, locale: &str) -> Result<Invocation, UnpackError> {
        let invocation = self.prepare(locale)?;
        info!("unpack: starting {} extraction", invocation.locale);
        execute(&invocation).await?;
        info!(
            "unpack: {} finished, output in {}",
            invocation.locale,
            invocation.output.display()
        );
        Ok(invocation)
    }

    /// All checks and filesystem preparation, without spawning anything.
    pub fn prepare(&self, locale: &str) -> Result<Invocation, UnpackError> {
        let locale: Locale = locale.parse()?;
        let region = locale.region();

        let data_source = self
            .config
            .game_path
            .get(region)
            .cloned()
            .ok_or(UnpackError::DataSourceNotConfigured { region })?;
        if !data_source.exists() {
            warn!("unpack: game path missing at {}", data_source.display());
            return Err(UnpackError::MissingDataSource {
                locale: locale.code().to_owned(),
                path: data_source,
            });
        }

        let program = absolute(&self.config.unpacker_path())?;
        if !program.is_file() {
            warn!("unpack: unpacker missing at {}", program.display());
            return Err(UnpackError::UnpackerNotInstalled { path: program });
        }
        let working_dir = absolute(&self.config.unpacker_dir)?;

        let output = self.config.output_root.join(locale.code());
        std::fs::create_dir_all(&output).map_err(|source| UnpackError::Io {
            path: output.clone(),
            source,
        })?;
        // The child runs in the unpacker directory, so relative paths would resolve there.
        let output = absolute(&output)?;
        let data_source = absolute(&data_source)?;

        debug!(
            "unpack: data_source={} output={} cwd={}",
            data_source.display(),
            output.display(),
            working_dir.display()
        );
        Ok(Invocation {
            program,
            data_source,
            locale,
            output,
            working_dir,
        })
    }
}

/// Spawn the unpacker with inherited stdio and wait for it to exit.
pub async fn execute(invocation: &Invocation) -> Result<(), UnpackError> {
    let status = Command::new(&invocation.program)
        .args(invocation.args())
        .current_dir(&invocation.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(UnpackError::Spawn)?;

    if status.success() {
        Ok(())
    } else {
        Err(UnpackError::Subprocess {
            code: status.code(),
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, UnpackError> {
    std::path::absolute(path).map_err(|source| UnpackError::Io {
        path: path.to_path_buf(),
        source,
    })
}
