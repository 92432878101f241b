use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};

mod archive;
mod config;
mod env;
mod error;
mod ledger;
mod networking;
mod release;
mod sync;
mod unpack;
mod util;

use crate::config::AppConfig;
use crate::error::UnpackError;
use crate::networking::{ProgressCallback, ProgressUpdate};
use crate::sync::{ReleaseSynchronizer, ToolStatus};
use crate::unpack::{ExtractionRunner, LOCALES};

#[derive(Parser, Debug)]
#[command(
    name = "unpacker-kit",
    author,
    version,
    about = "Keeps the game-data unpacker up to date and runs it per locale"
)]
struct Cli {
    /// JSON config with game paths and tool settings.
    #[arg(long, global = true, default_value_os_t = env::default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install or refresh the unpacker tools from their latest GitHub releases.
    Update,
    /// Extract game data for one locale with the installed unpacker.
    Unpack {
        /// Locale to extract: chs, en, ja or tc.
        locale: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Update => update(config).await,
        Command::Unpack { locale } => unpack(config, &locale).await,
    }
}

async fn update(config: AppConfig) -> ExitCode {
    let bar = download_bar();
    let mut on_progress = |update: ProgressUpdate| {
        if let Some(total) = update.total {
            bar.set_length(total);
        }
        bar.set_position(update.downloaded);
        bar.set_message(format!(
            "{} {:.0}% {}",
            update.stage, update.progress, update.speed
        ));
    };
    let mut progress: ProgressCallback<'_> = Some(&mut on_progress);

    let result = ReleaseSynchronizer::new(config)
        .synchronize(&mut progress)
        .await;
    bar.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("failed to update unpacker: {err}");
            return ExitCode::FAILURE;
        }
    };

    for report in &outcome.reports {
        match &report.outcome {
            Ok(ToolStatus::UpToDate { tag }) => info!("{}: already at {tag}", report.tool),
            Ok(ToolStatus::Updated { previous, tag }) => info!(
                "{}: installed {tag} (was {})",
                report.tool,
                previous.as_deref().unwrap_or("not installed")
            ),
            // Already logged when the tool failed.
            Err(_) => {}
        }
    }

    let failed = outcome.failures().count();
    if failed > 0 {
        error!("{failed} tool(s) failed to update; successful updates were recorded");
        return ExitCode::FAILURE;
    }
    info!(
        "unpacker updated successfully ({} of {} tools changed)",
        outcome.updated(),
        outcome.reports.len()
    );
    ExitCode::SUCCESS
}

async fn unpack(config: AppConfig, locale: &str) -> ExitCode {
    match ExtractionRunner::new(config).run(locale).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err @ UnpackError::InvalidLocale(_)) => {
            error!("{err}");
            error!("usage: unpacker-kit unpack <{}>", LOCALES.join("|"));
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn download_bar() -> ProgressBar {
    let bar = ProgressBar::no_length();
    let style = ProgressStyle::with_template(
        "[{bar:30}] {bytes}/{total_bytes} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    bar.set_style(style);
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_takes_a_single_positional_locale() {
        let cli = Cli::try_parse_from(["unpacker-kit", "unpack", "en"]).unwrap();
        assert!(matches!(cli.command, Command::Unpack { ref locale } if locale == "en"));
        assert_eq!(cli.config, PathBuf::from("config.json"));
    }

    #[test]
    fn unpack_without_locale_is_a_usage_error() {
        let err = Cli::try_parse_from(["unpacker-kit", "unpack"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn config_flag_is_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["unpacker-kit", "update", "--config", "alt.json"]).unwrap();
        assert!(matches!(cli.command, Command::Update));
        assert_eq!(cli.config, PathBuf::from("alt.json"));
    }
}
