pub mod commands;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use commands::{
    write_stream, CandidateReport, ConfigCommands, ConfigReport, DiscoverArgs, DownloadArgs,
    DownloadReport,
};
use scout_core::{load_scout_config, MediaScout, ScoutConfig};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] scout_core::ConfigError),
    #[error("{0}")]
    Scout(#[from] scout_core::ScoutError),
    #[error("{0}")]
    Discovery(#[from] scout_core::DiscoveryError),
    #[error("{0}")]
    Delivery(#[from] scout_core::DeliveryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Media scout command-line interface", long_about = None)]
pub struct Cli {
    /// Caminho do scout.toml
    #[arg(long, default_value = "configs/scout.toml")]
    pub config: PathBuf,
    /// Formato de saída
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Habilita logs detalhados (RUST_LOG tem precedência)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Lista os vídeos encontrados em uma página
    Discover(DiscoverArgs),
    /// Baixa um candidato descoberto
    Download(DownloadArgs),
    /// Operações de configuração
    #[command(subcommand)]
    Config(ConfigCommands),
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose);
    let config = load_scout_config(&cli.config)?;

    match &cli.command {
        Commands::Config(ConfigCommands::Check) => {
            render(&ConfigReport::new(&cli.config, &config), cli.format)?;
        }
        Commands::Discover(args) => {
            let report = block_on(discover(config, args))?;
            render(&report, cli.format)?;
        }
        Commands::Download(args) => {
            let report = block_on(download(config, args))?;
            render(&report, cli.format)?;
        }
    }

    Ok(())
}

/// Installs the stderr subscriber once; later calls are no-ops.
pub fn init_tracing(verbose: bool) {
    let default_directives = if verbose {
        "info,scout_core=debug,scoutctl=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn block_on<F, T>(future: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}

async fn discover(config: ScoutConfig, args: &DiscoverArgs) -> Result<CandidateReport> {
    let scout = MediaScout::from_config(config)?;
    let candidates = scout.discover(&args.url).await?;
    Ok(CandidateReport::new(&args.url, &candidates))
}

async fn download(config: ScoutConfig, args: &DownloadArgs) -> Result<DownloadReport> {
    let scout = MediaScout::from_config(config)?;
    let media = scout.download(&args.reference, args.kind.into()).await?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| Path::new(".").join(&media.filename));
    let declared_length = media.content_length;
    let content_type = media.content_type.clone();
    let bytes = write_stream(media.body, &output).await?;
    Ok(DownloadReport {
        output,
        bytes,
        content_type,
        declared_length,
    })
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

pub trait DisplayFallback {
    fn display(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::KindArg;

    fn fixture_config() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/scout.toml")
    }

    #[test]
    fn parses_download_arguments() {
        let cli = Cli::try_parse_from([
            "scoutctl",
            "--format",
            "json",
            "download",
            "https://www.youtube.com/watch?v=abc#format=18",
            "--kind",
            "platform",
            "-o",
            "clip.mp4",
        ])
        .unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Commands::Download(args) => {
                assert_eq!(args.kind, KindArg::Platform);
                assert_eq!(args.output, Some(PathBuf::from("clip.mp4")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn download_requires_a_kind() {
        assert!(Cli::try_parse_from(["scoutctl", "download", "https://cdn.example/a.mp4"]).is_err());
    }

    #[test]
    fn config_check_reports_fixture_values() {
        let config = load_scout_config(fixture_config()).unwrap();
        let report = ConfigReport::new(&fixture_config(), &config);
        assert_eq!(report.max_browser_sessions, 4);
        assert_eq!(report.transcode_timeout_seconds, 300);
        assert!(report.display().starts_with("Configuração válida:"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ffmpeg_path"], "ffmpeg");
    }

    #[test]
    fn run_fails_on_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: dir.path().join("absent.toml"),
            format: OutputFormat::Text,
            verbose: false,
            command: Commands::Config(ConfigCommands::Check),
        };
        assert!(matches!(run(cli), Err(AppError::Config(_))));
    }
}
