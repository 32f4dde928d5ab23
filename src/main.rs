use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gcp_discovery::gcp::detect;
use gcp_discovery::gcp::http::GcpHttpClient;
use gcp_discovery::{DiscoveryClient, DiscoveryConfig, Label};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Discover cluster members on Google Cloud Platform
#[derive(Parser, Debug)]
#[command(name = "gcp-discovery", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// GCP projects to search (comma-separated)
    #[arg(short, long, value_delimiter = ',', global = true)]
    projects: Vec<String>,

    /// GCP zones to search (comma-separated)
    #[arg(short, long, value_delimiter = ',', global = true)]
    zones: Vec<String>,

    /// Only instances carrying this label (key=value)
    #[arg(short, long, global = true)]
    label: Option<String>,

    /// Service account key used instead of the metadata server token
    #[arg(long, global = true)]
    private_key_path: Option<PathBuf>,

    /// Member port reported with each address
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Log level for debugging (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Print the addresses of all matching instances (default)
    Discover,
    /// Print the zone of the local instance
    Zone,
    /// Report whether this process runs on GCP
    Detect,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.as_str().to_lowercase()));

    let guard = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .init();
            None
        }
    };

    tracing::debug!("gcp-discovery started with log level: {:?}", level);
    Ok(guard)
}

/// Effective config: file (explicit or default location), then CLI flags
fn load_config(args: &Args) -> Result<DiscoveryConfig> {
    let mut config = match &args.config {
        Some(path) => DiscoveryConfig::load(path)?,
        None => match DiscoveryConfig::default_path() {
            Some(path) if path.exists() => {
                tracing::info!("Using config file {}", path.display());
                DiscoveryConfig::load(&path)?
            }
            _ => DiscoveryConfig::default(),
        },
    };

    if !args.projects.is_empty() {
        config.projects = args.projects.clone();
    }
    if !args.zones.is_empty() {
        config.zones = args.zones.clone();
    }
    if let Some(label) = &args.label {
        config.label = Some(label.parse::<Label>()?);
    }
    if let Some(path) = &args.private_key_path {
        config.private_key_path = Some(path.clone());
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_ref())?;

    match args.command.unwrap_or(Command::Discover) {
        Command::Discover => {
            let config = load_config(&args)?;
            let client = DiscoveryClient::from_config(config)
                .await
                .context("Failed to initialize discovery client")?;
            let addresses = client
                .get_addresses()
                .await
                .context("Failed to discover member addresses")?;
            for address in addresses {
                println!("{}", address);
            }
        }
        Command::Zone => {
            let config = load_config(&args)?;
            let client = DiscoveryClient::from_config(config)
                .await
                .context("Failed to initialize discovery client")?;
            let zone = client
                .get_availability_zone()
                .await
                .context("Failed to read the availability zone")?;
            println!("{}", zone);
        }
        Command::Detect => {
            let http = GcpHttpClient::new()?;
            let on_gcp = detect::is_auto_detection_applicable(&http).await;
            println!("{}", if on_gcp { "gcp" } else { "not gcp" });
        }
    }

    Ok(())
}
