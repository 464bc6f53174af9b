use anyhow::{Context, Result};
use clap::Parser;
use profilescan::{
    FileStorage, ProfileStore, ProfilescanConfig, ScanApp, ShutdownReason, TerminalFrontend,
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "profilescan")]
#[command(about = "Scan a barcode, see who it belongs to, register it if nobody does")]
#[command(version)]
#[command(long_about = "A terminal barcode scanner that keys simple person profiles \
(name, photo, scan history) by the code printed on their card. Profiles are kept \
in a local JSON store; every scan of a known code is appended to its history.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "profilescan.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the scanner")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Print stored profiles and exit
    #[arg(long, help = "Print every stored profile and exit")]
    list: bool,

    /// Override the data directory
    #[arg(long, value_name = "PATH", help = "Directory for the profile store and logs")]
    data_dir: Option<String>,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

/// Where log output goes. The interactive screen owns the terminal, so it
/// logs to a file.
enum LogTarget {
    Stderr,
    Directory(PathBuf),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let mut config = ProfilescanConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    if let Some(data_dir) = &args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }

    let interactive = !(args.list || args.validate_config);
    let target = if interactive {
        LogTarget::Directory(config.storage.log_dir())
    } else {
        LogTarget::Stderr
    };
    let log_guard = init_logging(&args, target)?;

    info!("Starting Profilescan v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate().context("Invalid configuration")?;

    if args.list {
        return print_profiles(&config);
    }

    let mut app = ScanApp::new(config).map_err(|e| {
        error!("Failed to create application: {}", e);
        e
    })?;

    let (input_sender, input_receiver) = mpsc::unbounded_channel();
    let frontend = TerminalFrontend::new();
    frontend.start(app.subscribe(), input_sender)?;

    let outcome = app.run(input_receiver).await;

    // Give the terminal back before reporting anything
    if let Err(e) = frontend.stop().await {
        error!("Failed to restore terminal: {}", e);
    }

    let reason = outcome.map_err(|e| {
        error!("Application error during execution: {}", e);
        e
    })?;

    if let ShutdownReason::Error(message) = &reason {
        eprintln!("✗ Profilescan stopped: {}", message);
    }

    let exit_code = reason.exit_code();
    info!("Profilescan exited with code: {}", exit_code);

    // Flush the log file; process::exit skips destructors
    drop(log_guard);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args, target: LogTarget) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("profilescan={}", log_level)));

    let (writer, guard, ansi) = match target {
        LogTarget::Stderr => (BoxMakeWriter::new(std::io::stderr), None, true),
        LogTarget::Directory(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(&dir, "profilescan.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
    };

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Profilescan Configuration File");
    println!("# Every key can be overridden from the environment, e.g.");
    println!("# PROFILESCAN_STORAGE__DATA_DIR=/var/lib/profilescan");
    println!();
    print!("{}", ProfilescanConfig::default_toml()?);
    Ok(())
}

fn print_profiles(config: &ProfilescanConfig) -> Result<()> {
    let storage = FileStorage::open(config.storage.data_path())?;
    let store = ProfileStore::open(Box::new(storage), config.storage.key.clone())?;

    if store.is_empty() {
        println!("No codes registered yet.");
        return Ok(());
    }

    for profile in store.list() {
        let last_scan = profile
            .last_scan()
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}\t{}\t{} scan(s)\tlast {}",
            profile.barcode(),
            profile.display_name(),
            profile.scan_count(),
            last_scan
        );
    }

    Ok(())
}
