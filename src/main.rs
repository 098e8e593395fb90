use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use qrscan::{QrScanConfig, ScanMode, ScannerSession};

#[derive(Parser, Debug)]
#[command(name = "qrscan")]
#[command(about = "Camera-driven QR code scanner with deduplicated results")]
#[command(version)]
#[command(long_about = "Scans QR codes from a live camera stream or from image files, \
deduplicates the decoded values, and presents them in an interactive terminal list \
with copy, delete and clear actions. If no camera is available the session falls \
back to image-file input.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "qrscan.toml", help = "Path to TOML configuration file")]
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

    /// Override the configured scan mode (push or pull)
    #[arg(long, value_name = "MODE", help = "Scan loop strategy: push (camera callback) or pull (interval polling)")]
    mode: Option<String>,

    /// Image files to scan at startup
    #[arg(long, value_name = "PATH", num_args = 1.., help = "Decode these image files before live scanning starts")]
    image: Vec<PathBuf>,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config();
        return Ok(());
    }

    // Initialize logging
    init_logging(&args)?;

    info!("Starting qrscan v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    // Load and validate configuration
    let mut config = match QrScanConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(mode) = args.mode.as_deref() {
        config.scanner.mode = match mode.to_lowercase().as_str() {
            "push" => ScanMode::Push,
            "pull" => ScanMode::Pull,
            other => {
                eprintln!("Unknown scan mode '{}', expected 'push' or 'pull'", other);
                std::process::exit(2);
            }
        };
    }

    // Validate configuration if requested
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

    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    // Create the session and bring up camera, scanner and input handling
    let mut session = ScannerSession::new(config);

    session.start().await.map_err(|e| {
        error!("Failed to start scanner session: {}", e);
        e
    })?;

    // Decode any image files given on the command line
    session.scan_image_files(&args.image).await;

    // Run the event loop until shutdown
    let exit_code = session.run().await.map_err(|e| {
        error!("Session error during execution: {}", e);
        e
    })?;

    info!("qrscan exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt, Layer};

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

    // Create environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("qrscan={}", log_level)));

    // Configure format based on options; logs go to stderr so they don't
    // fight the results view on stdout
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        None => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_writer(std::io::stderr).boxed()
        }
    };

    // Initialize subscriber
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() {
    let default_config = r#"# Qrscan Configuration File
# This is the default configuration with all available options

[camera]
# Camera device index; omit to auto-select, preferring a rear-facing device
# index = 0
# Requested capture resolution (width, height)
resolution = [640, 480]
# Maximum frames per second to request from the device
max_fps = 30
# Prefer a rear/environment-facing device when auto-selecting
prefer_rear_facing = true

[scanner]
# Scan loop strategy: "push" (camera callback) or "pull" (interval polling)
mode = "push"
# Minimum milliseconds between decode attempts in pull mode
scan_interval_ms = 100
# Attempt every detected grid in a frame instead of stopping at the first failure
try_harder = true

[results]
# Enable clipboard copy actions
clipboard = true
# Maximum rows rendered at once
max_visible_rows = 20

[system]
# Frame ring buffer capacity (number of frames)
ring_buffer_capacity = 30
# Event bus capacity
event_bus_capacity = 100
"#;

    println!("{}", default_config);
}
