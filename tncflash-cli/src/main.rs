//! tncflash CLI - reflash a TNC's firmware through its serial bootloader.
//!
//! Every terminal condition maps to a distinct process exit status (see
//! `exit.rs`); that table is the tool's machine-readable contract and the
//! reason failures are reported here instead of bubbling out as anonymous
//! errors.

use clap::{Parser, Subcommand};
use console::style;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod config;
mod exit;
mod serial;

use config::Config;
use tncflash::{
    HardwareRevision, HexImage, NativePort, SerialConfig, SessionResult, TncFlasher,
    port::DEFAULT_BAUD,
};

/// tncflash - reflash TNC firmware over a serial bootloader.
///
/// Environment variables:
///   TNCFLASH_PORT   - Default serial port
///   TNCFLASH_BAUD   - Default baud rate (default: 57600)
#[derive(Parser)]
#[command(name = "tncflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "TNCFLASH_PORT")]
    port: Option<String>,

    /// Baud rate for the serial link.
    #[arg(short, long, global = true, env = "TNCFLASH_BAUD")]
    baud: Option<u32>,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Flash a firmware image to the TNC.
    Flash {
        /// Path to the firmware hex image.
        image: PathBuf,
    },

    /// Identify which hardware revision a firmware image targets.
    Check {
        /// Path to the firmware hex image.
        image: PathBuf,

        /// Output the result as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output the port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!("tncflash v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    let status = match &cli.command {
        Commands::Flash { image } => cmd_flash(&cli, &config, image),
        Commands::Check { image, json } => cmd_check(image, *json),
        Commands::ListPorts { json } => cmd_list_ports(*json),
    };
    ExitCode::from(status)
}

/// Flash command implementation.
fn cmd_flash(cli: &Cli, config: &Config, image_path: &Path) -> u8 {
    let mut image = match HexImage::open(image_path) {
        Ok(image) => image,
        Err(e) => {
            error!("cannot open image {}: {e}", image_path.display());
            return exit::IMAGE_UNREADABLE;
        }
    };
    let total = match image.record_count() {
        Ok(total) => total,
        Err(e) => {
            error!("cannot read image {}: {e}", image_path.display());
            return exit::IMAGE_UNREADABLE;
        }
    };
    if !cli.quiet {
        eprintln!(
            "{} {} ({total} records)",
            style("image:").bold(),
            image_path.display()
        );
    }

    let Some(port_name) = serial::pick_port(cli.port.as_deref(), config) else {
        error!("no serial port given and none detected");
        return exit::PORT_UNAVAILABLE;
    };
    let baud = cli.baud.or(config.connection.baud).unwrap_or(DEFAULT_BAUD);
    let port = match NativePort::open(&SerialConfig::new(&port_name, baud)) {
        Ok(port) => port,
        Err(e) => {
            error!("cannot open serial port {port_name}: {e}");
            return exit::PORT_UNAVAILABLE;
        }
    };

    if !cli.quiet {
        eprintln!("{} {port_name} at {baud} baud", style("port:").bold());
        eprintln!(
            "{} starting reflash; do not interrupt this process, \
             the device can be left unbootable",
            style("⚠").yellow()
        );
    }

    let bar = if cli.quiet || !console::Term::stderr().is_term() {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(total);
        #[allow(clippy::unwrap_used)] // Static template string
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records")
                .unwrap()
                .progress_chars("#>-"),
        );
        bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        bar
    };

    let mut flasher = TncFlasher::new(port);
    let outcome = flasher.update(&mut image, &mut |records| bar.set_position(records));
    bar.finish_and_clear();

    match outcome {
        Ok(SessionResult::Updated { records }) => {
            if !cli.quiet {
                eprintln!(
                    "{} firmware updated ({records} records written)",
                    style("✓").green().bold()
                );
            }
            exit::for_result(SessionResult::Updated { records })
        }
        Ok(SessionResult::AlreadyCurrent) => {
            if !cli.quiet {
                eprintln!("{} firmware already current", style("✓").green());
            }
            exit::for_result(SessionResult::AlreadyCurrent)
        }
        Err(e) => {
            error!("{e}");
            if matches!(e, tncflash::Error::ChannelBusy { .. }) {
                eprintln!(
                    "{} close any other program using {port_name} and try again",
                    style("hint:").bold()
                );
            }
            exit::for_error(&e)
        }
    }
}

/// Plain slug for a hardware revision, for JSON output.
fn revision_slug(revision: HardwareRevision) -> &'static str {
    match revision {
        HardwareRevision::RevA => "rev-a",
        HardwareRevision::RevB => "rev-b",
        HardwareRevision::Unknown => "unknown",
    }
}

/// Check command implementation.
fn cmd_check(image_path: &Path, json: bool) -> u8 {
    let mut image = match HexImage::open(image_path) {
        Ok(image) => image,
        Err(e) => {
            error!("cannot open image {}: {e}", image_path.display());
            return exit::IMAGE_UNREADABLE;
        }
    };
    let records = match image.record_count() {
        Ok(records) => records,
        Err(e) => {
            error!("cannot read image {}: {e}", image_path.display());
            return exit::IMAGE_UNREADABLE;
        }
    };
    let revision = match tncflash::resolve_image_target(&mut image) {
        Ok(revision) => revision,
        Err(e) => {
            error!("cannot read image {}: {e}", image_path.display());
            return exit::IMAGE_UNREADABLE;
        }
    };

    if json {
        let report = serde_json::json!({
            "image": image_path.display().to_string(),
            "records": records,
            "revision": revision_slug(revision),
            "recognized": revision != HardwareRevision::Unknown,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
    } else {
        eprintln!(
            "{} {} ({records} records)",
            style("image:").bold(),
            image_path.display()
        );
        eprintln!("{} {revision}", style("target:").bold());
    }

    if revision == HardwareRevision::Unknown {
        error!("firmware image matches no known hardware signature");
        exit::UNKNOWN_IMAGE_TARGET
    } else {
        0
    }
}

/// List ports command implementation.
fn cmd_list_ports(json: bool) -> u8 {
    let ports = match tncflash::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            error!("cannot enumerate serial ports: {e}");
            return exit::PORT_UNAVAILABLE;
        }
    };

    if json {
        let report: Vec<serde_json::Value> = ports
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "vid": p.vid,
                    "pid": p.pid,
                    "manufacturer": p.manufacturer,
                    "product": p.product,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
        return 0;
    }

    if ports.is_empty() {
        eprintln!("{}", style("no serial ports found").dim());
    } else {
        for port in &ports {
            let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                format!(" ({vid:04X}:{pid:04X})")
            } else {
                String::new()
            };
            let product = port
                .product
                .as_deref()
                .map(|p| format!(" - {p}"))
                .unwrap_or_default();
            eprintln!(
                "  {} {}{}{}",
                style("•").green(),
                style(&port.name).cyan(),
                vid_pid,
                style(product).dim()
            );
        }
    }
    0
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_command_is_valid() {
        // Verifies that all derive macros produce a valid clap Command
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_flash() {
        let cli = Cli::try_parse_from([
            "tncflash",
            "--port",
            "/dev/ttyUSB0",
            "--baud",
            "57600",
            "flash",
            "firmware.hex",
        ])
        .unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(cli.baud, Some(57600));
        assert!(matches!(cli.command, Commands::Flash { .. }));
    }

    #[test]
    fn test_cli_parse_check() {
        let cli = Cli::try_parse_from(["tncflash", "check", "firmware.hex"]).unwrap();
        assert!(matches!(cli.command, Commands::Check { json: false, .. }));
    }

    #[test]
    fn test_cli_parse_check_json() {
        let cli = Cli::try_parse_from(["tncflash", "check", "--json", "firmware.hex"]).unwrap();
        if let Commands::Check { json, .. } = cli.command {
            assert!(json);
        } else {
            panic!("Expected Check command");
        }
    }

    #[test]
    fn test_cli_parse_list_ports() {
        let cli = Cli::try_parse_from(["tncflash", "list-ports"]).unwrap();
        assert!(matches!(cli.command, Commands::ListPorts { json: false }));
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["tncflash", "list-ports"]).unwrap();
        assert!(cli.port.is_none());
        assert!(cli.baud.is_none());
        assert!(cli.config_path.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "tncflash",
            "--port",
            "COM3",
            "--baud",
            "57600",
            "-vv",
            "--quiet",
            "--config",
            "/tmp/config.toml",
            "list-ports",
        ])
        .unwrap();
        assert_eq!(cli.port.as_deref(), Some("COM3"));
        assert_eq!(cli.baud, Some(57600));
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
    }

    #[test]
    fn test_cli_missing_subcommand() {
        let result = Cli::try_parse_from(["tncflash"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_revision_slug_values() {
        assert_eq!(revision_slug(HardwareRevision::RevA), "rev-a");
        assert_eq!(revision_slug(HardwareRevision::RevB), "rev-b");
        assert_eq!(revision_slug(HardwareRevision::Unknown), "unknown");
    }
}
