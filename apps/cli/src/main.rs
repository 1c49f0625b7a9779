use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use obdscan_core::lookup::{LayeredLookup, StaticDtcTable, TomlDtcDatabase, resolve_all};
use obdscan_core::session::{ScanOutcome, ScanSession, SessionConfig};
use obdscan_core::state::FaultStatus;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "OBD-II fault code reader for ELM327 interfaces", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Serial port of the interface (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Session configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Fault code description database (TOML)
    #[arg(long, global = true)]
    dtc_db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Read and describe stored fault codes (default)
    Scan,
    /// Clear stored fault codes and the check-engine lamp
    Erase,
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting OBDScan...");

    let result = match args.command.unwrap_or(Command::Scan) {
        Command::Scan => scan(&args),
        Command::Erase => erase(&args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// File values first, then command-line overrides.
fn session_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    Ok(config)
}

fn description_lookup(args: &Args) -> Result<LayeredLookup> {
    let mut lookup = LayeredLookup::new();
    if let Some(path) = &args.dtc_db {
        lookup = lookup.with_layer(TomlDtcDatabase::load_from_file(path)?);
    }
    Ok(lookup.with_layer(StaticDtcTable))
}

fn lamp(status: &FaultStatus) -> &'static str {
    if status.mil_on { "ON" } else { "OFF" }
}

fn scan(args: &Args) -> Result<()> {
    let config = session_config(args)?;
    let lookup = description_lookup(args)?;

    info!(port = %config.serial.port, baud = config.serial.baud_rate, "Opening interface");
    let mut session = ScanSession::connect(config)?;

    match session.run()? {
        ScanOutcome::NoFaults { status } => {
            println!("No faults found (MIL {})", lamp(&status));
        }
        ScanOutcome::Faults { status, codes } => {
            println!(
                "{} stored fault(s), MIL {}",
                status.stored,
                lamp(&status)
            );
            if codes.len() != status.stored as usize {
                warn!(
                    reported = status.stored,
                    read = codes.len(),
                    "Fault memory returned a different number of codes"
                );
            }
            for report in resolve_all(&lookup, &codes) {
                println!("{report}");
            }
        }
    }

    Ok(())
}

fn erase(args: &Args) -> Result<()> {
    let config = session_config(args)?;

    info!(port = %config.serial.port, baud = config.serial.baud_rate, "Opening interface");
    let mut session = ScanSession::connect(config)?;

    let result = session
        .set_protocol()
        .and_then(|_| session.erase_codes());
    session.close();
    result?;

    println!("Stored fault codes cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_subcommand_is_scan() {
        let args = Args::parse_from(["obdscan"]);
        assert_eq!(args.command.unwrap_or(Command::Scan), Command::Scan);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["obdscan", "erase", "--port", "COM7", "-b", "38400"]);
        assert_eq!(args.command, Some(Command::Erase));

        let config = session_config(&args).unwrap();
        assert_eq!(config.serial.port, "COM7");
        assert_eq!(config.serial.baud_rate, 38400);
        assert_eq!(config.response_settle_ms, 5000);
    }

    #[test]
    fn test_flags_override_config_file() {
        let path = std::env::temp_dir().join(format!("obdscan-cli-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "protocol_settle_ms = 250\n[serial]\nport = \"/dev/ttyS1\"\nbaud_rate = 9600\n",
        )
        .unwrap();

        let args = Args::parse_from([
            "obdscan",
            "--config",
            path.to_str().unwrap(),
            "--baud",
            "38400",
        ]);
        let config = session_config(&args).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.serial.port, "/dev/ttyS1");
        assert_eq!(config.serial.baud_rate, 38400);
        assert_eq!(config.protocol_settle_ms, 250);
    }

    #[test]
    fn test_missing_dtc_db_is_an_error() {
        let args = Args::parse_from(["obdscan", "--dtc-db", "/nonexistent/codes.toml"]);
        assert!(description_lookup(&args).is_err());
    }
}
