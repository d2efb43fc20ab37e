//! macdeploy - Main entry point
//!
//! Parses the command line, sets up logging and signal handling, then runs
//! the requested command. The exit code is 0 on success and 1 otherwise.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use macdeploy::bundle::BundleVersionReader;
use macdeploy::cli::{Cli, Commands, InfoCommands, InstallCommands};
use macdeploy::config::DeployConfig;
use macdeploy::download::CurlDownloader;
use macdeploy::info::{AppInfo, InfoError, render};
use macdeploy::orchestrator::{DmgInstallRequest, DmgInstaller};
use macdeploy::report::ConsoleReporter;
use macdeploy::system::MacSystem;
use macdeploy::{process_guard, sanity};

/// Initialize tracing. `RUST_LOG` wins over the verbosity flags.
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);
    info!("macdeploy {} starting up", env!("CARGO_PKG_VERSION"));

    // Tools run in their own process groups; make sure an interrupt takes
    // them down with us
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    debug!("Signal handlers initialized");

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Install {
            source:
                InstallCommands::Dmg {
                    url,
                    destination,
                    target,
                    overwrite,
                    download_dir,
                },
        } => {
            let mut config = DeployConfig::load(cli.config.as_deref())?;
            if let Some(download_dir) = download_dir {
                config.download_dir = download_dir;
            }
            config.validate().context("Invalid configuration")?;

            if let Err(message) = sanity::run_preflight_checks(&config, &url) {
                eprintln!("{}", message);
                return Ok(ExitCode::FAILURE);
            }

            let request = DmgInstallRequest {
                url,
                destination,
                target_version: target,
                overwrite,
            };
            install_dmg(&config, &request)
        }
        Commands::Info {
            subject: InfoCommands::App { path, key, json },
        } => info_app(&path, key.as_deref(), json),
    }
}

fn install_dmg(config: &DeployConfig, request: &DmgInstallRequest) -> Result<ExitCode> {
    let mut installer = DmgInstaller::new(
        MacSystem::new(config),
        CurlDownloader::new(&config.curl, &config.download_dir),
        BundleVersionReader,
        ConsoleReporter::stdout(),
    );

    let report = installer.run(request);
    for (stage, error) in &report.errors {
        debug!(stage = %stage, "{}", error);
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn info_app(path: &Path, key: Option<&str>, json: bool) -> Result<ExitCode> {
    let info = match AppInfo::load(path) {
        Ok(info) => info,
        Err(e @ InfoError::NotFound(_)) => {
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        let value = info.select(key)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if key.is_some() {
        println!("{}", render(&info.select(key)?));
    } else {
        for line in info.lines() {
            println!("{}", line);
        }
    }
    Ok(ExitCode::SUCCESS)
}
