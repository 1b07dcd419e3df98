//! Main application entry point (CLI binary).
//!
//! Thin wrapper around the `site_monitor` library:
//! - `.env` loading and argument parsing
//! - logger and TLS provider initialization
//! - running until Ctrl-C, or a single cycle with `--once`

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::process;

use site_monitor::initialization::{init_crypto_provider, init_logger_with};
use site_monitor::{init_monitor, Opt};

#[tokio::main]
async fn main() -> Result<()> {
    if dotenvy::dotenv().is_err() {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format)
        .context("Failed to initialize logger")?;
    init_crypto_provider();

    let scheduler = match init_monitor(&opt).await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            eprintln!("site_monitor error: {e:#}");
            process::exit(1);
        }
    };

    if opt.once {
        let report = scheduler.run_cycle().await;
        println!("{}", report.render());
        println!(
            "{} site{} checked: {} up, {} down, {} fault{}",
            report.total(),
            if report.total() == 1 { "" } else { "s" },
            report.up,
            report.down,
            report.faults,
            if report.faults == 1 { "" } else { "s" }
        );
        return Ok(());
    }

    scheduler.start();
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested");
    scheduler.stop().await;
    Ok(())
}
