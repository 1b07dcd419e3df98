//! site_monitor library: HTTP(S) availability monitoring
//!
//! Sites from a TOML catalog are probed on a fixed interval. Each probe checks
//! the HTTP status code, the TLS certificate (expiry and hostname) and
//! required page keywords. Outages are tracked as incidents in SQLite; users
//! are notified when a site goes down or comes back, and reminded with a
//! doubling interval while it stays down.
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use site_monitor::{init_monitor, Opt};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let opt = Opt::parse_from(["site_monitor", "--config", "sites.toml"]);
//! let scheduler = init_monitor(&opt).await?;
//!
//! let report = scheduler.check_all_sites().await;
//! println!("{} up, {} down", report.up, report.down);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! Requires a Tokio runtime and, before the first TLS inspection, a rustls
//! crypto provider (see [`initialization::init_crypto_provider`]).

pub mod check;
pub mod config;
pub mod error_handling;
pub mod initialization;
pub mod notify;
pub mod scheduler;
pub mod storage;
pub mod time_utils;
pub mod tls;

pub use check::{run_with_retry, CheckResult, HttpChecker, SiteProbe};
pub use config::{Defaults, LogFormat, LogLevel, MonitorConfig, Opt, Site, SitePatch};
pub use error_handling::{CheckErrorKind, StoreError};
pub use notify::{LogNotifier, Notifier};
pub use run::init_monitor;
pub use scheduler::{Scheduler, SweepReport};
pub use storage::StateStore;

mod run {
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use log::info;
    use tokio::sync::RwLock;

    use crate::check::HttpChecker;
    use crate::config::{MonitorConfig, Opt};
    use crate::initialization::init_client;
    use crate::notify::LogNotifier;
    use crate::scheduler::Scheduler;
    use crate::storage::{init_db_pool_with_path, run_migrations, StateStore};
    use crate::time_utils::{Clock, SystemClock};

    /// Loads the catalog, opens the state database and wires the scheduler.
    ///
    /// Notifications go to the log through [`LogNotifier`].
    pub async fn init_monitor(opt: &Opt) -> Result<Scheduler> {
        let catalog = MonitorConfig::load(&opt.config)
            .with_context(|| format!("Failed to load site catalog {}", opt.config.display()))?;
        info!(
            "Loaded {} site(s) from {}",
            catalog.sites.len(),
            opt.config.display()
        );

        let pool = init_db_pool_with_path(&opt.db_path)
            .await
            .context("Failed to open state database")?;
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let client = init_client().context("Failed to initialize HTTP client")?;

        Ok(Scheduler::new(
            Arc::new(RwLock::new(catalog)),
            Arc::new(StateStore::new(pool, Arc::clone(&clock))),
            Arc::new(HttpChecker::new(client, Arc::clone(&clock))),
            Arc::new(LogNotifier::new(clock)),
        ))
    }
}
