// storage/mod.rs
// Monitoring state persistence

mod incidents;
pub mod migrations;
pub mod models;
mod mutes;
pub mod pool;
mod state;
#[cfg(test)]
pub(crate) mod test_helpers;

pub use migrations::run_migrations;
pub use models::{DueReminder, Incident, Mute, SiteState, SiteStats, SiteStatus, SuccessOutcome};
pub use pool::init_db_pool_with_path;
pub use state::{reminder_interval_minutes, StateStore};
