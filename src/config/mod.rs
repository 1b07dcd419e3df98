//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (reminder schedule, timeouts, paths)
//! - CLI option types and parsing
//! - The TOML site catalog

mod constants;
mod sites;
mod types;

// Re-export all constants
pub use constants::*;
pub use sites::{Defaults, MonitorConfig, SchedulerSettings, Site, SitePatch};
pub use types::{LogFormat, LogLevel, Opt};
