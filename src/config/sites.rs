//! Site catalog: scheduler settings, check defaults and monitored sites.
//!
//! The catalog is read from a TOML file at startup and kept in memory. Runtime
//! edits go through the typed [`SitePatch`] so only a fixed set of fields can
//! ever be changed.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error_handling::ConfigError;

/// Scheduler cadence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Minutes to sleep between two sweeps.
    pub interval_minutes: u64,
    /// Number of sites probed at the same time within one sweep.
    pub max_concurrency: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 3,
            max_concurrency: 1,
        }
    }
}

/// Check defaults shared by every site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Attempts per sweep before a site is considered failed.
    pub retry_count: u32,
    /// Delay between two attempts of the same sweep.
    pub retry_interval_minutes: u64,
    /// Total timeout of one HTTP request.
    pub timeout_seconds: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_interval_minutes: 5,
            timeout_seconds: 10,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_expected_code() -> u16 {
    200
}

fn default_support_level() -> String {
    "none".to_string()
}

/// One monitored endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Site {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default = "default_support_level")]
    pub support_level: String,
    #[serde(default = "default_true")]
    pub check_ssl: bool,
    #[serde(default = "default_true")]
    pub check_http_code: bool,
    #[serde(default = "default_expected_code")]
    pub expected_code: u16,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub notify_users: Vec<i64>,
}

impl Site {
    /// Creates a site with default check flags.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            url: url.into(),
            support_level: default_support_level(),
            check_ssl: true,
            check_http_code: true,
            expected_code: default_expected_code(),
            keywords: Vec::new(),
            notify_users: Vec::new(),
        }
    }

    /// Name shown in messages; falls back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Typed partial update of a [`Site`]. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitePatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub support_level: Option<String>,
    pub check_ssl: Option<bool>,
    pub check_http_code: Option<bool>,
    pub expected_code: Option<u16>,
    pub keywords: Option<Vec<String>>,
    pub notify_users: Option<Vec<i64>>,
}

impl SitePatch {
    fn apply(self, site: &mut Site) {
        if let Some(name) = self.name {
            site.name = name;
        }
        if let Some(url) = self.url {
            site.url = url;
        }
        if let Some(level) = self.support_level {
            site.support_level = level;
        }
        if let Some(check_ssl) = self.check_ssl {
            site.check_ssl = check_ssl;
        }
        if let Some(check_http_code) = self.check_http_code {
            site.check_http_code = check_http_code;
        }
        if let Some(code) = self.expected_code {
            site.expected_code = code;
        }
        if let Some(keywords) = self.keywords {
            site.keywords = keywords;
        }
        if let Some(users) = self.notify_users {
            site.notify_users = users;
        }
    }
}

/// The full catalog file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub default: Defaults,
    #[serde(default)]
    pub sites: Vec<Site>,
}

impl MonitorConfig {
    /// Loads and validates a catalog file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parses and validates catalog text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: MonitorConfig = toml::from_str(content)?;
        for site in &mut config.sites {
            if site.name.is_empty() {
                site.name = site.id.clone();
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks the scheduler and default settings are positive, ids are unique
    /// and non-empty and every URL is http(s).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.interval_minutes must be at least 1".into(),
            ));
        }
        if self.scheduler.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.max_concurrency must be at least 1".into(),
            ));
        }
        if self.default.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "default.timeout_seconds must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            validate_site(site)?;
            if !seen.insert(site.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate site id '{}'",
                    site.id
                )));
            }
        }
        Ok(())
    }

    pub fn site(&self, site_id: &str) -> Option<&Site> {
        self.sites.iter().find(|s| s.id == site_id)
    }

    /// Sites whose notification list contains `user_id`.
    pub fn sites_for_user(&self, user_id: i64) -> Vec<&Site> {
        self.sites
            .iter()
            .filter(|s| s.notify_users.contains(&user_id))
            .collect()
    }

    /// Adds a site. Returns `Ok(false)` if the id is already taken.
    pub fn add_site(&mut self, site: Site) -> Result<bool, ConfigError> {
        validate_site(&site)?;
        if self.site(&site.id).is_some() {
            return Ok(false);
        }
        self.sites.push(site);
        Ok(true)
    }

    pub fn remove_site(&mut self, site_id: &str) -> bool {
        let before = self.sites.len();
        self.sites.retain(|s| s.id != site_id);
        self.sites.len() != before
    }

    /// Applies `patch` to the site. Returns `Ok(false)` for an unknown id.
    ///
    /// The patched site is validated before it replaces the stored one.
    pub fn update_site(&mut self, site_id: &str, patch: SitePatch) -> Result<bool, ConfigError> {
        let Some(site) = self.sites.iter_mut().find(|s| s.id == site_id) else {
            return Ok(false);
        };
        let mut updated = site.clone();
        patch.apply(&mut updated);
        validate_site(&updated)?;
        *site = updated;
        Ok(true)
    }

    pub fn add_notify_user(&mut self, site_id: &str, user_id: i64) -> bool {
        match self.sites.iter_mut().find(|s| s.id == site_id) {
            Some(site) => {
                if !site.notify_users.contains(&user_id) {
                    site.notify_users.push(user_id);
                }
                true
            }
            None => false,
        }
    }

    pub fn remove_notify_user(&mut self, site_id: &str, user_id: i64) -> bool {
        match self.sites.iter_mut().find(|s| s.id == site_id) {
            Some(site) => {
                site.notify_users.retain(|u| *u != user_id);
                true
            }
            None => false,
        }
    }
}

fn validate_site(site: &Site) -> Result<(), ConfigError> {
    if site.id.trim().is_empty() {
        return Err(ConfigError::Invalid("site id must not be empty".into()));
    }
    let url = url::Url::parse(&site.url)
        .map_err(|e| ConfigError::Invalid(format!("site '{}': invalid url: {e}", site.id)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "site '{}': unsupported scheme '{}'",
            site.id,
            url.scheme()
        )));
    }
    Ok(())
}
