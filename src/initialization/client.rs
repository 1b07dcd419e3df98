//! HTTP client initialization.

use std::sync::Arc;
use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::TCP_CONNECT_TIMEOUT_SECS;
use crate::error_handling::InitializationError;

/// User-Agent sent with every check.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Builds the shared client for site checks.
///
/// Certificates are verified and redirects followed (up to 10 hops). The total
/// request timeout is set per request from the site defaults, only the
/// connect phase is bounded here.
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if the TLS backend cannot
/// be initialized.
pub fn init_client() -> Result<Arc<reqwest::Client>, InitializationError> {
    let client = ClientBuilder::new()
        .connect_timeout(Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(Arc::new(client))
}
