//! Intra-sweep retries.

use std::time::Duration;

use log::info;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

use super::{CheckResult, SiteProbe};
use crate::config::{Defaults, Site};

/// Fixed delay between attempts, limited to `retry_count - 1` retries.
///
/// A `retry_count` of 0 still performs one attempt.
fn retry_strategy(defaults: &Defaults) -> impl Iterator<Item = Duration> {
    let retries = defaults.retry_count.max(1) as usize - 1;
    FixedInterval::new(Duration::from_secs(defaults.retry_interval_minutes * 60)).take(retries)
}

/// Checks `site` up to `defaults.retry_count` times.
///
/// Returns the first successful result, or the result of the last attempt
/// when every attempt failed. No delay follows the last attempt.
pub async fn run_with_retry(
    probe: &dyn SiteProbe,
    site: &Site,
    defaults: &Defaults,
) -> CheckResult {
    let attempts = defaults.retry_count.max(1);
    let mut attempt = 0u32;

    let outcome = Retry::start(retry_strategy(defaults), || {
        attempt += 1;
        let current = attempt;
        async move {
            let result = probe.check(site, defaults).await;
            if result.success {
                if current > 1 {
                    info!("[{}] succeeded on attempt {current}/{attempts}", site.id);
                }
                Ok(result)
            } else {
                if current < attempts {
                    info!(
                        "[{}] attempt {current}/{attempts} failed: {}. Retrying in {} min",
                        site.id,
                        result.error.as_deref().unwrap_or("unknown error"),
                        defaults.retry_interval_minutes
                    );
                } else {
                    info!(
                        "[{}] all {attempts} attempts failed. Last error: {}",
                        site.id,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                Err(result)
            }
        }
    })
    .await;

    match outcome {
        Ok(result) | Err(result) => result,
    }
}
