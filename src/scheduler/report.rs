//! Sweep reporting.

use crate::check::CheckResult;
use crate::config::Site;
use crate::error_handling::StoreError;

/// What happened to one site during a sweep.
#[derive(Debug)]
pub enum SiteOutcome {
    Checked(CheckResult),
    /// The check ran but its result could not be recorded.
    Fault(StoreError),
    /// The site's check task panicked or was cancelled.
    Aborted(String),
}

impl SiteOutcome {
    /// `✅ Shop (200)`, `❌ Shop (500) - Wrong HTTP code: 500, expected: 200`
    /// or `⚠️ Shop: <fault>`.
    pub fn summary_line(&self, site: &Site) -> String {
        match self {
            SiteOutcome::Checked(result) => {
                let icon = if result.success { "✅" } else { "❌" };
                format!("{icon} {}{}", site.display_name(), result.summary())
            }
            SiteOutcome::Fault(e) => format!("⚠️ {}: {e}", site.display_name()),
            SiteOutcome::Aborted(reason) => {
                format!("⚠️ {}: check aborted: {reason}", site.display_name())
            }
        }
    }
}

/// Result of `check_all_sites`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// One summary line per site, in catalog order.
    pub lines: Vec<String>,
    pub up: usize,
    pub down: usize,
    pub faults: usize,
}

impl SweepReport {
    pub(crate) fn push(&mut self, site: &Site, outcome: &SiteOutcome) {
        match outcome {
            SiteOutcome::Checked(result) if result.success => self.up += 1,
            SiteOutcome::Checked(_) => self.down += 1,
            SiteOutcome::Fault(_) | SiteOutcome::Aborted(_) => self.faults += 1,
        }
        self.lines.push(outcome.summary_line(site));
    }

    pub fn total(&self) -> usize {
        self.lines.len()
    }

    /// All summary lines joined by newlines.
    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}
