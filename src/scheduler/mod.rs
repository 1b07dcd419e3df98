//! Periodic sweep driver.
//!
//! One cycle checks every configured site, records the outcome in the
//! [`StateStore`], notifies on transitions and then sends due reminders. The
//! background loop repeats cycles every `scheduler.interval_minutes` until it
//! is cancelled.

mod report;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::RwLock;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::check::{run_with_retry, CheckResult, SiteProbe};
use crate::config::{Defaults, MonitorConfig, Site};
use crate::error_handling::{CheckErrorKind, StoreError};
use crate::initialization::log_check_result;
use crate::notify::Notifier;
use crate::storage::StateStore;

pub use report::{SiteOutcome, SweepReport};

struct Inner {
    catalog: Arc<RwLock<MonitorConfig>>,
    store: Arc<StateStore>,
    probe: Arc<dyn SiteProbe>,
    notifier: Arc<dyn Notifier>,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// The monitoring service object.
pub struct Scheduler {
    inner: Arc<Inner>,
    running: Mutex<Option<RunningLoop>>,
}

impl Scheduler {
    pub fn new(
        catalog: Arc<RwLock<MonitorConfig>>,
        store: Arc<StateStore>,
        probe: Arc<dyn SiteProbe>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                store,
                probe,
                notifier,
            }),
            running: Mutex::new(None),
        }
    }

    /// Shared site catalog. Edits apply from the next sweep on.
    pub fn catalog(&self) -> Arc<RwLock<MonitorConfig>> {
        Arc::clone(&self.inner.catalog)
    }

    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(&self.inner.store)
    }

    /// Checks every configured site once.
    pub async fn check_all_sites(&self) -> SweepReport {
        self.inner.check_all_sites().await
    }

    /// Checks one site with the same transition logic as a sweep.
    ///
    /// Returns `None` if `site_id` is not configured.
    pub async fn check_single_site(&self, site_id: &str) -> Option<String> {
        let (site, defaults) = {
            let catalog = self.inner.catalog.read().await;
            (catalog.site(site_id)?.clone(), catalog.default.clone())
        };
        let outcome = self.inner.process_site(&site, &defaults).await;
        Some(outcome.summary_line(&site))
    }

    /// Sends reminders for every DOWN site that is due. Returns how many went out.
    pub async fn send_due_reminders(&self) -> Result<usize, StoreError> {
        self.inner.send_due_reminders().await
    }

    /// One sweep followed by the reminder pass.
    pub async fn run_cycle(&self) -> SweepReport {
        self.inner.run_cycle().await
    }

    /// Spawns the background loop. Returns false if it is already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = running.as_ref() {
            if !current.handle.is_finished() {
                warn!("Scheduler is already running");
                return false;
            }
        }

        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move { inner.run_loop(loop_cancel).await });
        *running = Some(RunningLoop { cancel, handle });
        true
    }

    /// Cancels the background loop and waits for it to exit.
    ///
    /// A sweep interrupted here leaves no partial transition: uncommitted
    /// store transactions roll back.
    pub async fn stop(&self) {
        let current = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(current) = current {
            current.cancel.cancel();
            if let Err(e) = current.handle.await {
                warn!("Scheduler loop ended abnormally: {e}");
            }
            info!("Scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|current| !current.handle.is_finished())
    }
}

impl Inner {
    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        let interval_minutes = self.catalog.read().await.scheduler.interval_minutes.max(1);
        info!("Scheduler started, interval {interval_minutes} min");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                report = self.run_cycle() => {
                    info!(
                        "Sweep finished: {} up, {} down, {} faults",
                        report.up, report.down, report.faults
                    );
                }
            }

            let interval_minutes = self.catalog.read().await.scheduler.interval_minutes.max(1);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(interval_minutes * 60)) => {}
            }
        }
    }

    async fn run_cycle(self: &Arc<Self>) -> SweepReport {
        let report = self.check_all_sites().await;
        if let Err(e) = self.send_due_reminders().await {
            error!("Reminder pass failed: {e}");
        }
        report
    }

    /// Runs every site as its own task, at most `max_concurrency` at a time.
    ///
    /// A task that panics is reported as that site's fault. Dropping the
    /// sweep aborts the tasks still in flight.
    async fn check_all_sites(self: &Arc<Self>) -> SweepReport {
        let snapshot = self.catalog.read().await.clone();
        let concurrency = snapshot.scheduler.max_concurrency.max(1);
        info!(
            "Checking {} site(s), up to {concurrency} at a time",
            snapshot.sites.len()
        );

        let mut outcomes: Vec<Option<SiteOutcome>> =
            snapshot.sites.iter().map(|_| None).collect();
        let mut pending = snapshot.sites.iter().cloned().enumerate();
        let mut in_flight = HashMap::new();
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() < concurrency {
                let Some((index, site)) = pending.next() else {
                    break;
                };
                let inner = Arc::clone(self);
                let defaults = snapshot.default.clone();
                let handle =
                    tasks.spawn(async move { inner.process_site(&site, &defaults).await });
                in_flight.insert(handle.id(), index);
            }

            let Some(joined) = tasks.join_next_with_id().await else {
                break;
            };
            match joined {
                Ok((id, outcome)) => {
                    if let Some(index) = in_flight.remove(&id) {
                        outcomes[index] = Some(outcome);
                    }
                }
                Err(e) => {
                    if let Some(index) = in_flight.remove(&e.id()) {
                        error!("[{}] check task failed: {e}", snapshot.sites[index].id);
                        outcomes[index] = Some(SiteOutcome::Aborted(e.to_string()));
                    }
                }
            }
        }

        let mut report = SweepReport::default();
        for (site, outcome) in snapshot.sites.iter().zip(outcomes) {
            let outcome = outcome
                .unwrap_or_else(|| SiteOutcome::Aborted("check task was lost".to_string()));
            report.push(site, &outcome);
        }
        report
    }

    /// Check, record, notify. Store faults are logged and reported, never
    /// propagated to the rest of the sweep.
    async fn process_site(&self, site: &Site, defaults: &Defaults) -> SiteOutcome {
        let result = run_with_retry(self.probe.as_ref(), site, defaults).await;
        log_check_result(&site.id, &result);

        match self.record(site, &result).await {
            Ok(()) => SiteOutcome::Checked(result),
            Err(e) => {
                error!("[{}] failed to record check result: {e}", site.id);
                SiteOutcome::Fault(e)
            }
        }
    }

    async fn record(&self, site: &Site, result: &CheckResult) -> Result<(), StoreError> {
        if result.success {
            let outcome = self.store.record_success(&site.id).await?;
            if outcome.status_changed {
                self.notifier
                    .notify_site_up(site, result, outcome.downtime_seconds)
                    .await;
            }
        } else {
            let error_type = result.error_kind.unwrap_or(CheckErrorKind::NoResponse);
            let message = result.error.as_deref().unwrap_or_else(|| error_type.describe());
            if self
                .store
                .record_failure(&site.id, error_type, message)
                .await?
            {
                self.notifier.notify_site_down(site, result).await;
            }
        }
        Ok(())
    }

    async fn send_due_reminders(&self) -> Result<usize, StoreError> {
        let due = self.store.sites_needing_reminder(&self.store.now()).await?;
        if due.is_empty() {
            return Ok(0);
        }
        let snapshot = self.catalog.read().await.clone();

        let mut sent = 0;
        for (site_id, _) in due {
            let Some(site) = snapshot.site(&site_id) else {
                warn!("[{site_id}] reminder due for a site that is no longer configured");
                continue;
            };
            match self.remind(site).await {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => error!("[{site_id}] failed to send reminder: {e}"),
            }
        }
        Ok(sent)
    }

    /// Claims and sends the reminder of `site`. False if it was no longer due.
    async fn remind(&self, site: &Site) -> Result<bool, StoreError> {
        let Some(reminder) = self.store.claim_due_reminder(&site.id).await? else {
            return Ok(false);
        };
        let muted_users = self.store.muted_users(&site.id).await?;
        self.notifier
            .send_reminder(
                site,
                reminder.reminder_number,
                reminder.downtime_seconds,
                reminder.next_interval_minutes,
                &site.notify_users,
                &muted_users,
            )
            .await;
        Ok(true)
    }
}
