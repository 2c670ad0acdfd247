//! The tick: decide which targets are due, probe them with bounded parallelism, persist
//! each outcome, evaluate target rules, then evaluate group rules over what was written.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, AcquireError, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::prober::Prober;
use crate::alerting::{EvaluationError, EvaluationService};
use crate::db::models::Target;
use crate::db::store::{GroupStore, HealthRecordStore, StoreError, TargetStore};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("Probe slot unavailable: {0}")]
    Permit(#[from] AcquireError),
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub active_targets: usize,
    pub probed: usize,
    pub failed_probes: usize,
    pub target_errors: usize,
    pub groups_evaluated: usize,
    pub group_errors: usize,
    pub firings: usize,
}

enum TargetOutcome {
    NotDue,
    Probed { success: bool, firings: usize },
}

#[derive(Clone)]
pub struct Scheduler {
    targets: Arc<dyn TargetStore>,
    records: Arc<dyn HealthRecordStore>,
    groups: Arc<dyn GroupStore>,
    prober: Arc<dyn Prober>,
    evaluator: Arc<EvaluationService>,
    max_concurrent_probes: usize,
}

impl Scheduler {
    pub fn new(
        targets: Arc<dyn TargetStore>,
        records: Arc<dyn HealthRecordStore>,
        groups: Arc<dyn GroupStore>,
        prober: Arc<dyn Prober>,
        evaluator: Arc<EvaluationService>,
        max_concurrent_probes: usize,
    ) -> Self {
        Self {
            targets,
            records,
            groups,
            prober,
            evaluator,
            max_concurrent_probes: max_concurrent_probes.max(1),
        }
    }

    /// Runs one tick at logical time `now`. Only failing to list the active targets is
    /// an error; everything below that is logged and counted in the report.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickReport, StoreError> {
        let targets = self.targets.list_active().await?;
        let mut report = TickReport {
            active_targets: targets.len(),
            ..TickReport::default()
        };

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_probes));
        let mut tasks = JoinSet::new();
        for target in targets {
            let scheduler = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let outcome = scheduler.process_target(&target, now, semaphore).await;
                (target, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(TargetOutcome::NotDue))) => {}
                Ok((_, Ok(TargetOutcome::Probed { success, firings }))) => {
                    report.probed += 1;
                    if !success {
                        report.failed_probes += 1;
                    }
                    report.firings += firings;
                }
                Ok((target, Err(e))) => {
                    error!(target_id = target.id, target_name = %target.name, error = %e, "Error processing target.");
                    report.target_errors += 1;
                }
                Err(e) => {
                    error!(error = %e, "Target task panicked or was cancelled.");
                    report.target_errors += 1;
                }
            }
        }

        // Reads the records written above, so it must wait for every target task.
        match self.groups.groups_with_members().await {
            Ok(groups) => {
                for group in &groups {
                    match self.evaluator.evaluate_group(group, now).await {
                        Ok(firings) => {
                            report.groups_evaluated += 1;
                            report.firings += firings;
                        }
                        Err(e) => {
                            error!(group_id = group.group.id, group_name = %group.group.name, error = %e, "Error evaluating group.");
                            report.group_errors += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Error loading groups. Skipping group evaluation.");
                report.group_errors += 1;
            }
        }

        Ok(report)
    }

    async fn process_target(
        &self,
        target: &Target,
        now: DateTime<Utc>,
        slots: Arc<Semaphore>,
    ) -> Result<TargetOutcome, ProcessError> {
        let _permit = slots.acquire_owned().await?;
        let last_probe = self.records.latest_for(target.id).await?;
        if !target.is_due(last_probe.map(|r| r.timestamp), now) {
            return Ok(TargetOutcome::NotDue);
        }

        let result = self.prober.probe(target, target.timeout()).await;
        info!(
            target_id = target.id,
            target_name = %target.name,
            success = result.is_success,
            status_code = result.status_code,
            latency_ms = result.latency_ms,
            "Probe completed."
        );

        // Tick time, not completion time.
        let record = result.into_record(target.id, now);
        self.records.append_record(&record).await?;

        let firings = self.evaluator.evaluate_target(target, &record, now).await?;
        Ok(TargetOutcome::Probed {
            success: record.is_success,
            firings,
        })
    }

    /// Drives [`Scheduler::run_tick`] every `tick_interval` until `shutdown` flips to
    /// true or its sender goes away. A tick already running is allowed to finish.
    pub async fn run(self, tick_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_seconds = tick_interval.as_secs(),
            max_concurrent_probes = self.max_concurrent_probes,
            "Scheduler started."
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                break;
            }

            match self.run_tick(Utc::now()).await {
                Ok(report) => debug!(?report, "Tick completed."),
                Err(e) => error!(error = %e, "Tick failed. Waiting for the next one."),
            }
        }

        info!("Scheduler stopped.");
    }
}
