use std::time::{Duration, Instant};

use crate::config::manifest::AppCatalog;
use crate::config::plan::{PlanSource, RotationSlot};
use crate::foundation::core::{CancelToken, Resolution};
use crate::foundation::error::{LedError, LedResult};
use crate::schedule::process::{AppProcess, LaunchParams};
use crate::schedule::relay::{RelayStats, relay_frames, spawn_frame_reader};
use crate::schedule::sink::SinkConnector;

#[derive(Clone, Debug)]
pub struct SchedulerOptions {
    /// Wait before re-reading an empty plan.
    pub idle_interval: Duration,
    /// Wait after a failed slot before restarting from the top of the plan.
    pub failure_backoff: Duration,
    /// Longest single blocking wait inside the relay loop.
    pub relay_poll: Duration,
    /// Decoded frames buffered between the app's stdout and the relay loop.
    pub reader_capacity: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(2),
            failure_backoff: Duration::from_secs(1),
            relay_poll: Duration::from_millis(100),
            reader_capacity: 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotOutcome {
    /// The app is not installed; the slot's duration was waited out.
    Missing,
    Relayed(RelayStats),
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct SlotReport {
    pub app_id: String,
    pub outcome: SlotOutcome,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleEnd {
    /// Every slot ran.
    Completed,
    /// The plan had no slots.
    EmptyPlan,
    /// A slot failed; the remaining slots were skipped.
    SlotFailed,
    Cancelled,
}

#[derive(Clone, Debug)]
pub struct CycleReport {
    pub slots: Vec<SlotReport>,
    pub ended: CycleEnd,
}

/// Runs the rotation plan forever, one app at a time.
pub struct Scheduler {
    plan: PlanSource,
    catalog: AppCatalog,
    resolution: Resolution,
    connector: Box<dyn SinkConnector>,
    opts: SchedulerOptions,
}

impl Scheduler {
    pub fn new(
        plan: PlanSource,
        catalog: AppCatalog,
        resolution: Resolution,
        connector: Box<dyn SinkConnector>,
    ) -> Self {
        Self {
            plan,
            catalog,
            resolution,
            connector,
            opts: SchedulerOptions::default(),
        }
    }

    pub fn with_options(mut self, opts: SchedulerOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Cycle until `cancel` fires.
    ///
    /// Empty plans are re-read after `idle_interval`. A failed slot or an
    /// unreadable plan waits `failure_backoff` and starts over from the first
    /// slot.
    pub fn run(&self, cancel: &CancelToken) {
        let mut cycles = 0u64;
        while !cancel.is_cancelled() {
            let pause = match self.run_cycle(cancel) {
                Ok(report) => match report.ended {
                    CycleEnd::Completed => {
                        cycles += 1;
                        tracing::debug!(cycles, slots = report.slots.len(), "cycle completed");
                        None
                    }
                    CycleEnd::EmptyPlan => {
                        tracing::debug!(
                            plan = %self.plan.path().display(),
                            "rotation plan is empty"
                        );
                        Some(self.opts.idle_interval)
                    }
                    CycleEnd::SlotFailed => Some(self.opts.failure_backoff),
                    CycleEnd::Cancelled => None,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load rotation plan");
                    Some(self.opts.failure_backoff)
                }
            };
            if let Some(pause) = pause {
                cancel.sleep(pause);
            }
        }
        tracing::info!("scheduler stopped");
    }

    /// Load the plan fresh and run each slot once, in file order.
    pub fn run_cycle(&self, cancel: &CancelToken) -> LedResult<CycleReport> {
        let plan = self.plan.load()?;
        let mut slots = Vec::with_capacity(plan.len());
        if plan.is_empty() {
            return Ok(CycleReport {
                slots,
                ended: CycleEnd::EmptyPlan,
            });
        }

        for slot in &plan.slots {
            if cancel.is_cancelled() {
                return Ok(CycleReport {
                    slots,
                    ended: CycleEnd::Cancelled,
                });
            }
            let report = self.run_slot(slot, cancel);
            let failed = matches!(report.outcome, SlotOutcome::Failed(_));
            slots.push(report);
            if failed {
                return Ok(CycleReport {
                    slots,
                    ended: CycleEnd::SlotFailed,
                });
            }
        }

        let ended = if cancel.is_cancelled() {
            CycleEnd::Cancelled
        } else {
            CycleEnd::Completed
        };
        Ok(CycleReport { slots, ended })
    }

    /// Run one slot. Never returns early on error: failures become
    /// [`SlotOutcome::Failed`].
    pub fn run_slot(&self, slot: &RotationSlot, cancel: &CancelToken) -> SlotReport {
        let started = Instant::now();
        let deadline = started + slot.duration();
        tracing::info!(
            app_id = %slot.app_id,
            duration_sec = slot.duration_sec,
            "slot started"
        );

        let outcome = match self.relay_slot(slot, deadline, cancel) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(app_id = %slot.app_id, error = %e, "slot failed");
                SlotOutcome::Failed(e.to_string())
            }
        };

        let elapsed = started.elapsed();
        match &outcome {
            SlotOutcome::Relayed(stats) => tracing::info!(
                app_id = %slot.app_id,
                frames = stats.frames,
                ended_by = ?stats.ended_by,
                elapsed_ms = elapsed.as_millis() as u64,
                "slot finished"
            ),
            SlotOutcome::Missing => tracing::info!(
                app_id = %slot.app_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "slot held for missing app"
            ),
            SlotOutcome::Failed(_) => {}
        }

        SlotReport {
            app_id: slot.app_id.clone(),
            outcome,
            elapsed,
        }
    }

    fn relay_slot(
        &self,
        slot: &RotationSlot,
        deadline: Instant,
        cancel: &CancelToken,
    ) -> LedResult<SlotOutcome> {
        let Some(app) = self.catalog.resolve(&slot.app_id)? else {
            tracing::warn!(app_id = %slot.app_id, "app not installed, holding slot");
            cancel.sleep_until(deadline);
            return Ok(SlotOutcome::Missing);
        };

        if let Some(declared) = app.manifest.frame_size
            && declared != self.resolution
        {
            tracing::warn!(
                app_id = %slot.app_id,
                declared = %declared,
                panel = %self.resolution,
                "app declares a frame size different from the panel"
            );
        }

        let params = LaunchParams {
            duration: slot.duration(),
            resolution: self.resolution,
        };
        let mut process = AppProcess::spawn(&app, &params)?;
        let stdout = process
            .take_stdout()
            .ok_or_else(|| LedError::process("app stdout unavailable (unexpected)"))?;
        let frames = spawn_frame_reader(stdout, self.opts.reader_capacity)?;

        let relayed = relay_frames(
            &frames,
            self.connector.as_ref(),
            deadline,
            cancel,
            self.opts.relay_poll,
        );
        process.terminate();
        Ok(SlotOutcome::Relayed(relayed?))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/runner.rs"]
mod tests;
