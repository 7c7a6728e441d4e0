use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{LedError, LedResult};

/// Longest slot the scheduler accepts; longer plan entries are dropped.
pub const MAX_SLOT_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// One rotation entry: which app to run and for how long.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationSlot {
    pub app_id: String,
    pub duration_sec: f64,
}

impl RotationSlot {
    pub fn new(app_id: impl Into<String>, duration_sec: f64) -> Self {
        Self {
            app_id: app_id.into(),
            duration_sec,
        }
    }

    pub fn is_schedulable(&self) -> bool {
        self.duration_sec.is_finite()
            && self.duration_sec > 0.0
            && self.duration_sec <= MAX_SLOT_SECS
    }

    /// Slot length, clamped to `0..=MAX_SLOT_SECS`.
    pub fn duration(&self) -> Duration {
        let secs = if self.duration_sec.is_nan() {
            0.0
        } else {
            self.duration_sec.clamp(0.0, MAX_SLOT_SECS)
        };
        Duration::from_secs_f64(secs)
    }
}

/// Ordered, cyclically repeated list of slots.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RotationPlan {
    pub slots: Vec<RotationSlot>,
}

impl RotationPlan {
    pub fn new(slots: Vec<RotationSlot>) -> Self {
        Self { slots }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Drop slots whose duration cannot be scheduled, keeping file order.
    fn retain_schedulable(&mut self) {
        self.slots.retain(|slot| {
            let keep = slot.is_schedulable();
            if !keep {
                tracing::warn!(
                    app_id = %slot.app_id,
                    duration_sec = slot.duration_sec,
                    "dropping plan slot with unschedulable duration"
                );
            }
            keep
        });
    }

    pub fn parse(bytes: &[u8]) -> LedResult<Self> {
        let mut plan: Self = serde_json::from_slice(bytes)
            .map_err(|e| LedError::config(format!("invalid rotation plan: {e}")))?;
        plan.retain_schedulable();
        Ok(plan)
    }
}

/// Rotation plan file, re-read at the start of every cycle.
#[derive(Clone, Debug)]
pub struct PlanSource {
    path: PathBuf,
}

impl PlanSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty plan.
    pub fn load(&self) -> LedResult<RotationPlan> {
        match std::fs::read(&self.path) {
            Ok(bytes) => RotationPlan::parse(&bytes).map_err(|e| {
                LedError::config(format!("plan '{}': {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RotationPlan::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, plan: &RotationPlan) -> LedResult<()> {
        let bytes = serde_json::to_vec_pretty(plan)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/plan.rs"]
mod tests;
