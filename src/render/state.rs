use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::settings::SettingsStore;
use crate::foundation::core::PowerState;
use crate::foundation::error::{LedError, LedResult};

/// Runtime-mutable display parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    pub power: PowerState,
    pub brightness: f64,
    pub gamma: f64,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            power: PowerState::On,
            brightness: 1.0,
            gamma: 1.0,
        }
    }
}

/// Clamp into `[0, 1]`. NaN maps to 0.
pub fn clamp_brightness(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Display state owned by the renderer.
///
/// Reads and writes go through one mutex. Mutations persist while the lock is
/// held, so the file always reflects the last in-memory update.
#[derive(Debug)]
pub struct SharedState {
    inner: Mutex<DisplayState>,
    store: Option<SettingsStore>,
}

impl SharedState {
    pub fn new(initial: DisplayState, store: SettingsStore) -> Self {
        Self {
            inner: Mutex::new(initial),
            store: Some(store),
        }
    }

    /// State that is never persisted.
    pub fn in_memory(initial: DisplayState) -> Self {
        Self {
            inner: Mutex::new(initial),
            store: None,
        }
    }

    pub fn snapshot(&self) -> DisplayState {
        *self.inner.lock()
    }

    /// Clamp and store brightness. The in-memory value is updated even when
    /// persisting fails; the persist error is still returned.
    pub fn set_brightness(&self, value: f64) -> LedResult<DisplayState> {
        self.mutate(|s| s.brightness = clamp_brightness(value))
    }

    pub fn set_power(&self, power: PowerState) -> LedResult<DisplayState> {
        self.mutate(|s| s.power = power)
    }

    /// Re-read brightness, power and gamma from the settings file. Panel
    /// geometry is left untouched.
    pub fn reload(&self) -> LedResult<DisplayState> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| LedError::config("display state has no settings file to reload"))?;
        let mut guard = self.inner.lock();
        let fresh = store.load()?.display_state();
        *guard = fresh;
        Ok(fresh)
    }

    fn mutate(&self, f: impl FnOnce(&mut DisplayState)) -> LedResult<DisplayState> {
        let mut guard = self.inner.lock();
        f(&mut guard);
        let next = *guard;
        if let Some(store) = &self.store {
            store.persist_display(&next)?;
        }
        Ok(next)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/state.rs"]
mod tests;
