use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{PowerState, Resolution};
use crate::foundation::error::{LedError, LedResult};
use crate::render::state::{DisplayState, clamp_brightness};

/// The persisted settings document.
///
/// Every field has a default so a partial or missing file still loads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub brightness: f64,
    pub power: PowerState,
    pub gamma: f64,
    pub panel: PanelConfig,
    /// Time-of-day brightness overrides. Parsed and validated, not enforced.
    pub brightness_windows: Vec<BrightnessWindow>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            power: PowerState::On,
            gamma: 1.0,
            panel: PanelConfig::default(),
            brightness_windows: Vec::new(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> LedResult<()> {
        if !self.brightness.is_finite() {
            return Err(LedError::config("brightness must be a finite number"));
        }
        validate_gamma(self.gamma)?;
        self.panel.validate()?;
        for w in &self.brightness_windows {
            w.validate()?;
        }
        Ok(())
    }

    /// Runtime-mutable part of the document.
    pub fn display_state(&self) -> DisplayState {
        DisplayState {
            power: self.power,
            brightness: clamp_brightness(self.brightness),
            gamma: self.gamma,
        }
    }
}

pub fn validate_gamma(gamma: f64) -> LedResult<()> {
    if !gamma.is_finite() || gamma <= 0.0 {
        return Err(LedError::config(format!(
            "gamma must be a finite number > 0, got {gamma}"
        )));
    }
    Ok(())
}

/// Panel geometry and driver selection. Loaded once at renderer startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub width: u32,
    pub height: u32,
    pub driver: PanelDriver,
    pub wiring: PanelWiring,
}

impl Default for PanelConfig {
    fn default() -> Self {
        let res = Resolution::default();
        Self {
            width: res.width,
            height: res.height,
            driver: PanelDriver::Null,
            wiring: PanelWiring::default(),
        }
    }
}

impl PanelConfig {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn validate(&self) -> LedResult<()> {
        if self.resolution().is_empty() {
            return Err(LedError::config("panel width/height must be non-zero"));
        }
        if let PanelDriver::Framebuffer {
            line_length: Some(line_length),
            ..
        } = &self.driver
            && u64::from(*line_length) < u64::from(self.width) * 4
        {
            return Err(LedError::config(format!(
                "framebuffer line_length {line_length} is shorter than one {}-pixel row",
                self.width
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelDriver {
    /// Accept and discard draws.
    Null,
    /// Write every drawn frame to a PNG file.
    Png { path: PathBuf },
    /// Linux fbdev device with 32-bit BGRX pixels.
    Framebuffer {
        #[serde(default = "default_fb_device")]
        device: PathBuf,
        #[serde(default)]
        line_length: Option<u32>,
    },
}

fn default_fb_device() -> PathBuf {
    PathBuf::from("/dev/fb0")
}

/// Chain/wiring parameters of a HUB75-style matrix.
///
/// Carried through to the driver and logged at startup; the drivers shipped
/// here address pixels by `width`/`height` only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelWiring {
    pub rows: u32,
    pub cols: u32,
    pub chain_length: u32,
    pub parallel: u32,
    pub hardware_mapping: String,
    pub gpio_slowdown: u32,
}

impl Default for PanelWiring {
    fn default() -> Self {
        Self {
            rows: 32,
            cols: 64,
            chain_length: 2,
            parallel: 1,
            hardware_mapping: "regular".to_string(),
            gpio_slowdown: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrightnessWindow {
    /// Local time `HH:MM` at which the window opens.
    pub start: String,
    /// Local time `HH:MM` at which the window closes; may wrap past midnight.
    pub end: String,
    pub brightness: f64,
}

impl BrightnessWindow {
    pub fn validate(&self) -> LedResult<()> {
        parse_hhmm(&self.start)?;
        parse_hhmm(&self.end)?;
        if !(0.0..=1.0).contains(&self.brightness) {
            return Err(LedError::config(format!(
                "brightness window value {} is outside [0, 1]",
                self.brightness
            )));
        }
        Ok(())
    }
}

/// Parse `HH:MM` into minutes since midnight.
pub fn parse_hhmm(s: &str) -> LedResult<u16> {
    let bad = || LedError::config(format!("expected HH:MM time, got '{s}'"));
    let (h, m) = s.trim().split_once(':').ok_or_else(bad)?;
    let h: u16 = h.parse().map_err(|_| bad())?;
    let m: u16 = m.parse().map_err(|_| bad())?;
    if h > 23 || m > 59 {
        return Err(bad());
    }
    Ok(h * 60 + m)
}

/// Settings file on disk.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate. A missing file yields defaults.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> LedResult<Settings> {
        let Some(doc) = self.read_document()? else {
            tracing::info!("settings file missing, using defaults");
            return Ok(Settings::default());
        };
        let mut settings: Settings = serde_json::from_value(doc).map_err(|e| {
            LedError::config(format!(
                "invalid settings '{}': {e}",
                self.path.display()
            ))
        })?;
        settings.validate()?;
        settings.brightness = clamp_brightness(settings.brightness);
        Ok(settings)
    }

    /// Write brightness, power and gamma into the document, keeping every
    /// other key as found on disk.
    pub fn persist_display(&self, state: &DisplayState) -> LedResult<()> {
        let mut doc = self
            .read_document()?
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        let obj = doc.as_object_mut().ok_or_else(|| {
            LedError::config(format!(
                "settings '{}' is not a JSON object",
                self.path.display()
            ))
        })?;
        obj.insert("brightness".into(), serde_json::json!(state.brightness));
        obj.insert("power".into(), serde_json::to_value(state.power)?);
        obj.insert("gamma".into(), serde_json::json!(state.gamma));
        self.write_document(&doc)
    }

    /// Replace the whole document.
    pub fn save(&self, settings: &Settings) -> LedResult<()> {
        settings.validate()?;
        self.write_document(&serde_json::to_value(settings)?)
    }

    fn read_document(&self) -> LedResult<Option<serde_json::Value>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("read settings '{}'", self.path.display()))
                    .into());
            }
        };
        let doc = serde_json::from_slice(&bytes).map_err(|e| {
            LedError::config(format!(
                "settings '{}' is not valid JSON: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(doc))
    }

    fn write_document(&self, doc: &serde_json::Value) -> LedResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create settings dir '{}'", parent.display()))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut bytes = serde_json::to_vec_pretty(doc)?;
        bytes.push(b'\n');
        std::fs::write(&tmp, &bytes)
            .with_context(|| format!("write settings '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &self.path).with_context(|| {
            format!(
                "replace settings '{}' with '{}'",
                self.path.display(),
                tmp.display()
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/settings.rs"]
mod tests;
