//! ledloop drives an addressable LED panel from a rotation of external apps.
//!
//! Two long-running services share this crate:
//!
//! - the [`Renderer`] owns the panel, accepts length-prefixed frames on an
//!   ingest socket and administrative commands on a control socket;
//! - the [`Scheduler`] runs each app in the rotation plan for its slot and
//!   relays the app's frames to the renderer.
#![deny(unsafe_code)]

mod foundation;

/// On-disk settings, rotation plan and app manifests.
pub mod config;
/// Frame and control wire formats.
pub mod protocol;
/// Frame renderer and panel drivers.
pub mod render;
/// Rotation scheduler and app runner.
pub mod schedule;

pub use crate::foundation::core::{CancelToken, PowerState, Resolution};
pub use crate::foundation::error::{LedError, LedResult};

pub use crate::config::manifest::{AppCatalog, AppManifest, InstalledApp};
pub use crate::config::plan::{PlanSource, RotationPlan, RotationSlot};
pub use crate::config::settings::{
    BrightnessWindow, PanelConfig, PanelDriver, PanelWiring, Settings, SettingsStore,
};
pub use crate::protocol::control::{ControlCommand, ControlResponse, send_command};
pub use crate::protocol::framing::{MAX_FRAME_LEN, read_frame, write_frame};
pub use crate::render::panel::{MemoryPanel, Panel, open_panel};
pub use crate::render::server::{BoundRenderer, FrameOutcome, Renderer, RendererConfig};
pub use crate::render::state::{DisplayState, SharedState, clamp_brightness};
pub use crate::schedule::relay::{RelayEnd, RelayStats};
pub use crate::schedule::runner::{
    CycleEnd, CycleReport, Scheduler, SchedulerOptions, SlotOutcome, SlotReport,
};
pub use crate::schedule::sink::{FrameSink, InMemoryConnector, IngestConnector, SinkConnector};
