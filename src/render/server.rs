use std::io::{ErrorKind, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use parking_lot::Mutex;

use crate::config::settings::SettingsStore;
use crate::foundation::core::{CancelToken, PowerState};
use crate::foundation::error::LedResult;
use crate::protocol::control::{ControlCommand, ControlResponse, read_request};
use crate::protocol::framing::read_frame;
use crate::render::adjust::{apply_display_state, decode_frame};
use crate::render::panel::{Panel, open_panel};
use crate::render::state::SharedState;

/// Socket locations and per-connection limits.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub ingest_socket: PathBuf,
    pub control_socket: PathBuf,
    /// Read/write timeout on a control connection.
    pub control_timeout: Duration,
    /// How often accept loops check for a stop request.
    pub accept_poll: Duration,
}

impl RendererConfig {
    pub fn new(ingest_socket: impl Into<PathBuf>, control_socket: impl Into<PathBuf>) -> Self {
        Self {
            ingest_socket: ingest_socket.into(),
            control_socket: control_socket.into(),
            control_timeout: Duration::from_secs(5),
            accept_poll: Duration::from_millis(100),
        }
    }
}

/// What happened to one ingested frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Drawn,
    /// Consumed from the stream while the panel is off.
    PoweredOff,
    /// Undecodable payload or failed draw.
    Dropped,
}

/// Shared handles every connection worker needs.
#[derive(Clone)]
struct Shared {
    state: Arc<SharedState>,
    panel: Arc<Mutex<Box<dyn Panel>>>,
}

/// The frame renderer: owns the panel and the display state.
pub struct Renderer {
    cfg: RendererConfig,
    shared: Shared,
}

impl Renderer {
    pub fn new(cfg: RendererConfig, state: SharedState, panel: Box<dyn Panel>) -> Self {
        Self {
            cfg,
            shared: Shared {
                state: Arc::new(state),
                panel: Arc::new(Mutex::new(panel)),
            },
        }
    }

    /// Load settings once, open the panel they describe and seed the display
    /// state from them.
    pub fn from_settings(cfg: RendererConfig, store: SettingsStore) -> LedResult<Self> {
        let settings = store.load()?;
        let panel = open_panel(&settings.panel)?;
        let initial = settings.display_state();
        tracing::info!(
            res = %settings.panel.resolution(),
            power = %initial.power,
            brightness = initial.brightness,
            gamma = initial.gamma,
            "renderer initialised"
        );
        Ok(Self::new(cfg, SharedState::new(initial, store), panel))
    }

    pub fn state(&self) -> &SharedState {
        &self.shared.state
    }

    /// Bind both sockets. Failure here is fatal to the renderer.
    pub fn bind(self) -> LedResult<BoundRenderer> {
        let ingest = bind_socket(&self.cfg.ingest_socket)?;
        let control = bind_socket(&self.cfg.control_socket)?;
        tracing::info!(
            ingest = %self.cfg.ingest_socket.display(),
            control = %self.cfg.control_socket.display(),
            "renderer listening"
        );
        Ok(BoundRenderer {
            renderer: self,
            ingest,
            control,
        })
    }

    /// Decode, adjust and draw one payload according to the current state.
    pub fn render_frame(&self, payload: &[u8]) -> FrameOutcome {
        self.shared.render_frame(payload)
    }

    pub fn handle_command(&self, cmd: ControlCommand) -> ControlResponse {
        self.shared.handle_command(cmd)
    }
}

/// A renderer whose sockets are bound and ready to accept.
pub struct BoundRenderer {
    renderer: Renderer,
    ingest: UnixListener,
    control: UnixListener,
}

impl BoundRenderer {
    /// Accept on both sockets until `cancel` fires, then remove the socket
    /// files and return. Connection workers are left to finish on their own.
    pub fn run(self, cancel: &CancelToken) -> LedResult<()> {
        let Self {
            renderer,
            ingest,
            control,
        } = self;
        let cfg = renderer.cfg;
        let shared = renderer.shared;
        let timeout = cfg.control_timeout;

        std::thread::scope(|scope| {
            let ingest_shared = shared.clone();
            scope.spawn(|| {
                accept_loop(&ingest, "ingest", cancel, cfg.accept_poll, move |stream| {
                    let shared = ingest_shared.clone();
                    move || shared.serve_ingest(stream)
                })
            });
            let control_shared = shared.clone();
            scope.spawn(|| {
                accept_loop(&control, "control", cancel, cfg.accept_poll, move |stream| {
                    let shared = control_shared.clone();
                    move || shared.serve_control(stream, timeout)
                })
            });
        });

        for path in [&cfg.ingest_socket, &cfg.control_socket] {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::debug!(path = %path.display(), error = %e, "socket file not removed");
            }
        }
        tracing::info!("renderer stopped");
        Ok(())
    }
}

fn bind_socket(path: &Path) -> LedResult<UnixListener> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create socket dir '{}'", parent.display()))?;
    }
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed stale socket"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("remove stale socket '{}'", path.display()))
                .into());
        }
    }
    let listener =
        UnixListener::bind(path).with_context(|| format!("bind socket '{}'", path.display()))?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

fn accept_loop<F, W>(
    listener: &UnixListener,
    channel: &'static str,
    cancel: &CancelToken,
    poll: Duration,
    make_worker: F,
) where
    F: Fn(UnixStream) -> W,
    W: FnOnce() + Send + 'static,
{
    while !cancel.is_cancelled() {
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(e) = stream.set_nonblocking(false) {
                    tracing::warn!(channel, error = %e, "dropping connection");
                    continue;
                }
                let worker = make_worker(stream);
                if let Err(e) = std::thread::Builder::new()
                    .name(format!("{channel}-conn"))
                    .spawn(worker)
                {
                    tracing::error!(channel, error = %e, "failed to spawn connection worker");
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                cancel.sleep(poll);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::error!(channel, error = %e, "accept failed");
                cancel.sleep(poll);
            }
        }
    }
    tracing::debug!(channel, "accept loop stopped");
}

impl Shared {
    fn serve_ingest(&self, mut stream: UnixStream) {
        let (mut drawn, mut skipped, mut dropped) = (0u64, 0u64, 0u64);
        loop {
            match read_frame(&mut stream) {
                Ok(Some(payload)) => match self.render_frame(&payload) {
                    FrameOutcome::Drawn => drawn += 1,
                    FrameOutcome::PoweredOff => skipped += 1,
                    FrameOutcome::Dropped => dropped += 1,
                },
                Ok(None) => break,
                Err(e) if e.is_disconnect() => {
                    tracing::debug!(error = %e, "ingest peer went away mid-frame");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "closing ingest connection");
                    break;
                }
            }
        }
        tracing::debug!(drawn, skipped, dropped, "ingest connection closed");
    }

    fn render_frame(&self, payload: &[u8]) -> FrameOutcome {
        if !self.state.snapshot().power.is_on() {
            return FrameOutcome::PoweredOff;
        }

        let mut img = match decode_frame(payload) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!(len = payload.len(), error = %e, "skipping undecodable frame");
                return FrameOutcome::Dropped;
            }
        };

        // Hold the panel while re-reading state so a concurrent power-off
        // clear cannot be overdrawn by a frame that observed power on.
        let mut panel = self.panel.lock();
        let state = self.state.snapshot();
        if !state.power.is_on() {
            return FrameOutcome::PoweredOff;
        }
        apply_display_state(&mut img, &state);
        match panel.draw(&img) {
            Ok(()) => {
                tracing::trace!(len = payload.len(), "frame drawn");
                FrameOutcome::Drawn
            }
            Err(e) => {
                tracing::warn!(error = %e, "panel draw failed");
                FrameOutcome::Dropped
            }
        }
    }

    fn serve_control(&self, mut stream: UnixStream, timeout: Duration) {
        if let Err(e) = stream
            .set_read_timeout(Some(timeout))
            .and_then(|()| stream.set_write_timeout(Some(timeout)))
        {
            tracing::warn!(error = %e, "dropping control connection");
            return;
        }

        let response = match read_request(&stream).and_then(|raw| ControlCommand::parse(&raw)) {
            Ok(cmd) => self.handle_command(cmd),
            Err(e) => {
                tracing::warn!(error = %e, "rejecting control request");
                ControlResponse::error(e.to_string())
            }
        };

        let written = response
            .to_line()
            .and_then(|line| stream.write_all(&line).map_err(Into::into));
        if let Err(e) = written {
            tracing::debug!(error = %e, "control reply not delivered");
        }
    }

    fn handle_command(&self, cmd: ControlCommand) -> ControlResponse {
        let name = cmd.name();
        let result = match cmd {
            ControlCommand::SetBrightness { value } => {
                self.state.set_brightness(value).map(|_| None)
            }
            ControlCommand::Power { state } => {
                let applied = self.state.set_power(state);
                if state == PowerState::Off {
                    self.blank_panel();
                }
                applied.map(|_| None)
            }
            ControlCommand::Reload => self.state.reload().map(|s| {
                if !s.power.is_on() {
                    self.blank_panel();
                }
                None
            }),
            ControlCommand::Status => Ok(Some(self.state.snapshot())),
        };

        match result {
            Ok(state) => {
                tracing::info!(cmd = name, "control command applied");
                ControlResponse {
                    state,
                    ..ControlResponse::ok()
                }
            }
            Err(e) => {
                tracing::warn!(cmd = name, error = %e, "control command failed");
                ControlResponse::error(e.to_string())
            }
        }
    }

    fn blank_panel(&self) {
        if let Err(e) = self.panel.lock().clear() {
            tracing::warn!(error = %e, "panel clear failed");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/server.rs"]
mod tests;
