use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::PowerState;
use crate::foundation::error::{LedError, LedResult};
use crate::render::state::DisplayState;

/// Largest accepted control request, terminator included.
pub const MAX_REQUEST_LEN: u64 = 64 * 1024;

/// One administrative request. Exactly one is carried per control connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Set brightness; out-of-range values are clamped by the renderer.
    SetBrightness { value: f64 },
    Power { state: PowerState },
    /// Re-read brightness, power and gamma from the settings file.
    Reload,
    /// Report the current display state without changing it.
    Status,
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetBrightness { .. } => "set_brightness",
            Self::Power { .. } => "power",
            Self::Reload => "reload",
            Self::Status => "status",
        }
    }

    pub fn parse(bytes: &[u8]) -> LedResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| LedError::protocol(format!("malformed control request: {e}")))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DisplayState>,
}

impl ControlResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
            state: None,
        }
    }

    pub fn with_state(state: DisplayState) -> Self {
        Self {
            state: Some(state),
            ..Self::ok()
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(msg.into()),
            state: None,
        }
    }

    pub fn to_line(&self) -> LedResult<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Read one request record: everything up to the first newline or EOF.
pub fn read_request<R: Read>(r: R) -> LedResult<Vec<u8>> {
    let mut reader = BufReader::new(r.take(MAX_REQUEST_LEN));
    let mut buf = Vec::new();
    reader.read_until(b'\n', &mut buf)?;

    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if buf.len() as u64 >= MAX_REQUEST_LEN {
        return Err(LedError::protocol(format!(
            "control request exceeds {MAX_REQUEST_LEN} bytes"
        )));
    }
    if buf.iter().all(u8::is_ascii_whitespace) {
        return Err(LedError::protocol("empty control request"));
    }
    Ok(buf)
}

/// Send one command to a renderer's control socket and wait for its reply.
pub fn send_command(
    socket: &Path,
    cmd: &ControlCommand,
    timeout: Duration,
) -> LedResult<ControlResponse> {
    let mut stream = UnixStream::connect(socket)
        .with_context(|| format!("connect control socket '{}'", socket.display()))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let mut line = serde_json::to_vec(cmd)?;
    line.push(b'\n');
    stream.write_all(&line)?;
    stream.shutdown(std::net::Shutdown::Write)?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply)?;
    serde_json::from_slice(&reply)
        .map_err(|e| LedError::protocol(format!("malformed control response: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/protocol/control.rs"]
mod tests;
