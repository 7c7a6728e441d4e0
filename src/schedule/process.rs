use std::io::{self, ErrorKind, Write};
use std::os::unix::process::CommandExt as _;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::Duration;

use serde::Serialize;

use crate::config::manifest::InstalledApp;
use crate::foundation::core::Resolution;
use crate::foundation::error::{LedError, LedResult};

/// What an app is told about the slot it is running in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaunchParams {
    pub duration: Duration,
    pub resolution: Resolution,
}

/// Parameter record written to the app's stdin as one JSON line.
#[derive(Debug, Serialize)]
struct ParamRecord {
    duration_sec: f64,
    width: u32,
    height: u32,
}

impl LaunchParams {
    pub fn to_record_line(&self) -> LedResult<Vec<u8>> {
        let record = ParamRecord {
            duration_sec: self.duration.as_secs_f64(),
            width: self.resolution.width,
            height: self.resolution.height,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// A running app with owned output handle.
///
/// Dropping the handle terminates the child if it is still running and reaps
/// it on a detached thread; it never waits for a voluntary exit.
pub struct AppProcess {
    app_id: String,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl AppProcess {
    /// Start the app's entrypoint as `<entrypoint> <width> <height>` in its
    /// own directory and process group, send the parameter record and close
    /// stdin.
    #[tracing::instrument(skip(app, params), fields(app_id = %app.manifest.id))]
    pub fn spawn(app: &InstalledApp, params: &LaunchParams) -> LedResult<Self> {
        let entrypoint = app.entrypoint();
        let mut cmd = Command::new(&entrypoint);
        cmd.arg(params.resolution.width.to_string())
            .arg(params.resolution.height.to_string())
            .current_dir(&app.dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .process_group(0);

        let mut child = spawn_retrying_busy(&mut cmd).map_err(|e| {
            LedError::process(format!(
                "failed to spawn '{}': {e}",
                entrypoint.display()
            ))
        })?;

        let stdout = child.stdout.take();
        let mut process = Self {
            app_id: app.manifest.id.clone(),
            child: Some(child),
            stdout,
        };

        let mut stdin = process
            .child
            .as_mut()
            .and_then(|c| c.stdin.take())
            .ok_or_else(|| LedError::process("failed to open app stdin (unexpected)"))?;
        match stdin.write_all(&params.to_record_line()?) {
            Ok(()) => {}
            // The app exited or closed stdin without reading; its output
            // still gets relayed.
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!("app closed stdin before reading parameters");
            }
            Err(e) => {
                return Err(LedError::process(format!(
                    "failed to write parameters to app stdin: {e}"
                )));
            }
        }
        drop(stdin);

        tracing::debug!(pid = ?process.id(), "app started");
        Ok(process)
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// The child's frame stream. Can be taken once.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Kill the app's process group and move on without waiting.
    pub fn terminate(mut self) {
        self.terminate_inner();
    }

    fn terminate_inner(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        drop(self.stdout.take());

        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(app_id = %self.app_id, %status, "app already exited");
                return;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(app_id = %self.app_id, error = %e, "app status unknown"),
        }

        if let Err(e) = kill_process_group(child.id()) {
            tracing::debug!(app_id = %self.app_id, error = %e, "process group kill failed");
            if let Err(e) = child.kill() {
                tracing::warn!(app_id = %self.app_id, error = %e, "failed to signal app");
            }
        }
        let app_id = self.app_id.clone();
        let reaper = std::thread::Builder::new()
            .name("app-reaper".into())
            .spawn(move || match child.wait() {
                Ok(status) => tracing::debug!(app_id = %app_id, %status, "app reaped"),
                Err(e) => tracing::warn!(app_id = %app_id, error = %e, "failed to reap app"),
            });
        if let Err(e) = reaper {
            tracing::warn!(app_id = %self.app_id, error = %e, "failed to spawn reaper");
        }
    }
}

/// SIGKILL every process in the group led by `pgid`.
#[allow(unsafe_code)]
fn kill_process_group(pgid: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid).map_err(|_| io::Error::from(ErrorKind::InvalidInput))?;
    // SAFETY: killpg only takes integers and does not touch our memory.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Retry while the executable is still open for writing (ETXTBSY), which
/// happens right after an app is installed.
fn spawn_retrying_busy(cmd: &mut Command) -> io::Result<Child> {
    let mut attempts = 0;
    loop {
        match cmd.spawn() {
            Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) && attempts < 5 => {
                attempts += 1;
                std::thread::sleep(Duration::from_millis(20 * attempts));
            }
            other => return other,
        }
    }
}

impl Drop for AppProcess {
    fn drop(&mut self) {
        self.terminate_inner();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/process.rs"]
mod tests;
