use std::io::Read;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::foundation::core::CancelToken;
use crate::foundation::error::LedResult;
use crate::protocol::framing::read_frame;
use crate::schedule::sink::{FrameSink, SinkConnector};

/// Why a relay loop stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayEnd {
    /// The slot's duration elapsed.
    Deadline,
    /// The app closed its output.
    EndOfStream,
    /// Reading the app's output failed.
    ReadError(String),
    /// A stop was requested.
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayStats {
    pub frames: u64,
    pub ended_by: RelayEnd,
}

/// Decode frames from `source` on a dedicated thread.
///
/// The channel disconnects after a clean end of stream; a read error is
/// delivered as the final item. The thread exits on its own once the
/// receiver is dropped and the source stops producing.
pub fn spawn_frame_reader<R>(
    source: R,
    capacity: usize,
) -> LedResult<Receiver<LedResult<Vec<u8>>>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    std::thread::Builder::new()
        .name("app-frame-reader".into())
        .spawn(move || {
            let mut source = source;
            loop {
                match read_frame(&mut source) {
                    Ok(Some(frame)) => {
                        if tx.send(Ok(frame)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

/// Forward frames from `frames` to a sink until the deadline passes, the
/// stream ends, a read fails or `cancel` fires.
///
/// The sink is opened on the first frame and kept for the rest of the slot.
/// `poll` bounds how long a single wait may block, so a silent app cannot
/// hold the loop past its deadline or a stop request. Sink failures are
/// returned as errors; everything else is a normal end.
pub fn relay_frames(
    frames: &Receiver<LedResult<Vec<u8>>>,
    connector: &dyn SinkConnector,
    deadline: Instant,
    cancel: &CancelToken,
    poll: Duration,
) -> LedResult<RelayStats> {
    let mut sink: Option<Box<dyn FrameSink>> = None;
    let mut count = 0u64;

    let ended_by = loop {
        if cancel.is_cancelled() {
            break RelayEnd::Cancelled;
        }
        let now = Instant::now();
        if now >= deadline {
            break RelayEnd::Deadline;
        }

        match frames.recv_timeout((deadline - now).min(poll)) {
            Ok(Ok(frame)) => {
                if sink.is_none() {
                    sink = Some(connector.connect()?);
                }
                if let Some(s) = sink.as_mut() {
                    s.push_frame(&frame)?;
                }
                count += 1;
                tracing::trace!(len = frame.len(), frames = count, "frame relayed");
            }
            Ok(Err(e)) => break RelayEnd::ReadError(e.to_string()),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break RelayEnd::EndOfStream,
        }
    };

    if let Some(mut s) = sink
        && let Err(e) = s.end()
    {
        tracing::debug!(error = %e, "closing ingest connection failed");
    }

    Ok(RelayStats {
        frames: count,
        ended_by,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/relay.rs"]
mod tests;
