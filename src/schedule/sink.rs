use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use parking_lot::Mutex;

use crate::foundation::error::LedResult;
use crate::protocol::framing::encode_header;

/// Destination for relayed frames.
///
/// Ordering contract: frames are pushed in the order the app emitted them and
/// a sink only ever carries frames from a single app process.
pub trait FrameSink: Send {
    fn push_frame(&mut self, payload: &[u8]) -> LedResult<()>;
    /// Called once after the last frame of a slot.
    fn end(&mut self) -> LedResult<()> {
        Ok(())
    }
}

/// Opens one sink per slot.
pub trait SinkConnector: Send + Sync {
    fn connect(&self) -> LedResult<Box<dyn FrameSink>>;
}

/// Persistent connection to the renderer's ingest socket.
pub struct IngestSink {
    stream: UnixStream,
    scratch: Vec<u8>,
}

impl IngestSink {
    pub fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            scratch: Vec::new(),
        }
    }
}

impl FrameSink for IngestSink {
    fn push_frame(&mut self, payload: &[u8]) -> LedResult<()> {
        // Header and payload go out in one write so a frame is never split
        // across a short write followed by an error.
        self.scratch.clear();
        self.scratch.extend_from_slice(&encode_header(payload.len())?);
        self.scratch.extend_from_slice(payload);
        self.stream.write_all(&self.scratch)?;
        Ok(())
    }

    fn end(&mut self) -> LedResult<()> {
        self.stream.flush()?;
        self.stream.shutdown(std::net::Shutdown::Write)?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct IngestConnector {
    socket: PathBuf,
    write_timeout: Duration,
}

impl IngestConnector {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl SinkConnector for IngestConnector {
    fn connect(&self) -> LedResult<Box<dyn FrameSink>> {
        let stream = UnixStream::connect(&self.socket)
            .with_context(|| format!("connect ingest socket '{}'", self.socket.display()))?;
        stream.set_write_timeout(Some(self.write_timeout))?;
        Ok(Box::new(IngestSink::new(stream)))
    }
}

/// Frames captured per connection.
#[derive(Debug, Default)]
struct Captured {
    connections: Vec<Vec<Vec<u8>>>,
    ended: usize,
}

/// In-memory connector for tests and dry runs. Clones share their captures.
#[derive(Clone, Debug, Default)]
pub struct InMemoryConnector {
    captured: Arc<Mutex<Captured>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames per connection, in connection order.
    pub fn connections(&self) -> Vec<Vec<Vec<u8>>> {
        self.captured.lock().connections.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.captured.lock().connections.iter().map(Vec::len).sum()
    }

    pub fn ended_count(&self) -> usize {
        self.captured.lock().ended
    }
}

impl SinkConnector for InMemoryConnector {
    fn connect(&self) -> LedResult<Box<dyn FrameSink>> {
        let mut captured = self.captured.lock();
        captured.connections.push(Vec::new());
        Ok(Box::new(InMemorySink {
            index: captured.connections.len() - 1,
            captured: Arc::clone(&self.captured),
        }))
    }
}

struct InMemorySink {
    index: usize,
    captured: Arc<Mutex<Captured>>,
}

impl FrameSink for InMemorySink {
    fn push_frame(&mut self, payload: &[u8]) -> LedResult<()> {
        self.captured.lock().connections[self.index].push(payload.to_vec());
        Ok(())
    }

    fn end(&mut self) -> LedResult<()> {
        self.captured.lock().ended += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/sink.rs"]
mod tests;
