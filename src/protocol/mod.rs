//! Wire formats shared by the renderer, the scheduler and app processes.

/// Administrative request/response records for the control socket.
pub mod control;
/// Length-prefixed frame stream used by the ingest socket and app stdout.
pub mod framing;
