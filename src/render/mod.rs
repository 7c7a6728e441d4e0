//! The frame renderer: sole owner of the panel handle.

/// Brightness and gamma applied to decoded frames.
pub mod adjust;
/// Panel drivers.
pub mod panel;
/// Ingest and control socket servers.
pub mod server;
/// Runtime display state behind a single lock.
pub mod state;
