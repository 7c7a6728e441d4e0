//! The scheduler: runs the rotation plan one app at a time and relays its
//! frames to the renderer.

/// Child-process handle for one rotation slot.
pub mod process;
/// Deadline- and cancellation-aware frame relay.
pub mod relay;
/// Plan cycling, missing-app fallback and failure containment.
pub mod runner;
/// Frame destinations for relayed frames.
pub mod sink;

#[cfg(test)]
#[path = "../../tests/unit/schedule/support.rs"]
pub(crate) mod test_support;
