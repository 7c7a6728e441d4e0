//! On-disk documents shared with the external app manager and web UI.

/// Installed-app manifests and app id resolution.
pub mod manifest;
/// Rotation plan file.
pub mod plan;
/// Persisted display settings and panel geometry.
pub mod settings;
