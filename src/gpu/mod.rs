//! Device-facing plumbing shared by the engine's higher layers.
//!
//! Provides adapter/device acquisition, error-scoped resource creation,
//! and the bind-group and copy-alignment helpers the resource and
//! algorithm layers build on.

/// Compute bind-group layout entries and copy-alignment helpers.
pub mod binding;
/// Adapter/device acquisition and device-scoped helpers.
pub mod context;
