// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits (thresholds in clippy.toml)
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! GPU compute execution engine built on wgpu.
//!
//! Surge runs compute kernels over typed data arrays through a small set of
//! cooperating objects: resources mirror host arrays into device storage,
//! algorithms compile kernels against ordered resource bindings, and
//! sequences record batches of operations that submit to logical queues and
//! replay without re-recording.
//!
//! # Key entry points
//!
//! - [`manager::Manager`] - device ownership, object factories, registries
//! - [`resource::Resource`] - a typed array mirrored between host and device
//! - [`algorithm::Algorithm`] - a compiled kernel bound to resources
//! - [`sequence::Sequence`] - record / submit / await lifecycle
//! - [`operation::Operation`] - the recordable command variants
//!
//! # Architecture
//!
//! Kernels arrive as SPIR-V or WGSL and are introspected host-side
//! ([`kernel`]) so binding mismatches fail before any device object exists.
//! Data moves through explicit staging: sync-to-device operations refresh
//! upload staging from the host mirror at each submit, sync-to-host
//! operations map readback staging after the completion fence. Submission
//! is decoupled from completion, so independent sequences on distinct
//! logical queues overlap their GPU work.

pub mod algorithm;
pub mod element;
pub mod error;
pub mod gpu;
pub mod kernel;
pub mod manager;
pub mod operation;
pub mod options;
pub mod resource;
pub mod sequence;
mod util;
