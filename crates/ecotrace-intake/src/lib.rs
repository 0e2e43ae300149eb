//! Transporter intake
//!
//! The screen-level workflow that turns a scanned or uploaded QR code into a
//! recorded transport leg. [`WorkflowController`] owns all mutable state; the
//! resolution and submission calls are plain functions over the
//! [`ecotrace_core::TraceabilityApi`] seam.

pub mod controller;
pub mod resolution;
pub mod submission;

pub use controller::{Notice, NoticeKind, WorkflowController, WorkflowState};
pub use resolution::resolve_batch;
pub use submission::submit_transport;
