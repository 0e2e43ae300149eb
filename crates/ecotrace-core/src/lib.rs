//! EcoTrace Core Library
//!
//! This crate provides the domain models, error types, configuration, batch
//! reference parsing and role-based routing rules shared by every EcoTrace
//! client component.

pub mod batch_ref;
pub mod config;
pub mod error;
pub mod hooks;
pub mod models;
pub mod routing;
pub mod validation;

// Re-export commonly used types
pub use batch_ref::{
    batch_reference_url, parse_batch_reference, ParseError, BATCH_REFERENCE_MARKER,
};
pub use config::{ClientConfig, LogFormat};
pub use error::{
    AccessDenied, ApiError, ApiErrorKind, LogLevel, ResolveError, ScanError, SubmitError,
    UserFacing,
};
pub use hooks::TraceabilityApi;
pub use routing::{authorize, batch_follow_up, sidebar, Access, Route, SidebarEntry};
pub use validation::build_transport_request;
