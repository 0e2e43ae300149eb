//! Data models
//!
//! Wire types exchanged with the traceability API plus the client-side
//! records the intake workflow owns, organised by domain.

mod auth;
mod batch;
mod timestamp;
mod transport;

pub use auth::*;
pub use batch::*;
pub use transport::*;
