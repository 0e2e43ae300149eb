//! QR acquisition
//!
//! Two ways to get a QR payload: decode a single uploaded image, or run a
//! continuous stream over a [`FrameSource`] whose start/stop transitions are
//! owned by a [`ScannerLifecycle`].

pub mod decoder;
pub mod frame_source;
pub mod lifecycle;
pub mod stream;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use decoder::{ImageLoadError, QrDecoder, RqrrDecoder};
pub use frame_source::{DirectoryFrameSource, FrameSource, LOCK_FILE_NAME};
pub use lifecycle::{ScanOutcome, ScanSubscription, ScannerLifecycle, ScannerState, StartOutcome};
pub use stream::{spawn_stream, StreamEvent, StreamHandle};
