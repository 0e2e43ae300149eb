//! Continuous stream decoding
//!
//! A background task polls an opened [`FrameSource`] at a fixed rate, decodes
//! every new frame and reports payloads on a channel. The task owns the
//! source and always closes it on exit.

use std::sync::Arc;
use std::time::Duration;

use ecotrace_core::ScanError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::decoder::QrDecoder;
use crate::frame_source::FrameSource;

/// Something the stream observed. Tagged with the session it belongs to so a
/// late event can be told apart from the current session's.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Decoded { session: u64, text: String },
    Failed { session: u64, error: ScanError },
}

impl StreamEvent {
    pub fn session(&self) -> u64 {
        match self {
            StreamEvent::Decoded { session, .. } | StreamEvent::Failed { session, .. } => *session,
        }
    }
}

/// Handle to a running stream task.
#[derive(Debug)]
pub struct StreamHandle {
    session: u64,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Ask the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the task and wait until the source is closed.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(session = self.session, error = %e, "Scanner stream task ended abnormally");
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start decoding frames from an already opened `source`.
pub fn spawn_stream(
    mut source: Box<dyn FrameSource>,
    decoder: Arc<dyn QrDecoder>,
    fps: u32,
    session: u64,
    events: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) -> StreamHandle {
    let period = Duration::from_millis(1000 / u64::from(fps.max(1)));
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(error) => {
                    tracing::warn!(session, error = %error, "Frame capture failed");
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {}
                        _ = events.send(StreamEvent::Failed { session, error }) => {}
                    }
                    break;
                }
            };

            let decoder = decoder.clone();
            let decoded = match tokio::task::spawn_blocking(move || decoder.decode_image(&frame))
                .await
            {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::warn!(session, error = %e, "Frame decode task failed");
                    continue;
                }
            };

            if let Some(text) = decoded {
                tracing::debug!(session, "QR code decoded from stream");
                // A full channel must not keep the task alive past cancellation.
                let sent = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    sent = events.send(StreamEvent::Decoded { session, text }) => sent,
                };
                if sent.is_err() {
                    break;
                }
            }
        }

        if let Err(e) = source.close().await {
            tracing::warn!(session, source = %source.describe(), error = %e, "Failed to close frame source");
        }
        tracing::debug!(session, "Scanner stream finished");
    });

    StreamHandle {
        session,
        cancel,
        task: Some(task),
    }
}
