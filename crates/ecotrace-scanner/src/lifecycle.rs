//! Scanner lifecycle
//!
//! `Idle -> Starting -> Active -> Idle`. Starting is two-phase: wait for the
//! display surface, then acquire the device. Either phase can be cut short by
//! [`ScannerLifecycle::stop`], which is idempotent and safe in any state.
//!
//! Every start gets a new session number and `stop` bumps it too, so an
//! in-flight start or a late stream event can tell it has been superseded.
//! The state lock is never held across an await point.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ecotrace_core::ScanError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::decoder::QrDecoder;
use crate::frame_source::FrameSource;
use crate::stream::{spawn_stream, StreamEvent, StreamHandle};

const EVENT_BUFFER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Starting,
    Active,
}

/// Receiving end of an active session's events.
#[derive(Debug)]
pub struct ScanSubscription {
    session: u64,
    events: mpsc::Receiver<StreamEvent>,
}

impl ScanSubscription {
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }
}

#[derive(Debug)]
pub enum StartOutcome {
    Started(ScanSubscription),
    /// A session is already starting or active; nothing was opened.
    AlreadyRunning,
    /// `stop` ran before the device was acquired.
    Cancelled,
}

/// Result of an accepted stream event. Accepting ends the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Decoded(String),
    Failed(ScanError),
}

#[derive(Debug)]
struct Inner {
    state: ScannerState,
    session: u64,
    pending: Option<CancellationToken>,
    stream: Option<StreamHandle>,
}

pub struct ScannerLifecycle {
    decoder: Arc<dyn QrDecoder>,
    fps: u32,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for ScannerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerLifecycle")
            .field("fps", &self.fps)
            .field("inner", &*self.lock())
            .finish()
    }
}

impl ScannerLifecycle {
    pub fn new(decoder: Arc<dyn QrDecoder>, fps: u32) -> Self {
        Self {
            decoder,
            fps: fps.max(1),
            inner: Mutex::new(Inner {
                state: ScannerState::Idle,
                session: 0,
                pending: None,
                stream: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ScannerState {
        self.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == ScannerState::Active
    }

    pub fn decoder(&self) -> Arc<dyn QrDecoder> {
        self.decoder.clone()
    }

    /// Start a session on `source` once `surface_ready` resolves.
    ///
    /// Returns [`StartOutcome::AlreadyRunning`] without touching `source`
    /// when a session is starting or active. A device failure returns the
    /// lifecycle to `Idle`.
    pub async fn start<R>(
        &self,
        mut source: Box<dyn FrameSource>,
        surface_ready: R,
    ) -> Result<StartOutcome, ScanError>
    where
        R: Future<Output = ()> + Send,
    {
        let (session, cancel) = {
            let mut inner = self.lock();
            if inner.state != ScannerState::Idle {
                tracing::debug!(state = ?inner.state, "Scanner already running, start ignored");
                return Ok(StartOutcome::AlreadyRunning);
            }
            inner.session += 1;
            inner.state = ScannerState::Starting;
            let token = CancellationToken::new();
            inner.pending = Some(token.clone());
            (inner.session, token)
        };
        tracing::info!(session, source = %source.describe(), "Scanner starting");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(session, "Scanner start cancelled before surface was ready");
                return Ok(StartOutcome::Cancelled);
            }
            _ = surface_ready => {}
        }

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = source.open() => Some(result),
        };

        match opened {
            None => {
                // Abandoned mid-open; the source may hold part of the device.
                close_quietly(session, source.as_mut()).await;
                tracing::debug!(session, "Scanner start cancelled while opening device");
                return Ok(StartOutcome::Cancelled);
            }
            Some(Err(error)) => {
                {
                    let mut inner = self.lock();
                    if inner.session == session {
                        inner.state = ScannerState::Idle;
                        inner.pending = None;
                    }
                }
                tracing::warn!(session, error = %error, "Scanner failed to start");
                return Err(error);
            }
            Some(Ok(())) => {}
        }

        let installed = {
            let mut inner = self.lock();
            if inner.session != session || cancel.is_cancelled() {
                Err(source)
            } else {
                let (tx, rx) = mpsc::channel(EVENT_BUFFER);
                let handle = spawn_stream(
                    source,
                    self.decoder.clone(),
                    self.fps,
                    session,
                    tx,
                    cancel,
                );
                inner.stream = Some(handle);
                inner.pending = None;
                inner.state = ScannerState::Active;
                Ok(ScanSubscription {
                    session,
                    events: rx,
                })
            }
        };

        match installed {
            Ok(subscription) => {
                tracing::info!(session, "Scanner active");
                Ok(StartOutcome::Started(subscription))
            }
            Err(mut source) => {
                close_quietly(session, source.as_mut()).await;
                tracing::debug!(session, "Scanner stopped while device was opening");
                Ok(StartOutcome::Cancelled)
            }
        }
    }

    /// Stop whatever is running. Never fails; always ends in `Idle`.
    pub async fn stop(&self) {
        let (previous, pending, stream) = {
            let mut inner = self.lock();
            let previous = inner.state;
            inner.state = ScannerState::Idle;
            inner.session += 1;
            (previous, inner.pending.take(), inner.stream.take())
        };

        if let Some(token) = pending {
            token.cancel();
        }
        if let Some(stream) = stream {
            stream.shutdown().await;
        }
        if previous != ScannerState::Idle {
            tracing::info!(from = ?previous, "Scanner stopped");
        }
    }

    /// Act on a stream event if it belongs to the active session.
    ///
    /// A current event ends the session and is returned; anything else
    /// (stale session, scanner not active) is dropped.
    pub async fn accept(&self, event: StreamEvent) -> Option<ScanOutcome> {
        let stream = {
            let mut inner = self.lock();
            if inner.state != ScannerState::Active || inner.session != event.session() {
                tracing::debug!(
                    event_session = event.session(),
                    current_session = inner.session,
                    state = ?inner.state,
                    "Ignoring stale scanner event"
                );
                return None;
            }
            inner.state = ScannerState::Idle;
            inner.session += 1;
            inner.stream.take()
        };

        if let Some(stream) = stream {
            stream.shutdown().await;
        }

        Some(match event {
            StreamEvent::Decoded { text, .. } => ScanOutcome::Decoded(text),
            StreamEvent::Failed { error, .. } => ScanOutcome::Failed(error),
        })
    }
}

impl Drop for ScannerLifecycle {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = inner.pending.take() {
            token.cancel();
        }
        // Dropping the handle cancels the task, which closes the source.
        inner.stream.take();
        inner.state = ScannerState::Idle;
    }
}

async fn close_quietly(session: u64, source: &mut dyn FrameSource) {
    if let Err(e) = source.close().await {
        tracing::warn!(session, error = %e, "Failed to close frame source");
    }
}
