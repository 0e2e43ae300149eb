//! Intake workflow controller
//!
//! `AwaitingBatch -> BatchResolved -> (submit) -> AwaitingBatch`. Both
//! acquisition paths (camera stream and uploaded image) funnel decoded text
//! through the batch reference parser and the resolution call. Every failure
//! ends as a dismissible [`Notice`] and leaves the controller re-enterable.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use ecotrace_core::models::{
    AuthContext, DraftField, ResolvedBatch, TransportDraft, TransportRecord,
};
use ecotrace_core::{
    authorize, build_transport_request, parse_batch_reference, AccessDenied, LogLevel, Route,
    SubmitError, TraceabilityApi, UserFacing,
};
use ecotrace_scanner::{
    FrameSource, ImageLoadError, QrDecoder, ScanOutcome, ScanSubscription, ScannerLifecycle,
    ScannerState, StartOutcome, StreamEvent,
};

use crate::resolution::resolve_batch;
use crate::submission::submit_transport;

const MSG_STREAM_INVALID: &str = "Invalid QR code";
const MSG_IMAGE_INVALID: &str = "Invalid QR format";
const MSG_NOT_DETECTED: &str = "QR not detected";
const MSG_PROCESSING_FAILED: &str = "Failed to process image";
const MSG_RECORDED: &str = "Transport recorded successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    AwaitingBatch,
    BatchResolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Success,
}

/// Inline message shown until dismissed or replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

pub struct WorkflowController {
    api: Arc<dyn TraceabilityApi>,
    auth: AuthContext,
    scanner: ScannerLifecycle,
    resolved: Option<ResolvedBatch>,
    draft: TransportDraft,
    notice: Option<Notice>,
}

impl std::fmt::Debug for WorkflowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowController")
            .field("auth", &self.auth)
            .field("scanner", &self.scanner)
            .field("resolved", &self.resolved)
            .field("draft", &self.draft)
            .field("notice", &self.notice)
            .finish()
    }
}

impl WorkflowController {
    /// Only a transporter may open the intake screen.
    pub fn new(
        api: Arc<dyn TraceabilityApi>,
        auth: AuthContext,
        scanner: ScannerLifecycle,
    ) -> Result<Self, AccessDenied> {
        authorize(Some(&auth), &Route::CreateTransport { batch: None }).into_result()?;
        Ok(Self {
            api,
            auth,
            scanner,
            resolved: None,
            draft: TransportDraft::default(),
            notice: None,
        })
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn state(&self) -> WorkflowState {
        if self.resolved.is_some() {
            WorkflowState::BatchResolved
        } else {
            WorkflowState::AwaitingBatch
        }
    }

    pub fn resolved_batch(&self) -> Option<&ResolvedBatch> {
        self.resolved.as_ref()
    }

    pub fn draft(&self) -> &TransportDraft {
        &self.draft
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn scanner_state(&self) -> ScannerState {
        self.scanner.state()
    }

    /// Open the screen. A `batch` navigation parameter resolves straight
    /// away, skipping acquisition.
    pub async fn enter(&mut self, batch: Option<i64>) -> bool {
        match batch {
            Some(batch_id) => {
                tracing::debug!(batch_id, "Batch supplied by navigation");
                self.resolve(batch_id).await
            }
            None => false,
        }
    }

    /// Start the camera stream. Returns the event subscription once the
    /// device is acquired.
    pub async fn start_scan<R>(
        &mut self,
        source: Box<dyn FrameSource>,
        surface_ready: R,
    ) -> Option<ScanSubscription>
    where
        R: Future<Output = ()> + Send,
    {
        if self.resolved.is_some() {
            tracing::debug!("Batch already resolved, scan not started");
            return None;
        }
        self.notice = None;
        match self.scanner.start(source, surface_ready).await {
            Ok(StartOutcome::Started(subscription)) => Some(subscription),
            Ok(StartOutcome::AlreadyRunning) | Ok(StartOutcome::Cancelled) => None,
            Err(error) => {
                log_failure(&error, "Scanner start failed");
                self.notice = Some(Notice::error(error.user_message()));
                None
            }
        }
    }

    pub async fn stop_scan(&mut self) {
        self.scanner.stop().await;
    }

    /// Feed one stream event. Returns `true` when the event belonged to the
    /// active session (which has now ended), `false` when it was stale.
    pub async fn handle_stream_event(&mut self, event: StreamEvent) -> bool {
        let Some(outcome) = self.scanner.accept(event).await else {
            return false;
        };
        match outcome {
            ScanOutcome::Decoded(text) => {
                self.handle_decoded(&text, MSG_STREAM_INVALID).await;
            }
            ScanOutcome::Failed(error) => {
                log_failure(&error, "Scanner stream failed");
                self.notice = Some(Notice::error(error.user_message()));
            }
        }
        true
    }

    /// Drive a started session until it yields a result or ends. Returns
    /// whether a batch is resolved afterwards.
    pub async fn run_scan(&mut self, mut subscription: ScanSubscription) -> bool {
        loop {
            match subscription.recv().await {
                Some(event) => {
                    if self.handle_stream_event(event).await {
                        break;
                    }
                }
                None => {
                    self.scanner.stop().await;
                    break;
                }
            }
        }
        self.resolved.is_some()
    }

    /// Decode an uploaded image file's bytes.
    pub async fn scan_image(&mut self, data: Vec<u8>) -> bool {
        self.notice = None;
        let decoder = self.scanner.decoder();
        let decoded =
            tokio::task::spawn_blocking(move || decoder.decode_image_bytes(&data)).await;

        match decoded {
            Ok(Ok(Some(text))) => self.handle_decoded(&text, MSG_IMAGE_INVALID).await,
            Ok(Ok(None)) => {
                self.notice = Some(Notice::error(MSG_NOT_DETECTED));
                false
            }
            Ok(Err(error)) => {
                log_failure(&error, "Uploaded image could not be loaded");
                self.notice = Some(Notice::error(error.user_message()));
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Image decode task failed");
                self.notice = Some(Notice::error(MSG_PROCESSING_FAILED));
                false
            }
        }
    }

    pub async fn scan_image_file(&mut self, path: &Path) -> bool {
        match tokio::fs::read(path).await {
            Ok(data) => self.scan_image(data).await,
            Err(e) => {
                let error = ImageLoadError::from(e);
                log_failure(&error, "Uploaded image could not be read");
                self.notice = Some(Notice::error(error.user_message()));
                false
            }
        }
    }

    /// Decode a raw RGBA pixel buffer.
    pub async fn scan_pixels(&mut self, pixels: Vec<u8>, width: u32, height: u32) -> bool {
        self.notice = None;
        let decoder = self.scanner.decoder();
        let decoded =
            tokio::task::spawn_blocking(move || decoder.decode_rgba(&pixels, width, height)).await;

        match decoded {
            Ok(Some(text)) => self.handle_decoded(&text, MSG_IMAGE_INVALID).await,
            Ok(None) => {
                self.notice = Some(Notice::error(MSG_NOT_DETECTED));
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Pixel decode task failed");
                self.notice = Some(Notice::error(MSG_PROCESSING_FAILED));
                false
            }
        }
    }

    /// Resolve `batch_id` directly. On failure nothing changes apart from the
    /// notice.
    pub async fn resolve(&mut self, batch_id: i64) -> bool {
        self.notice = None;
        match resolve_batch(self.api.as_ref(), batch_id).await {
            Ok(batch) => {
                self.scanner.stop().await;
                self.draft = TransportDraft::with_origin(batch.default_origin());
                self.resolved = Some(batch);
                true
            }
            Err(error) => {
                log_failure(&error, "Batch resolution failed");
                self.notice = Some(Notice::error(error.user_message()));
                false
            }
        }
    }

    pub fn select_origin(&mut self, origin: &str) -> Result<(), SubmitError> {
        let batch = self.resolved.as_ref().ok_or(SubmitError::NoBatchResolved)?;
        if !batch.has_origin(origin) {
            return Err(SubmitError::UnknownOrigin(origin.to_string()));
        }
        self.draft.selected_origin = origin.to_string();
        Ok(())
    }

    pub fn update_field(
        &mut self,
        field: DraftField,
        value: impl Into<String>,
    ) -> Result<(), SubmitError> {
        if self.resolved.is_none() {
            return Err(SubmitError::NoBatchResolved);
        }
        self.draft.set(field, value);
        Ok(())
    }

    /// Whether `submit` would pass client-side validation.
    pub fn can_submit(&self) -> bool {
        self.resolved
            .as_ref()
            .is_some_and(|batch| build_transport_request(batch, &self.draft).is_ok())
    }

    /// Record the transport. Success resets the workflow to acquisition;
    /// failure keeps the batch and draft as they were.
    pub async fn submit(&mut self) -> Result<TransportRecord, SubmitError> {
        self.notice = None;
        let result = match self.resolved.as_ref() {
            Some(batch) => submit_transport(self.api.as_ref(), batch, &self.draft).await,
            None => Err(SubmitError::NoBatchResolved),
        };

        match &result {
            Ok(_) => {
                self.resolved = None;
                self.draft = TransportDraft::default();
                self.notice = Some(Notice::success(MSG_RECORDED));
            }
            Err(error) => {
                log_failure(error, "Transport submission failed");
                self.notice = Some(Notice::error(error.user_message()));
            }
        }
        result
    }

    /// Release the camera. Must run before the controller goes away.
    pub async fn teardown(&mut self) {
        self.scanner.stop().await;
    }

    async fn handle_decoded(&mut self, text: &str, invalid_message: &str) -> bool {
        match parse_batch_reference(text) {
            Ok(batch_id) => self.resolve(batch_id).await,
            Err(e) => {
                tracing::debug!(error = %e, "Decoded text is not a batch reference");
                self.notice = Some(Notice::error(invalid_message));
                false
            }
        }
    }
}

fn log_failure<E>(error: &E, message: &str)
where
    E: UserFacing + std::fmt::Display,
{
    match error.log_level() {
        LogLevel::Debug => tracing::debug!(error = %error, "{}", message),
        LogLevel::Warn => tracing::warn!(error = %error, "{}", message),
        LogLevel::Error => tracing::error!(error = %error, "{}", message),
    }
}
