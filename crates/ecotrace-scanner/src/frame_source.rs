//! Capture devices
//!
//! A [`FrameSource`] is an exclusively owned stream of frames. The shipped
//! implementation watches a directory a capture process drops frames into;
//! ownership is a lock file inside that directory.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use ecotrace_core::ScanError;
use image::DynamicImage;
use sysinfo::{Pid, System};
use tokio::io::AsyncWriteExt;

use crate::decoder::load_image;

/// Marks a frame directory as in use by one scanner.
pub const LOCK_FILE_NAME: &str = ".ecotrace-scanner.lock";

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

#[async_trait]
pub trait FrameSource: Send {
    fn describe(&self) -> String;

    /// Acquire the device. Fails with [`ScanError::DeviceUnavailable`] when
    /// it is missing, busy or not permitted.
    async fn open(&mut self) -> Result<(), ScanError>;

    /// Next frame, or `None` when no new frame is available yet.
    async fn next_frame(&mut self) -> Result<Option<DynamicImage>, ScanError>;

    /// Release the device. Safe to call more than once.
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Frames are image files appearing in `dir`, consumed in file-name order.
/// Files already present when the source opens are skipped.
#[derive(Debug)]
pub struct DirectoryFrameSource {
    dir: PathBuf,
    lock_path: PathBuf,
    lock_held: bool,
    seen: HashSet<PathBuf>,
}

impl DirectoryFrameSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let lock_path = dir.join(LOCK_FILE_NAME);
        Self {
            dir,
            lock_path,
            lock_held: false,
            seen: HashSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_open(&self) -> bool {
        self.lock_held
    }

    /// Create the lock file. A lock left behind by a process that is no
    /// longer running is reclaimed once.
    async fn acquire_lock(&self) -> Result<tokio::fs::File, ScanError> {
        let mut reclaimed = false;
        loop {
            let created = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
                .await;
            match created {
                Ok(file) => return Ok(file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists && !reclaimed => {
                    let Some(owner) = read_lock_owner(&self.lock_path).await else {
                        return Err(self.busy());
                    };
                    if process_alive(owner) {
                        return Err(self.busy());
                    }
                    tracing::warn!(
                        lock = %self.lock_path.display(),
                        pid = owner,
                        "Reclaiming scanner lock from a process that is gone"
                    );
                    match tokio::fs::remove_file(&self.lock_path).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => {
                            return Err(ScanError::DeviceUnavailable(format!(
                                "cannot reclaim {}: {}",
                                self.lock_path.display(),
                                e
                            )))
                        }
                    }
                    reclaimed = true;
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(self.busy()),
                Err(e) => {
                    return Err(ScanError::DeviceUnavailable(format!(
                        "cannot lock {}: {}",
                        self.dir.display(),
                        e
                    )))
                }
            }
        }
    }

    fn busy(&self) -> ScanError {
        ScanError::DeviceUnavailable(format!(
            "{} is in use by another scanner",
            self.dir.display()
        ))
    }

    async fn list_frames(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut frames = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_frame_file(&path) {
                frames.push(path);
            }
        }
        frames.sort();
        Ok(frames)
    }
}

/// Pid recorded in a lock file. `None` when the file is gone or does not
/// hold a pid yet.
async fn read_lock_owner(path: &Path) -> Option<u32> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    contents.trim().parse().ok()
}

fn process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_process(Pid::from_u32(pid))
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    fn describe(&self) -> String {
        format!("frame directory {}", self.dir.display())
    }

    async fn open(&mut self) -> Result<(), ScanError> {
        if self.lock_held {
            return Ok(());
        }

        let meta = tokio::fs::metadata(&self.dir).await.map_err(|e| {
            ScanError::DeviceUnavailable(format!("{}: {}", self.dir.display(), e))
        })?;
        if !meta.is_dir() {
            return Err(ScanError::DeviceUnavailable(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }

        let mut lock = self.acquire_lock().await?;
        self.lock_held = true;

        let pid = std::process::id().to_string();
        let written = match lock.write_all(pid.as_bytes()).await {
            Ok(()) => lock.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::debug!(error = %e, "Could not write pid into scanner lock file");
        }

        let existing = match self.list_frames().await {
            Ok(existing) => existing,
            Err(e) => {
                if let Err(close_err) = self.close().await {
                    tracing::warn!(error = %close_err, "Failed to release scanner lock");
                }
                return Err(ScanError::DeviceUnavailable(format!(
                    "cannot list {}: {}",
                    self.dir.display(),
                    e
                )));
            }
        };
        self.seen = existing.into_iter().collect();

        tracing::debug!(
            dir = %self.dir.display(),
            skipped = self.seen.len(),
            "Frame directory opened"
        );
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<DynamicImage>, ScanError> {
        if !self.lock_held {
            return Err(ScanError::FrameCapture("frame source is not open".to_string()));
        }

        let frames = self
            .list_frames()
            .await
            .map_err(|e| ScanError::FrameCapture(format!("{}: {}", self.dir.display(), e)))?;

        // Forget frames the capture process has already cleaned up.
        self.seen.retain(|p| frames.binary_search(p).is_ok());

        let Some(path) = frames.into_iter().find(|p| !self.seen.contains(p)) else {
            return Ok(None);
        };
        self.seen.insert(path.clone());

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ScanError::FrameCapture(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        };

        match load_image(&data) {
            Ok(image) => Ok(Some(image)),
            Err(e) => {
                tracing::warn!(frame = %path.display(), error = %e, "Skipping unreadable frame");
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if !self.lock_held {
            return Ok(());
        }
        self.lock_held = false;
        self.seen.clear();
        match tokio::fs::remove_file(&self.lock_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to remove scanner lock {}", self.lock_path.display())
            }),
        }
    }
}

impl Drop for DirectoryFrameSource {
    fn drop(&mut self) {
        if self.lock_held {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{blank_png, qr_png};

    #[tokio::test]
    async fn open_takes_exclusive_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = DirectoryFrameSource::new(dir.path());
        first.open().await.unwrap();
        assert!(dir.path().join(LOCK_FILE_NAME).exists());

        let mut second = DirectoryFrameSource::new(dir.path());
        let err = second.open().await.unwrap_err();
        assert!(matches!(err, ScanError::DeviceUnavailable(_)));

        first.close().await.unwrap();
        first.close().await.unwrap();
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());

        second.open().await.unwrap();
        second.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DirectoryFrameSource::new(dir.path().join("nope"));
        assert!(matches!(
            source.open().await,
            Err(ScanError::DeviceUnavailable(_))
        ));
        assert!(!source.is_open());
    }

    #[tokio::test]
    async fn yields_only_new_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("000-old.png"), qr_png("batch/1")).unwrap();

        let mut source = DirectoryFrameSource::new(dir.path());
        source.open().await.unwrap();
        assert!(source.next_frame().await.unwrap().is_none());

        std::fs::write(dir.path().join("002.png"), blank_png(8, 8)).unwrap();
        std::fs::write(dir.path().join("001.png"), blank_png(16, 16)).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let first = source.next_frame().await.unwrap().unwrap();
        assert_eq!(first.width(), 16);
        let second = source.next_frame().await.unwrap().unwrap();
        assert_eq!(second.width(), 8);
        assert!(source.next_frame().await.unwrap().is_none());

        source.close().await.unwrap();
    }

    #[tokio::test]
    async fn unreadable_frame_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DirectoryFrameSource::new(dir.path());
        source.open().await.unwrap();
        std::fs::write(dir.path().join("broken.png"), b"garbage").unwrap();
        assert!(source.next_frame().await.unwrap().is_none());
        assert!(source.next_frame().await.unwrap().is_none());
        source.close().await.unwrap();
    }

    #[tokio::test]
    async fn drop_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut source = DirectoryFrameSource::new(dir.path());
            source.open().await.unwrap();
        }
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn stale_lock_from_dead_process_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        // Above the Linux pid_max ceiling, so never a running process.
        std::fs::write(dir.path().join(LOCK_FILE_NAME), "4294967").unwrap();

        let mut source = DirectoryFrameSource::new(dir.path());
        source.open().await.unwrap();
        assert!(source.is_open());
        let owner = std::fs::read_to_string(dir.path().join(LOCK_FILE_NAME)).unwrap();
        assert_eq!(owner, std::process::id().to_string());
        source.close().await.unwrap();
    }

    #[tokio::test]
    async fn lock_held_by_live_process_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(LOCK_FILE_NAME),
            std::process::id().to_string(),
        )
        .unwrap();

        let mut source = DirectoryFrameSource::new(dir.path());
        assert!(matches!(
            source.open().await,
            Err(ScanError::DeviceUnavailable(_))
        ));
        assert!(dir.path().join(LOCK_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn removed_frames_are_forgotten() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DirectoryFrameSource::new(dir.path());
        source.open().await.unwrap();

        let frame = dir.path().join("001.png");
        std::fs::write(&frame, blank_png(8, 8)).unwrap();
        assert!(source.next_frame().await.unwrap().is_some());
        assert!(source.seen.contains(&frame));

        std::fs::remove_file(&frame).unwrap();
        assert!(source.next_frame().await.unwrap().is_none());
        assert!(source.seen.is_empty());
        source.close().await.unwrap();
    }

    #[tokio::test]
    async fn next_frame_requires_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DirectoryFrameSource::new(dir.path());
        assert!(matches!(
            source.next_frame().await,
            Err(ScanError::FrameCapture(_))
        ));
    }
}
