//! Progress-tracking multipart upload body and stall watchdog.
//!
//! The video file is streamed as a counted chunk stream so upload
//! progress is observable while bytes move. Percentages are pushed to
//! the controller over an unbounded channel (the controller maps them
//! onto job state and events) and mirrored into a lock-free
//! [`TransferObserver`] that the stall watchdog reads.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use gaitview_core::job::{UNKNOWN_SIZE_PROGRESS, UPLOAD_PROGRESS_FLOOR};
use gaitview_core::types::ViewType;

use crate::events::AnalysisEvent;

/// Upload percentage below which a long silence counts as "stuck".
/// Past this point the transfer has demonstrably started and slow
/// links are given the benefit of the doubt.
const STALL_PROGRESS_CEILING: u8 = 10;

/// Shared observation point between the counting stream and the stall
/// watchdog.
pub(crate) struct TransferObserver {
    epoch: Instant,
    percent: AtomicU8,
    /// Milliseconds since `epoch` at the last byte-progress update.
    last_change_ms: AtomicU64,
}

impl TransferObserver {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Instant::now(),
            percent: AtomicU8::new(0),
            last_change_ms: AtomicU64::new(0),
        }
    }

    fn record(&self, percent: u8) {
        self.percent.store(percent, Ordering::Relaxed);
        self.last_change_ms
            .store(self.epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Time since the last byte-progress update (or since the upload
    /// began, if no bytes have moved yet).
    fn idle_for(&self) -> Duration {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        let last_ms = self.last_change_ms.load(Ordering::Relaxed);
        Duration::from_millis(now_ms.saturating_sub(last_ms))
    }
}

/// Build the multipart form for a video submission.
///
/// The file part streams through a counter: with a known total size
/// each chunk recomputes `max(percent, 1)`; a zero-length/unknown
/// total holds the indicator at a fixed low value instead of
/// fabricating a midpoint estimate.
pub(crate) async fn video_form(
    path: &Path,
    view: ViewType,
    progress_tx: mpsc::UnboundedSender<u8>,
    observer: Arc<TransferObserver>,
) -> std::io::Result<reqwest::multipart::Form> {
    let file = tokio::fs::File::open(path).await?;
    let total_bytes = file.metadata().await?.len();

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "walk.mp4".to_string());

    let mut sent: u64 = 0;
    let counted = ReaderStream::new(file).map(move |chunk| {
        if let Ok(bytes) = &chunk {
            sent += bytes.len() as u64;
            let percent = if total_bytes > 0 {
                (((sent * 100) / total_bytes) as u8).clamp(UPLOAD_PROGRESS_FLOOR, 100)
            } else {
                UNKNOWN_SIZE_PROGRESS
            };
            observer.record(percent);
            let _ = progress_tx.send(percent);
        }
        chunk
    });

    let body = reqwest::Body::wrap_stream(counted);
    let part = if total_bytes > 0 {
        reqwest::multipart::Part::stream_with_length(body, total_bytes)
    } else {
        reqwest::multipart::Part::stream(body)
    }
    .file_name(file_name);

    Ok(reqwest::multipart::Form::new()
        .part("file", part)
        .text("view_type", view.as_str()))
}

/// Watch an in-flight upload and emit a single non-fatal
/// [`AnalysisEvent::UploadStalled`] if it sits without byte progress
/// for `warn_after` while still below [`STALL_PROGRESS_CEILING`].
///
/// The transfer itself is never aborted here; the hard upload timeout
/// is enforced on the HTTP request. Cancel the token once the upload
/// resolves either way.
pub(crate) fn spawn_stall_watchdog(
    observer: Arc<TransferObserver>,
    warn_after: Duration,
    cancel: CancellationToken,
    event_tx: broadcast::Sender<AnalysisEvent>,
) -> tokio::task::JoinHandle<()> {
    let tick = (warn_after / 4).max(Duration::from_millis(25));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(tick) => {}
            }

            if observer.percent() >= STALL_PROGRESS_CEILING {
                continue;
            }

            let idle = observer.idle_for();
            if idle >= warn_after {
                tracing::warn!(
                    idle_secs = idle.as_secs(),
                    percent = observer.percent(),
                    "Upload has made no progress; transfer continues",
                );
                let _ = event_tx.send(AnalysisEvent::UploadStalled {
                    stalled_for_secs: idle.as_secs(),
                });
                return;
            }
        }
    })
}
