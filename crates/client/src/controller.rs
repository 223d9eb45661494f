//! Upload/poll lifecycle controller for one analysis job.
//!
//! [`AnalysisController`] owns an [`AnalysisJob`] and is its only
//! mutator: every state change flows through the controller's own
//! async flow, so no locking discipline beyond the internal `RwLock`
//! is needed. `submit` runs the whole lifecycle (health probe ->
//! upload -> poll) to a terminal state; progress is broadcast as
//! [`AnalysisEvent`]s along the way.
//!
//! Polling is a single sequential loop: one request in flight at a
//! time, every branch either sleeps-and-continues or terminates.
//! Dropping the `submit` future tears the loop down with it, so a
//! discarded job leaks no timers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use gaitview_core::job::AnalysisJob;
use gaitview_core::types::{JobStatus, PipelineStep, ViewType};

use crate::api::{BackendStatus, GaitApi, GaitApiError};
use crate::config::ClientConfig;
use crate::events::AnalysisEvent;
use crate::poll::{self, PollOutcome};
use crate::upload::{self, TransferObserver};

/// Broadcast channel capacity for lifecycle events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Reasons a submission is rejected before any state change.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The input file does not exist or is unreadable.
    #[error("input file not found: {}", .0.display())]
    InputFileMissing(PathBuf),

    /// Another submission is currently running on this controller.
    #[error("another submission is already in flight")]
    InFlight,

    /// The job is in a state that does not accept submissions.
    #[error("cannot submit while the job is {0:?}; submissions are accepted from idle or failed")]
    InvalidState(JobStatus),
}

/// Drives the lifecycle of a submitted walking video.
pub struct AnalysisController {
    api: GaitApi,
    config: ClientConfig,
    job: Arc<RwLock<AnalysisJob>>,
    event_tx: broadcast::Sender<AnalysisEvent>,
    /// Held for the duration of `submit`/`reset`; `try_lock` turns a
    /// concurrent call into a clean rejection instead of a queue.
    submit_guard: Mutex<()>,
}

impl AnalysisController {
    /// Create a controller for the backend named by `config`.
    pub fn new(config: ClientConfig) -> Self {
        let api = GaitApi::new(config.base_url.clone());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            api,
            config,
            job: Arc::new(RwLock::new(AnalysisJob::new())),
            event_tx,
            submit_guard: Mutex::new(()),
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the current job state.
    pub async fn job(&self) -> AnalysisJob {
        self.job.read().await.clone()
    }

    /// The underlying REST client (for listing analyses or fetching
    /// reports outside the submit lifecycle).
    pub fn api(&self) -> &GaitApi {
        &self.api
    }

    /// Discard the current job and return to `idle`.
    ///
    /// Rejected while a submission is in flight; a failed job is
    /// otherwise kept on screen until the user explicitly moves on.
    pub async fn reset(&self) -> Result<(), SubmitError> {
        let _guard = self.submit_guard.try_lock().map_err(|_| SubmitError::InFlight)?;
        self.job.write().await.reset();
        Ok(())
    }

    /// Submit a video and drive it to a terminal state.
    ///
    /// Runs the full lifecycle: pre-flight health probe, streaming
    /// multipart upload with progress, write-propagation grace delay,
    /// then the poll loop. Returns the terminal [`JobStatus`]; all
    /// network failures are absorbed into job state (`Failed` plus a
    /// human-readable `error`), not the `Result`. `Err` is reserved
    /// for precondition violations, which leave the job untouched.
    pub async fn submit(&self, file: &Path, view: ViewType) -> Result<JobStatus, SubmitError> {
        let _guard = self.submit_guard.try_lock().map_err(|_| SubmitError::InFlight)?;

        {
            let job = self.job.read().await;
            if !job.can_submit() {
                return Err(SubmitError::InvalidState(job.status));
            }
        }

        if tokio::fs::metadata(file).await.is_err() {
            return Err(SubmitError::InputFileMissing(file.to_path_buf()));
        }

        let submission = uuid::Uuid::new_v4();
        tracing::info!(
            %submission,
            path = %file.display(),
            view = view.as_str(),
            "Submitting video for analysis",
        );

        // Fail fast before moving a potentially large file: a dead
        // backend should cost one probe, not a whole upload.
        if let Err(e) = self.api.health(self.config.health_timeout).await {
            let message = format!(
                "Backend health check at {} failed: {e}. No upload was attempted; \
                 verify the backend is running and reachable.",
                self.api.base_url()
            );
            tracing::warn!(%submission, error = %e, "Health probe failed");
            return Ok(self.fail_job(message, false).await);
        }

        let analysis_id = match self.run_upload(file, view, submission).await {
            Ok(id) => id,
            Err(status) => return Ok(status),
        };

        // The backend may not have propagated the new record to all
        // workers yet; give it a moment before the first poll.
        tokio::time::sleep(self.config.post_upload_grace).await;

        Ok(self.poll_until_terminal(&analysis_id).await)
    }

    // ---- upload phase ----

    /// Stream the file to the upload endpoint, tracking progress.
    ///
    /// On success returns the backend-assigned analysis id with the
    /// job already transitioned to `Processing`. On failure the job is
    /// failed and the terminal status is returned as the error.
    async fn run_upload(
        &self,
        file: &Path,
        view: ViewType,
        submission: uuid::Uuid,
    ) -> Result<String, JobStatus> {
        {
            let mut job = self.job.write().await;
            if let Err(e) = job.begin_upload() {
                // Unreachable while the submit guard is held; bail
                // without touching state if it ever happens.
                tracing::error!(%submission, error = %e, "Job state desynchronized");
                return Err(job.status);
            }
            let _ = self.event_tx.send(AnalysisEvent::UploadProgress {
                percent: job.upload_progress,
            });
        }

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();
        let observer = Arc::new(TransferObserver::new());
        let watchdog_cancel = CancellationToken::new();
        let watchdog = upload::spawn_stall_watchdog(
            Arc::clone(&observer),
            self.config.stall_warning_after,
            watchdog_cancel.clone(),
            self.event_tx.clone(),
        );

        // Map raw byte-progress onto job state and events. The sender
        // lives inside the request body, so this task drains and exits
        // once the transfer resolves either way.
        let job_handle = Arc::clone(&self.job);
        let event_tx = self.event_tx.clone();
        let progress_task = tokio::spawn(async move {
            let mut last_emitted = 0u8;
            while let Some(percent) = progress_rx.recv().await {
                if percent <= last_emitted {
                    continue;
                }
                last_emitted = percent;
                if job_handle
                    .write()
                    .await
                    .record_upload_progress(percent)
                    .is_ok()
                {
                    let _ = event_tx.send(AnalysisEvent::UploadProgress { percent });
                }
            }
        });

        let upload_result = match upload::video_form(file, view, progress_tx, observer).await {
            Ok(form) => self.api.upload(form, self.config.upload_timeout).await,
            Err(e) => {
                watchdog_cancel.cancel();
                let _ = watchdog.await;
                let _ = progress_task.await;
                let message = format!("Could not read {}: {e}", file.display());
                return Err(self.fail_job(message, false).await);
            }
        };

        watchdog_cancel.cancel();
        let _ = watchdog.await;
        let _ = progress_task.await;

        match upload_result {
            Ok(response) => {
                {
                    let mut job = self.job.write().await;
                    if let Err(e) = job.begin_processing(response.analysis_id.clone()) {
                        tracing::error!(%submission, error = %e, "Job state desynchronized");
                        return Err(job.status);
                    }
                }
                let _ = self
                    .event_tx
                    .send(AnalysisEvent::UploadProgress { percent: 100 });
                let _ = self.event_tx.send(AnalysisEvent::StepProgress {
                    step: PipelineStep::PoseEstimation,
                    percent: 0,
                    message: None,
                });
                tracing::info!(
                    %submission,
                    analysis_id = %response.analysis_id,
                    "Upload accepted; analysis started",
                );
                Ok(response.analysis_id)
            }
            Err(e) => {
                tracing::warn!(%submission, error = %e, "Upload failed");
                Err(self
                    .fail_job(upload_failure_message(self.api.base_url(), &e), false)
                    .await)
            }
        }
    }

    // ---- poll phase ----

    /// Poll the status endpoint until the analysis reaches a terminal
    /// state, applying the two-tier 404 policy and transient-error
    /// backoff from [`PollConfig`](crate::poll::PollConfig).
    async fn poll_until_terminal(&self, id: &str) -> JobStatus {
        let cfg = &self.config.poll;

        // The grace window runs from the start of polling, initial
        // delay included.
        let poll_started = Instant::now();
        tokio::time::sleep(cfg.initial_delay).await;
        let mut not_found_attempts: u32 = 0;
        let mut consecutive_errors: u32 = 0;

        loop {
            match poll::classify(self.api.get_analysis(id).await) {
                PollOutcome::Status(response) => match response.status {
                    BackendStatus::Processing => {
                        // A good response wipes prior error history.
                        not_found_attempts = 0;
                        consecutive_errors = 0;

                        let step = response
                            .current_step
                            .as_deref()
                            .map(PipelineStep::from_backend_name)
                            .unwrap_or(PipelineStep::PoseEstimation);
                        let percent = response.step_progress.unwrap_or(0).min(100);

                        {
                            let mut job = self.job.write().await;
                            if let Err(e) =
                                job.record_step(step, percent, response.step_message.clone())
                            {
                                tracing::error!(analysis_id = id, error = %e, "Job state desynchronized");
                            }
                        }
                        let _ = self.event_tx.send(AnalysisEvent::StepProgress {
                            step,
                            percent,
                            message: response.step_message,
                        });

                        tokio::time::sleep(cfg.interval).await;
                    }

                    BackendStatus::Completed => {
                        let metrics = response.metrics.clone();
                        {
                            let mut job = self.job.write().await;
                            if let Err(e) =
                                job.complete(response.step_message, response.metrics)
                            {
                                tracing::error!(analysis_id = id, error = %e, "Job state desynchronized");
                            }
                        }
                        let _ = self.event_tx.send(AnalysisEvent::Completed {
                            analysis_id: id.to_string(),
                            metrics,
                        });
                        tracing::info!(analysis_id = id, "Analysis completed");
                        return JobStatus::Completed;
                    }

                    BackendStatus::Failed => {
                        let message = response
                            .error
                            .unwrap_or_else(|| "Analysis failed on the backend".to_string());
                        return self.fail_job(message, false).await;
                    }
                },

                PollOutcome::NotFound => {
                    not_found_attempts += 1;
                    let within_grace = poll_started.elapsed() <= cfg.grace_window;

                    if !within_grace || not_found_attempts >= cfg.max_not_found_attempts {
                        // The record is genuinely gone, not just slow
                        // to appear; the id is useless from here on.
                        let message = format!(
                            "Analysis {id} was not found on the backend. The record may \
                             have been lost; please upload the video again."
                        );
                        return self.fail_job(message, true).await;
                    }

                    let delay = poll::not_found_delay(not_found_attempts, cfg);
                    tracing::debug!(
                        analysis_id = id,
                        attempt = not_found_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Analysis not visible yet; retrying",
                    );
                    tokio::time::sleep(delay).await;
                }

                PollOutcome::Transient(detail) => {
                    consecutive_errors += 1;

                    if consecutive_errors >= cfg.max_consecutive_errors {
                        let message = format!(
                            "Lost contact with the backend while tracking analysis {id} \
                             ({consecutive_errors} consecutive failures): {detail}"
                        );
                        return self.fail_job(message, false).await;
                    }

                    let delay = poll::error_delay(consecutive_errors, cfg);
                    tracing::warn!(
                        analysis_id = id,
                        consecutive_errors,
                        delay_ms = delay.as_millis() as u64,
                        error = %detail,
                        "Poll failed; backing off",
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    // ---- shared ----

    /// Move the job to `Failed` with a human-readable description and
    /// broadcast the terminal event. `discard_id` additionally clears
    /// the backend id (lost-record case: the job must be resubmitted).
    async fn fail_job(&self, message: String, discard_id: bool) -> JobStatus {
        {
            let mut job = self.job.write().await;
            if let Err(e) = job.fail(message.as_str()) {
                tracing::error!(error = %e, "Job state desynchronized");
            }
            if discard_id {
                job.id = None;
            }
        }
        tracing::warn!(error = %message, "Analysis job failed");
        let _ = self.event_tx.send(AnalysisEvent::Failed { error: message });
        JobStatus::Failed
    }
}

/// Build the user-facing diagnostic for an upload failure, naming the
/// resolved backend URL and the most likely cause.
fn upload_failure_message(base_url: &str, error: &GaitApiError) -> String {
    match error {
        GaitApiError::Request(e) if e.is_timeout() => format!(
            "Upload to {base_url} timed out. Large videos on slow connections can \
             exceed the upload window; try a shorter clip or a faster link."
        ),
        GaitApiError::Request(e) => format!(
            "Upload to {base_url} failed before the backend answered: {e}. The backend \
             may be down, or a network or proxy issue may be blocking the transfer."
        ),
        GaitApiError::Api { status, body } => {
            format!("Upload to {base_url} was rejected with HTTP {status}: {body}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_failure_message_names_the_backend() {
        let message = upload_failure_message(
            "http://localhost:8000",
            &GaitApiError::Api {
                status: 500,
                body: "disk full".into(),
            },
        );
        assert!(message.contains("http://localhost:8000"));
        assert!(message.contains("500"));
        assert!(message.contains("disk full"));
    }

    #[tokio::test]
    async fn submit_rejects_missing_input_file() {
        let controller = AnalysisController::new(ClientConfig::new("http://localhost:1"));
        let result = controller
            .submit(Path::new("/nonexistent/walk.mp4"), ViewType::Sagittal)
            .await;
        assert!(matches!(result, Err(SubmitError::InputFileMissing(_))));

        // Precondition failures leave the job untouched.
        assert_eq!(controller.job().await.status, JobStatus::Idle);
    }
}
