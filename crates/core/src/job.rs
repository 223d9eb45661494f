//! The [`AnalysisJob`] lifecycle record and its transition rules.
//!
//! A job moves strictly forward through
//! `idle -> uploading -> processing -> {completed|failed}`. The
//! transition methods enforce that ordering and return
//! [`JobStateError`] on violation instead of corrupting state. The
//! upload/poll controller is the only intended mutator; everything else
//! reads snapshots.

use serde::Serialize;

use crate::types::{JobStatus, PipelineStep, Timestamp};

/// Progress value to hold when the total upload size is unknown.
pub const UNKNOWN_SIZE_PROGRESS: u8 = 5;

/// Non-zero floor shown as soon as an upload starts, so a progress
/// indicator is visible before any bytes have moved.
pub const UPLOAD_PROGRESS_FLOOR: u8 = 1;

/// One submitted video and its tracked processing lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisJob {
    /// Backend-assigned identifier. Absent until the upload succeeds,
    /// and cleared again if the backend loses the record.
    pub id: Option<String>,
    pub status: JobStatus,
    /// Percentage in 0..=100, meaningful only while `Uploading`.
    /// Monotonically non-decreasing within one upload.
    pub upload_progress: u8,
    /// Backend-reported pipeline stage, meaningful only while
    /// `Processing` (or terminal, where it records the last stage).
    pub current_step: Option<PipelineStep>,
    /// Percentage in 0..=100 for the current step, copied verbatim
    /// from poll responses.
    pub step_progress: u8,
    /// Free-text status from the backend.
    pub step_message: Option<String>,
    /// Last failure description. Present only when `Failed`.
    pub error: Option<String>,
    /// Final metrics payload from the backend, present once completed.
    pub metrics: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// A transition method was called in a state that does not permit it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobStateError {
    #[error("invalid job transition: {from:?} -> {to}")]
    InvalidTransition { from: JobStatus, to: &'static str },
}

impl AnalysisJob {
    /// Fresh job in the `Idle` state.
    pub fn new() -> Self {
        Self {
            id: None,
            status: JobStatus::Idle,
            upload_progress: 0,
            current_step: None,
            step_progress: 0,
            step_message: None,
            error: None,
            metrics: None,
            created_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    /// Whether a new submission may start from the current state.
    pub fn can_submit(&self) -> bool {
        matches!(self.status, JobStatus::Idle | JobStatus::Failed)
    }

    /// Enter the `Uploading` state, clearing any residue from a prior
    /// failed attempt. Upload progress starts at the visibility floor.
    pub fn begin_upload(&mut self) -> Result<(), JobStateError> {
        if !self.can_submit() {
            return Err(JobStateError::InvalidTransition {
                from: self.status,
                to: "uploading",
            });
        }
        self.id = None;
        self.status = JobStatus::Uploading;
        self.upload_progress = UPLOAD_PROGRESS_FLOOR;
        self.current_step = None;
        self.step_progress = 0;
        self.step_message = None;
        self.error = None;
        self.metrics = None;
        self.completed_at = None;
        Ok(())
    }

    /// Record observed upload progress.
    ///
    /// Values are clamped to 100 and never move backwards, so jittery
    /// transport callbacks cannot make the indicator regress.
    pub fn record_upload_progress(&mut self, percent: u8) -> Result<(), JobStateError> {
        if self.status != JobStatus::Uploading {
            return Err(JobStateError::InvalidTransition {
                from: self.status,
                to: "uploading (progress)",
            });
        }
        self.upload_progress = self.upload_progress.max(percent.min(100));
        Ok(())
    }

    /// The upload succeeded: enter `Processing` with the backend's id.
    ///
    /// The pipeline always starts at pose estimation; later polls may
    /// move the step forward.
    pub fn begin_processing(&mut self, id: String) -> Result<(), JobStateError> {
        if self.status != JobStatus::Uploading {
            return Err(JobStateError::InvalidTransition {
                from: self.status,
                to: "processing",
            });
        }
        self.id = Some(id);
        self.status = JobStatus::Processing;
        self.upload_progress = 100;
        self.current_step = Some(PipelineStep::PoseEstimation);
        self.step_progress = 0;
        self.step_message = None;
        Ok(())
    }

    /// Copy step fields from a poll response verbatim.
    pub fn record_step(
        &mut self,
        step: PipelineStep,
        progress: u8,
        message: Option<String>,
    ) -> Result<(), JobStateError> {
        if self.status != JobStatus::Processing {
            return Err(JobStateError::InvalidTransition {
                from: self.status,
                to: "processing (step)",
            });
        }
        self.current_step = Some(step);
        self.step_progress = progress.min(100);
        self.step_message = message;
        Ok(())
    }

    /// Terminal success.
    ///
    /// The step is forced to report generation at 100% regardless of
    /// what the final poll carried; a completed analysis is done.
    /// The backend's closing message is kept when it sent one.
    pub fn complete(
        &mut self,
        message: Option<String>,
        metrics: Option<serde_json::Value>,
    ) -> Result<(), JobStateError> {
        if self.status != JobStatus::Processing {
            return Err(JobStateError::InvalidTransition {
                from: self.status,
                to: "completed",
            });
        }
        self.status = JobStatus::Completed;
        self.current_step = Some(PipelineStep::ReportGeneration);
        self.step_progress = 100;
        self.step_message = Some(message.unwrap_or_else(|| "Analysis complete".to_string()));
        self.metrics = metrics;
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// Terminal failure with a human-readable description.
    ///
    /// Allowed from any non-completed state: the health probe fails a
    /// job that never left `Idle`, uploads fail from `Uploading`, and
    /// polling fails from `Processing`. A failed upload resets the
    /// progress indicator to zero.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobStateError> {
        if self.status == JobStatus::Completed {
            return Err(JobStateError::InvalidTransition {
                from: self.status,
                to: "failed",
            });
        }
        if self.status == JobStatus::Uploading {
            self.upload_progress = 0;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        Ok(())
    }

    /// Discard this job and return to `Idle`.
    ///
    /// Only ever triggered by explicit user action; there is no
    /// automatic reset on failure.
    pub fn reset(&mut self) {
        *self = AnalysisJob::new();
    }
}

impl Default for AnalysisJob {
    fn default() -> Self {
        Self::new()
    }
}
