//! Lifecycle events emitted by the upload/poll controller.
//!
//! These are the data contract between the controller and whatever
//! renders the job (a dashboard, a terminal, a test). They are
//! broadcast via a [`tokio::sync::broadcast`] channel; call
//! [`AnalysisController::subscribe`] to receive them.
//!
//! [`AnalysisController::subscribe`]: crate::controller::AnalysisController::subscribe

use serde::Serialize;

use gaitview_core::types::PipelineStep;

/// A lifecycle event for one submitted video.
#[derive(Debug, Clone, Serialize)]
pub enum AnalysisEvent {
    /// Upload progress moved forward (0-100, monotone).
    UploadProgress { percent: u8 },

    /// The upload has gone a long time without byte progress while
    /// still in its early phase. Non-fatal; the transfer continues.
    UploadStalled { stalled_for_secs: u64 },

    /// The backend reported pipeline progress.
    StepProgress {
        step: PipelineStep,
        /// Completion percentage (0-100) of the current step.
        percent: u8,
        /// Free-text status from the backend, if any.
        message: Option<String>,
    },

    /// The analysis finished; metrics (if the backend sent them) are
    /// attached.
    Completed {
        analysis_id: String,
        metrics: Option<serde_json::Value>,
    },

    /// The job reached a terminal failure.
    Failed {
        /// Human-readable failure description.
        error: String,
    },
}
