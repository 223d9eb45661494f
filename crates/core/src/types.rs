//! Status, step, and view-type enums shared across the client.
//!
//! Wire names are fixed by the backend API and must not drift: the
//! serde renames here are the exact strings the backend sends and
//! expects (including the digit-leading `3d_lifting`).

use serde::{Deserialize, Serialize};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Client-tracked lifecycle status of a submitted video.
///
/// This is a superset of the backend's own status enum: `idle` and
/// `uploading` exist only on the client, before the backend has ever
/// heard of the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No submission in flight. The starting state, and the only state
    /// (besides `Failed`) from which a new submission is accepted.
    Idle,
    /// The video is being transferred to the backend.
    Uploading,
    /// The backend has accepted the video and is running the pipeline.
    Processing,
    /// Terminal: the analysis finished and metrics are available.
    Completed,
    /// Terminal: the submission failed at some point in the lifecycle.
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal (`Completed` or `Failed`).
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One stage of the backend's four-step analysis pipeline.
///
/// The client never computes these; they are reported by the backend
/// and echoed for progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStep {
    /// 2D pose estimation on the raw video frames.
    #[serde(rename = "pose_estimation")]
    PoseEstimation,
    /// Lifting 2D keypoints into a 3D skeleton.
    #[serde(rename = "3d_lifting")]
    Lifting3d,
    /// Biomechanical metric computation from the 3D trajectories.
    #[serde(rename = "metrics_calculation")]
    MetricsCalculation,
    /// Rendering the clinical report artifacts.
    #[serde(rename = "report_generation")]
    ReportGeneration,
}

/// Number of steps in the backend pipeline, for "step N of M" display.
pub const PIPELINE_STEP_COUNT: u8 = 4;

impl PipelineStep {
    /// Parse a backend-reported step name.
    ///
    /// Unknown names fall back to [`PipelineStep::PoseEstimation`] so a
    /// backend that grows a new stage degrades to a sane display
    /// instead of breaking the client.
    pub fn from_backend_name(name: &str) -> Self {
        match name {
            "pose_estimation" => PipelineStep::PoseEstimation,
            "3d_lifting" => PipelineStep::Lifting3d,
            "metrics_calculation" => PipelineStep::MetricsCalculation,
            "report_generation" => PipelineStep::ReportGeneration,
            _ => PipelineStep::PoseEstimation,
        }
    }

    /// 1-based position of this step in the pipeline.
    pub fn step_number(self) -> u8 {
        match self {
            PipelineStep::PoseEstimation => 1,
            PipelineStep::Lifting3d => 2,
            PipelineStep::MetricsCalculation => 3,
            PipelineStep::ReportGeneration => 4,
        }
    }

    /// Human-readable label for progress display.
    pub fn label(self) -> &'static str {
        match self {
            PipelineStep::PoseEstimation => "Pose estimation",
            PipelineStep::Lifting3d => "3D lifting",
            PipelineStep::MetricsCalculation => "Metrics calculation",
            PipelineStep::ReportGeneration => "Report generation",
        }
    }
}

/// Camera view of the recorded walk, sent as the `view_type` field of
/// the upload form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    /// Side-on recording.
    Sagittal,
    /// Head-on recording.
    Frontal,
}

impl ViewType {
    /// Wire name for the multipart form field.
    pub fn as_str(self) -> &'static str {
        match self {
            ViewType::Sagittal => "sagittal",
            ViewType::Frontal => "frontal",
        }
    }
}

/// Target audience of a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportAudience {
    Clinician,
    Patient,
}

impl ReportAudience {
    /// Value of the `audience` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            ReportAudience::Clinician => "clinician",
            ReportAudience::Patient => "patient",
        }
    }
}
