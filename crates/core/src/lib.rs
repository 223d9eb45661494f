//! Shared domain types for the gait-analysis client.
//!
//! Defines the pipeline step and status enums, the [`AnalysisJob`]
//! lifecycle record, and its transition rules. No I/O lives here.
//!
//! [`AnalysisJob`]: job::AnalysisJob

pub mod job;
pub mod types;
