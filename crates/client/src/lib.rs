//! HTTP client for the gait-analysis backend.
//!
//! Provides base-URL resolution, a typed REST wrapper around the
//! backend's analysis API, a progress-tracking multipart upload, and
//! the upload/poll controller that owns the lifecycle of a submitted
//! walking video. Lifecycle changes are broadcast as
//! [`events::AnalysisEvent`]s for a rendering layer to consume.

pub mod api;
pub mod config;
pub mod controller;
pub mod endpoint;
pub mod events;
pub mod poll;

mod upload;
