//! Command-line driver for the gait-analysis client.
//!
//! Stands in for the product's rendering layer: submits one walking
//! video, subscribes to lifecycle events, and renders them as log
//! lines. Exits non-zero if the analysis does not complete.

use std::path::PathBuf;

use anyhow::{bail, Context};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gaitview_client::config::ClientConfig;
use gaitview_client::controller::AnalysisController;
use gaitview_client::events::AnalysisEvent;
use gaitview_core::types::{JobStatus, ReportAudience, ViewType, PIPELINE_STEP_COUNT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gaitview_app=info,gaitview_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(
        args.next()
            .context("usage: gaitview <video-file> [sagittal|frontal]")?,
    );
    let view = match args.next().as_deref() {
        None | Some("sagittal") => ViewType::Sagittal,
        Some("frontal") => ViewType::Frontal,
        Some(other) => bail!("unknown view type {other:?}; expected sagittal or frontal"),
    };

    let config = ClientConfig::from_env();
    tracing::info!(base_url = %config.base_url, "Using backend");

    let controller = AnalysisController::new(config);
    let mut events = controller.subscribe();

    let renderer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let terminal = matches!(
                        event,
                        AnalysisEvent::Completed { .. } | AnalysisEvent::Failed { .. }
                    );
                    render(&event);
                    if terminal {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let status = controller.submit(&path, view).await?;
    let _ = renderer.await;

    if status != JobStatus::Completed {
        let job = controller.job().await;
        bail!(
            "analysis failed: {}",
            job.error.unwrap_or_else(|| "unknown error".into())
        );
    }

    let job = controller.job().await;
    if let Some(metrics) = &job.metrics {
        tracing::info!(metrics = %metrics, "Biomechanical metrics");
    }
    if let Some(id) = &job.id {
        match controller.api().get_report(id, ReportAudience::Clinician).await {
            Ok(report) => tracing::info!(%report, "Clinician report"),
            Err(e) => tracing::warn!(error = %e, "Report not available yet"),
        }
    }
    Ok(())
}

fn render(event: &AnalysisEvent) {
    match event {
        AnalysisEvent::UploadProgress { percent } => {
            tracing::info!(percent, "Uploading");
        }
        AnalysisEvent::UploadStalled { stalled_for_secs } => {
            tracing::warn!(stalled_for_secs, "Upload appears stuck; still waiting");
        }
        AnalysisEvent::StepProgress {
            step,
            percent,
            message,
        } => {
            tracing::info!(
                step = step.label(),
                step_number = step.step_number(),
                step_count = PIPELINE_STEP_COUNT,
                percent,
                message = message.as_deref().unwrap_or(""),
                "Processing",
            );
        }
        AnalysisEvent::Completed { analysis_id, .. } => {
            tracing::info!(%analysis_id, "Analysis complete");
        }
        AnalysisEvent::Failed { error } => {
            tracing::error!(%error, "Analysis failed");
        }
    }
}
