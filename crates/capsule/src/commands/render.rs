//! One-shot render command.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use capsule_preview::{render_once, ErrorInfo, PipelineError, PreviewStatus};
use capsule_transform::SourceUnit;

use crate::config::ConfigFile;

/// Outcome printed with `--json`.
#[derive(Debug, Serialize)]
struct RenderReport {
    status: PreviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

impl RenderReport {
    fn new(outcome: &Result<String, PipelineError>) -> Self {
        match outcome {
            Ok(html) => Self {
                status: PreviewStatus::Ready,
                html: Some(html.clone()),
                error: None,
            },
            Err(err) => Self {
                status: match err {
                    PipelineError::RuntimeRender(_) => PreviewStatus::RuntimeError,
                    _ => PreviewStatus::PreviewError,
                },
                html: None,
                error: Some(ErrorInfo {
                    kind: err.kind(),
                    message: err.message().to_string(),
                }),
            },
        }
    }
}

/// Run the render command. Returns whether the component mounted.
pub fn run(config: &ConfigFile, file: &Path, json: bool) -> Result<bool> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let source = SourceUnit::normalize(&raw);

    let outcome = {
        let mut pipeline = config.pipeline().map_err(anyhow::Error::msg)?;
        render_once(&mut pipeline, &source)
    };

    if json {
        let report = RenderReport::new(&outcome);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &outcome {
            Ok(html) => println!("{}", html),
            Err(err) => eprintln!("{}: {}", err.kind().title(), err.message()),
        }
    }

    Ok(outcome.is_ok())
}
