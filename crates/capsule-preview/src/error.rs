//! The preview error taxonomy.

use capsule_sandbox::{LoadError, RenderError};
use capsule_transform::TransformError;
use serde::{Deserialize, Serialize};

/// Which stage of the pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transform,
    Load,
    MissingExport,
    RuntimeRender,
}

impl ErrorKind {
    /// Heading of the panel that displays this kind of error.
    pub fn title(self) -> &'static str {
        match self {
            ErrorKind::RuntimeRender => "Runtime Error",
            _ => "Preview Error",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transform => "transform",
            ErrorKind::Load => "load",
            ErrorKind::MissingExport => "missing_export",
            ErrorKind::RuntimeRender => "runtime_render",
        }
    }
}

/// A failure anywhere between receiving source and showing its view.
///
/// The message is always displayed verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Transform(String),

    #[error("{0}")]
    Load(String),

    #[error("{0}")]
    MissingExport(String),

    #[error("{0}")]
    RuntimeRender(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Transform(_) => ErrorKind::Transform,
            PipelineError::Load(_) => ErrorKind::Load,
            PipelineError::MissingExport(_) => ErrorKind::MissingExport,
            PipelineError::RuntimeRender(_) => ErrorKind::RuntimeRender,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PipelineError::Transform(message)
            | PipelineError::Load(message)
            | PipelineError::MissingExport(message)
            | PipelineError::RuntimeRender(message) => message,
        }
    }
}

impl From<TransformError> for PipelineError {
    fn from(err: TransformError) -> Self {
        PipelineError::Transform(err.to_string())
    }
}

impl From<LoadError> for PipelineError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::MissingExport => PipelineError::MissingExport(err.to_string()),
            other => PipelineError::Load(other.to_string()),
        }
    }
}

impl From<RenderError> for PipelineError {
    fn from(err: RenderError) -> Self {
        PipelineError::RuntimeRender(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn converts_stage_errors() {
        let err = PipelineError::from(TransformError::EngineUnavailable);
        assert_eq!(err.kind(), ErrorKind::Transform);
        assert_eq!(err.message(), "Transform engine is not loaded");

        let err = PipelineError::from(LoadError::MissingExport);
        assert_eq!(err.kind(), ErrorKind::MissingExport);
        assert!(err.message().contains("No default export found"));

        let err = PipelineError::from(LoadError::Timeout(Duration::from_secs(2)));
        assert_eq!(err.kind(), ErrorKind::Load);

        let err = PipelineError::from(RenderError::Thrown("x is undefined".into()));
        assert_eq!(err, PipelineError::RuntimeRender("x is undefined".into()));
    }

    #[test]
    fn panel_titles() {
        assert_eq!(ErrorKind::Load.title(), "Preview Error");
        assert_eq!(ErrorKind::MissingExport.title(), "Preview Error");
        assert_eq!(ErrorKind::RuntimeRender.title(), "Runtime Error");
    }

    #[test]
    fn kinds_serialize_in_snake_case() {
        let json = serde_json::to_string(&ErrorKind::MissingExport).unwrap();

        assert_eq!(json, "\"missing_export\"");
        assert_eq!(ErrorKind::MissingExport.as_str(), "missing_export");
    }
}
