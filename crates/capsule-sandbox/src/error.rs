//! Error types for sandboxed execution.

use std::time::Duration;

/// Errors raised while loading an executable unit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The unit is not valid script.
    #[error("{0}")]
    Compile(String),

    /// Top-level execution threw, including unresolved dependencies.
    #[error("{0}")]
    Thrown(String),

    #[error("No default export found in the generated code.")]
    MissingExport,

    #[error("Execution timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Execution was stopped on reaching the isolate heap limit.
    #[error("Heap limit of {0} bytes exceeded")]
    HeapLimit(usize),
}

/// Errors raised while rendering a loaded component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("{0}")]
    Thrown(String),

    #[error("Render timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Heap limit of {0} bytes exceeded during render")]
    HeapLimit(usize),
}

/// Errors raised while creating a sandbox.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("V8 platform error: {0}")]
    Platform(String),

    #[error("Failed to bootstrap module '{module}': {message}")]
    Bootstrap { module: String, message: String },
}

impl SandboxError {
    pub(crate) fn bootstrap(module: &str, message: impl Into<String>) -> Self {
        Self::Bootstrap {
            module: module.to_string(),
            message: message.into(),
        }
    }
}
