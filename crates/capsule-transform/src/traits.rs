//! Trait definitions for transformation engines.

use crate::source::ExecutableUnit;

/// Context for transforming a source unit.
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Virtual filename reported in diagnostics
    pub filename: String,

    /// Factory used for JSX elements
    pub pragma: String,

    /// Component used for JSX fragments
    pub pragma_frag: String,
}

impl Default for TransformContext {
    fn default() -> Self {
        Self {
            filename: "generated.tsx".to_string(),
            pragma: "React.createElement".to_string(),
            pragma_frag: "React.Fragment".to_string(),
        }
    }
}

/// Errors that can occur during transformation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("Transform engine is not loaded")]
    EngineUnavailable,

    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Transform(String),

    #[error("Module lowering failed: {0}")]
    Module(String),
}

/// A transformation engine turning typed component source into an executable unit.
pub trait TransformEngine: Send + Sync {
    /// Engine identifier (e.g., "oxc")
    fn name(&self) -> &'static str;

    /// Whether the engine can accept work.
    fn is_ready(&self) -> bool {
        true
    }

    /// Transform one complete source program.
    ///
    /// # Arguments
    /// * `source` - The typed, JSX-flavored program text
    /// * `ctx` - Filename and JSX pragma settings
    fn transform(
        &self,
        source: &str,
        ctx: &TransformContext,
    ) -> Result<ExecutableUnit, TransformError>;
}
