//! The transform and load stages behind the render host.

use capsule_sandbox::{Component, Sandbox, SandboxConfig, SandboxError};
use capsule_transform::{OxcEngine, SourceUnit, Transformer};

use crate::error::PipelineError;
use crate::host::{PreviewView, RenderHost, Ticket};

/// Produces a mountable value from source and renders it.
pub trait Pipeline {
    /// What a successful load yields.
    type Value;

    /// Transform and load one source unit.
    fn load(&mut self, source: &SourceUnit) -> Result<Self::Value, PipelineError>;

    /// Render a loaded value to markup. Errors end up in the crash boundary.
    fn mount(&mut self, value: &Self::Value) -> Result<String, String>;
}

/// Pipeline backed by a [`Transformer`] and a V8 [`Sandbox`].
#[derive(Debug)]
pub struct SandboxPipeline {
    transformer: Transformer,
    sandbox: Sandbox,
}

impl SandboxPipeline {
    pub fn new(transformer: Transformer, sandbox: Sandbox) -> Self {
        Self {
            transformer,
            sandbox,
        }
    }

    /// Pipeline with the oxc engine attached and a fresh sandbox.
    pub fn with_config(config: SandboxConfig) -> Result<Self, SandboxError> {
        let sandbox = Sandbox::new(config)?;
        Ok(Self::new(Transformer::new(OxcEngine::new()), sandbox))
    }
}

impl Pipeline for SandboxPipeline {
    type Value = Component;

    fn load(&mut self, source: &SourceUnit) -> Result<Component, PipelineError> {
        let unit = self.transformer.transform(source)?;
        tracing::trace!("Executable unit:\n{}", unit);

        let component = self.sandbox.load(&unit)?;
        tracing::debug!(
            "Loaded component {}",
            component.name().unwrap_or("(anonymous)")
        );
        Ok(component)
    }

    fn mount(&mut self, component: &Component) -> Result<String, String> {
        self.sandbox.render(component).map_err(|err| err.to_string())
    }
}

/// Drive one source unit through a fresh render host and return its markup.
pub fn render_once<P: Pipeline>(
    pipeline: &mut P,
    source: &SourceUnit,
) -> Result<String, PipelineError> {
    let mut host = RenderHost::new();
    let ticket = Ticket(1);

    host.begin(ticket);
    host.complete(ticket, pipeline.load(source));

    match host.mount(|value| pipeline.mount(value)) {
        PreviewView::Mounted(html) => Ok(html),
        PreviewView::PreviewError(err) => Err(err),
        PreviewView::RuntimeError(message) => Err(PipelineError::RuntimeRender(message)),
        PreviewView::Empty | PreviewView::Loading => Err(PipelineError::RuntimeRender(
            "Failed to render component".to_string(),
        )),
    }
}
