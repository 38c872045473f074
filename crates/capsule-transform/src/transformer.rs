//! Engine owner with readiness checks and single-entry memoization.

use crate::source::{ExecutableUnit, SourceUnit};
use crate::traits::{TransformContext, TransformEngine, TransformError};

/// Converts source units into executable units with an injected engine.
///
/// Only the most recent result is remembered, so re-submitting unchanged
/// source skips the engine entirely.
pub struct Transformer {
    engine: Option<Box<dyn TransformEngine>>,
    ctx: TransformContext,
    last: Option<(SourceUnit, Result<ExecutableUnit, TransformError>)>,
}

impl Transformer {
    /// Create a transformer backed by `engine`.
    pub fn new(engine: impl TransformEngine + 'static) -> Self {
        Self {
            engine: Some(Box::new(engine)),
            ctx: TransformContext::default(),
            last: None,
        }
    }

    /// Create a transformer with no engine attached yet.
    pub fn detached() -> Self {
        Self {
            engine: None,
            ctx: TransformContext::default(),
            last: None,
        }
    }

    /// Replace the transform context.
    pub fn with_context(mut self, ctx: TransformContext) -> Self {
        self.ctx = ctx;
        self.last = None;
        self
    }

    /// Attach (or swap) the engine. Clears the memoized result.
    pub fn attach(&mut self, engine: impl TransformEngine + 'static) {
        self.engine = Some(Box::new(engine));
        self.last = None;
    }

    /// Name of the attached engine, if any.
    pub fn engine_name(&self) -> Option<&'static str> {
        self.engine.as_ref().map(|e| e.name())
    }

    /// Transform a source unit.
    pub fn transform(&mut self, source: &SourceUnit) -> Result<ExecutableUnit, TransformError> {
        let engine = match &self.engine {
            Some(engine) if engine.is_ready() => engine,
            _ => return Err(TransformError::EngineUnavailable),
        };

        if let Some((cached_source, cached)) = &self.last {
            if cached_source == source {
                tracing::trace!("Reusing transform of unchanged source");
                return cached.clone();
            }
        }

        let result = engine.transform(source.as_str(), &self.ctx);
        self.last = Some((source.clone(), result.clone()));
        result
    }
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("engine", &self.engine_name())
            .field("ctx", &self.ctx)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct CountingEngine {
        calls: Arc<AtomicUsize>,
        offline: Arc<AtomicBool>,
    }

    impl TransformEngine for CountingEngine {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn is_ready(&self) -> bool {
            !self.offline.load(Ordering::SeqCst)
        }

        fn transform(
            &self,
            source: &str,
            _ctx: &TransformContext,
        ) -> Result<ExecutableUnit, TransformError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if source.contains("bad") {
                return Err(TransformError::Parse("bad source".to_string()));
            }
            Ok(ExecutableUnit::new(source.to_uppercase()))
        }
    }

    #[test]
    fn detached_transformer_reports_missing_engine() {
        let mut transformer = Transformer::detached();
        let err = transformer.transform(&SourceUnit::from("x")).unwrap_err();

        assert_eq!(err, TransformError::EngineUnavailable);
        assert_eq!(err.to_string(), "Transform engine is not loaded");
    }

    #[test]
    fn engine_that_is_not_ready_is_unavailable() {
        let engine = CountingEngine::default();
        engine.offline.store(true, Ordering::SeqCst);
        let mut transformer = Transformer::new(engine.clone());

        let err = transformer.transform(&SourceUnit::from("x")).unwrap_err();

        assert_eq!(err, TransformError::EngineUnavailable);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn memoizes_most_recent_source_only() {
        let engine = CountingEngine::default();
        let mut transformer = Transformer::new(engine.clone());
        let a = SourceUnit::from("a");
        let b = SourceUnit::from("b");

        transformer.transform(&a).unwrap();
        transformer.transform(&a).unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);

        transformer.transform(&b).unwrap();
        transformer.transform(&a).unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn memoized_failures_are_repeated() {
        let engine = CountingEngine::default();
        let mut transformer = Transformer::new(engine.clone());
        let bad = SourceUnit::from("bad");

        let first = transformer.transform(&bad).unwrap_err();
        let second = transformer.transform(&bad).unwrap_err();

        assert_eq!(first, second);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attach_brings_engine_online() {
        let mut transformer = Transformer::detached();
        assert!(transformer.engine_name().is_none());

        transformer.attach(CountingEngine::default());

        assert_eq!(transformer.engine_name(), Some("counting"));
        assert_eq!(
            transformer.transform(&SourceUnit::from("ok")).unwrap().as_str(),
            "OK"
        );
    }
}
