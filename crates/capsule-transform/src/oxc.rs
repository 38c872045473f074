//! Transformation engine backed by the oxc toolchain.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{HelperLoaderMode, JsxOptions, JsxRuntime, TransformOptions, Transformer};

use crate::module::lower_modules;
use crate::source::ExecutableUnit;
use crate::traits::{TransformContext, TransformEngine, TransformError};

/// TSX engine: type erasure, classic JSX, then module lowering.
#[derive(Debug, Default)]
pub struct OxcEngine;

impl OxcEngine {
    /// Create a new oxc engine.
    pub fn new() -> Self {
        Self
    }

    fn options(ctx: &TransformContext) -> TransformOptions {
        let mut options = TransformOptions {
            jsx: JsxOptions {
                runtime: JsxRuntime::Classic,
                pragma: Some(ctx.pragma.clone()),
                pragma_frag: Some(ctx.pragma_frag.clone()),
                use_spread: Some(true),
                ..JsxOptions::default()
            },
            ..TransformOptions::default()
        };

        // Helpers must never turn into imports the registry cannot resolve.
        options.helper_loader.mode = HelperLoaderMode::External;
        options
    }
}

impl TransformEngine for OxcEngine {
    fn name(&self) -> &'static str {
        "oxc"
    }

    fn transform(
        &self,
        source: &str,
        ctx: &TransformContext,
    ) -> Result<ExecutableUnit, TransformError> {
        let allocator = Allocator::default();
        let path = Path::new(&ctx.filename);

        let parsed = Parser::new(&allocator, source, SourceType::tsx()).parse();
        if !parsed.errors.is_empty() {
            return Err(TransformError::Parse(join_diagnostics(
                &ctx.filename,
                &parsed.errors,
            )));
        }

        let mut program = parsed.program;

        let semantic = SemanticBuilder::new()
            .with_excess_capacity(2.0)
            .build(&program);
        if !semantic.errors.is_empty() {
            return Err(TransformError::Parse(join_diagnostics(
                &ctx.filename,
                &semantic.errors,
            )));
        }
        let scoping = semantic.semantic.into_scoping();

        let options = Self::options(ctx);
        let transformed = Transformer::new(&allocator, path, &options)
            .build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            return Err(TransformError::Transform(join_diagnostics(
                &ctx.filename,
                &transformed.errors,
            )));
        }

        let printed = Codegen::new().build(&program).code;
        let lowered = lower_modules(&printed)?;

        tracing::debug!(
            source_bytes = source.len(),
            output_bytes = lowered.len(),
            "Transformed {}",
            ctx.filename
        );

        Ok(ExecutableUnit::new(lowered))
    }
}

fn join_diagnostics<E: std::fmt::Display>(filename: &str, errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| format!("{filename}: {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}
