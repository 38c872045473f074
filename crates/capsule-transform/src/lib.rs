//! TSX to executable script transformation.
//!
//! This crate turns one generated, typed, JSX-flavored component program into a
//! plain script body that can be executed with exactly three bindings in scope:
//! `React`, `require` and `exports`.

pub mod module;
pub mod oxc;
pub mod source;
pub mod traits;
pub mod transformer;

pub use module::lower_modules;
pub use oxc::OxcEngine;
pub use source::{ExecutableUnit, SourceUnit};
pub use traits::{TransformContext, TransformEngine, TransformError};
pub use transformer::Transformer;
