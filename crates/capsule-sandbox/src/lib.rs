//! Isolated execution of transformed component code.
//!
//! A [`Sandbox`] owns one V8 isolate with a fixed dependency registry
//! (`react`, `framer-motion`, `lucide-react`) and a static markup renderer.
//! Executable units are loaded with exactly three bindings in scope and their
//! default export is rendered to HTML.

pub mod console;
pub mod error;
pub mod platform;
pub mod registry;
pub mod sandbox;
mod watchdog;

pub use error::{LoadError, RenderError, SandboxError};
pub use platform::{initialize_platform, is_platform_initialized};
pub use registry::DependencyRegistry;
pub use sandbox::{Component, Sandbox, SandboxConfig};
