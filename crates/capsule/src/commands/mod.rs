//! CLI command implementations.

pub mod dev;
pub mod export;
pub mod init;
pub mod render;
pub mod transform;
