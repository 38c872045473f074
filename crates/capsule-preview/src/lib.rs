//! Live preview of generated components.
//!
//! The [`RenderHost`] state machine drives one source unit at a time through
//! a [`Pipeline`] (transform, then load) and mounts the result inside a
//! [`CrashBoundary`]. [`PreviewWorker`] runs that loop on a dedicated thread
//! and [`DevServer`] pushes every resulting view to browsers.

pub mod boundary;
pub mod error;
pub mod host;
pub mod hub;
pub mod panel;
pub mod pipeline;
pub mod server;
pub mod watcher;
pub mod worker;

pub use boundary::{BoundaryState, CrashBoundary};
pub use error::{ErrorKind, PipelineError};
pub use host::{PreviewState, PreviewView, RenderHost, Ticket};
pub use hub::{preview_client_script, ErrorInfo, PreviewHub, PreviewMessage, PreviewSnapshot, PreviewStatus};
pub use panel::{PageContext, Templates};
pub use pipeline::{render_once, Pipeline, SandboxPipeline};
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
pub use worker::{PreviewHandle, PreviewWorker, WorkerError};
