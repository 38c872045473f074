//! Dedicated thread that runs the pipeline.
//!
//! A V8 isolate cannot move between threads, so the pipeline is built and
//! used on one thread for its whole life. Callers talk to it through a
//! cloneable [`PreviewHandle`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use capsule_transform::SourceUnit;

use crate::host::{PreviewView, RenderHost, Ticket};
use crate::hub::{PreviewHub, PreviewSnapshot};
use crate::panel::Templates;
use crate::pipeline::Pipeline;

/// Errors starting the worker.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Failed to spawn preview worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Failed to initialize preview pipeline: {0}")]
    Init(String),
}

struct Job {
    ticket: Ticket,
    source: SourceUnit,
}

enum Command {
    Render(Job),
    Shutdown,
}

#[derive(Default)]
struct Submissions {
    ticket: Ticket,
    last: Option<SourceUnit>,
}

/// Submits source to a running [`PreviewWorker`].
#[derive(Clone)]
pub struct PreviewHandle {
    commands: mpsc::Sender<Command>,
    submissions: Arc<Mutex<Submissions>>,
    latest: Arc<AtomicU64>,
}

impl PreviewHandle {
    /// Queue raw source for rendering.
    ///
    /// Returns the ticket of the new generation, or `None` when the source
    /// is empty, identical to the previous submission, or the worker is gone.
    pub fn submit(&self, raw: &str) -> Option<Ticket> {
        let source = SourceUnit::normalize(raw);
        if source.is_empty() {
            tracing::debug!("Ignoring empty source");
            return None;
        }

        let mut submissions = self
            .submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if submissions.last.as_ref() == Some(&source) {
            tracing::debug!("Source unchanged, skipping");
            return None;
        }

        let ticket = submissions.ticket.next();
        submissions.ticket = ticket;
        submissions.last = Some(source.clone());
        self.latest.store(ticket.get(), Ordering::SeqCst);

        match self.commands.send(Command::Render(Job { ticket, source })) {
            Ok(()) => Some(ticket),
            Err(_) => {
                tracing::warn!("Preview worker has stopped");
                None
            }
        }
    }

    /// Newest ticket handed out.
    pub fn latest(&self) -> Ticket {
        Ticket(self.latest.load(Ordering::SeqCst))
    }
}

/// Owns the worker thread. Dropping it stops the thread.
pub struct PreviewWorker {
    handle: PreviewHandle,
    thread: Option<JoinHandle<()>>,
}

impl PreviewWorker {
    /// Start the worker, building the pipeline on the new thread.
    ///
    /// Returns once the pipeline is ready, or with the factory's error.
    pub fn spawn<P, F>(factory: F, hub: PreviewHub) -> Result<Self, WorkerError>
    where
        P: Pipeline + 'static,
        F: FnOnce() -> Result<P, String> + Send + 'static,
    {
        let (commands, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let latest = Arc::new(AtomicU64::new(0));
        let worker_latest = Arc::clone(&latest);

        let thread = std::thread::Builder::new()
            .name("capsule-preview".to_string())
            .spawn(move || {
                let pipeline = match factory() {
                    Ok(pipeline) => {
                        let _ = ready_tx.send(Ok(()));
                        pipeline
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                run(pipeline, receiver, hub, worker_latest);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(message)) => {
                let _ = thread.join();
                return Err(WorkerError::Init(message));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(WorkerError::Init("worker exited during startup".to_string()));
            }
        }

        tracing::debug!("Preview worker started");

        Ok(Self {
            handle: PreviewHandle {
                commands,
                submissions: Arc::new(Mutex::new(Submissions::default())),
                latest,
            },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> PreviewHandle {
        self.handle.clone()
    }
}

impl Drop for PreviewWorker {
    fn drop(&mut self) {
        let _ = self.handle.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run<P: Pipeline>(
    mut pipeline: P,
    receiver: mpsc::Receiver<Command>,
    hub: PreviewHub,
    latest: Arc<AtomicU64>,
) {
    let templates = Templates::new();
    let mut host = RenderHost::new();

    while let Ok(command) = receiver.recv() {
        let mut job = match command {
            Command::Render(job) => job,
            Command::Shutdown => break,
        };

        // Only the newest queued job is worth running
        let mut shutdown = false;
        while let Ok(command) = receiver.try_recv() {
            match command {
                Command::Render(next) if next.ticket > job.ticket => job = next,
                Command::Render(_) => {}
                Command::Shutdown => {
                    shutdown = true;
                    break;
                }
            }
        }
        if shutdown {
            break;
        }

        process(&mut pipeline, &mut host, &templates, &hub, &latest, job);
    }

    tracing::debug!("Preview worker stopped");
}

fn process<P: Pipeline>(
    pipeline: &mut P,
    host: &mut RenderHost<P::Value>,
    templates: &Templates,
    hub: &PreviewHub,
    latest: &AtomicU64,
    job: Job,
) {
    let Job { ticket, source } = job;
    if !host.begin(ticket) {
        return;
    }
    publish(templates, hub, ticket, &host.view(), &source);

    let outcome = pipeline.load(&source);

    if latest.load(Ordering::SeqCst) > ticket.get() {
        tracing::debug!("Generation {} superseded during load", ticket);
        return;
    }
    if !host.complete(ticket, outcome) {
        return;
    }

    let view = host.mount(|value| pipeline.mount(value));
    publish(templates, hub, ticket, &view, &source);
}

fn publish(
    templates: &Templates,
    hub: &PreviewHub,
    ticket: Ticket,
    view: &PreviewView,
    source: &SourceUnit,
) {
    match PreviewSnapshot::from_view(templates, ticket, view, source.as_str()) {
        Ok(snapshot) => {
            hub.publish(snapshot);
        }
        Err(e) => tracing::error!("Failed to render preview panel: {}", e),
    }
}
