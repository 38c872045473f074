//! The render host state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::boundary::CrashBoundary;
use crate::error::PipelineError;

/// Generation id. Later submissions always get larger tickets.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ticket(pub u64);

impl Ticket {
    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Ticket(self.0 + 1)
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the host is for the current generation.
#[derive(Debug)]
pub enum PreviewState<V> {
    Empty,
    Pending(Ticket),
    Ready {
        ticket: Ticket,
        value: V,
        boundary: CrashBoundary,
    },
    Failed {
        ticket: Ticket,
        error: PipelineError,
    },
}

impl<V> PreviewState<V> {
    pub fn ticket(&self) -> Option<Ticket> {
        match self {
            PreviewState::Empty => None,
            PreviewState::Pending(ticket)
            | PreviewState::Ready { ticket, .. }
            | PreviewState::Failed { ticket, .. } => Some(*ticket),
        }
    }
}

/// What the display region shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewView {
    /// Nothing submitted yet
    Empty,
    /// Loading indicator
    Loading,
    /// Live markup of the mounted component
    Mounted(String),
    /// Transform, load or missing-export failure
    PreviewError(PipelineError),
    /// Failure captured by the crash boundary
    RuntimeError(String),
}

/// Owns the state of the preview and enforces latest-wins ordering.
#[derive(Debug)]
pub struct RenderHost<V> {
    state: PreviewState<V>,
    latest: Ticket,
}

impl<V> RenderHost<V> {
    pub fn new() -> Self {
        Self {
            state: PreviewState::Empty,
            latest: Ticket::default(),
        }
    }

    pub fn state(&self) -> &PreviewState<V> {
        &self.state
    }

    /// Newest ticket the host has started.
    pub fn latest(&self) -> Ticket {
        self.latest
    }

    /// Start a generation, dropping whatever was shown before.
    ///
    /// Returns `false` (and changes nothing) for a ticket older than one
    /// already started.
    pub fn begin(&mut self, ticket: Ticket) -> bool {
        if ticket < self.latest {
            tracing::debug!("Ignoring stale generation {} (latest {})", ticket, self.latest);
            return false;
        }

        self.latest = ticket;
        self.state = PreviewState::Pending(ticket);
        true
    }

    /// Apply the pipeline outcome for `ticket`.
    ///
    /// Results for anything but the pending generation are discarded and
    /// `false` is returned.
    pub fn complete(&mut self, ticket: Ticket, outcome: Result<V, PipelineError>) -> bool {
        match self.state {
            PreviewState::Pending(pending) if pending == ticket => {}
            _ => {
                tracing::debug!("Discarding superseded result for generation {}", ticket);
                return false;
            }
        }

        self.state = match outcome {
            Ok(value) => PreviewState::Ready {
                ticket,
                value,
                boundary: CrashBoundary::new(),
            },
            Err(error) => {
                tracing::info!("Generation {} failed: {}", ticket, error);
                PreviewState::Failed { ticket, error }
            }
        };
        true
    }

    /// Mount (or update) the ready value inside its crash boundary.
    pub fn mount<F>(&mut self, render: F) -> PreviewView
    where
        F: FnOnce(&V) -> Result<String, String>,
    {
        if let PreviewState::Ready {
            value, boundary, ..
        } = &mut self.state
        {
            let value = &*value;
            boundary.mount(|| render(value));
        }

        self.view()
    }

    pub fn view(&self) -> PreviewView {
        match &self.state {
            PreviewState::Empty => PreviewView::Empty,
            PreviewState::Pending(_) => PreviewView::Loading,
            PreviewState::Ready { boundary, .. } => boundary.view(),
            PreviewState::Failed { error, .. } => PreviewView::PreviewError(error.clone()),
        }
    }
}

impl<V> Default for RenderHost<V> {
    fn default() -> Self {
        Self::new()
    }
}
