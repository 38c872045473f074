//! Containment of failures raised while mounting a loaded component.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::host::PreviewView;

/// Whether the boundary has caught a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryState {
    Clean,
    Tripped(String),
}

/// Wraps every mount of one component generation.
///
/// The first failure trips the boundary for good; only a fresh boundary
/// (created for the next generation) starts clean again.
#[derive(Debug, Clone)]
pub struct CrashBoundary {
    state: BoundaryState,
    markup: Option<String>,
}

impl CrashBoundary {
    pub fn new() -> Self {
        Self {
            state: BoundaryState::Clean,
            markup: None,
        }
    }

    pub fn state(&self) -> &BoundaryState {
        &self.state
    }

    pub fn is_tripped(&self) -> bool {
        matches!(self.state, BoundaryState::Tripped(_))
    }

    /// Markup of the last successful mount.
    pub fn markup(&self) -> Option<&str> {
        self.markup.as_deref()
    }

    /// Run one mount or update. A tripped boundary does not call `render`.
    pub fn mount<F>(&mut self, render: F) -> &BoundaryState
    where
        F: FnOnce() -> Result<String, String>,
    {
        if self.is_tripped() {
            return &self.state;
        }

        match panic::catch_unwind(AssertUnwindSafe(render)) {
            Ok(Ok(markup)) => self.markup = Some(markup),
            Ok(Err(message)) => self.trip(message),
            Err(payload) => self.trip(panic_message(payload.as_ref())),
        }

        &self.state
    }

    /// What this boundary shows right now.
    pub fn view(&self) -> PreviewView {
        match (&self.state, &self.markup) {
            (BoundaryState::Tripped(message), _) => PreviewView::RuntimeError(message.clone()),
            (BoundaryState::Clean, Some(markup)) => PreviewView::Mounted(markup.clone()),
            (BoundaryState::Clean, None) => PreviewView::Loading,
        }
    }

    fn trip(&mut self, message: String) {
        tracing::warn!("Crash boundary tripped: {}", message);
        self.markup = None;
        self.state = BoundaryState::Tripped(message);
    }
}

impl Default for CrashBoundary {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Render panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn successful_mount_shows_markup() {
        let mut boundary = CrashBoundary::new();
        assert_eq!(boundary.view(), PreviewView::Loading);

        boundary.mount(|| Ok("<p>hi</p>".to_string()));

        assert_eq!(boundary.state(), &BoundaryState::Clean);
        assert_eq!(boundary.view(), PreviewView::Mounted("<p>hi</p>".to_string()));
    }

    #[test]
    fn failure_trips_once_and_stays_tripped() {
        let mut boundary = CrashBoundary::new();
        let calls = Cell::new(0);

        boundary.mount(|| {
            calls.set(calls.get() + 1);
            Err("Cannot read properties of undefined (reading 'name')".to_string())
        });
        boundary.mount(|| {
            calls.set(calls.get() + 1);
            Ok("<p>recovered</p>".to_string())
        });

        assert_eq!(calls.get(), 1);
        assert_eq!(
            boundary.view(),
            PreviewView::RuntimeError("Cannot read properties of undefined (reading 'name')".into())
        );
    }

    #[test]
    fn update_failure_replaces_previous_markup() {
        let mut boundary = CrashBoundary::new();

        boundary.mount(|| Ok("<p>first</p>".to_string()));
        boundary.mount(|| Err("boom".to_string()));

        assert!(boundary.is_tripped());
        assert!(boundary.markup().is_none());
    }

    #[test]
    fn panics_are_contained() {
        let mut boundary = CrashBoundary::new();

        boundary.mount(|| panic!("renderer bug"));

        assert_eq!(boundary.state(), &BoundaryState::Tripped("renderer bug".into()));
    }
}
