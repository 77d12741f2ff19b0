//! Operation observers.
//!
//! The database reports every operation to an [`OperationObserver`] after it
//! completes, with its wall time and how many tree nodes it allocated or
//! freed. Observers never influence the operation itself.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Kind of database operation being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Select,
    Update,
    Delete,
    Generate,
    Clear,
    Save,
}

impl OperationKind {
    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Select => "select",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Generate => "generate",
            Self::Clear => "clear",
            Self::Save => "save",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationEvent {
    pub kind: OperationKind,
    /// Time spent inside the operation.
    pub duration: Duration,
    /// Change in the number of tree nodes (splits add, merges remove).
    pub nodes_delta: isize,
    /// Whether the operation returned `Ok`.
    pub succeeded: bool,
}

/// Receives a callback after every database operation.
pub trait OperationObserver {
    fn on_operation(&mut self, event: &OperationEvent);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl OperationObserver for NoopObserver {
    fn on_operation(&mut self, _event: &OperationEvent) {}
}

/// Observer that logs each event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl OperationObserver for TracingObserver {
    fn on_operation(&mut self, event: &OperationEvent) {
        tracing::info!(
            operation = event.kind.as_str(),
            micros = event.duration.as_micros(),
            nodes_delta = event.nodes_delta,
            succeeded = event.succeeded,
            "operation complete"
        );
    }
}

/// Observer that keeps every event, shareable with the caller.
///
/// The database owns its observer, so tests hand it a clone of the `Rc` and
/// read the events back through the other handle.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Rc<RefCell<Vec<OperationEvent>>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far.
    #[must_use]
    #[allow(clippy::disallowed_methods)] // Events are copied out of the shared buffer
    pub fn events(&self) -> Vec<OperationEvent> {
        self.events.borrow().clone()
    }
}

impl OperationObserver for RecordingObserver {
    #[allow(clippy::disallowed_methods)]
    fn on_operation(&mut self, event: &OperationEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: OperationKind) -> OperationEvent {
        OperationEvent {
            kind,
            duration: Duration::from_micros(3),
            nodes_delta: 1,
            succeeded: true,
        }
    }

    #[test]
    fn test_recording_observer_shares_events() {
        let observer = RecordingObserver::new();
        let mut handle = observer.clone();

        handle.on_operation(&event(OperationKind::Insert));
        handle.on_operation(&event(OperationKind::Delete));

        let kinds: Vec<_> = observer.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![OperationKind::Insert, OperationKind::Delete]);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(OperationKind::Generate.to_string(), "generate");
        assert_eq!(OperationKind::Save.as_str(), "save");
    }
}
