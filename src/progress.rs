use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::operation::Operation;

/// Checkpoints reported while a route call runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The prerequisite closure of the requested operation was computed.
    ClosureResolved {
        session_id: String,
        requested: Operation,
        prerequisites: Vec<Operation>,
    },
    /// A prerequisite was skipped because its result is cached.
    OperationSkipped {
        session_id: String,
        operation: Operation,
    },
    OperationStarted {
        session_id: String,
        operation: Operation,
        prerequisite: bool,
    },
    OperationSucceeded {
        session_id: String,
        operation: Operation,
        elapsed: Duration,
    },
    OperationFailed {
        session_id: String,
        operation: Operation,
        error: String,
        elapsed: Duration,
    },
    /// Free-form progress emitted by a handler.
    Message {
        session_id: String,
        operation: Operation,
        message: String,
    },
}

/// Receives [`ProgressEvent`]s at defined checkpoints.
///
/// Reporting is synchronous and must not block: the router calls it
/// inline between operations.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Logs every checkpoint through `tracing`. The router's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::ClosureResolved {
                session_id,
                requested,
                prerequisites,
            } => debug!(
                session_id = %session_id,
                operation = %requested,
                prerequisites = ?prerequisites,
                "Resolved prerequisite closure"
            ),
            ProgressEvent::OperationSkipped {
                session_id,
                operation,
            } => debug!(session_id = %session_id, operation = %operation, "Using cached result"),
            ProgressEvent::OperationStarted {
                session_id,
                operation,
                prerequisite,
            } => debug!(
                session_id = %session_id,
                operation = %operation,
                prerequisite,
                "Operation started"
            ),
            ProgressEvent::OperationSucceeded {
                session_id,
                operation,
                elapsed,
            } => info!(
                session_id = %session_id,
                operation = %operation,
                elapsed_ms = elapsed.as_millis() as u64,
                "Operation completed successfully"
            ),
            ProgressEvent::OperationFailed {
                session_id,
                operation,
                error,
                elapsed,
            } => warn!(
                session_id = %session_id,
                operation = %operation,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %error,
                "Operation failed"
            ),
            ProgressEvent::Message {
                session_id,
                operation,
                message,
            } => info!(session_id = %session_id, operation = %operation, "{}", message),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Keeps every event in memory; handy for tests and for transports that
/// batch progress into their response.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Operations that reached `OperationStarted`, in order.
    pub fn started(&self) -> Vec<Operation> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::OperationStarted { operation, .. } => Some(operation),
                _ => None,
            })
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter_keeps_order() {
        let reporter = RecordingReporter::new();
        for operation in [Operation::Analyze, Operation::Build] {
            reporter.report(&ProgressEvent::OperationStarted {
                session_id: "s".to_string(),
                operation,
                prerequisite: false,
            });
        }
        reporter.report(&ProgressEvent::OperationSkipped {
            session_id: "s".to_string(),
            operation: Operation::Tag,
        });

        assert_eq!(reporter.started(), vec![Operation::Analyze, Operation::Build]);
        assert_eq!(reporter.events().len(), 3);
    }

    #[test]
    fn test_tracing_reporter_accepts_every_event() {
        let reporter = TracingReporter;
        reporter.report(&ProgressEvent::OperationFailed {
            session_id: "s".to_string(),
            operation: Operation::Push,
            error: "denied".to_string(),
            elapsed: Duration::from_millis(3),
        });
        reporter.report(&ProgressEvent::Message {
            session_id: "s".to_string(),
            operation: Operation::Push,
            message: "uploading layers".to_string(),
        });
    }
}
