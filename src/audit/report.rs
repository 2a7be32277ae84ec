//! Reporting channel for logging failures
//!
//! Sink failures never replace the result of the business write. They are
//! handed to an `ErrorReporter` so operators still see audit outages.

use std::sync::Mutex;

use crate::error::OplogError;
use crate::models::TargetRef;

/// Receives failures that happened after the business write succeeded
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &OplogError, target: &TargetRef);
}

/// Logs failures at error level through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &OplogError, target: &TargetRef) {
        tracing::error!(
            model = %target.model,
            object_id = %target.object_id,
            error = %error,
            "operation log not recorded"
        );
    }
}

/// Keeps failure messages for the host to inspect
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages in arrival order
    pub fn reports(&self) -> Vec<String> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, error: &OplogError, target: &TargetRef) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(format!("{} {}: {}", target.model, target.object_id, error));
        }
    }
}
