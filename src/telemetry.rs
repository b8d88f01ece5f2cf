//! Error telemetry reporting.
//!
//! Every error is handed to an [`ErrorReporter`] before it is turned into a
//! caller-visible response (or swallowed by a best-effort sweep). The
//! production reporter writes structured log events; tests swap in a
//! recording implementation.

use crate::error::AppError;

/// Capability interface for reporting errors to external telemetry.
///
/// Injected into the components that must never suppress an error without
/// reporting it: the issue handler and the expiry reaper.
pub trait ErrorReporter: Send + Sync {
    /// Report one error with a short human-readable context string.
    fn report(&self, context: &str, error: &AppError);
}

/// Reporter backed by the tracing subscriber.
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, context: &str, error: &AppError) {
        tracing::error!(context, %error, "error reported");
    }
}
