//! Run log: the two-method sink every stage reports user-facing messages to.
//!
//! Library internals still emit `tracing` events for diagnostics; the
//! [`Logger`] carries the messages a user should see (stage timings, files
//! written, per-unit failures). The default [`TracingLogger`] forwards them to
//! `tracing` so a plain CLI run needs nothing extra; a host application can
//! inject its own sink via [`crate::Processor::with_logger`].

use std::sync::{Arc, Mutex};

/// Sink for user-facing run messages.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards run messages to `tracing` at INFO / ERROR level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "sheet2qr::run", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "sheet2qr::run", "{message}");
    }
}

/// Severity of a [`MemoryLogger`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// Keeps every message in memory; useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of everything logged so far.
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Messages logged at [`Level::Error`].
    pub fn errors(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(level, _)| *level == Level::Error)
            .map(|(_, m)| m)
            .collect()
    }

    fn push(&self, level: Level, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}

impl Logger for MemoryLogger {
    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}
