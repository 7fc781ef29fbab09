//! Progress-callback trait for per-unit pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::Processor::with_progress`] to receive events as each code group
//! and each page completes. The CLI drives its progress bar from it.
//!
//! Units finish out of order (the pools run them concurrently), so `index`
//! identifies the unit by submission position, not by completion count.

use crate::error::Stage;
use std::sync::Arc;

/// Called by the pipeline as it processes each unit of work.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Methods may be called from the collecting task while
/// other units are still running; implementations must synchronise any
/// shared mutable state.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once when a stage starts, with the number of units it will run.
    fn on_stage_start(&self, stage: Stage, total: usize) {
        let _ = (stage, total);
    }

    /// Called when one unit finishes successfully.
    fn on_unit_complete(&self, stage: Stage, index: usize, total: usize) {
        let _ = (stage, index, total);
    }

    /// Called when one unit fails; the unit is dropped from the results.
    fn on_unit_error(&self, stage: Stage, index: usize, total: usize, error: &str) {
        let _ = (stage, index, total, error);
    }

    /// Called once after the stage has collected its results.
    fn on_stage_complete(&self, stage: Stage, total: usize, success_count: usize) {
        let _ = (stage, total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type stored by [`crate::Processor`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
