//! Progress-callback trait for per-record render events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::ReportConfigBuilder::progress_callback`] to follow a
//! batch as the renderer works through it.
//!
//! # Example
//!
//! ```rust
//! use report_pdf::{RenderProgressCallback, ReportConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl RenderProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, position: usize, total: usize, pdf_len: usize) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("document {}/{} done ({} bytes)", position, total, pdf_len);
//!     }
//! }
//!
//! let config = ReportConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { rendered: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::host::RecordId;
use std::sync::Arc;

/// Called by the renderer as it processes a batch of records.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. With `render_concurrency > 1` the per-document
/// methods may be called from different threads.
pub trait RenderProgressCallback: Send + Sync {
    /// Called once the renderer knows how many documents it will render.
    fn on_batch_start(&self, documents: usize) {
        let _ = documents;
    }

    /// Called when a stored attachment is served instead of rendering.
    fn on_record_reused(&self, id: RecordId) {
        let _ = id;
    }

    /// Called just before a document is handed to the engine.
    ///
    /// `position` is 1-indexed.
    fn on_document_start(&self, position: usize, total: usize) {
        let _ = (position, total);
    }

    /// Called when the engine produced a document.
    fn on_document_complete(&self, position: usize, total: usize, pdf_len: usize) {
        let _ = (position, total, pdf_len);
    }

    /// Called when the engine failed on a document. The batch is aborted.
    fn on_document_error(&self, position: usize, total: usize, error: &str) {
        let _ = (position, total, error);
    }

    /// Called once after every document has been rendered.
    fn on_batch_complete(&self, documents: usize, merged: bool) {
        let _ = (documents, merged);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReportConfig`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;
