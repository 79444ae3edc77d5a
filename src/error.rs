//! Error types for the report-pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ReportError`] — **Fatal**: the report cannot be produced at all
//!   (no rendering engine, template markers that cannot be attributed to
//!   records, a stream that is not a PDF). Returned as `Err(ReportError)`
//!   from [`crate::report::ReportRenderer`].
//!
//! * [`FetchError`] — **Non-fatal**: a single asset (image, font, stylesheet)
//!   could not be fetched. The fetcher logs it and hands the engine an empty
//!   placeholder, so one broken image never fails the whole render.

use thiserror::Error;

/// All fatal errors returned by the report-pdf library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Engine errors ─────────────────────────────────────────────────────
    /// No rendering engine is configured or the engine program is missing.
    #[error(
        "The PDF rendering engine is not available in this environment.\n\
Install it (e.g. `pip install plutoprint`) and restart the workers."
    )]
    EngineUnavailable,

    /// The engine ran but did not produce a PDF.
    #[error("Rendering engine '{engine}' failed: {detail}")]
    EngineFailed { engine: String, detail: String },

    // ── Template errors ───────────────────────────────────────────────────
    /// Per-record HTML fragments cannot be attributed to record ids.
    #[error(
        "Report template \u{201c}{report}\u{201d} has an issue.\n\n\
Cannot separate files to save as attachments because the template is missing \
data-oe-model / data-oe-id on <div class='article'>."
    )]
    MissingRecordMarkers { report: String },

    /// The report HTML could not be split into article bodies.
    #[error("Malformed report HTML: {0}")]
    MalformedTemplate(String),

    // ── PDF errors ────────────────────────────────────────────────────────
    /// One of the streams handed to the merger is not a readable PDF.
    #[error("Cannot merge stream #{index}: {detail}")]
    PdfMerge { index: usize, detail: String },

    /// The merger was called without any stream.
    #[error("No PDF streams to merge")]
    NothingToMerge,

    /// A stored image attachment could not be converted to PDF.
    #[error("Attachment '{name}' could not be converted to PDF: {detail}")]
    AttachmentConversion { name: String, detail: String },

    // ── Host errors ───────────────────────────────────────────────────────
    /// The host framework rejected a call (unknown report, render failure…).
    #[error("Host error: {0}")]
    Host(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReportError {
    /// Whether the message is meant to be shown to the end user as-is.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ReportError::EngineUnavailable | ReportError::MissingRecordMarkers { .. }
        )
    }
}

/// A non-fatal error for a single asset fetch.
///
/// Never returned by [`crate::fetch::ResourceFetcher::fetch_url`]; it only
/// travels as far as the log line that explains the placeholder.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("{url}: HTTP {status}")]
    Status { url: String, status: u16 },

    /// Connection, TLS, timeout or body read failure.
    #[error("{url}: {detail}")]
    Transport { url: String, detail: String },

    /// A `data:` URL that cannot be decoded.
    #[error("invalid data URL: {0}")]
    DataUrl(String),
}
