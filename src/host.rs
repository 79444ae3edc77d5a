//! The host framework seam.
//!
//! Everything the renderer needs from the business application (report
//! definitions, QWeb-style HTML rendering, stored attachments, paper formats,
//! a session cookie for asset requests) goes through [`ReportHost`]. The
//! crate never talks to an ORM or a session store directly.

use crate::error::ReportError;
use crate::paper::PaperFormat;
use crate::pipeline::attachment::Attachment;
use crate::pipeline::prepare::{split_report_html, PreparedHtml};
use serde::{Deserialize, Serialize};

/// Identifier of a host record.
pub type RecordId = i64;

/// The parts of a host report action the renderer looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDefinition {
    /// Human-readable report name (used in error messages).
    pub name: String,
    /// Model the report prints records of.
    pub model: String,
    /// The report stores each printed record as an attachment.
    #[serde(default)]
    pub save_attachments: bool,
    /// Stored attachments are served instead of rendering again.
    #[serde(default)]
    pub reuse_attachments: bool,
}

impl ReportDefinition {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            save_attachments: false,
            reuse_attachments: false,
        }
    }

    /// Enable attachment saving, and optionally reuse.
    pub fn with_attachments(mut self, reuse: bool) -> Self {
        self.save_attachments = true;
        self.reuse_attachments = reuse;
        self
    }
}

/// Values passed to the host's HTML rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderData {
    /// Always `pdf` unless the caller set something else.
    pub report_type: String,
    pub debug: bool,
    /// Extra template values, forwarded untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for RenderData {
    fn default() -> Self {
        Self {
            report_type: "pdf".to_string(),
            debug: false,
            extra: serde_json::Map::new(),
        }
    }
}

impl RenderData {
    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Callbacks into the business application.
///
/// Implementations must be `Send + Sync`: the renderer holds the host in an
/// `Arc` and may call it from Tokio worker threads.
pub trait ReportHost: Send + Sync {
    /// Look up a report by reference (XML id, technical name…).
    fn report(&self, report_ref: &str) -> Result<ReportDefinition, ReportError>;

    /// Render the report HTML for `ids` (every record in one page).
    fn render_html(
        &self,
        report: &ReportDefinition,
        ids: &[RecordId],
        data: &RenderData,
    ) -> Result<Vec<u8>, ReportError>;

    /// Cut the rendered HTML into per-record documents.
    fn prepare_html(&self, html: &[u8], model: &str) -> Result<PreparedHtml, ReportError> {
        let _ = model;
        split_report_html(html)
    }

    /// Paper format configured for the report (or the company default).
    fn paper_format(&self, report: &ReportDefinition) -> PaperFormat;

    /// Previously stored PDF of `id`, if the report keeps one.
    fn retrieve_attachment(
        &self,
        report: &ReportDefinition,
        id: RecordId,
    ) -> Result<Option<Attachment>, ReportError> {
        let _ = (report, id);
        Ok(None)
    }

    /// `Cookie` header value granting the engine access to protected assets.
    ///
    /// Hosts usually mint a short-lived session cloned from the current
    /// request with debug mode off.
    fn asset_session_cookie(&self) -> Result<Option<String>, ReportError> {
        Ok(None)
    }
}
