//! # report-pdf
//!
//! Render business-application reports to PDF with an HTML/CSS engine.
//!
//! ## Why this crate?
//!
//! Report hosts already produce print-ready HTML, one `<div class="article">`
//! per record. What is left is the glue around the engine: turning the
//! report's paper format into `@page` CSS, splitting the HTML per record,
//! reusing PDFs stored as attachments, proxying the engine's asset requests
//! back to the host with the user's session, and merging whatever cannot be
//! attributed to a single record.
//!
//! ## Pipeline Overview
//!
//! ```text
//! report ref + record ids
//!  │
//!  ├─ 1. Attach   reuse stored PDFs (images wrapped into a page)
//!  ├─ 2. HTML     host renders the records still missing a stream
//!  ├─ 3. Prepare  split per article, read data-oe-id / data-report-*
//!  ├─ 4. CSS      paper format → @page rules injected after <head>
//!  ├─ 5. Render   engine in spawn_blocking, assets via the HTTP fetcher
//!  └─ 6. Streams  per-record PDFs, or one merged document
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use report_pdf::{CommandEngine, RenderData, ReportConfig, ReportHost, ReportRenderer};
//! use std::sync::Arc;
//!
//! # fn host() -> Arc<dyn ReportHost> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut builder = ReportConfig::builder().base_url("http://localhost:8069");
//!     if let Some(engine) = CommandEngine::locate(CommandEngine::DEFAULT_PROGRAM) {
//!         builder = builder.engine(Arc::new(engine));
//!     }
//!     let renderer = ReportRenderer::new(host(), builder.build()?);
//!     let streams = renderer
//!         .prepare_streams("sale.report_saleorder", &[12, 13], RenderData::default())
//!         .await?;
//!     eprintln!("{} stream(s), merged: {}", streams.len(), streams.is_merged());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `report2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! report-pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod css;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod host;
pub mod output;
pub mod paper;
pub mod pipeline;
pub mod progress;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ReportConfig, ReportConfigBuilder};
pub use engine::{CommandEngine, EngineState, MediaType, RenderEngine, RenderRequest};
pub use error::{FetchError, ReportError};
pub use fetch::{FetchOptions, HttpResourceFetcher, ResourceData, ResourceFetcher};
pub use host::{RecordId, RenderData, ReportDefinition, ReportHost};
pub use output::{PreRendered, ReportStream, ReportStreams, StreamKey};
pub use paper::{CssProfile, PaperFormat, SpecificArgs};
pub use pipeline::attachment::Attachment;
pub use pipeline::inject::inject_css;
pub use pipeline::merge::merge_streams;
pub use pipeline::prepare::{split_report_html, PreparedHtml};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback};
pub use report::ReportRenderer;
