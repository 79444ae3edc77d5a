//! Report rendering entry points.
//!
//! [`ReportRenderer`] turns a report reference and a list of record ids into
//! PDF streams, one per record whenever the HTML can be attributed to
//! records, a single merged document otherwise.
//!
//! ## Why per-record streams?
//!
//! Hosts that store every printed record as an attachment need one PDF per
//! record. Stored PDFs are reused instead of rendered again, so a batch of
//! already printed invoices never reaches the engine.

use crate::config::ReportConfig;
use crate::engine::EngineState;
use crate::error::ReportError;
use crate::host::{RecordId, RenderData, ReportDefinition, ReportHost};
use crate::output::{PreRendered, ReportStream, ReportStreams, StreamKey};
use crate::paper::SpecificArgs;
use crate::pipeline::inject::inject_css;
use crate::pipeline::merge::merge_streams;
use crate::pipeline::prepare::PreparedHtml;
use crate::pipeline::render;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Renders host reports to PDF.
///
/// # Example
/// ```rust,no_run
/// use report_pdf::{CommandEngine, RenderData, ReportConfig, ReportHost, ReportRenderer};
/// use std::sync::Arc;
///
/// # async fn run(host: Arc<dyn ReportHost>) -> Result<(), report_pdf::ReportError> {
/// let engine = CommandEngine::locate(CommandEngine::DEFAULT_PROGRAM)
///     .ok_or(report_pdf::ReportError::EngineUnavailable)?;
/// let config = ReportConfig::builder()
///     .base_url("http://localhost:8069")
///     .engine(Arc::new(engine))
///     .build()?;
/// let renderer = ReportRenderer::new(host, config);
/// let streams = renderer
///     .prepare_streams("account.report_invoice", &[7, 8], RenderData::default())
///     .await?;
/// for (key, stream) in streams.iter() {
///     println!("{:?}: {} bytes", key, stream.stream.as_ref().map_or(0, Vec::len));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ReportRenderer {
    host: Arc<dyn ReportHost>,
    config: ReportConfig,
}

impl fmt::Debug for ReportRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportRenderer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReportRenderer {
    pub fn new(host: Arc<dyn ReportHost>, config: ReportConfig) -> Self {
        Self { host, config }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Whether reports can be printed with the current configuration.
    pub fn engine_state(&self) -> EngineState {
        if self.config.engine.is_some() {
            EngineState::Ok
        } else {
            EngineState::Unavailable
        }
    }

    /// The stylesheet injected into every document of `report`.
    pub fn report_css(&self, report: &ReportDefinition, specific: &SpecificArgs) -> String {
        self.host.paper_format(report).to_css(
            specific,
            self.config.landscape,
            self.config.css_profile,
        )
    }

    /// Render `ids`, or return the raw HTML in test mode.
    ///
    /// Test mode (without `force_rendering`) never touches the engine, so
    /// report tests run where no engine is installed.
    pub async fn pre_render(
        &self,
        report_ref: &str,
        ids: &[RecordId],
        data: RenderData,
    ) -> Result<PreRendered, ReportError> {
        if !self.config.renders_pdf() {
            let report = self.host.report(report_ref)?;
            debug!("Test mode: returning HTML of '{}'", report.name);
            let html = self.host.render_html(&report, ids, &data)?;
            return Ok(PreRendered::Html(html));
        }
        self.prepare_streams(report_ref, ids, data)
            .await
            .map(PreRendered::Pdf)
    }

    /// Collect one PDF stream per record of `ids`.
    ///
    /// Stored attachments are reused when the report allows it. When ids
    /// repeat, the request is empty, or the rendered documents cannot be
    /// attributed to records, the result is a single [`StreamKey::Merged`]
    /// document.
    ///
    /// # Errors
    /// - [`ReportError::EngineUnavailable`] when no engine is configured.
    /// - [`ReportError::MissingRecordMarkers`] when the report saves
    ///   attachments but its articles do not carry the requested ids.
    /// - Any engine, host or merge failure.
    pub async fn prepare_streams(
        &self,
        report_ref: &str,
        ids: &[RecordId],
        data: RenderData,
    ) -> Result<ReportStreams, ReportError> {
        let start = Instant::now();
        let engine = self
            .config
            .engine
            .clone()
            .ok_or(ReportError::EngineUnavailable)?;

        let report = self.host.report(report_ref)?;
        let has_duplicates = has_duplicates(ids);
        let saves_per_record = !has_duplicates && report.save_attachments;
        let uses_attachments = saves_per_record && !self.config.skip_attachments;
        info!(
            "Rendering '{}' for {} record(s) with {}",
            report.name,
            ids.len(),
            engine.name()
        );

        // ── Step 1: Stored attachments ───────────────────────────────────
        let mut streams = self.collect_attachments(&report, ids, uses_attachments)?;
        let pending = streams.pending_ids();
        if !ids.is_empty() && pending.is_empty() {
            info!("All {} record(s) served from attachments", streams.len());
            return Ok(streams);
        }

        // ── Step 2: Host HTML ────────────────────────────────────────────
        let render_ids: Vec<RecordId> = if has_duplicates {
            ids.to_vec()
        } else {
            pending.clone()
        };
        let html = self.host.render_html(&report, &render_ids, &data)?;
        let prepared = self.host.prepare_html(&html, &report.model)?;
        debug!(
            "Prepared {} body(ies), html ids {:?}",
            prepared.bodies.len(),
            prepared.html_ids
        );

        // Checked even when stored attachments are skipped for this call.
        if saves_per_record && !same_ids(&prepared.known_ids(), &pending) {
            return Err(ReportError::MissingRecordMarkers {
                report: report.name.clone(),
            });
        }

        // ── Step 3: Stylesheet and asset session ─────────────────────────
        let css = self.report_css(&report, &prepared.specific);
        let cookie = match self.host.asset_session_cookie() {
            Ok(cookie) => cookie,
            Err(e) => {
                warn!("No session cookie for assets: {}", e);
                None
            }
        };

        // ── Step 4: Render ───────────────────────────────────────────────
        let merged_only = has_duplicates || ids.is_empty();
        let documents: Vec<Vec<u8>> = if merged_only || prepared.bodies.is_empty() {
            vec![inject_css(&html, &[css.as_str()])]
        } else {
            prepared
                .bodies
                .iter()
                .map(|body| inject_css(body, &[css.as_str()]))
                .collect()
        };

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(documents.len());
        }
        let pdfs = render::render_documents(&engine, documents, &self.config, cookie).await?;

        // ── Step 5: Attribute streams to records ─────────────────────────
        let rendered = pdfs.len();
        let order = if merged_only {
            None
        } else {
            stream_order(&prepared, &pending, rendered)
        };
        let merged = order.is_none();
        let result = match order {
            Some(order) => {
                for (id, pdf) in order.into_iter().zip(pdfs) {
                    if let Some(entry) = streams.get_mut(&StreamKey::Record(id)) {
                        entry.stream = Some(pdf);
                    }
                }
                streams
            }
            None => {
                debug!("Merging {} stream(s) into one document", rendered);
                ReportStreams::merged(merge_streams(&pdfs)?)
            }
        };

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(rendered, merged);
        }
        info!(
            "Report '{}' done: {} stream(s){}, {}ms",
            report.name,
            result.len(),
            if merged { " (merged)" } else { "" },
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Blocking wrapper around [`ReportRenderer::pre_render`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn pre_render_blocking(
        &self,
        report_ref: &str,
        ids: &[RecordId],
        data: RenderData,
    ) -> Result<PreRendered, ReportError> {
        runtime()?.block_on(self.pre_render(report_ref, ids, data))
    }

    /// Blocking wrapper around [`ReportRenderer::prepare_streams`].
    pub fn prepare_streams_blocking(
        &self,
        report_ref: &str,
        ids: &[RecordId],
        data: RenderData,
    ) -> Result<ReportStreams, ReportError> {
        runtime()?.block_on(self.prepare_streams(report_ref, ids, data))
    }

    fn collect_attachments(
        &self,
        report: &ReportDefinition,
        ids: &[RecordId],
        uses_attachments: bool,
    ) -> Result<ReportStreams, ReportError> {
        let mut streams = ReportStreams::new();
        for &id in ids {
            let key = StreamKey::Record(id);
            if streams.contains_key(&key) {
                continue;
            }
            let mut entry = ReportStream::default();
            if uses_attachments {
                if let Some(attachment) = self.host.retrieve_attachment(report, id)? {
                    if report.reuse_attachments {
                        entry.stream = Some(attachment.to_pdf()?);
                        debug!("Record {} reuses attachment '{}'", id, attachment.name);
                        if let Some(ref cb) = self.config.progress_callback {
                            cb.on_record_reused(id);
                        }
                    }
                    entry.attachment = Some(attachment);
                }
            }
            streams.insert(key, entry);
        }
        Ok(streams)
    }
}

/// Record id of each rendered stream, in stream order, or `None` when the
/// streams cannot be attributed and must be merged.
fn stream_order(
    prepared: &PreparedHtml,
    pending: &[RecordId],
    rendered: usize,
) -> Option<Vec<RecordId>> {
    let by_id = prepared.html_ids.len() == rendered
        && prepared.html_ids.iter().all(Option::is_some)
        && same_ids(&prepared.known_ids(), pending);
    if by_id {
        return Some(prepared.known_ids());
    }
    if rendered == pending.len() {
        debug!("Assigning {} stream(s) by position", rendered);
        return Some(pending.to_vec());
    }
    warn!(
        "{} stream(s) for {} pending record(s); merging",
        rendered,
        pending.len()
    );
    None
}

fn has_duplicates(ids: &[RecordId]) -> bool {
    let mut seen = HashSet::with_capacity(ids.len());
    !ids.iter().all(|id| seen.insert(*id))
}

fn same_ids(a: &[RecordId], b: &[RecordId]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

fn runtime() -> Result<tokio::runtime::Runtime, ReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReportError::Internal(format!("Failed to create tokio runtime: {}", e)))
}
