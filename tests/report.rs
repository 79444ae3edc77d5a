//! Integration tests for report rendering.
//!
//! A fake host renders one `<div class="article">` per record and a fake
//! engine turns every `<p>Record N</p>` of a document into one PDF page
//! labelled "Record N", so tests can tell which record ended up where.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use report_pdf::{
    Attachment, PreRendered, RecordId, RenderData, RenderEngine, RenderProgressCallback,
    RenderRequest, ReportConfig, ReportConfigBuilder, ReportDefinition, ReportError, ReportHost,
    ReportRenderer, ResourceFetcher, StreamKey,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

static RECORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p>(Record \d+)</p>").unwrap());

/// A PDF with one page per label, each page showing its label.
fn pdf_with_pages(labels: &[String]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut kids = vec![];
    for label in labels {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        label.clone().into_bytes(),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => labels.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Page labels of a PDF, in page order.
fn page_labels(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let content = doc.get_page_content(id).unwrap();
            let text = String::from_utf8_lossy(&content);
            text.split('(')
                .nth(1)
                .and_then(|s| s.split(')').next())
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

fn report_html(ids: &[RecordId]) -> String {
    let articles: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="article" data-oe-model="sale.order" data-oe-id="{id}"><p>Record {id}</p></div>"#
            )
        })
        .collect();
    format!(
        r#"<!DOCTYPE html><html data-report-margin-top="40"><head><title>SO</title></head><body><div class="header">ACME</div>{articles}</body></html>"#
    )
}

struct FakeHost {
    report: ReportDefinition,
    fixed_html: Option<String>,
    attachments: HashMap<RecordId, Attachment>,
    cookie_fails: bool,
    rendered_ids: Mutex<Vec<Vec<RecordId>>>,
}

impl FakeHost {
    fn new() -> Self {
        Self {
            report: ReportDefinition::new("Quotation", "sale.order"),
            fixed_html: None,
            attachments: HashMap::new(),
            cookie_fails: false,
            rendered_ids: Mutex::new(Vec::new()),
        }
    }

    fn saving_attachments(mut self, reuse: bool) -> Self {
        self.report = self.report.with_attachments(reuse);
        self
    }

    fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.insert(attachment.id, attachment);
        self
    }

    fn with_html(mut self, html: &str) -> Self {
        self.fixed_html = Some(html.to_string());
        self
    }

    fn render_calls(&self) -> Vec<Vec<RecordId>> {
        self.rendered_ids.lock().unwrap().clone()
    }
}

impl ReportHost for FakeHost {
    fn report(&self, _report_ref: &str) -> Result<ReportDefinition, ReportError> {
        Ok(self.report.clone())
    }

    fn render_html(
        &self,
        _report: &ReportDefinition,
        ids: &[RecordId],
        data: &RenderData,
    ) -> Result<Vec<u8>, ReportError> {
        assert_eq!(data.report_type, "pdf");
        self.rendered_ids.lock().unwrap().push(ids.to_vec());
        let html = match self.fixed_html {
            Some(ref html) => html.clone(),
            None => report_html(ids),
        };
        Ok(html.into_bytes())
    }

    fn paper_format(&self, _report: &ReportDefinition) -> report_pdf::PaperFormat {
        report_pdf::PaperFormat::a4()
    }

    fn retrieve_attachment(
        &self,
        _report: &ReportDefinition,
        id: RecordId,
    ) -> Result<Option<Attachment>, ReportError> {
        Ok(self.attachments.get(&id).cloned())
    }

    fn asset_session_cookie(&self) -> Result<Option<String>, ReportError> {
        if self.cookie_fails {
            return Err(ReportError::Host("no session".into()));
        }
        Ok(Some("session_id=test".into()))
    }
}

#[derive(Default)]
struct FakeEngine {
    calls: AtomicUsize,
    documents: Mutex<Vec<String>>,
    fail: bool,
}

impl FakeEngine {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RenderEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn render(
        &self,
        request: &RenderRequest<'_>,
        _fetcher: &dyn ResourceFetcher,
    ) -> Result<Vec<u8>, ReportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let html = String::from_utf8_lossy(request.html).into_owned();
        self.documents.lock().unwrap().push(html.clone());
        if self.fail {
            return Err(ReportError::EngineFailed {
                engine: "fake".into(),
                detail: "out of ink".into(),
            });
        }
        let mut labels: Vec<String> = RECORD_RE
            .captures_iter(&html)
            .map(|c| c[1].to_string())
            .collect();
        if labels.is_empty() {
            labels.push("blank".to_string());
        }
        Ok(pdf_with_pages(&labels))
    }
}

/// Route library logs to the test output (`RUST_LOG=report_pdf=debug`).
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn renderer_with(
    host: &Arc<FakeHost>,
    engine: Option<&Arc<FakeEngine>>,
    configure: impl FnOnce(ReportConfigBuilder) -> ReportConfigBuilder,
) -> ReportRenderer {
    init_tracing();
    let mut builder = ReportConfig::builder();
    if let Some(engine) = engine {
        builder = builder.engine(engine.clone());
    }
    let config = configure(builder).build().unwrap();
    ReportRenderer::new(host.clone(), config)
}

fn renderer(host: &Arc<FakeHost>, engine: &Arc<FakeEngine>) -> ReportRenderer {
    renderer_with(host, Some(engine), |b| b)
}

fn stream_of(streams: &report_pdf::ReportStreams, id: RecordId) -> Vec<u8> {
    streams
        .record(id)
        .and_then(|s| s.stream.clone())
        .unwrap_or_else(|| panic!("record {id} has no stream"))
}

// ── Per-record streams ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_record_gets_its_own_stream() {
    let host = Arc::new(FakeHost::new());
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[7], RenderData::default())
        .await
        .unwrap();

    assert_eq!(streams.len(), 1);
    assert!(!streams.is_merged());
    assert_eq!(page_labels(&stream_of(&streams, 7)), vec!["Record 7"]);
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_each_record_rendered_separately_in_request_order() {
    let host = Arc::new(FakeHost::new());
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[3, 1, 2], RenderData::default())
        .await
        .unwrap();

    let keys: Vec<_> = streams.keys().copied().collect();
    assert_eq!(
        keys,
        vec![StreamKey::Record(3), StreamKey::Record(1), StreamKey::Record(2)]
    );
    for id in [1, 2, 3] {
        assert_eq!(page_labels(&stream_of(&streams, id)), vec![format!("Record {id}")]);
    }
    assert_eq!(engine.calls(), 3);
    assert_eq!(host.render_calls(), vec![vec![3, 1, 2]]);
}

#[tokio::test]
async fn test_documents_carry_paper_css_and_header() {
    let host = Arc::new(FakeHost::new());
    let engine = Arc::new(FakeEngine::default());

    renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[1, 2], RenderData::default())
        .await
        .unwrap();

    let documents = engine.documents.lock().unwrap().clone();
    assert_eq!(documents.len(), 2);
    for doc in &documents {
        assert!(doc.contains("<head><style>"), "CSS goes right after <head>");
        assert!(doc.contains("size: A4;"));
        assert!(doc.contains("margin: 40mm 10mm 10mm 10mm;"), "{doc}");
        assert!(doc.contains("ACME"), "header is repeated");
    }
    assert!(documents[0].contains("Record 1") && !documents[0].contains("Record 2"));
}

#[tokio::test]
async fn test_landscape_override_swaps_orientation() {
    let host = Arc::new(FakeHost::new());
    let engine = Arc::new(FakeEngine::default());

    renderer_with(&host, Some(&engine), |b| b.landscape(true))
        .prepare_streams("sale.report_saleorder", &[1], RenderData::default())
        .await
        .unwrap();

    let documents = engine.documents.lock().unwrap();
    assert!(documents[0].contains("size: A4 landscape;"), "{}", documents[0]);
}

#[tokio::test]
async fn test_concurrent_rendering_keeps_assignment() {
    let host = Arc::new(FakeHost::new());
    let engine = Arc::new(FakeEngine::default());

    let ids: Vec<RecordId> = (1..=8).collect();
    let streams = renderer_with(&host, Some(&engine), |b| b.render_concurrency(4))
        .prepare_streams("sale.report_saleorder", &ids, RenderData::default())
        .await
        .unwrap();

    for id in ids {
        assert_eq!(page_labels(&stream_of(&streams, id)), vec![format!("Record {id}")]);
    }
}

// ── Merged results ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_duplicate_ids_collapse_to_one_merged_document() {
    let host = Arc::new(FakeHost::new().saving_attachments(true));
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[4, 4, 5], RenderData::default())
        .await
        .unwrap();

    assert!(streams.is_merged());
    assert_eq!(streams.len(), 1);
    let merged = streams.get(&StreamKey::Merged).unwrap();
    assert!(merged.attachment.is_none());
    assert_eq!(
        page_labels(merged.stream.as_ref().unwrap()),
        vec!["Record 4", "Record 4", "Record 5"]
    );
    assert_eq!(engine.calls(), 1, "the full HTML is rendered once");
    assert_eq!(host.render_calls(), vec![vec![4, 4, 5]]);
}

#[tokio::test]
async fn test_empty_request_renders_one_merged_document() {
    let host = Arc::new(FakeHost::new());
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[], RenderData::default())
        .await
        .unwrap();

    assert!(streams.is_merged());
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_unattributable_streams_are_merged() {
    // Two records requested, one article without id: 1 stream for 2 records.
    let html = r#"<html><head></head><body>
        <div class="article"><p>Record 1</p><p>Record 2</p></div>
    </body></html>"#;
    let host = Arc::new(FakeHost::new().with_html(html));
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[1, 2], RenderData::default())
        .await
        .unwrap();

    assert!(streams.is_merged());
    let merged = streams.get(&StreamKey::Merged).unwrap();
    assert_eq!(
        page_labels(merged.stream.as_ref().unwrap()),
        vec!["Record 1", "Record 2"]
    );
}

#[tokio::test]
async fn test_positional_assignment_without_markers() {
    let html = r#"<html><head></head><body>
        <div class="article"><p>Record 10</p></div>
        <div class="article"><p>Record 20</p></div>
    </body></html>"#;
    let host = Arc::new(FakeHost::new().with_html(html));
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[10, 20], RenderData::default())
        .await
        .unwrap();

    assert_eq!(page_labels(&stream_of(&streams, 10)), vec!["Record 10"]);
    assert_eq!(page_labels(&stream_of(&streams, 20)), vec!["Record 20"]);
}

#[tokio::test]
async fn test_report_without_articles_renders_full_html() {
    let html = r#"<html><head></head><body><p>Record 5</p></body></html>"#;
    let host = Arc::new(FakeHost::new().with_html(html));
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[5], RenderData::default())
        .await
        .unwrap();

    assert_eq!(engine.calls(), 1);
    assert_eq!(page_labels(&stream_of(&streams, 5)), vec!["Record 5"]);
}

// ── Attachments ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stored_attachments_skip_the_engine() {
    let stored_1 = pdf_with_pages(&["Stored 1".to_string()]);
    let stored_2 = pdf_with_pages(&["Stored 2".to_string()]);
    let host = Arc::new(
        FakeHost::new()
            .saving_attachments(true)
            .with_attachment(Attachment::new(1, "SO1.pdf", Some("application/pdf"), stored_1.clone()))
            .with_attachment(Attachment::new(2, "SO2.pdf", Some("application/pdf"), stored_2)),
    );
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[1, 2], RenderData::default())
        .await
        .unwrap();

    assert_eq!(engine.calls(), 0);
    assert!(host.render_calls().is_empty());
    assert_eq!(stream_of(&streams, 1), stored_1);
    assert_eq!(streams.record(2).unwrap().attachment.as_ref().unwrap().id, 2);
}

#[tokio::test]
async fn test_partial_reuse_renders_only_missing_records() {
    let stored = pdf_with_pages(&["Stored 1".to_string()]);
    let host = Arc::new(
        FakeHost::new()
            .saving_attachments(true)
            .with_attachment(Attachment::new(1, "SO1.pdf", Some("application/pdf"), stored)),
    );
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[1, 2], RenderData::default())
        .await
        .unwrap();

    assert_eq!(host.render_calls(), vec![vec![2]]);
    assert_eq!(page_labels(&stream_of(&streams, 1)), vec!["Stored 1"]);
    assert_eq!(page_labels(&stream_of(&streams, 2)), vec!["Record 2"]);
    assert!(streams.record(2).unwrap().attachment.is_none());
}

#[tokio::test]
async fn test_attachment_kept_but_not_reused_without_reuse_flag() {
    let stored = pdf_with_pages(&["Stored 1".to_string()]);
    let host = Arc::new(
        FakeHost::new()
            .saving_attachments(false)
            .with_attachment(Attachment::new(1, "SO1.pdf", Some("application/pdf"), stored)),
    );
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[1], RenderData::default())
        .await
        .unwrap();

    let entry = streams.record(1).unwrap();
    assert_eq!(page_labels(entry.stream.as_ref().unwrap()), vec!["Record 1"]);
    assert_eq!(entry.attachment.as_ref().unwrap().name, "SO1.pdf");
}

#[tokio::test]
async fn test_image_attachment_becomes_a_pdf_page() {
    let img = image::RgbImage::from_pixel(4, 3, image::Rgb([200, 10, 10]));
    let mut png = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();

    let host = Arc::new(
        FakeHost::new()
            .saving_attachments(true)
            .with_attachment(Attachment::new(3, "scan.png", Some("image/png"), png.into_inner())),
    );
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[3], RenderData::default())
        .await
        .unwrap();

    let pdf = stream_of(&streams, 3);
    assert!(pdf.starts_with(b"%PDF"));
    assert_eq!(report_pdf::pipeline::merge::page_count(&pdf).unwrap(), 1);
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_skip_attachments_renders_everything() {
    let stored = pdf_with_pages(&["Stored 1".to_string()]);
    let host = Arc::new(
        FakeHost::new()
            .saving_attachments(true)
            .with_attachment(Attachment::new(1, "SO1.pdf", Some("application/pdf"), stored)),
    );
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer_with(&host, Some(&engine), |b| b.skip_attachments(true))
        .prepare_streams("sale.report_saleorder", &[1], RenderData::default())
        .await
        .unwrap();

    assert_eq!(page_labels(&stream_of(&streams, 1)), vec!["Record 1"]);
    assert!(streams.record(1).unwrap().attachment.is_none());
}

#[tokio::test]
async fn test_missing_record_markers_is_a_user_error() {
    let html = r#"<html><head></head><body>
        <div class="article"><p>Record 1</p></div>
    </body></html>"#;
    let host = Arc::new(FakeHost::new().saving_attachments(false).with_html(html));
    let engine = Arc::new(FakeEngine::default());

    let err = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[1], RenderData::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::MissingRecordMarkers { .. }), "{err}");
    assert!(err.is_user_facing());
    let msg = err.to_string();
    assert!(msg.contains("Quotation"));
    assert!(msg.contains("data-oe-id"));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_missing_record_markers_checked_when_skipping_attachments() {
    let html = r#"<html><head></head><body>
        <div class="article"><p>Record 1</p></div>
    </body></html>"#;
    let host = Arc::new(FakeHost::new().saving_attachments(true).with_html(html));
    let engine = Arc::new(FakeEngine::default());

    let err = renderer_with(&host, Some(&engine), |b| b.skip_attachments(true))
        .prepare_streams("sale.report_saleorder", &[1], RenderData::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::MissingRecordMarkers { .. }), "{err}");
    assert_eq!(engine.calls(), 0);
}

// ── Engine availability and failures ─────────────────────────────────────────

#[tokio::test]
async fn test_missing_engine_is_a_user_error() {
    let host = Arc::new(FakeHost::new());
    let renderer = renderer_with(&host, None, |b| b);

    assert_eq!(renderer.engine_state().as_str(), "unavailable");
    let err = renderer
        .prepare_streams("sale.report_saleorder", &[1], RenderData::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::EngineUnavailable));
    assert!(err.is_user_facing());
    assert!(host.render_calls().is_empty());
}

#[tokio::test]
async fn test_engine_failure_propagates() {
    let host = Arc::new(FakeHost::new());
    let engine = Arc::new(FakeEngine::failing());

    let err = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[1, 2], RenderData::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::EngineFailed { .. }), "{err}");
    assert!(!err.is_user_facing());
}

#[tokio::test]
async fn test_cookie_failure_is_not_fatal() {
    let mut host = FakeHost::new();
    host.cookie_fails = true;
    let host = Arc::new(host);
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams("sale.report_saleorder", &[1], RenderData::default())
        .await
        .unwrap();

    assert_eq!(streams.len(), 1);
}

// ── Test mode ────────────────────────────────────────────────────────────────

#[test]
fn test_test_mode_returns_html_without_engine() {
    let host = Arc::new(FakeHost::new());
    let renderer = renderer_with(&host, None, |b| b.test_mode(true));

    let result = tokio_test::block_on(renderer.pre_render(
        "sale.report_saleorder",
        &[1, 2],
        RenderData::default(),
    ))
    .unwrap();

    match result {
        PreRendered::Html(html) => {
            let html = String::from_utf8(html).unwrap();
            assert!(html.contains("Record 1") && html.contains("Record 2"));
        }
        other => panic!("expected HTML, got {}", other.report_type()),
    }
}

#[tokio::test]
async fn test_force_rendering_renders_in_test_mode() {
    let host = Arc::new(FakeHost::new());
    let engine = Arc::new(FakeEngine::default());
    let renderer = renderer_with(&host, Some(&engine), |b| b.test_mode(true).force_rendering(true));

    let result = renderer
        .pre_render("sale.report_saleorder", &[1], RenderData::default())
        .await
        .unwrap();

    assert_eq!(result.report_type(), "pdf");
    assert_eq!(engine.calls(), 1);
}

#[test]
fn test_blocking_wrapper() {
    let host = Arc::new(FakeHost::new());
    let engine = Arc::new(FakeEngine::default());

    let streams = renderer(&host, &engine)
        .prepare_streams_blocking("sale.report_saleorder", &[9], RenderData::default())
        .unwrap();

    assert_eq!(page_labels(&stream_of(&streams, 9)), vec!["Record 9"]);
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingCallback {
    batch: Mutex<Option<usize>>,
    completed: AtomicUsize,
    reused: AtomicUsize,
    finished: Mutex<Option<(usize, bool)>>,
}

impl RenderProgressCallback for CountingCallback {
    fn on_batch_start(&self, documents: usize) {
        *self.batch.lock().unwrap() = Some(documents);
    }

    fn on_record_reused(&self, _id: RecordId) {
        self.reused.fetch_add(1, Ordering::SeqCst);
    }

    fn on_document_complete(&self, _position: usize, _total: usize, pdf_len: usize) {
        assert!(pdf_len > 0);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_complete(&self, documents: usize, merged: bool) {
        *self.finished.lock().unwrap() = Some((documents, merged));
    }
}

#[tokio::test]
async fn test_progress_callback_receives_batch_events() {
    let stored = pdf_with_pages(&["Stored 1".to_string()]);
    let host = Arc::new(
        FakeHost::new()
            .saving_attachments(true)
            .with_attachment(Attachment::new(1, "SO1.pdf", Some("application/pdf"), stored)),
    );
    let engine = Arc::new(FakeEngine::default());
    let cb = Arc::new(CountingCallback::default());
    let cb_dyn: Arc<dyn RenderProgressCallback> = cb.clone();

    renderer_with(&host, Some(&engine), |b| b.progress_callback(cb_dyn))
        .prepare_streams("sale.report_saleorder", &[1, 2, 3], RenderData::default())
        .await
        .unwrap();

    assert_eq!(*cb.batch.lock().unwrap(), Some(2));
    assert_eq!(cb.reused.load(Ordering::SeqCst), 1);
    assert_eq!(cb.completed.load(Ordering::SeqCst), 2);
    assert_eq!(*cb.finished.lock().unwrap(), Some((2, false)));
}
