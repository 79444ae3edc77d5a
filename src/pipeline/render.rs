//! Engine stage: turn prepared HTML documents into PDF bytes.
//!
//! ## Why spawn_blocking?
//!
//! Engines are CPU-bound native code, and their resource callback performs
//! blocking HTTP requests. `tokio::task::spawn_blocking` moves each render
//! onto the blocking thread pool so Tokio worker threads never stall.
//!
//! Every document gets its own [`HttpResourceFetcher`], and therefore its own
//! URL cache, created on the blocking thread that uses it.

use crate::config::ReportConfig;
use crate::engine::{RenderEngine, RenderRequest};
use crate::error::ReportError;
use crate::fetch::HttpResourceFetcher;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Render `documents` in order, at most `config.render_concurrency` at once.
///
/// The first engine failure aborts the batch.
pub async fn render_documents(
    engine: &Arc<dyn RenderEngine>,
    documents: Vec<Vec<u8>>,
    config: &ReportConfig,
    cookie_header: Option<String>,
) -> Result<Vec<Vec<u8>>, ReportError> {
    let total = documents.len();
    let start = Instant::now();

    let pdfs: Vec<Vec<u8>> = stream::iter(documents.into_iter().enumerate().map(|(idx, html)| {
        let engine = Arc::clone(engine);
        let options = config.fetch_options();
        let base_url = config.base_url.clone();
        let cookie = cookie_header.clone();
        let progress = config.progress_callback.clone();
        let position = idx + 1;
        async move {
            if let Some(ref cb) = progress {
                cb.on_document_start(position, total);
            }
            let result = tokio::task::spawn_blocking(move || {
                let fetcher = HttpResourceFetcher::new(options, cookie);
                let request = RenderRequest::html(&html, &base_url);
                let pdf = engine.render(&request, &fetcher);
                debug!(
                    "Document {}/{} rendered by {} ({} assets fetched)",
                    position,
                    total,
                    engine.name(),
                    fetcher.cached_len()
                );
                pdf
            })
            .await
            .map_err(|e| ReportError::Internal(format!("Render task panicked: {e}")))
            .and_then(|r| r);

            if let Some(ref cb) = progress {
                match &result {
                    Ok(pdf) => cb.on_document_complete(position, total, pdf.len()),
                    Err(e) => cb.on_document_error(position, total, &e.to_string()),
                }
            }
            result
        }
    }))
    .buffered(config.render_concurrency.max(1))
    .try_collect()
    .await?;

    info!(
        "Rendered {} document(s) in {}ms",
        pdfs.len(),
        start.elapsed().as_millis()
    );
    Ok(pdfs)
}
