//! Report HTML splitting: one standalone document per record.
//!
//! The host renders every requested record into a single HTML page where each
//! record sits in its own `<div class="article" data-oe-model=… data-oe-id=…>`.
//! To get one PDF per record the page is cut back into per-article documents
//! that share the original `<head>` (stylesheets, fonts) and the report's
//! header and footer blocks.
//!
//! Hosts with their own splitting logic override
//! [`crate::host::ReportHost::prepare_html`]; this module is the default.

use crate::error::ReportError;
use crate::host::RecordId;
use crate::paper::SpecificArgs;
use crate::pipeline::markup::{closing_index, scan_tags, Tag};
use tracing::debug;

/// The host HTML cut into per-record documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedHtml {
    /// One complete HTML document per article, in page order.
    pub bodies: Vec<Vec<u8>>,
    /// `data-oe-id` of each article; `None` when the marker is missing.
    pub html_ids: Vec<Option<RecordId>>,
    pub header: Option<Vec<u8>>,
    pub footer: Option<Vec<u8>>,
    /// `data-report-*` attributes of the `<html>` element.
    pub specific: SpecificArgs,
}

impl PreparedHtml {
    /// Ids of the articles that carry a usable `data-oe-id`.
    pub fn known_ids(&self) -> Vec<RecordId> {
        self.html_ids.iter().flatten().copied().collect()
    }
}

/// Split a rendered report into per-article documents.
///
/// # Errors
/// [`ReportError::MalformedTemplate`] when an article, header or footer
/// `<div>` is never closed.
pub fn split_report_html(html: &[u8]) -> Result<PreparedHtml, ReportError> {
    let text = String::from_utf8_lossy(html);
    let text = text.as_ref();
    let tags = scan_tags(text);

    let head = head_content(text, &tags);

    let specific: SpecificArgs = tags
        .iter()
        .find(|t| t.is_open("html"))
        .map(|t| {
            t.attrs
                .iter()
                .filter(|a| a.name.starts_with("data-report-"))
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect()
        })
        .unwrap_or_default();

    let header = find_block(text, &tags, "header")?;
    let footer = find_block(text, &tags, "footer")?;

    let mut bodies = Vec::new();
    let mut html_ids = Vec::new();
    let mut i = 0;

    while i < tags.len() {
        let tag = &tags[i];
        if !(tag.is_open("div") && tag.has_class("article")) {
            i += 1;
            continue;
        }
        let close = div_close(&tags, i)?;
        let article = &text[tag.span.start..tags[close].span.end];
        i = close + 1;

        let id = tag
            .attr("data-oe-id")
            .and_then(|a| a.value.trim().parse::<RecordId>().ok());
        html_ids.push(id);

        let doc = format!(
            "<!DOCTYPE html>\n<html><head>{head}</head><body>{}{article}{}</body></html>",
            header.unwrap_or(""),
            footer.unwrap_or(""),
        );
        bodies.push(doc.into_bytes());
    }

    debug!(
        "Split report into {} article(s), ids {:?}",
        bodies.len(),
        html_ids
    );

    Ok(PreparedHtml {
        bodies,
        html_ids,
        header: header.map(|h| h.as_bytes().to_vec()),
        footer: footer.map(|f| f.as_bytes().to_vec()),
        specific,
    })
}

/// Markup between the first `<head>` and its `</head>`.
fn head_content<'a>(text: &'a str, tags: &[Tag]) -> &'a str {
    let Some(open) = tags.iter().position(|t| t.is_open("head")) else {
        return "";
    };
    tags[open..]
        .iter()
        .find(|t| t.is_close("head"))
        .map_or("", |close| &text[tags[open].span.end..close.span.start])
}

/// The first complete `<div class="{class}">…</div>` element, if any.
fn find_block<'a>(text: &'a str, tags: &[Tag], class: &str) -> Result<Option<&'a str>, ReportError> {
    let Some(open) = tags
        .iter()
        .position(|t| t.is_open("div") && t.has_class(class))
    else {
        return Ok(None);
    };
    let close = div_close(tags, open)?;
    Ok(Some(&text[tags[open].span.start..tags[close].span.end]))
}

fn div_close(tags: &[Tag], open: usize) -> Result<usize, ReportError> {
    closing_index(tags, open).ok_or_else(|| {
        ReportError::MalformedTemplate(format!(
            "<div> at byte {} is never closed",
            tags[open].span.start
        ))
    })
}
