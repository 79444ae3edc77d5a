//! The HTML/CSS → PDF engine seam.
//!
//! The renderer treats the engine as a black box that loads an HTML
//! document, asks a [`ResourceFetcher`] for every external resource, and
//! writes PDF bytes. In-process bindings implement [`RenderEngine`] directly;
//! [`CommandEngine`] drives an engine shipped as a command-line program.

use crate::error::ReportError;
use crate::fetch::{ResourceData, ResourceFetcher, OCTET_STREAM};
use crate::pipeline::markup::{scan_tags, Tag};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use reqwest::Url;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

static CSS_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("valid regex")
});

/// CSS media the document is laid out for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaType {
    #[default]
    Print,
    Screen,
}

/// One document to render.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub html: &'a [u8],
    /// Base URL relative references in the document resolve against.
    pub base_url: &'a str,
    pub media: MediaType,
    pub mime_type: &'a str,
    pub text_encoding: &'a str,
}

impl<'a> RenderRequest<'a> {
    /// A UTF-8 HTML document laid out for print.
    pub fn html(html: &'a [u8], base_url: &'a str) -> Self {
        Self {
            html,
            base_url,
            media: MediaType::Print,
            mime_type: "text/html",
            text_encoding: "utf-8",
        }
    }
}

/// An HTML/CSS → PDF engine.
///
/// `render` is blocking and CPU-bound; the renderer always calls it from
/// `tokio::task::spawn_blocking`.
pub trait RenderEngine: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Render one document to PDF bytes, fetching resources via `fetcher`.
    fn render(
        &self,
        request: &RenderRequest<'_>,
        fetcher: &dyn ResourceFetcher,
    ) -> Result<Vec<u8>, ReportError>;
}

/// Whether reports can be printed in this environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Ok,
    Unavailable,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Ok => "ok",
            EngineState::Unavailable => "unavailable",
        }
    }
}

/// Placeholder replaced by the input HTML path.
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Placeholder replaced by the output PDF path.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";
/// Placeholder replaced by the request's base URL.
pub const BASE_URL_PLACEHOLDER: &str = "{base_url}";

/// An engine run as an external program: `program input.html output.pdf`.
///
/// The program never sees the session cookie, so assets go through the
/// fetcher before it runs: `src` of images, `href` of stylesheet and icon
/// links, and every `url()` in stylesheets (linked or inline) are replaced by
/// `data:` URLs. A `<base href>` pointing at the host is inserted for
/// whatever is left.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    inline_assets: bool,
}

impl CommandEngine {
    /// The program looked up by default.
    pub const DEFAULT_PROGRAM: &'static str = "plutoprint";

    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let name = program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "command".to_string());
        Self {
            name,
            program,
            args: vec![INPUT_PLACEHOLDER.to_string(), OUTPUT_PLACEHOLDER.to_string()],
            inline_assets: true,
        }
    }

    /// Let the program fetch assets itself instead of inlining them through
    /// the fetcher. Protected assets then render blank.
    pub fn with_inline_assets(mut self, inline: bool) -> Self {
        self.inline_assets = inline;
        self
    }

    /// Replace the argument template (placeholders: `{input}`, `{output}`,
    /// `{base_url}`).
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Find `program` on `PATH` (or as a path); `None` when it is missing.
    pub fn locate(program: &str) -> Option<Self> {
        let found = find_program(program)?;
        info!("Using rendering engine at {}", found.display());
        Some(Self::new(found))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn expand_args(&self, input: &Path, output: &Path, base_url: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| {
                a.replace(INPUT_PLACEHOLDER, &input.to_string_lossy())
                    .replace(OUTPUT_PLACEHOLDER, &output.to_string_lossy())
                    .replace(BASE_URL_PLACEHOLDER, base_url)
            })
            .collect()
    }
}

impl RenderEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(
        &self,
        request: &RenderRequest<'_>,
        fetcher: &dyn ResourceFetcher,
    ) -> Result<Vec<u8>, ReportError> {
        let failed = |detail: String| ReportError::EngineFailed {
            engine: self.name.clone(),
            detail,
        };

        let dir = tempfile::TempDir::new().map_err(|e| failed(format!("temp dir: {e}")))?;
        let input = dir.path().join("report.html");
        let output = dir.path().join("report.pdf");

        let html = if self.inline_assets {
            inline_assets(request.html, request.base_url, fetcher)
        } else {
            request.html.to_vec()
        };
        let html = with_base_href(&html, request.base_url);
        std::fs::write(&input, &html).map_err(|e| failed(format!("write input: {e}")))?;

        let args = self.expand_args(&input, &output, request.base_url);
        debug!("Running {} {:?}", self.program.display(), args);
        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| failed(format!("spawn {}: {e}", self.program.display())))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(failed(format!(
                "exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        let pdf = std::fs::read(&output).map_err(|e| failed(format!("read output: {e}")))?;
        if !pdf.starts_with(b"%PDF") {
            return Err(failed("output is not a PDF".into()));
        }
        Ok(pdf)
    }
}

/// Replace asset references in `html` by `data:` URLs served by `fetcher`.
fn inline_assets(html: &[u8], base_url: &str, fetcher: &dyn ResourceFetcher) -> Vec<u8> {
    let text = String::from_utf8_lossy(html);
    let text = text.as_ref();
    let tags = scan_tags(text);
    let document_base = Url::parse(&format!("{}/", base_url.trim_end_matches('/'))).ok();
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for (i, tag) in tags.iter().enumerate() {
        if tag.closing {
            continue;
        }
        if tag.name == "style" {
            if let Some(close) = tags.get(i + 1).filter(|t| t.is_close("style")) {
                let css = &text[tag.span.end..close.span.start];
                let css = inline_css_urls(css, document_base.as_ref(), fetcher);
                edits.push((tag.span.end..close.span.start, css));
            }
            continue;
        }
        let Some((attr, stylesheet)) = asset_attribute(tag) else {
            continue;
        };
        let Some(attr) = tag.attr(attr) else { continue };
        let Some(span) = attr.value_span.clone() else {
            continue;
        };
        let Some(url) = absolute_url(document_base.as_ref(), &attr.value) else {
            continue;
        };

        let mut data = fetcher.fetch_url(&url);
        if stylesheet && !data.is_empty() {
            // Non UTF-8 stylesheets are passed through untouched.
            if let Ok(css) = std::str::from_utf8(&data.content) {
                let css_base = Url::parse(&url).ok();
                let css = inline_css_urls(css, css_base.as_ref(), fetcher);
                data.content = css.into_bytes();
                data.text_encoding = "utf-8".to_string();
            }
        }
        edits.push((span, data_url(&data)));
    }

    debug!("Inlined {} asset reference(s)", edits.len());
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (span, replacement) in edits {
        out.push_str(&text[last..span.start]);
        out.push_str(&replacement);
        last = span.end;
    }
    out.push_str(&text[last..]);
    out.into_bytes()
}

/// The URL attribute of an asset-bearing tag, and whether it is a stylesheet.
fn asset_attribute(tag: &Tag) -> Option<(&'static str, bool)> {
    match tag.name.as_str() {
        "img" | "source" | "embed" => Some(("src", false)),
        "link" => {
            let rel = tag.attr("rel").map(|a| a.value.to_ascii_lowercase())?;
            let mut tokens = rel.split_whitespace();
            if tokens.clone().any(|t| t == "stylesheet") {
                Some(("href", true))
            } else if tokens.any(|t| t == "icon") {
                Some(("href", false))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Rewrite every `url()` of `css`, resolved against `base`.
fn inline_css_urls(css: &str, base: Option<&Url>, fetcher: &dyn ResourceFetcher) -> String {
    CSS_URL_RE
        .replace_all(css, |caps: &Captures| {
            match absolute_url(base, &caps[1]) {
                Some(url) => format!("url(\"{}\")", data_url(&fetcher.fetch_url(&url))),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// `reference` made absolute against `base`; `None` for fragments, `data:`
/// and non-HTTP schemes. Without a usable base the reference is returned
/// as-is for the fetcher to resolve.
fn absolute_url(base: Option<&Url>, reference: &str) -> Option<String> {
    let reference = reference.trim().replace("&amp;", "&");
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }
    if let Some((scheme, _)) = reference.split_once(':') {
        let is_scheme = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if is_scheme {
            let scheme = scheme.to_ascii_lowercase();
            return matches!(scheme.as_str(), "http" | "https").then_some(reference);
        }
    }
    match base.map(|b| b.join(&reference)) {
        Some(Ok(url)) => Some(url.into()),
        _ => Some(reference),
    }
}

fn data_url(data: &ResourceData) -> String {
    let mime = if data.mime_type.is_empty() {
        OCTET_STREAM
    } else {
        data.mime_type.as_str()
    };
    let charset = if data.text_encoding.is_empty() {
        String::new()
    } else {
        format!(";charset={}", data.text_encoding)
    };
    format!("data:{mime}{charset};base64,{}", STANDARD.encode(&data.content))
}

/// Insert `<base href="{base_url}/">` after `<head>` unless the document
/// already declares a base.
fn with_base_href(html: &[u8], base_url: &str) -> Vec<u8> {
    let lower = html.to_ascii_lowercase();
    if base_url.is_empty() || find_bytes(&lower, b"<base ").is_some() {
        return html.to_vec();
    }
    let Some(pos) = find_bytes(&lower, b"<head>") else {
        return html.to_vec();
    };
    let split = pos + b"<head>".len();
    let tag = format!("<base href=\"{}/\">", base_url.trim_end_matches('/'));
    let mut out = Vec::with_capacity(html.len() + tag.len());
    out.extend_from_slice(&html[..split]);
    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(&html[split..]);
    out
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .flat_map(|dir| executable_names(program).map(move |name| dir.join(name)))
        .find(|p| is_executable(p))
}

fn executable_names(program: &str) -> impl Iterator<Item = String> + '_ {
    let exts: &[&str] = if cfg!(windows) { &["", ".exe", ".bat", ".cmd"] } else { &[""] };
    exts.iter().map(move |ext| format!("{program}{ext}"))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
