//! Resource fetch shim: serve engine asset requests from the host over HTTP.
//!
//! While laying out a report the engine asks for every stylesheet, image and
//! font the HTML references. Those usually live on the host application
//! itself (`/web/assets/…`, `/web/content/…`, `/web/image/…`) and some sit
//! behind the user's session, so the shim:
//!
//! 1. resolves relative URLs against the host's base URL,
//! 2. forwards a session cookie, but only to the host itself or to its
//!    internal content route (third-party CDNs never see it),
//! 3. caches every answer for the lifetime of the fetcher (one render), and
//! 4. degrades every failure to an empty placeholder resource.
//!
//! The engine's callback is synchronous, so the shim uses reqwest's blocking
//! client. The renderer always runs engines inside
//! `tokio::task::spawn_blocking`, where blocking is allowed.

use crate::error::FetchError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Content type reported for empty placeholders.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Placeholder type for skipped fonts; engines accept an empty WOFF2 and
/// fall back to the next font in the stack.
pub const EMPTY_FONT_TYPE: &str = "font/woff2";

/// One fetched resource, as handed back to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceData {
    pub content: Vec<u8>,
    /// Content type without parameters (`text/css`, `image/png`…).
    pub mime_type: String,
    /// Text encoding for textual resources, empty for binary ones.
    pub text_encoding: String,
}

impl ResourceData {
    pub fn new(
        content: Vec<u8>,
        mime_type: impl Into<String>,
        text_encoding: impl Into<String>,
    ) -> Self {
        Self {
            content,
            mime_type: mime_type.into(),
            text_encoding: text_encoding.into(),
        }
    }

    /// An empty resource of the given type.
    pub fn empty(mime_type: impl Into<String>) -> Self {
        Self::new(Vec::new(), mime_type, "")
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// The engine-side callback for external resources.
///
/// `fetch_url` never fails: a resource that cannot be produced is returned
/// empty so one broken asset cannot fail the whole render.
pub trait ResourceFetcher: Send + Sync {
    fn fetch_url(&self, url: &str) -> ResourceData;
}

/// Knobs of [`HttpResourceFetcher`], usually derived from
/// [`crate::config::ReportConfig::fetch_options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Host base URL; relative asset URLs resolve against it.
    pub base_url: String,
    pub timeout: Duration,
    /// Hosts whose fonts the engine cannot use; answered with an empty font.
    pub skipped_font_hosts: Vec<String>,
    /// URL fragments that always get the session cookie.
    pub internal_content_routes: Vec<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            timeout: Duration::from_secs(6),
            skipped_font_hosts: vec!["fonts.odoocdn.com".to_string()],
            internal_content_routes: vec!["/web/content/".to_string()],
        }
    }
}

/// Fetches engine resources from the host over HTTP, with a per-instance cache.
pub struct HttpResourceFetcher {
    options: FetchOptions,
    base_url: String,
    cookie_header: Option<String>,
    cache: Mutex<HashMap<String, ResourceData>>,
    client: OnceLock<Option<Client>>,
}

impl HttpResourceFetcher {
    pub fn new(options: FetchOptions, cookie_header: Option<String>) -> Self {
        let base_url = options.base_url.trim_end_matches('/').to_string();
        Self {
            options,
            base_url,
            cookie_header,
            cache: Mutex::new(HashMap::new()),
            client: OnceLock::new(),
        }
    }

    /// Number of distinct URLs answered so far.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Absolute form of `url`: `http(s)://` and `data:` URLs are kept, anything
    /// else is joined onto the base URL with leading slashes stripped.
    pub fn resolve_url(&self, url: &str) -> String {
        if is_absolute(url) {
            return url.to_string();
        }
        let relative = url.trim_start_matches('/');
        Url::parse(&format!("{}/", self.base_url))
            .and_then(|base| base.join(relative))
            .map(String::from)
            .unwrap_or_else(|_| format!("{}/{}", self.base_url, relative))
    }

    /// Whether the session cookie may be sent along with `url`.
    pub fn forwards_cookie(&self, url: &str) -> bool {
        if self.cookie_header.is_none() {
            return false;
        }
        if self
            .options
            .internal_content_routes
            .iter()
            .any(|route| url.contains(route.as_str()))
        {
            return true;
        }
        match (Url::parse(&self.base_url), Url::parse(url)) {
            (Ok(base), Ok(target)) => {
                base.host_str().is_some()
                    && base.host_str() == target.host_str()
                    && base.port_or_known_default() == target.port_or_known_default()
            }
            _ => false,
        }
    }

    fn is_skipped_font(&self, url: &str) -> bool {
        let low = url.to_ascii_lowercase();
        low.ends_with(".eot")
            || self
                .options
                .skipped_font_hosts
                .iter()
                .any(|host| low.contains(&host.to_ascii_lowercase()))
    }

    fn client(&self) -> Option<&Client> {
        self.client
            .get_or_init(|| {
                Client::builder()
                    .timeout(self.options.timeout)
                    .build()
                    .map_err(|e| warn!("Cannot build HTTP client for report assets: {}", e))
                    .ok()
            })
            .as_ref()
    }

    fn fetch_uncached(&self, url: &str) -> ResourceData {
        if self.is_skipped_font(url) {
            debug!("Skipping unsupported font {}", url);
            return ResourceData::empty(EMPTY_FONT_TYPE);
        }

        if url.starts_with("data:") {
            return decode_data_url(url).unwrap_or_else(|e| {
                warn!("Asset placeholder: {}", e);
                ResourceData::empty(OCTET_STREAM)
            });
        }

        match self.download(url) {
            Ok(data) => data,
            Err(FetchError::Status { status: 404, .. }) => {
                debug!("Asset not found: {}", url);
                ResourceData::empty(OCTET_STREAM)
            }
            Err(e) => {
                warn!("Asset placeholder: {}", e);
                ResourceData::empty(OCTET_STREAM)
            }
        }
    }

    fn download(&self, url: &str) -> Result<ResourceData, FetchError> {
        let transport = |detail: String| FetchError::Transport {
            url: url.to_string(),
            detail,
        };
        let client = self
            .client()
            .ok_or_else(|| transport("HTTP client unavailable".into()))?;

        let mut request = client.get(url);
        if self.forwards_cookie(url) {
            if let Some(cookie) = &self.cookie_header {
                request = request.header(COOKIE, cookie);
            }
        }

        let response = request.send().map_err(|e| transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(OCTET_STREAM)
            .to_string();
        let (mime_type, charset) = split_content_type(&content_type);
        let encoding = if is_textual(&mime_type) {
            charset.unwrap_or_else(|| "utf-8".to_string())
        } else {
            String::new()
        };

        let body = response.bytes().map_err(|e| transport(e.to_string()))?;
        debug!("Fetched {} ({}, {} bytes)", url, mime_type, body.len());
        Ok(ResourceData::new(body.to_vec(), mime_type, encoding))
    }
}

impl ResourceFetcher for HttpResourceFetcher {
    fn fetch_url(&self, url: &str) -> ResourceData {
        let url = self.resolve_url(url);

        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&url) {
                return hit.clone();
            }
        }

        let data = self.fetch_uncached(&url);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url, data.clone());
        }
        data
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:")
}

fn is_textual(mime_type: &str) -> bool {
    mime_type.starts_with("text/") || mime_type == "application/xml" || mime_type == "image/svg+xml"
}

/// `text/css; charset=ISO-8859-1` → (`text/css`, `Some("ISO-8859-1")`).
fn split_content_type(value: &str) -> (String, Option<String>) {
    let mut parts = value.split(';');
    let mime = parts.next().unwrap_or("").trim().to_ascii_lowercase();
    let mime = if mime.is_empty() {
        OCTET_STREAM.to_string()
    } else {
        mime
    };
    let charset = parts.find_map(|p| {
        let (k, v) = p.split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| v.trim().trim_matches('"').to_string())
    });
    (mime, charset)
}

/// Decode an RFC 2397 `data:` URL.
pub fn decode_data_url(url: &str) -> Result<ResourceData, FetchError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| FetchError::DataUrl("missing data: scheme".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::DataUrl("missing ',' separator".into()))?;

    let mut params = meta.split(';');
    let mime = params.next().unwrap_or("").trim();
    let mut base64 = false;
    let mut charset = None;
    for p in params {
        if p.eq_ignore_ascii_case("base64") {
            base64 = true;
        } else if let Some((k, v)) = p.split_once('=') {
            if k.trim().eq_ignore_ascii_case("charset") {
                charset = Some(v.trim().to_string());
            }
        }
    }
    let mime = if mime.is_empty() {
        "text/plain".to_string()
    } else {
        mime.to_ascii_lowercase()
    };

    let content = if base64 {
        let compact: String = percent_decode(payload)
            .into_iter()
            .map(char::from)
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| FetchError::DataUrl(e.to_string()))?
    } else {
        percent_decode(payload)
    };

    let encoding = if is_textual(&mime) {
        charset.unwrap_or_else(|| "utf-8".to_string())
    } else {
        String::new()
    };
    Ok(ResourceData::new(content, mime, encoding))
}

fn percent_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(cookie: Option<&str>) -> HttpResourceFetcher {
        HttpResourceFetcher::new(
            FetchOptions {
                base_url: "http://erp.example.com:8069/".into(),
                ..FetchOptions::default()
            },
            cookie.map(str::to_string),
        )
    }

    #[test]
    fn relative_urls_resolve_against_base() {
        let f = fetcher(None);
        assert_eq!(
            f.resolve_url("/web/image/42"),
            "http://erp.example.com:8069/web/image/42"
        );
        assert_eq!(
            f.resolve_url("web/assets/report.css"),
            "http://erp.example.com:8069/web/assets/report.css"
        );
        assert_eq!(f.resolve_url("https://cdn.example.org/x.png"), "https://cdn.example.org/x.png");
        assert_eq!(f.resolve_url("data:,hi"), "data:,hi");
    }

    #[test]
    fn cookie_only_for_same_host_or_content_route() {
        let f = fetcher(Some("session_id=abc"));
        assert!(f.forwards_cookie("http://erp.example.com:8069/web/assets/a.css"));
        assert!(!f.forwards_cookie("http://erp.example.com:9000/web/assets/a.css"));
        assert!(!f.forwards_cookie("https://cdn.example.org/font.woff2"));
        assert!(f.forwards_cookie("https://mirror.example.org/web/content/12"));
    }

    #[test]
    fn no_cookie_configured_means_no_forwarding() {
        let f = fetcher(None);
        assert!(!f.forwards_cookie("http://erp.example.com:8069/web/content/1"));
    }

    #[test]
    fn eot_and_cdn_fonts_are_empty_woff2() {
        let f = fetcher(None);
        let eot = f.fetch_url("/fonts/Lato.EOT");
        assert!(eot.is_empty());
        assert_eq!(eot.mime_type, EMPTY_FONT_TYPE);

        let cdn = f.fetch_url("https://fonts.odoocdn.com/fonts/noto/x.woff2");
        assert_eq!(cdn.mime_type, EMPTY_FONT_TYPE);
        assert_eq!(f.cached_len(), 2);
    }

    #[test]
    fn data_url_base64() {
        let data = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(data.content, b"hello");
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(data.text_encoding, "");
    }

    #[test]
    fn data_url_percent_encoded_text() {
        let data = decode_data_url("data:text/css;charset=latin1,a%7Bcolor%3Ared%7D").unwrap();
        assert_eq!(data.content, b"a{color:red}");
        assert_eq!(data.mime_type, "text/css");
        assert_eq!(data.text_encoding, "latin1");
    }

    #[test]
    fn data_url_defaults_to_text_plain() {
        let data = decode_data_url("data:,hi").unwrap();
        assert_eq!(data.mime_type, "text/plain");
        assert_eq!(data.text_encoding, "utf-8");
    }

    #[test]
    fn broken_data_url_is_an_empty_placeholder() {
        let f = fetcher(None);
        let data = f.fetch_url("data:image/png;base64");
        assert!(data.is_empty());
        assert_eq!(data.mime_type, OCTET_STREAM);
    }

    #[test]
    fn content_type_parameters_are_split() {
        assert_eq!(
            split_content_type("text/css; charset=\"ISO-8859-1\""),
            ("text/css".to_string(), Some("ISO-8859-1".to_string()))
        );
        assert_eq!(split_content_type("image/png"), ("image/png".to_string(), None));
        assert_eq!(split_content_type(""), (OCTET_STREAM.to_string(), None));
    }

    #[test]
    fn percent_decode_keeps_invalid_sequences() {
        assert_eq!(percent_decode("100%"), b"100%");
        assert_eq!(percent_decode("%zz%41"), b"%zzA");
    }
}
