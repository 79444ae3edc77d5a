//! Configuration for report rendering.
//!
//! Every knob lives in [`ReportConfig`], built via [`ReportConfigBuilder`].
//! The host-specific parts (which report, which records) are call arguments;
//! the config only holds what stays the same across calls: where assets are
//! fetched from, which engine renders, and how the batch is processed.

use crate::engine::RenderEngine;
use crate::error::ReportError;
use crate::fetch::FetchOptions;
use crate::paper::CssProfile;
use crate::progress::ProgressCallback;
use reqwest::Url;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable overriding [`ReportConfig::base_url`].
pub const ENV_BASE_URL: &str = "REPORT_PDF_BASE_URL";
/// Environment variable overriding [`ReportConfig::fetch_timeout_secs`].
pub const ENV_FETCH_TIMEOUT: &str = "REPORT_PDF_FETCH_TIMEOUT";
/// Environment variable enabling [`ReportConfig::test_mode`].
pub const ENV_TEST_MODE: &str = "REPORT_PDF_TEST_MODE";
/// Environment variable enabling [`ReportConfig::force_rendering`].
pub const ENV_FORCE_RENDERING: &str = "REPORT_PDF_FORCE_RENDERING";

/// Configuration for a [`crate::report::ReportRenderer`].
///
/// # Example
/// ```rust
/// use report_pdf::ReportConfig;
///
/// let config = ReportConfig::builder()
///     .base_url("https://erp.example.com")
///     .fetch_timeout_secs(10)
///     .landscape(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.landscape, Some(true));
/// ```
#[derive(Clone)]
pub struct ReportConfig {
    /// Host base URL; relative asset URLs and the engine's document base
    /// resolve against it. Default: `http://localhost`.
    pub base_url: String,

    /// Per-asset HTTP timeout in seconds. Default: 6.
    pub fetch_timeout_secs: u64,

    /// The rendering engine. `None` makes every PDF render fail with
    /// [`ReportError::EngineUnavailable`].
    pub engine: Option<Arc<dyn RenderEngine>>,

    /// Test mode: [`crate::report::ReportRenderer::pre_render`] returns the
    /// HTML instead of rendering PDFs. Default: false.
    pub test_mode: bool,

    /// Render PDFs even in test mode. Default: false.
    pub force_rendering: bool,

    /// Ignore stored attachments: neither reuse them nor check the template's
    /// record markers. Default: false.
    pub skip_attachments: bool,

    /// Orientation override; `None` lets the template decide.
    pub landscape: Option<bool>,

    /// Stylesheet template. Default: [`CssProfile::Standard`].
    pub css_profile: CssProfile,

    /// Number of documents rendered at once. Default: 1.
    pub render_concurrency: usize,

    /// Hosts whose web fonts are replaced by an empty font.
    pub skipped_font_hosts: Vec<String>,

    /// URL fragments that always receive the session cookie.
    pub internal_content_routes: Vec<String>,

    /// Optional per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let fetch = FetchOptions::default();
        Self {
            base_url: fetch.base_url,
            fetch_timeout_secs: fetch.timeout.as_secs(),
            engine: None,
            test_mode: false,
            force_rendering: false,
            skip_attachments: false,
            landscape: None,
            css_profile: CssProfile::default(),
            render_concurrency: 1,
            skipped_font_hosts: fetch.skipped_font_hosts,
            internal_content_routes: fetch.internal_content_routes,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfig")
            .field("base_url", &self.base_url)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .field("test_mode", &self.test_mode)
            .field("force_rendering", &self.force_rendering)
            .field("skip_attachments", &self.skip_attachments)
            .field("landscape", &self.landscape)
            .field("css_profile", &self.css_profile)
            .field("render_concurrency", &self.render_concurrency)
            .field("skipped_font_hosts", &self.skipped_font_hosts)
            .field("internal_content_routes", &self.internal_content_routes)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RenderProgressCallback>"),
            )
            .finish()
    }
}

impl ReportConfig {
    /// Create a new builder for `ReportConfig`.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Options for the asset fetcher of one render.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            skipped_font_hosts: self.skipped_font_hosts.clone(),
            internal_content_routes: self.internal_content_routes.clone(),
        }
    }

    /// Whether PDFs are produced, or test mode short-circuits to HTML.
    pub fn renders_pdf(&self) -> bool {
        !self.test_mode || self.force_rendering
    }
}

/// Builder for [`ReportConfig`].
#[derive(Debug)]
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl ReportConfigBuilder {
    /// Start from the defaults overridden by `REPORT_PDF_*` environment
    /// variables. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut builder = ReportConfig::builder();
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                builder = builder.base_url(url.trim());
            }
        }
        if let Some(secs) = std::env::var(ENV_FETCH_TIMEOUT)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            builder = builder.fetch_timeout_secs(secs);
        }
        if let Some(v) = env_flag(ENV_TEST_MODE) {
            builder = builder.test_mode(v);
        }
        if let Some(v) = env_flag(ENV_FORCE_RENDERING) {
            builder = builder.force_rendering(v);
        }
        builder
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn test_mode(mut self, v: bool) -> Self {
        self.config.test_mode = v;
        self
    }

    pub fn force_rendering(mut self, v: bool) -> Self {
        self.config.force_rendering = v;
        self
    }

    pub fn skip_attachments(mut self, v: bool) -> Self {
        self.config.skip_attachments = v;
        self
    }

    pub fn landscape(mut self, v: bool) -> Self {
        self.config.landscape = Some(v);
        self
    }

    pub fn css_profile(mut self, profile: CssProfile) -> Self {
        self.config.css_profile = profile;
        self
    }

    pub fn render_concurrency(mut self, n: usize) -> Self {
        self.config.render_concurrency = n;
        self
    }

    pub fn skipped_font_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.skipped_font_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn internal_content_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.internal_content_routes = routes.into_iter().map(Into::into).collect();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReportConfig, ReportError> {
        let c = &self.config;
        match Url::parse(&c.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ReportError::InvalidConfig(format!(
                    "base URL must be http(s), got scheme '{}'",
                    url.scheme()
                )))
            }
            Err(e) => {
                return Err(ReportError::InvalidConfig(format!(
                    "invalid base URL '{}': {e}",
                    c.base_url
                )))
            }
        }
        if c.fetch_timeout_secs == 0 {
            return Err(ReportError::InvalidConfig(
                "Fetch timeout must be ≥ 1 second".into(),
            ));
        }
        if c.render_concurrency == 0 {
            return Err(ReportError::InvalidConfig(
                "Render concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

fn env_flag(name: &str) -> Option<bool> {
    match std::env::var(name).ok()?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
