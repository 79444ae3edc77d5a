//! CLI binary for report-pdf.
//!
//! A thin shim over the library crate: renders report HTML saved to disk,
//! merges PDFs, prints paper CSS and probes the asset fetcher.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use report_pdf::{
    merge_streams, split_report_html, CommandEngine, CssProfile, FetchOptions,
    HttpResourceFetcher, PaperFormat, PreRendered, ProgressCallback, RecordId, RenderData,
    RenderEngine, RenderProgressCallback, ReportConfig, ReportConfigBuilder, ReportDefinition,
    ReportError, ReportHost, ReportRenderer, ResourceFetcher, SpecificArgs, StreamKey,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per document.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading report…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, position: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&position))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, documents: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(documents as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
    }

    fn on_record_reused(&self, id: RecordId) {
        self.bar.println(format!(
            "  {} Record {:<6} {}",
            cyan("↺"),
            id,
            dim("stored attachment")
        ));
    }

    fn on_document_start(&self, position: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(position, Instant::now());
        }
        self.bar.set_message(format!("document {position}"));
    }

    fn on_document_complete(&self, position: usize, total: usize, pdf_len: usize) {
        let secs = self.elapsed_secs(position);
        self.bar.println(format!(
            "  {} Document {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            position,
            total,
            dim(&format!("{pdf_len:>8} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, position: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(position);
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Document {:>3}/{:<3}  {}  {}",
            red("✗"),
            position,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, documents: usize, merged: bool) {
        self.bar.finish_and_clear();
        if self.errors.load(Ordering::SeqCst) == 0 {
            eprintln!(
                "{} {} document(s) rendered{}",
                green("✔"),
                bold(&documents.to_string()),
                if merged { ", merged into one PDF" } else { "" }
            );
        }
    }
}

// ── Host backed by a rendered report saved on disk ───────────────────────────

/// A [`ReportHost`] serving one HTML file and a fixed paper format.
struct FileHost {
    html: Vec<u8>,
    model: String,
    paper: PaperFormat,
    cookie: Option<String>,
}

impl ReportHost for FileHost {
    fn report(&self, report_ref: &str) -> Result<ReportDefinition, ReportError> {
        Ok(ReportDefinition::new(report_ref, &self.model))
    }

    fn render_html(
        &self,
        _report: &ReportDefinition,
        _ids: &[RecordId],
        _data: &RenderData,
    ) -> Result<Vec<u8>, ReportError> {
        Ok(self.html.clone())
    }

    fn paper_format(&self, _report: &ReportDefinition) -> PaperFormat {
        self.paper.clone()
    }

    fn asset_session_cookie(&self) -> Result<Option<String>, ReportError> {
        Ok(self.cookie.clone())
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render every article of a saved report, one PDF per record
  report2pdf render invoice.html --out-dir out/

  # Render as a single document, landscape Letter
  report2pdf render invoice.html --ids 7,7 --format Letter --landscape

  # Use a different engine program
  report2pdf render report.html --engine /usr/local/bin/plutoprint

  # Concatenate PDFs
  report2pdf merge a.pdf b.pdf -o both.pdf

  # Show the stylesheet injected for a paper format
  report2pdf css --format A4 --margin-top 40 --header-spacing 35

  # Fetch an asset the way the engine would
  report2pdf fetch /web/image/res.company/1/logo --base-url http://localhost:8069 \
      --cookie "session_id=abc"

ENVIRONMENT VARIABLES:
  REPORT_PDF_BASE_URL         Host base URL for relative assets
  REPORT_PDF_FETCH_TIMEOUT    Per-asset timeout in seconds
  REPORT_PDF_TEST_MODE        Return the HTML instead of rendering
  REPORT_PDF_FORCE_RENDERING  Render even in test mode
  REPORT_PDF_ENGINE           Engine program (default: plutoprint on PATH)
  RUST_LOG                    Log filter (overrides -v / -q)
"#;

/// Render host report HTML to PDF streams.
#[derive(Parser, Debug)]
#[command(
    name = "report2pdf",
    version,
    about = "Render report HTML to per-record PDF streams",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "REPORT_PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "REPORT_PDF_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a saved report HTML file.
    Render(RenderArgs),
    /// Concatenate PDF files in order.
    Merge {
        /// Input PDF files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output file.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the stylesheet injected for a paper format.
    Css {
        #[command(flatten)]
        paper: PaperArgs,
    },
    /// Fetch one resource through the asset fetcher.
    Fetch {
        /// Absolute URL, host-relative path or data: URL.
        url: String,
        #[arg(long, env = "REPORT_PDF_BASE_URL", default_value = "http://localhost")]
        base_url: String,
        /// `Cookie` header forwarded to the host.
        #[arg(long)]
        cookie: Option<String>,
        /// Per-request timeout in seconds.
        #[arg(long, env = "REPORT_PDF_FETCH_TIMEOUT", default_value_t = 6)]
        timeout: u64,
        /// Write the content here instead of printing a summary only.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Report HTML as rendered by the host.
    input: PathBuf,

    /// Record ids, comma separated. Default: the `data-oe-id` of each article.
    #[arg(long, value_delimiter = ',')]
    ids: Vec<RecordId>,

    /// Report name used in logs and file names. Default: the input file stem.
    #[arg(long)]
    report: Option<String>,

    /// Model the records belong to.
    #[arg(long, default_value = "report.record")]
    model: String,

    #[command(flatten)]
    paper: PaperArgs,

    /// Directory the PDFs are written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Engine program; the placeholders {input}, {output} and {base_url}
    /// are expanded in --engine-arg.
    #[arg(long, env = "REPORT_PDF_ENGINE")]
    engine: Option<PathBuf>,

    /// Engine argument template (repeatable). Default: `{input} {output}`.
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Host base URL for relative assets.
    #[arg(long)]
    base_url: Option<String>,

    /// `Cookie` header forwarded with asset requests.
    #[arg(long)]
    cookie: Option<String>,

    /// Let the engine program fetch assets itself (no cookie, no placeholders)
    /// instead of inlining them as data: URLs.
    #[arg(long)]
    no_inline_assets: bool,

    /// Documents rendered at once.
    #[arg(short, long, default_value_t = 1)]
    concurrency: usize,

    /// Write the HTML the renderer would send instead of rendering.
    #[arg(long)]
    test_mode: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct PaperArgs {
    /// Named paper format (A4, Letter…); ignored with --width/--height.
    #[arg(long, default_value = "A4")]
    format: String,

    /// Custom page width in mm.
    #[arg(long, requires = "height")]
    width: Option<f64>,

    /// Custom page height in mm.
    #[arg(long, requires = "width")]
    height: Option<f64>,

    /// Paper format as JSON (overrides the other paper flags).
    #[arg(long)]
    paper_json: Option<PathBuf>,

    #[arg(long)]
    margin_top: Option<f64>,
    #[arg(long)]
    margin_bottom: Option<f64>,
    #[arg(long)]
    margin_left: Option<f64>,
    #[arg(long)]
    margin_right: Option<f64>,
    #[arg(long)]
    header_spacing: Option<f64>,

    /// Force landscape orientation.
    #[arg(long)]
    landscape: bool,

    /// Stylesheet template.
    #[arg(long, value_enum, default_value = "standard")]
    profile: ProfileArg,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ProfileArg {
    Standard,
    HeaderFixups,
}

impl From<ProfileArg> for CssProfile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Standard => CssProfile::Standard,
            ProfileArg::HeaderFixups => CssProfile::HeaderFixups,
        }
    }
}

impl PaperArgs {
    fn paper_format(&self) -> Result<PaperFormat> {
        if let Some(ref path) = self.paper_json {
            let raw = std::fs::read(path)
                .with_context(|| format!("Failed to read paper format from {:?}", path))?;
            return serde_json::from_slice(&raw)
                .with_context(|| format!("Invalid paper format JSON in {:?}", path));
        }
        let mut paper = match (self.width, self.height) {
            (Some(w), Some(h)) => PaperFormat::custom(w, h),
            _ => PaperFormat::named(&self.format),
        };
        if let Some(v) = self.margin_top {
            paper.margin_top = v;
        }
        if let Some(v) = self.margin_bottom {
            paper.margin_bottom = v;
        }
        if let Some(v) = self.margin_left {
            paper.margin_left = v;
        }
        if let Some(v) = self.margin_right {
            paper.margin_right = v;
        }
        if self.header_spacing.is_some() {
            paper.header_spacing = self.header_spacing;
        }
        Ok(paper)
    }

    fn landscape(&self) -> Option<bool> {
        self.landscape.then_some(true)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Render(ref args) => run_render(args, cli.quiet).await,
        Command::Merge {
            ref inputs,
            ref output,
        } => run_merge(inputs, output, cli.quiet),
        Command::Css { ref paper } => {
            let css = paper.paper_format()?.to_css(
                &SpecificArgs::new(),
                paper.landscape(),
                paper.profile.into(),
            );
            println!("{}", css.trim());
            Ok(())
        }
        Command::Fetch {
            ref url,
            ref base_url,
            ref cookie,
            timeout,
            ref output,
        } => run_fetch(url, base_url, cookie.clone(), timeout, output.as_deref(), cli.quiet).await,
    }
}

async fn run_render(args: &RenderArgs, quiet: bool) -> Result<()> {
    let html = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {:?}", args.input))?;
    let stem = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let report_ref = args.report.clone().unwrap_or_else(|| stem.clone());

    let ids = if args.ids.is_empty() {
        split_report_html(&html)
            .context("Failed to read record ids from the report")?
            .known_ids()
    } else {
        args.ids.clone()
    };

    let show_progress = !quiet && !args.no_progress && !args.test_mode;
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RenderProgressCallback>)
    } else {
        None
    };

    let host = Arc::new(FileHost {
        html,
        model: args.model.clone(),
        paper: args.paper.paper_format()?,
        cookie: args.cookie.clone(),
    });
    let config = build_config(args, progress)?;
    let renderer = ReportRenderer::new(host, config);

    let result = renderer
        .pre_render(&report_ref, &ids, RenderData::default())
        .await
        .context("Rendering failed")?;

    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", args.out_dir))?;

    match result {
        PreRendered::Html(html) => {
            let path = args.out_dir.join(format!("{stem}.html"));
            write_file(&path, &html).await?;
            if !quiet {
                eprintln!("{} test mode  →  {}", cyan("◆"), bold(&path.display().to_string()));
            }
        }
        PreRendered::Pdf(streams) => {
            for (key, stream) in streams {
                let Some(pdf) = stream.stream else { continue };
                let name = match key {
                    StreamKey::Record(id) => format!("{stem}-{id}.pdf"),
                    StreamKey::Merged => format!("{stem}.pdf"),
                };
                let path = args.out_dir.join(name);
                write_file(&path, &pdf).await?;
                if !quiet {
                    eprintln!(
                        "  {}  {}",
                        bold(&path.display().to_string()),
                        dim(&format!("{} bytes", pdf.len()))
                    );
                }
            }
        }
    }
    Ok(())
}

/// Map CLI args to `ReportConfig`.
fn build_config(args: &RenderArgs, progress: Option<ProgressCallback>) -> Result<ReportConfig> {
    let mut builder: ReportConfigBuilder = ReportConfigBuilder::from_env()
        .render_concurrency(args.concurrency)
        .css_profile(args.paper.profile.into());
    if let Some(ref url) = args.base_url {
        builder = builder.base_url(url.as_str());
    }
    if args.test_mode {
        builder = builder.test_mode(true);
    }
    if args.paper.landscape {
        builder = builder.landscape(true);
    }
    if let Some(engine) = resolve_engine(args) {
        builder = builder.engine(engine);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// The configured engine program, or the default one found on `PATH`.
fn resolve_engine(args: &RenderArgs) -> Option<Arc<dyn RenderEngine>> {
    let mut engine = match args.engine {
        Some(ref path) => CommandEngine::new(path),
        None => CommandEngine::locate(CommandEngine::DEFAULT_PROGRAM)?,
    };
    if !args.engine_args.is_empty() {
        engine = engine.with_args(args.engine_args.iter().cloned());
    }
    Some(Arc::new(engine.with_inline_assets(!args.no_inline_assets)))
}

fn run_merge(inputs: &[PathBuf], output: &Path, quiet: bool) -> Result<()> {
    let streams = inputs
        .iter()
        .map(|p| std::fs::read(p).with_context(|| format!("Failed to read {:?}", p)))
        .collect::<Result<Vec<_>>>()?;
    let merged = merge_streams(&streams).context("Merge failed")?;
    std::fs::write(output, &merged).with_context(|| format!("Failed to write {:?}", output))?;
    if !quiet {
        eprintln!(
            "{} {} file(s)  →  {}",
            green("✔"),
            inputs.len(),
            bold(&output.display().to_string())
        );
    }
    Ok(())
}

async fn run_fetch(
    url: &str,
    base_url: &str,
    cookie: Option<String>,
    timeout: u64,
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let options = FetchOptions {
        base_url: base_url.trim_end_matches('/').to_string(),
        timeout: Duration::from_secs(timeout.max(1)),
        ..FetchOptions::default()
    };
    let url_owned = url.to_string();
    let data = tokio::task::spawn_blocking(move || {
        HttpResourceFetcher::new(options, cookie).fetch_url(&url_owned)
    })
    .await
    .context("Fetch task failed")?;

    if let Some(path) = output {
        std::fs::write(path, &data.content)
            .with_context(|| format!("Failed to write {:?}", path))?;
    }
    if !quiet {
        let mark = if data.is_empty() { red("✗") } else { green("✓") };
        let mut out = io::stdout().lock();
        writeln!(
            out,
            "{} {}  {}  {}  {}",
            mark,
            url,
            data.mime_type,
            if data.text_encoding.is_empty() {
                dim("-")
            } else {
                data.text_encoding.clone()
            },
            dim(&format!("{} bytes", data.content.len()))
        )
        .context("Failed to write to stdout")?;
    }
    Ok(())
}

/// Write via a temp file + rename so partial PDFs never appear.
async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", tmp))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move {:?} to {:?}", tmp, path))?;
    Ok(())
}
