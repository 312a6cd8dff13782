//! CLI binary for manga-bundler.
//!
//! A thin shim over the library crate: `serve` runs the HTTP endpoints,
//! `pdf` and `zip` bundle a URL list straight to a file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use manga_bundler::server::DEFAULT_BODY_LIMIT;
use manga_bundler::{
    bundle, bundle_to_file, serve, BatchProgressCallback, BundleConfig, BundleMode, BundleOutput,
    ProgressCallback, ServerConfig,
};
use std::collections::HashMap;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per image. Images may finish out of
/// order in ZIP mode.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Fetching");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, image_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&image_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_images: usize) {
        self.bar.set_length(total_images as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Fetching {total_images} images…"))
        ));
    }

    fn on_image_start(&self, image_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(image_num, Instant::now());
        }
        self.bar.set_message(format!("image {image_num}"));
    }

    fn on_image_complete(&self, image_num: usize, total: usize, bytes: usize) {
        let secs = self.elapsed_secs(image_num);
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            image_num,
            total,
            dim(&format!("{:>6} KB", bytes / 1024)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, image_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(image_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}  {}",
            red("✗"),
            image_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_images: usize, successful: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} images fetched",
                green("✔"),
                bold(&successful.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images usable  ({} failed)",
                if successful == 0 { red("✘") } else { cyan("⚠") },
                bold(&successful.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the HTTP endpoints on port 8080
  manga-bundler serve --bind 0.0.0.0:8080

  # One page per image, written to manga_<n>_pages.pdf
  manga-bundler pdf https://example.com/001.png https://example.com/002.jpg

  # URLs from a file (one per line, '#' comments allowed), custom output
  manga-bundler zip --input chapter-12.txt -o chapter-12.zip

  # URLs from stdin
  cat urls.txt | manga-bundler pdf --input - -o out.pdf

HTTP ENDPOINTS:
  POST /api/download-pdf   {"urls": [...]}   → application/pdf
  POST /api/download-zip   {"urls": [...]}   → application/zip

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH              Path to libpdfium (otherwise the system library)
  MANGA_BUNDLER_BIND           Listen address for `serve`
  MANGA_BUNDLER_RETRY_DELAY_MS Pause between attempts
  MANGA_BUNDLER_TIMEOUT        Per-image request timeout in seconds
  RUST_LOG                     Overrides the log filter
"#;

/// Bundle remote images into a PDF or ZIP.
#[derive(Parser, Debug)]
#[command(
    name = "manga-bundler",
    version,
    about = "Bundle remote images into a page-per-image PDF or a ZIP archive",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MANGA_BUNDLER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MANGA_BUNDLER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP endpoints.
    Serve(ServeArgs),
    /// Build a PDF with one page per image.
    Pdf(BundleArgs),
    /// Build a ZIP of the raw downloads.
    Zip(BundleArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "MANGA_BUNDLER_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Maximum request body size in bytes.
    #[arg(long, env = "MANGA_BUNDLER_BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    body_limit: usize,

    #[command(flatten)]
    fetch: FetchArgs,
}

#[derive(Args, Debug)]
struct BundleArgs {
    /// Image URLs, in page order.
    urls: Vec<String>,

    /// Read URLs from this file, one per line. `-` reads stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file. Defaults to manga_<n>_pages.pdf / manga_<n>_images.zip.
    #[arg(short, long, env = "MANGA_BUNDLER_OUTPUT")]
    output: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "MANGA_BUNDLER_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    fetch: FetchArgs,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Attempts per image when building a PDF.
    #[arg(long, env = "MANGA_BUNDLER_PDF_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    pdf_attempts: u32,

    /// Attempts per image when building a ZIP.
    #[arg(long, env = "MANGA_BUNDLER_ZIP_ATTEMPTS", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..))]
    zip_attempts: u32,

    /// Pause between attempts in milliseconds.
    #[arg(long, env = "MANGA_BUNDLER_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Per-image request timeout in seconds. No timeout when unset.
    #[arg(long, env = "MANGA_BUNDLER_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// User-Agent sent with every image request.
    #[arg(long, env = "MANGA_BUNDLER_USER_AGENT")]
    user_agent: Option<String>,

    /// ZIP DEFLATE level (0–9).
    #[arg(long, env = "MANGA_BUNDLER_COMPRESSION", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(0..=9))]
    compression: u8,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for one-shot bundling; the server
    // has no bar and logs at INFO.
    let show_progress = match &cli.command {
        Command::Pdf(args) | Command::Zip(args) => !cli.quiet && !args.no_progress,
        Command::Serve(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => {
            let config = build_config(&args.fetch, None)?;
            let server = ServerConfig {
                bind: args.bind,
                body_limit: args.body_limit,
            };
            serve(server, config).await.context("Server failed")?;
        }
        Command::Pdf(args) => run_bundle(BundleMode::Pdf, args, show_progress, cli.quiet).await?,
        Command::Zip(args) => run_bundle(BundleMode::Zip, args, show_progress, cli.quiet).await?,
    }
    Ok(())
}

async fn run_bundle(mode: BundleMode, args: BundleArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let urls = collect_urls(&args)?;
    if urls.is_empty() {
        anyhow::bail!("No URLs given. Pass them as arguments or via --input.");
    }

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&args.fetch, progress)?;

    let (output, path) = match args.output {
        Some(path) => {
            let output = bundle_to_file(mode, urls, &path, &config)
                .await
                .context("Bundling failed")?;
            (output, path)
        }
        None => {
            let output = bundle(mode, urls, &config).await.context("Bundling failed")?;
            let path = PathBuf::from(mode.filename(output.summary.successful));
            tokio::fs::write(&path, &output.bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            (output, path)
        }
    };

    if !quiet {
        print_summary(&output, &path);
    }
    Ok(())
}

fn print_summary(output: &BundleOutput, path: &Path) {
    let s = output.summary;
    eprintln!(
        "{}  {}/{} images  {}ms  →  {}",
        if s.failed == 0 { green("✔") } else { cyan("⚠") },
        s.successful,
        s.total(),
        output.total_duration_ms,
        bold(&path.display().to_string()),
    );
    if output.mode == BundleMode::Pdf && s.webp_skipped > 0 {
        eprintln!(
            "   {} WebP images skipped; use `zip` to keep them",
            dim(&s.webp_skipped.to_string())
        );
    }
}

/// URLs from positional args first, then from `--input`.
fn collect_urls(args: &BundleArgs) -> Result<Vec<String>> {
    let mut urls = args.urls.clone();
    if let Some(input) = &args.input {
        let text = if input.as_os_str() == "-" {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read URLs from stdin")?;
            buf
        } else {
            std::fs::read_to_string(input)
                .with_context(|| format!("Failed to read URL list from {:?}", input))?
        };
        urls.extend(parse_url_list(&text));
    }
    Ok(urls)
}

/// One URL per line; blank lines and `#` comments are skipped.
fn parse_url_list(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
}

/// Map CLI args to `BundleConfig`.
fn build_config(args: &FetchArgs, progress: Option<ProgressCallback>) -> Result<BundleConfig> {
    let mut builder = BundleConfig::builder()
        .document_max_attempts(args.pdf_attempts)
        .archive_max_attempts(args.zip_attempts)
        .retry_delay_ms(args.retry_delay_ms)
        .compression_level(args.compression);

    if let Some(secs) = args.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(ua) = &args.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    if let Some(path) = &args.pdfium_lib_path {
        builder = builder.pdfium_library_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
