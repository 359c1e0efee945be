//! CLI binary for pdf2txt.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ExtractionConfig` / `ApiConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use pdf2txt::{
    write_output, ApiConfig, ExtractionConfig, ExtractionProgress, Extractor, ProgressCallback,
    RunState,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per page. Pages may finish out of
/// order when `--concurrency` is above 1.
struct CliProgress {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Checking PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgress for CliProgress {
    fn on_state(&self, state: &RunState) {
        match state {
            RunState::Rasterizing => self.bar.set_message("Rendering pages…"),
            RunState::Assembling => self.bar.set_message("Assembling text…"),
            RunState::Failed { .. } => self.bar.finish_and_clear(),
            _ => {}
        }
    }

    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting text from {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar
            .set_message(format!("Processing page {page_num} of {total_pages}..."));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages extracted  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract to stdout
  pdf2txt scan.pdf

  # Save next to the working directory as scan.pdf_extracted.txt
  pdf2txt scan.pdf --save

  # Write to a chosen file, failing if any page could not be read
  pdf2txt scan.pdf -o scan.txt --strict

  # Check the API key and endpoint first
  pdf2txt --verify scan.pdf

  # Another OpenAI-compatible gateway and model
  pdf2txt --base-url http://localhost:8000/v1 --model Qwen/Qwen2-VL-7B-Instruct scan.pdf

  # Where is pdfium being looked for?
  pdf2txt --probe-pdfium

OUTPUT FORMAT:
  One block per page, in page order:

    === Page 1 ===
    <text>

  Pages that could not be extracted carry an "[ERROR] ..." line instead.

ENVIRONMENT VARIABLES:
  DEEPINFRA_API_KEY       API key for the extraction endpoint (required)
  MODEL_NAME              Vision model (default meta-llama/Llama-3.2-11B-Vision-Instruct)
  API_BASE_URL            OpenAI-compatible API root (default DeepInfra)
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  PDFIUM_PROBE_CACHE_DIR  Override the per-user pdfium directory
  RUST_LOG                Override the log filter

  A .env file in the working directory is read before flags are parsed.
"#;

/// Extract plain text from PDF files with a vision language model.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2txt",
    version,
    about = "Extract plain text from PDF files with a vision language model",
    long_about = "Render each page of a PDF to an image and have a vision language model \
transcribe it exactly. Works with DeepInfra by default and with any OpenAI-compatible \
chat completions endpoint.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to extract.
    #[arg(required_unless_present = "probe_pdfium")]
    input: Option<PathBuf>,

    /// Write the text to this file instead of stdout.
    #[arg(short, long, env = "PDF2TXT_OUTPUT", conflicts_with = "save")]
    output: Option<PathBuf>,

    /// Write the text to `<input file name>_extracted.txt` in the current directory.
    #[arg(long)]
    save: bool,

    /// Exit non-zero when any page failed.
    #[arg(long, env = "PDF2TXT_STRICT")]
    strict: bool,

    /// Send a tiny request first to check the key and endpoint.
    #[arg(long)]
    verify: bool,

    /// Print where pdfium was looked for, then exit.
    #[arg(long)]
    probe_pdfium: bool,

    /// API key for the extraction endpoint.
    #[arg(long, env = "DEEPINFRA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Vision model ID.
    #[arg(long, env = "MODEL_NAME", default_value = pdf2txt::config::DEFAULT_MODEL)]
    model: String,

    /// OpenAI-compatible API root.
    #[arg(long, env = "API_BASE_URL", default_value = pdf2txt::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "PDF2TXT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Calls per page before giving up, first call included.
    #[arg(long, env = "PDF2TXT_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[arg(long, env = "PDF2TXT_RETRY_INITIAL_MS", default_value_t = 4000)]
    retry_initial_ms: u64,

    /// Longest retry delay, in milliseconds.
    #[arg(long, env = "PDF2TXT_RETRY_MAX_MS", default_value_t = 10_000)]
    retry_max_ms: u64,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF2TXT_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Cap on rendered page width in pixels; 0 renders at full DPI.
    #[arg(long, env = "PDF2TXT_MAX_WIDTH", default_value_t = 1700)]
    max_width: u32,

    /// Longest image edge sent to the model, in pixels.
    #[arg(long, env = "PDF2TXT_MAX_DIMENSION", default_value_t = 2000)]
    max_dimension: u32,

    /// JPEG quality (1–100).
    #[arg(long, env = "PDF2TXT_JPEG_QUALITY", default_value_t = 95,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Max model output tokens per page.
    #[arg(long, env = "PDF2TXT_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: u32,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDF2TXT_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Largest base64 image payload per page in bytes; 0 disables the check.
    #[arg(long, env = "PDF2TXT_MAX_PAYLOAD", default_value_t = 20 * 1024 * 1024)]
    max_payload: usize,

    /// Largest accepted PDF in bytes.
    #[arg(long, env = "PDF2TXT_MAX_UPLOAD", default_value_t = pdf2txt::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload: u64,

    /// Pages in flight at once.
    #[arg(short, long, env = "PDF2TXT_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2TXT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TXT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Print the full result (text, pages, stats) as JSON.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TXT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Settings from .env apply before clap reads the environment.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Probe-only mode ──────────────────────────────────────────────────
    if cli.probe_pdfium {
        let probe = tokio::task::spawn_blocking(pdfium_probe::probe)
            .await
            .context("pdfium probe task failed")?;
        for attempt in &probe.attempts {
            let mark = if probe.resolved.as_ref() == Some(&attempt.candidate) {
                green("✓")
            } else {
                red("✗")
            };
            println!("{mark} {attempt}");
        }
        match probe.resolved {
            Some(candidate) => println!("{} using {}", green("✔"), bold(&candidate.to_string())),
            None => bail!(
                "pdfium not found; set {} to the library file or its directory",
                pdfium_probe::LIB_PATH_ENV
            ),
        }
        return Ok(());
    }

    let Some(input) = cli.input.clone() else {
        bail!("no input PDF given");
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgress::new() as Arc<dyn ExtractionProgress>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let api = build_api_config(&cli)?;
    let extractor = Extractor::with_defaults(config, api).context("Failed to set up extractor")?;

    if cli.verify {
        extractor
            .verify()
            .await
            .context("Extraction endpoint check failed")?;
        if !cli.quiet {
            eprintln!("{} endpoint reachable, key accepted", green("✔"));
        }
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let extraction = extractor
        .extract_file(&input)
        .await
        .with_context(|| format!("Extraction failed for {}", input.display()))?;

    let destination = match (&cli.output, cli.save) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => Some(PathBuf::from(&extraction.file_name)),
        (None, false) => None,
    };

    if cli.json {
        let json =
            serde_json::to_string_pretty(&extraction).context("Failed to serialise output")?;
        match &destination {
            Some(path) => write_output(path, &json).await?,
            None => println!("{json}"),
        }
    } else if let Some(path) = &destination {
        write_output(path, &extraction.text).await?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(extraction.text.as_bytes())
            .context("Failed to write to stdout")?;
    }

    // ── Summary ──────────────────────────────────────────────────────────
    let stats = &extraction.stats;
    let failed = extraction.failed_pages();
    if !cli.quiet {
        if let Some(path) = &destination {
            eprintln!(
                "{}  {}/{} pages  {}ms  →  {}",
                if failed.is_empty() { green("✔") } else { cyan("⚠") },
                stats.succeeded_pages,
                stats.total_pages,
                stats.total_duration_ms,
                bold(&path.display().to_string()),
            );
        } else if !show_progress {
            eprintln!(
                "Extracted {}/{} pages in {}ms",
                stats.succeeded_pages, stats.total_pages, stats.total_duration_ms
            );
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
        if !failed.is_empty() {
            eprintln!("   failed pages: {}", red(&format!("{failed:?}")));
        }
    }

    if cli.strict {
        extraction.into_result().context("Strict mode")?;
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .max_width((cli.max_width > 0).then_some(cli.max_width))
        .max_dimension(cli.max_dimension)
        .jpeg_quality(cli.jpeg_quality)
        .max_payload_len((cli.max_payload > 0).then_some(cli.max_payload))
        .max_upload_bytes(cli.max_upload)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_attempts(cli.max_attempts)
        .retry_initial_delay_ms(cli.retry_initial_ms)
        .retry_max_delay_ms(cli.retry_max_ms)
        .concurrency(cli.concurrency);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args to `ApiConfig`.
fn build_api_config(cli: &Cli) -> Result<ApiConfig> {
    let key = cli
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .with_context(|| {
            format!(
                "{} is not set; export it or pass --api-key",
                pdf2txt::config::API_KEY_ENV
            )
        })?;

    Ok(ApiConfig::new(key)
        .with_model(&cli.model)
        .with_base_url(&cli.base_url)
        .with_timeout_secs(cli.api_timeout))
}
