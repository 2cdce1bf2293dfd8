//! CLI binary for edgequake-recast.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `RecastConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use edgequake_recast::pipeline::structure::{structure_text, summarize_transcript};
use edgequake_recast::{
    ingest_file, parse_srt, render_to_file, BlockKind, BlockList, ContentBlock,
    IngestProgressCallback, IntermediateDocument, OcrEngine, PageError, ProgressCallback, RecastConfig,
    VisionOcr,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
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

/// Live progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_ingestion_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
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
        self.bar.set_prefix("Ingesting");
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

impl IngestProgressCallback for CliProgressCallback {
    fn on_ingestion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Ingesting {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
        ));
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

    fn on_ingestion_complete(&self, total_pages: usize, clean_pages: usize) {
        self.bar.finish_and_clear();
        let failed = total_pages.saturating_sub(clean_pages);
        if failed == 0 {
            eprintln!(
                "{} {} pages ingested",
                green("✔"),
                bold(&total_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages ingested cleanly  ({} with failures)",
                cyan("⚠"),
                bold(&clean_pages.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text (native + OCR) to stdout
  pdfrecast ingest lesson.pdf

  # Skip OCR, dump page captures as JPEG files
  pdfrecast ingest --ocr none --images-dir pages/ lesson.pdf

  # Full pipeline: ingest, structure, curate, render ./<title>.pdf
  pdfrecast build lesson.pdf -o out/

  # Keep the curated blocks for editing, then re-render them
  pdfrecast build lesson.pdf --blocks-out blocks.json
  pdfrecast render blocks.json --title "My Lesson" -o out/

  # Flatten a subtitle file and summarise it into one lesson section
  pdfrecast transcript talk.srt --summarize

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
"#;

/// Recast PDF documents into structured, re-laid-out PDF lessons.
#[derive(Parser, Debug)]
#[command(
    name = "pdfrecast",
    version,
    about = "Recast PDF documents into structured, re-laid-out PDF lessons",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RECAST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "RECAST_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "RECAST_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract text and page captures from a PDF.
    Ingest {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        #[command(flatten)]
        ingest: IngestArgs,

        #[command(flatten)]
        llm: LlmArgs,

        /// Print a JSON summary instead of the text.
        #[arg(long, env = "RECAST_JSON")]
        json: bool,

        /// Write every page capture as a JPEG into this directory.
        #[arg(long, env = "RECAST_IMAGES_DIR")]
        images_dir: Option<PathBuf>,
    },

    /// Render a JSON list of content blocks to PDF.
    Render {
        /// JSON file containing an array of content blocks.
        blocks: PathBuf,

        /// Document title; also names the output file.
        #[arg(long)]
        title: String,

        /// Output directory.
        #[arg(short, long, env = "RECAST_OUTPUT_DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Ingest, structure, curate and render in one go.
    Build {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        #[command(flatten)]
        ingest: IngestArgs,

        #[command(flatten)]
        llm: LlmArgs,

        /// Output directory.
        #[arg(short, long, env = "RECAST_OUTPUT_DIR", default_value = ".")]
        output: PathBuf,

        /// Title of the output document. Default: the first line of page 1,
        /// else the outline's title.
        #[arg(long)]
        title: Option<String>,

        /// Include every page image as a figure.
        #[arg(long, env = "RECAST_INCLUDE_FIGURES")]
        include_figures: bool,

        /// Also write the curated blocks as JSON to this file.
        #[arg(long)]
        blocks_out: Option<PathBuf>,
    },

    /// Flatten an SRT subtitle file into transcript text.
    Transcript {
        /// `.srt` file.
        input: PathBuf,

        /// Summarise the transcript into one lesson section (JSON).
        #[arg(long)]
        summarize: bool,

        #[command(flatten)]
        llm: LlmArgs,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OcrArg {
    /// No OCR; native text only.
    None,
    /// Vision LLM transcription.
    Vision,
    /// Offline `ocrs` engine (needs the `local-ocr` feature).
    Local,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Page capture scale factor (0.5–6.0).
    #[arg(long, env = "RECAST_SCALE", default_value_t = 3.0)]
    scale: f32,

    /// JPEG quality of page captures (1–100).
    #[arg(long, env = "RECAST_JPEG_QUALITY", default_value_t = 100,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// OCR engine.
    #[arg(long, env = "RECAST_OCR", value_enum, default_value = "vision")]
    ocr: OcrArg,

    /// OCR language hint (ISO 639-2 code).
    #[arg(long, env = "RECAST_LANG", default_value = "fra")]
    lang: String,

    /// Pages recognised concurrently.
    #[arg(long, env = "RECAST_OCR_CONCURRENCY", default_value_t = 4)]
    ocr_concurrency: usize,

    /// Directory holding the `ocrs` models (local OCR only).
    #[arg(long, env = "RECAST_OCR_MODELS")]
    ocr_models: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "RECAST_PASSWORD")]
    password: Option<String>,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "RECAST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

impl Default for IngestArgs {
    fn default() -> Self {
        Self {
            scale: 3.0,
            jpeg_quality: 100,
            ocr: OcrArg::None,
            lang: "fra".into(),
            ocr_concurrency: 4,
            ocr_models: None,
            password: None,
            pdfium_lib: None,
            download_timeout: 120,
        }
    }
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Structuring temperature (0.0–2.0).
    #[arg(long, env = "RECAST_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Max tokens of the structuring answer.
    #[arg(long, env = "RECAST_MAX_TOKENS", default_value_t = 2000)]
    max_tokens: usize,

    /// Retries on LLM failure.
    #[arg(long, env = "RECAST_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Characters of text sent for structuring.
    #[arg(long, env = "RECAST_MAX_INPUT_CHARS", default_value_t = 4000)]
    max_input_chars: usize,

    /// Path to a text file containing a custom structuring prompt.
    #[arg(long, env = "RECAST_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,
}

/// JSON summary printed by `ingest --json`; captures are left out.
#[derive(Serialize)]
struct IngestSummary<'a> {
    title: &'a str,
    page_count: usize,
    cover_page: Option<usize>,
    image_pages: Vec<usize>,
    failures: &'a [PageError],
    full_text: &'a str,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is given.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn IngestProgressCallback>)
    } else {
        None
    };

    match cli.command {
        Command::Ingest {
            input,
            ingest,
            llm,
            json,
            images_dir,
        } => {
            let config = build_config(&ingest, &llm, progress).await?;
            let doc = ingest_file(&input, &config)
                .await
                .context("Ingestion failed")?;

            if let Some(dir) = images_dir {
                let written = write_page_images(&doc, &dir)?;
                if !cli.quiet {
                    eprintln!("{} {} page images → {}", green("✔"), written, bold(&dir.display().to_string()));
                }
            }

            if json {
                let summary = IngestSummary {
                    title: &doc.title,
                    page_count: doc.page_count,
                    cover_page: doc.cover_image.as_ref().map(|r| r.page_num),
                    image_pages: doc.page_images.iter().map(|r| r.page_num).collect(),
                    failures: &doc.failures,
                    full_text: &doc.full_text,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).context("Failed to serialise output")?
                );
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(doc.full_text.as_bytes())
                    .context("Failed to write to stdout")?;
            }
        }

        Command::Render {
            blocks,
            title,
            output,
        } => {
            let raw = tokio::fs::read_to_string(&blocks)
                .await
                .with_context(|| format!("Failed to read blocks from {:?}", blocks))?;
            let blocks: Vec<ContentBlock> =
                serde_json::from_str(&raw).context("Blocks file is not a JSON array of content blocks")?;
            let path = render_to_file(&blocks, &title, &output).context("Rendering failed")?;
            if !cli.quiet {
                eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
            }
        }

        Command::Build {
            input,
            ingest,
            llm,
            output,
            title,
            include_figures,
            blocks_out,
        } => {
            let config = build_config(&ingest, &llm, progress).await?;
            let doc = ingest_file(&input, &config)
                .await
                .context("Ingestion failed")?;

            if !cli.quiet {
                eprintln!("{} Structuring {} chars…", cyan("◆"), doc.full_text.chars().count());
            }
            let outline = structure_text(&doc.full_text, doc.page_images.len(), &config)
                .await
                .context("Structuring failed")?;

            let title = title.unwrap_or_else(|| doc.lesson_title(&outline));
            let mut blocks = BlockList::from_outline(&outline, &doc, &title);
            if include_figures {
                let figures: Vec<String> = blocks
                    .blocks()
                    .iter()
                    .filter(|b| b.kind == BlockKind::Image && !b.included)
                    .map(|b| b.id.clone())
                    .collect();
                for id in figures {
                    blocks.toggle(&id);
                }
            }

            if let Some(path) = blocks_out {
                let json = serde_json::to_string_pretty(blocks.blocks())
                    .context("Failed to serialise blocks")?;
                tokio::fs::write(&path, json)
                    .await
                    .with_context(|| format!("Failed to write blocks to {:?}", path))?;
            }

            let path = render_to_file(blocks.blocks(), &title, &output).context("Rendering failed")?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} blocks ({} included)  →  {}",
                    green("✔"),
                    blocks.len(),
                    blocks.included().len(),
                    bold(&path.display().to_string())
                );
            }
        }

        Command::Transcript {
            input,
            summarize,
            llm,
        } => {
            let raw = tokio::fs::read_to_string(&input)
                .await
                .with_context(|| format!("Failed to read subtitles from {:?}", input))?;
            let text = parse_srt(&raw);

            if summarize {
                let config = build_config(&IngestArgs::default(), &llm, None).await?;
                let summary = summarize_transcript(&text, &config)
                    .await
                    .context("Transcript summary failed")?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).context("Failed to serialise output")?
                );
            } else {
                println!("{text}");
            }
        }
    }

    Ok(())
}

/// Map CLI args to `RecastConfig`, attaching the chosen OCR engine.
async fn build_config(
    ingest: &IngestArgs,
    llm: &LlmArgs,
    progress: Option<ProgressCallback>,
) -> Result<RecastConfig> {
    let system_prompt = if let Some(ref path) = llm.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = RecastConfig::builder()
        .capture_scale(ingest.scale)
        .jpeg_quality(ingest.jpeg_quality)
        .ocr_language(ingest.lang.clone())
        .ocr_concurrency(ingest.ocr_concurrency)
        .temperature(llm.temperature)
        .max_tokens(llm.max_tokens)
        .max_retries(llm.max_retries)
        .max_input_chars(llm.max_input_chars)
        .download_timeout_secs(ingest.download_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    config.model = llm.model.clone();
    config.provider_name = llm.provider.clone();
    config.password = ingest.password.clone();
    config.pdfium_library_path = ingest.pdfium_lib.clone();
    config.system_prompt = system_prompt;

    config.ocr = match ingest.ocr {
        OcrArg::None => None,
        OcrArg::Vision => {
            let engine: Arc<dyn OcrEngine> = Arc::new(
                VisionOcr::from_config(&config).context("Vision OCR needs an LLM provider")?,
            );
            Some(engine)
        }
        OcrArg::Local => Some(local_ocr(ingest.ocr_models.as_deref())?),
    };

    Ok(config)
}

#[cfg(feature = "local-ocr")]
fn local_ocr(models: Option<&Path>) -> Result<Arc<dyn OcrEngine>> {
    use edgequake_recast::{LocalOcr, LocalOcrModels};
    let models = models.map(LocalOcrModels::from_dir).unwrap_or_default();
    let engine = tokio::task::block_in_place(|| LocalOcr::new(&models))
        .context("Failed to load local OCR models")?;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "local-ocr"))]
fn local_ocr(_models: Option<&Path>) -> Result<Arc<dyn OcrEngine>> {
    anyhow::bail!("this build has no local OCR; rebuild with `--features local-ocr`")
}

/// Write the cover and every page image as `page-NNN.jpg`.
fn write_page_images(doc: &IntermediateDocument, dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let mut written = 0;
    for raster in doc.cover_image.iter().chain(doc.page_images.iter()) {
        let path = dir.join(format!("page-{:03}.jpg", raster.page_num));
        if path.exists() {
            // The cover may duplicate the first page image.
            continue;
        }
        std::fs::write(&path, &raster.jpeg).with_context(|| format!("Failed to write {:?}", path))?;
        written += 1;
    }
    Ok(written)
}
