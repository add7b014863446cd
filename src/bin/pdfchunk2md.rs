//! CLI binary for pdfchunk2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, writes `<output_dir>/<input_stem>_extracted.md`, and
//! turns any failure into exit status 1.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfchunk2md::{
    extract_to_file, inspect, Chunk, ChunkProgressCallback, ChunkSeparator, ExtractionConfig,
    MissingOutputPolicy, ProgressCallback,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the chunks of the document plus
/// a log line per finished chunk.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the chunk currently being converted.
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    /// The bar starts as a spinner while the PDF is split; `on_run_start`
    /// switches it to a counter once the chunk count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Splitting PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ChunkProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_chunks: usize) {
        self.activate_bar(total_chunks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_chunks} chunks…"))
        ));
    }

    fn on_chunk_start(&self, chunk: &Chunk, _index: usize, _total: usize) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(format!("pages {}", chunk.range_label()));
    }

    fn on_chunk_complete(&self, chunk: &Chunk, index: usize, total: usize) {
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {:<16}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("pages {}", chunk.range_label())),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, chunk: &Chunk, index: usize, total: usize, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {:<16}  {}  {}",
            red("✗"),
            index + 1,
            total,
            dim(&format!("pages {}", chunk.range_label())),
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.finish_and_clear();
    }

    fn on_run_complete(&self, total_chunks: usize, merged_chunks: usize) {
        let missing = total_chunks.saturating_sub(merged_chunks);
        self.bar.finish_and_clear();

        if missing == 0 {
            eprintln!(
                "{} {} chunks converted and merged",
                green("✔"),
                bold(&merged_chunks.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} chunks merged  ({} without output)",
                cyan("⚠"),
                bold(&merged_chunks.to_string()),
                total_chunks,
                red(&missing.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert with marker_single, 20 pages per chunk
  pdfchunk2md book.pdf out/

  # Smaller chunks and a lower batch multiplier for small GPUs
  pdfchunk2md --chunk-size 10 --batch-multiplier 2 book.pdf out/

  # Run the converter through another interpreter
  pdfchunk2md --converter python --converter-arg=-m --converter-arg=marker.single book.pdf out/

  # Fail instead of warning when a chunk produces no Markdown
  pdfchunk2md --fail-on-missing book.pdf out/

  # Inspect PDF metadata (no conversion)
  pdfchunk2md --inspect-only book.pdf out/

OUTPUT LAYOUT:
  <output_dir>/chunks/                          staged chunk PDFs (deleted once converted)
  <output_dir>/<stem>/<chunk>/<chunk>.md        converter output per chunk
  <output_dir>/<stem>_extracted.md              merged Markdown

ENVIRONMENT VARIABLES:
  RUST_LOG                          Override log filter (e.g. pdfchunk2md=debug)
  PYTORCH_MPS_HIGH_WATERMARK_RATIO  Set to 0.0 for every converter run
"#;

/// Split a PDF into page chunks, convert each with an external tool, merge the Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "pdfchunk2md",
    version,
    about = "Split a PDF into page chunks, convert each chunk to Markdown, and merge the results",
    long_about = "Split a PDF into fixed-size page chunks, run an external converter \
(marker_single by default) on each chunk one at a time, and merge the per-chunk Markdown \
back into a single document ordered by page.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the input PDF.
    input_file: PathBuf,

    /// Directory for staging, converter output, and the merged file.
    output_dir: PathBuf,

    /// Pages per chunk.
    #[arg(long, env = "PDFCHUNK2MD_CHUNK_SIZE", default_value_t = 20,
          value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: u64,

    /// Value passed to the converter as --batch_multiplier.
    #[arg(long, env = "PDFCHUNK2MD_BATCH_MULTIPLIER", default_value_t = 4,
          value_parser = clap::value_parser!(u32).range(1..))]
    batch_multiplier: u32,

    /// Value passed to the converter as --max_pages.
    #[arg(long, env = "PDFCHUNK2MD_MAX_PAGES",
          value_parser = clap::value_parser!(u64).range(1..))]
    max_pages: Option<u64>,

    /// Reserved: chunks are always converted one at a time.
    #[arg(long, env = "PDFCHUNK2MD_WORKERS", default_value_t = 1,
          value_parser = clap::value_parser!(u64).range(1..))]
    workers: u64,

    /// Converter executable.
    #[arg(long, env = "PDFCHUNK2MD_CONVERTER", default_value = "marker_single")]
    converter: String,

    /// Extra argument placed before the chunk path (repeatable).
    #[arg(long = "converter-arg", value_name = "ARG", allow_hyphen_values = true)]
    converter_args: Vec<String>,

    /// Chunk separator: newline, hr, comment, or custom string.
    #[arg(long, env = "PDFCHUNK2MD_SEPARATOR", default_value = "newline")]
    separator: String,

    /// Exit with an error when a chunk produces no Markdown.
    #[arg(long, env = "PDFCHUNK2MD_FAIL_ON_MISSING")]
    fail_on_missing: bool,

    /// Keep chunk PDFs in the staging directory after conversion.
    #[arg(long, env = "PDFCHUNK2MD_KEEP_CHUNKS")]
    keep_chunks: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "PDFCHUNK2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFCHUNK2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFCHUNK2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFCHUNK2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would interleave with the progress bar, so they are
    // hidden while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error processing {}: {:#}", display_name(&cli.input_file), e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input_file)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
            );
        } else {
            println!("File:         {}", cli.input_file.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", meta.page_count);
            println!(
                "Chunks:       {} of ≤{} pages",
                pdfchunk2md::plan_chunks(meta.page_count, cli.chunk_size as usize).len(),
                cli.chunk_size
            );
            println!("PDF Version:  {}", meta.pdf_version);
            println!("Encrypted:    {}", meta.is_encrypted);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ChunkProgressCallback>)
    } else {
        None
    };

    let config = build_config(cli, progress_cb)?;

    // ── Run extraction ───────────────────────────────────────────────────
    let (output_file, output) = extract_to_file(&cli.input_file, &cli.output_dir, &config)
        .await
        .context("Extraction failed")?;

    if cli.json {
        let report = serde_json::json!({
            "output_file": output_file,
            "result": output,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise output")?
        );
        return Ok(());
    }

    if !cli.quiet {
        println!(
            "Successfully processed {}. Output saved to {}",
            display_name(&cli.input_file),
            output_file.display()
        );
        eprintln!(
            "   {} pages  /  {} chunks  /  {}ms total",
            dim(&output.stats.total_pages.to_string()),
            dim(&output.stats.total_chunks.to_string()),
            output.stats.total_duration_ms,
        );
        if !output.missing.is_empty() {
            let ranges: Vec<String> = output.missing.iter().map(Chunk::range_label).collect();
            eprintln!(
                "{} no Markdown for pages {}",
                cyan("⚠"),
                red(&ranges.join(", "))
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .chunk_size(cli.chunk_size as usize)
        .batch_multiplier(cli.batch_multiplier)
        .worker_count(cli.workers as usize)
        .converter_program(cli.converter.clone())
        .converter_args(cli.converter_args.iter().cloned())
        .separator(parse_separator(&cli.separator))
        .keep_chunks(cli.keep_chunks)
        .missing_output(if cli.fail_on_missing {
            MissingOutputPolicy::Fail
        } else {
            MissingOutputPolicy::Warn
        });

    if let Some(max) = cli.max_pages {
        builder = builder.max_pages(max as usize);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--separator` string into `ChunkSeparator`.
fn parse_separator(s: &str) -> ChunkSeparator {
    match s.to_lowercase().as_str() {
        "newline" | "none" => ChunkSeparator::Newline,
        "hr" | "---" => ChunkSeparator::HorizontalRule,
        "comment" => ChunkSeparator::Comment,
        _ => ChunkSeparator::Custom(s.to_string()),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_parsing() {
        assert_eq!(parse_separator("newline"), ChunkSeparator::Newline);
        assert_eq!(parse_separator("HR"), ChunkSeparator::HorizontalRule);
        assert_eq!(parse_separator("comment"), ChunkSeparator::Comment);
        assert_eq!(
            parse_separator("<!-- Break -->"),
            ChunkSeparator::Custom("<!-- Break -->".into())
        );
    }

    #[test]
    fn cli_maps_to_config() {
        let cli = Cli::try_parse_from([
            "pdfchunk2md",
            "--chunk-size",
            "10",
            "--max-pages",
            "5",
            "--converter",
            "python",
            "--converter-arg=-m",
            "--converter-arg",
            "marker.single",
            "--fail-on-missing",
            "in.pdf",
            "out",
        ])
        .unwrap();
        assert_eq!(cli.input_file, PathBuf::from("in.pdf"));
        assert_eq!(cli.output_dir, PathBuf::from("out"));

        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.batch_multiplier, 4);
        assert_eq!(config.max_pages, Some(5));
        assert_eq!(config.converter_program, "python");
        assert_eq!(config.converter_args, ["-m", "marker.single"]);
        assert_eq!(config.missing_output, MissingOutputPolicy::Fail);
    }

    #[test]
    fn cli_requires_both_positionals() {
        assert!(Cli::try_parse_from(["pdfchunk2md", "in.pdf"]).is_err());
    }

    #[test]
    fn cli_rejects_zero_chunk_size() {
        assert!(Cli::try_parse_from(["pdfchunk2md", "--chunk-size", "0", "a.pdf", "o"]).is_err());
    }
}
