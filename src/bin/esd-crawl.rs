//! CLI binary for esd-crawl.
//!
//! A thin shim over the library crate: `tables` maps flags to
//! `TableFinderConfig` and prints one line per table page, `upsert` maps
//! flags to `AirtableConfig` and prints the record id.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use esd_crawl::{
    AirtableClient, AirtableConfig, Fields, ImageFormat, PdfiumBackend, ProgressCallback,
    ScanProgressCallback, TableFinder, TableFinderConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

/// Terminal progress callback: a live bar over the pages plus one log line
/// per stored table image.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Instant,
}

impl CliProgressCallback {
    /// Spinner until `on_scan_start` tells us the page count.
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
            started: Instant::now(),
        })
    }

    /// Clear the bar if the scan ended without `on_scan_complete`.
    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Scanning");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_pages} pages for tables…"))
        ));
    }

    fn on_page_scanned(&self, page_num: usize, _total_pages: usize, _tables: usize) {
        self.bar.set_message(format!("page {page_num}"));
        self.bar.inc(1);
    }

    fn on_table_saved(&self, page_num: usize, img_path: &str) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}",
            green("✓"),
            page_num,
            dim(img_path)
        ));
    }

    fn on_scan_complete(&self, total_pages: usize, table_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} of {} pages contain tables  {}",
            green("✔"),
            bold(&table_pages.to_string()),
            total_pages,
            dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64())),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Store annotated images of every table page under ./tables
  esd-crawl tables report.pdf

  # Remote PDF, JPEG images, custom store, JSON output
  esd-crawl tables https://example.org/release.pdf --store out --format jpeg --json

  # Only list the table-bearing pages
  esd-crawl tables --pages-only report.pdf

  # Find-or-create a record keyed on "url"
  esd-crawl upsert --base appXXXX --table Documents --key url \
      --field url=https://example.org/release.pdf --field pages=12

ENVIRONMENT VARIABLES:
  AIRTABLE_API_KEY        Airtable personal access token
  AIRTABLE_API_ROOT       Override the API root (default https://api.airtable.com/v0)
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory
  RUST_LOG                Override log filtering (e.g. esd_crawl=debug)
"#;

/// Find tables in PDFs and file records in Airtable.
#[derive(Parser, Debug)]
#[command(
    name = "esd-crawl",
    version,
    about = "Find tables in PDFs and file records in Airtable",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ESD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ESD_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect table pages and store an annotated image for each.
    Tables(TablesArgs),
    /// Return the id of the record matching --key, creating it if needed.
    Upsert(UpsertArgs),
}

#[derive(Args, Debug)]
struct TablesArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory table images are stored under.
    #[arg(long, env = "ESD_STORE", default_value = "tables")]
    store: PathBuf,

    /// Resolution of the stored images (36–400).
    #[arg(long, env = "ESD_DPI", default_value_t = 72,
          value_parser = clap::value_parser!(u32).range(36..=400))]
    dpi: u32,

    /// Image format: png or jpeg.
    #[arg(long, env = "ESD_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "ESD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// List table pages without rendering or storing anything.
    #[arg(long)]
    pages_only: bool,

    /// Print results as JSON.
    #[arg(long, env = "ESD_JSON")]
    json: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "ESD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "ESD_NO_PROGRESS")]
    no_progress: bool,

    /// Use this pdfium library instead of locating or downloading one.
    #[arg(long, env = "ESD_PDFIUM_LIB", value_name = "PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct UpsertArgs {
    /// Airtable base id (app…).
    #[arg(long, env = "AIRTABLE_BASE")]
    base: String,

    /// Table name or id.
    #[arg(long, env = "AIRTABLE_TABLE")]
    table: String,

    /// Field whose value identifies the record.
    #[arg(long)]
    key: String,

    /// Field value as name=value; values that parse as JSON are sent as JSON.
    #[arg(long = "field", value_name = "NAME=VALUE")]
    fields: Vec<String>,

    /// Fields as a JSON object; --field entries override it.
    #[arg(long)]
    fields_json: Option<String>,

    /// Airtable API token.
    #[arg(long, env = "AIRTABLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Airtable API root.
    #[arg(long, env = "AIRTABLE_API_ROOT", default_value = esd_crawl::config::DEFAULT_API_ROOT)]
    api_root: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "AIRTABLE_TIMEOUT", default_value_t = 30)]
    timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    #[value(alias = "jpg")]
    Jpeg,
}

impl From<FormatArg> for ImageFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Jpeg => ImageFormat::Jpeg,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight the progress bar, so they are only shown
    // when the bar is off. Dependency chatter stays capped at info.
    let show_progress = match &cli.command {
        Command::Tables(args) => !cli.quiet && !args.no_progress && !args.json,
        Command::Upsert(_) => false,
    };
    let filter = if cli.verbose {
        "debug,pdfium_render=info,reqwest=info,hyper=info,hyper_util=info,rustls=info"
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
        Command::Tables(args) => run_tables(args, cli.quiet, show_progress),
        Command::Upsert(args) => run_upsert(args),
    }
}

fn run_tables(args: TablesArgs, quiet: bool, show_progress: bool) -> Result<()> {
    if args.pdfium_lib.is_none() {
        ensure_pdfium(quiet)?;
    }

    let mut builder = TableFinderConfig::builder()
        .storage_root(args.store.clone())
        .dpi(args.dpi)
        .image_format(args.format.into())
        .download_timeout_secs(args.download_timeout);
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd.clone());
    }
    let progress = show_progress.then(CliProgressCallback::new_dynamic);
    if let Some(ref cb) = progress {
        builder = builder.progress_callback(cb.clone() as ProgressCallback);
    }
    let config = builder.build().context("Invalid configuration")?;

    let mut finder = TableFinder::new(config);
    if let Some(ref lib) = args.pdfium_lib {
        finder = finder.with_backend(PdfiumBackend::with_library_path(lib));
    }

    let outcome = scan_and_print(&finder, &args);
    if let Some(cb) = progress {
        cb.clear();
    }
    outcome
}

fn scan_and_print(finder: &TableFinder, args: &TablesArgs) -> Result<()> {
    if args.pages_only {
        let pages = finder
            .pages_with_tables(args.input.as_str())
            .context("Table scan failed")?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&pages)?);
        } else {
            for page in pages {
                println!("{page}");
            }
        }
        return Ok(());
    }

    let tables = finder
        .find_tables(args.input.as_str(), &())
        .context("Table scan failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&tables).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        for table in &tables {
            println!("{}\t{}", table.page_num, args.store.join(&table.img_path).display());
        }
    }
    Ok(())
}

fn run_upsert(args: UpsertArgs) -> Result<()> {
    let fields = collect_fields(args.fields_json.as_deref(), &args.fields)?;

    let mut builder = AirtableConfig::builder()
        .api_root(args.api_root.clone())
        .timeout_secs(args.timeout);
    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key.clone());
    }
    let config = builder.build().context("Invalid configuration")?;

    let client = AirtableClient::new(config)?;
    let id = client
        .upsert_record(&args.base, &args.table, &args.key, &fields)
        .with_context(|| format!("Upsert into {}/{} failed", args.base, args.table))?;
    println!("{id}");
    Ok(())
}

/// Merge `--fields-json` with `--field name=value` pairs.
fn collect_fields(json: Option<&str>, pairs: &[String]) -> Result<Fields> {
    let mut fields = match json {
        Some(raw) => match serde_json::from_str::<Value>(raw).context("--fields-json is not valid JSON")? {
            Value::Object(map) => map,
            _ => bail!("--fields-json must be a JSON object"),
        },
        None => Fields::new(),
    };

    for pair in pairs {
        let Some((name, raw)) = pair.split_once('=') else {
            bail!("--field expects NAME=VALUE, got '{pair}'");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("--field name is empty in '{pair}'");
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        fields.insert(name.to_string(), value);
    }
    Ok(fields)
}

/// Download pdfium on first run, with a byte-level bar unless quiet.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        pdfium_auto::ensure_pdfium_library(None).context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
        if let Some(t) = total {
            if bar.length().unwrap_or(0) != t {
                bar.set_length(t);
            }
        }
        bar.set_position(downloaded);
    }))
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_values_parse_as_json_when_possible() {
        let pairs = vec![
            "name=foo".to_string(),
            "count=3".to_string(),
            "zip=02134".to_string(),
            "ok=true".to_string(),
        ];
        let fields = collect_fields(None, &pairs).unwrap();
        assert_eq!(fields["name"], json!("foo"));
        assert_eq!(fields["count"], json!(3));
        assert_eq!(fields["zip"], json!("02134"));
        assert_eq!(fields["ok"], json!(true));
    }

    #[test]
    fn field_pairs_override_json() {
        let fields = collect_fields(Some(r#"{"a":1,"b":2}"#), &["b=x".to_string()]).unwrap();
        assert_eq!(fields["a"], json!(1));
        assert_eq!(fields["b"], json!("x"));
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        assert!(collect_fields(Some("[1,2]"), &[]).is_err());
        assert!(collect_fields(None, &["novalue".to_string()]).is_err());
        assert!(collect_fields(None, &["=v".to_string()]).is_err());
    }

    #[test]
    fn cli_parses_tables_command() {
        let cli = Cli::try_parse_from(["esd-crawl", "tables", "doc.pdf", "--format", "jpg", "--dpi", "144"]).unwrap();
        match cli.command {
            Command::Tables(args) => {
                assert_eq!(args.input, "doc.pdf");
                assert_eq!(args.dpi, 144);
                assert!(matches!(args.format, FormatArg::Jpeg));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn progress_bar_is_cleared_after_a_failed_scan() {
        let cb = CliProgressCallback::new_dynamic();
        cb.on_scan_start(3);
        cb.on_page_scanned(1, 3, 0);
        // The scan stops here with an error; no completion event arrives.
        cb.clear();
        assert!(cb.bar.is_finished());
        cb.clear();
    }

    #[test]
    fn cli_accepts_explicit_pdfium_library() {
        let cli =
            Cli::try_parse_from(["esd-crawl", "tables", "doc.pdf", "--pdfium-lib", "/opt/libpdfium.so"]).unwrap();
        match cli.command {
            Command::Tables(args) => {
                assert_eq!(args.pdfium_lib, Some(PathBuf::from("/opt/libpdfium.so")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
