use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::panic;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use textscout::{
    CancellationMonitor, CliOverrides, DirectoryScope, EncodingMode, FileHandle, MatchCollector,
    MatchRecord, ProgressMonitor, ScanOutcome, SearchConfig, SearchPattern, SearchResult,
    SearchStatus, Severity, TextSearchEngine, WORKER_THREAD_PREFIX,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const EXIT_PROBLEMS: u8 = 1;
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliSearchConfig {
    /// Regular expression to search for; without one, matching files are only listed
    #[arg(short = 'p', long = "pattern", default_value = "")]
    pattern: String,

    /// Directories to search in (can be specified multiple times)
    #[arg(short = 'd', long = "dir", default_value = ".")]
    roots: Vec<PathBuf>,

    /// File extensions to include (e.g. rs,go,js)
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// Maximum number of threads to use
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Print only the names of files with matches
    #[arg(short = 'l', long)]
    files_only: bool,

    /// Show only statistics, not matches
    #[arg(short, long)]
    stats: bool,

    /// Do not report files that disappear during the search
    #[arg(long)]
    lightweight_refresh: bool,

    /// How to handle bytes that are invalid in a file's encoding (failfast|lossy)
    #[arg(long)]
    encoding: Option<String>,

    /// Configuration file to load
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (error|warn|info|debug|trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Do not show a progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a pattern in files
    Search(Box<CliSearchConfig>),
}

/// Prints matches as they arrive, one file at a time
struct PrintingCollector {
    files_only: bool,
    stats_only: bool,
    list_files: bool,
    progress: ProgressBar,
    pending: Mutex<HashMap<FileHandle, Vec<String>>>,
    matches: AtomicUsize,
    files_with_matches: AtomicUsize,
}

impl PrintingCollector {
    fn new(args: &CliSearchConfig, list_files: bool, progress: ProgressBar) -> Self {
        Self {
            files_only: args.files_only,
            stats_only: args.stats,
            list_files,
            progress,
            pending: Mutex::new(HashMap::new()),
            matches: AtomicUsize::new(0),
            files_with_matches: AtomicUsize::new(0),
        }
    }

    fn print(&self, lines: &[String]) {
        self.progress.suspend(|| {
            for line in lines {
                println!("{}", line);
            }
        });
    }
}

impl MatchCollector for PrintingCollector {
    fn accept_file(&self, file: &FileHandle) -> SearchResult<bool> {
        if self.list_files && !self.stats_only {
            self.print(&[file.full_path().display().to_string()]);
        }
        Ok(true)
    }

    fn accept_pattern_match(&self, record: &MatchRecord) -> SearchResult<bool> {
        self.matches.fetch_add(1, Ordering::Relaxed);
        if self.stats_only {
            return Ok(true);
        }

        let file = record.file();
        let line = if self.files_only {
            file.full_path().display().to_string().blue().to_string()
        } else {
            let (line, column) = record.line_and_column();
            format!(
                "{}:{}:{}: {}",
                file.full_path().display().to_string().blue(),
                line.to_string().green(),
                column,
                record.line_text()
            )
        };

        self.pending
            .lock()
            .entry(file.clone())
            .or_default()
            .push(line);
        // One line per file is enough when only names are wanted
        Ok(!self.files_only)
    }

    fn flush_matches(&self, file: &FileHandle) {
        let lines = self.pending.lock().remove(file);
        if let Some(lines) = lines {
            self.files_with_matches.fetch_add(1, Ordering::Relaxed);
            self.print(&lines);
        }
    }

    fn can_run_in_parallel(&self) -> bool {
        true
    }
}

/// Shows search progress on a progress bar; Ctrl-C cancels through the shared flag
struct BarMonitor {
    bar: ProgressBar,
    cancel: CancellationMonitor,
}

impl ProgressMonitor for BarMonitor {
    fn begin_task(&self, name: &str, total_work: usize) {
        self.bar.set_length(total_work as u64);
        self.bar.set_message(name.to_string());
    }

    fn sub_task(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn worked(&self, work: usize) {
        self.bar.inc(work as u64);
    }

    fn done(&self) {
        self.bar.finish_and_clear();
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(EXIT_PROBLEMS)
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Search(args) => search(*args),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn is_worker_thread(name: Option<&str>) -> bool {
    name.is_some_and(|name| name.starts_with(WORKER_THREAD_PREFIX))
}

/// Keeps panics caught inside scan workers off the terminal; they surface as status entries.
fn install_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if is_worker_thread(thread::current().name()) {
            debug!("Scan worker panicked: {}", info);
        } else {
            default_hook(info);
        }
    }));
}

fn parse_encoding(value: &str) -> anyhow::Result<EncodingMode> {
    match value.to_lowercase().as_str() {
        "failfast" => Ok(EncodingMode::FailFast),
        "lossy" => Ok(EncodingMode::Lossy),
        other => anyhow::bail!("Unknown encoding mode '{}' (expected failfast or lossy)", other),
    }
}

fn search(args: CliSearchConfig) -> anyhow::Result<ExitCode> {
    let overrides = CliOverrides {
        thread_count: args.threads,
        lightweight_auto_refresh: args.lightweight_refresh,
        encoding_mode: args.encoding.as_deref().map(parse_encoding).transpose()?,
        log_level: args.log_level.clone(),
    };
    let config = SearchConfig::load_from(args.config.as_deref())
        .context("Failed to load configuration")?
        .merge_with_cli(overrides);
    init_logging(&config.log_level);
    install_panic_hook();

    let pattern = SearchPattern::with_size_limit(&args.pattern, config.pattern_size_limit)?;

    let mut scope = DirectoryScope::new(args.roots.iter().cloned());
    if let Some(extensions) = &args.extensions {
        scope = scope.with_extensions(
            extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }

    let bar = if args.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {wide_msg}")
                .context("Invalid progress template")?
                .progress_chars("=>-"),
        );
        bar
    };

    let cancel = CancellationMonitor::new();
    let handler_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.cancel()) {
        warn!("Ctrl-C will not cancel the search: {}", e);
    }
    let monitor = BarMonitor {
        bar: bar.clone(),
        cancel,
    };

    let collector = Arc::new(PrintingCollector::new(&args, pattern.is_empty(), bar));
    let engine = TextSearchEngine::new(collector.clone(), pattern).with_config(config);
    let status = engine.search_scope(&scope, Some(&monitor));

    print_summary(&collector, &status);
    if args.stats {
        let stats = engine.metrics().get_stats();
        println!(
            "Scanned {} files in {} batches ({} linked, {} binary skipped, {} failed)",
            stats.files_scanned,
            stats.batches_processed,
            stats.duplicates_replayed,
            stats.binary_files_skipped,
            stats.failed_files
        );
    }
    print_problems(&status);

    Ok(match status.outcome() {
        ScanOutcome::Cancelled => ExitCode::from(EXIT_CANCELLED),
        ScanOutcome::FatalAborted => ExitCode::from(EXIT_PROBLEMS),
        ScanOutcome::Completed if status.severity() >= Severity::Error => {
            ExitCode::from(EXIT_PROBLEMS)
        }
        ScanOutcome::Completed => ExitCode::SUCCESS,
    })
}

fn print_summary(collector: &PrintingCollector, status: &SearchStatus) {
    if collector.list_files {
        println!("\nFound {} files", status.files_scanned);
        return;
    }
    println!(
        "\nFound {} matches in {} files",
        collector.matches.load(Ordering::Relaxed),
        collector.files_with_matches.load(Ordering::Relaxed)
    );
}

fn print_problems(status: &SearchStatus) {
    for entry in status.entries() {
        let label = match entry.severity() {
            Severity::Error | Severity::Cancel => "error:".red().bold(),
            Severity::Warning => "warning:".yellow().bold(),
            Severity::Info | Severity::Ok => "note:".normal(),
        };
        eprintln!("{} {}", label, entry);
    }
    if status.is_cancelled() {
        eprintln!(
            "{} search cancelled after {} of {} files",
            "warning:".yellow().bold(),
            status.files_scanned,
            status.files_to_scan
        );
    }
}
