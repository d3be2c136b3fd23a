//! pdfharvest CLI - parallel PDF text and image harvesting

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfharvest::{assemble_with, render, ExtractOptions, JsonFormat, LopdfLoader, PageResult};

#[derive(Parser, Debug)]
#[command(name = "pdfharvest")]
#[command(version)]
#[command(about = "Extract normalized text and images from every page of a PDF", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE", env = "PDFHARVEST_INPUT")]
    input: PathBuf,

    /// Image rasterization resolution in dpi
    #[arg(short, long, env = "PDFHARVEST_RESOLUTION", default_value_t = pdfharvest::DEFAULT_RESOLUTION)]
    resolution: u32,

    /// Output JSON file
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "PDFHARVEST_OUTPUT",
        default_value = "response_data.json"
    )]
    output: PathBuf,

    /// Directory extracted images are written to
    #[arg(long, value_name = "DIR", env = "PDFHARVEST_IMAGE_DIR", default_value = pdfharvest::DEFAULT_IMAGE_DIR)]
    image_dir: PathBuf,

    /// Number of worker threads (defaults to available CPUs)
    #[arg(short = 'j', long, env = "PDFHARVEST_WORKERS")]
    workers: Option<usize>,

    /// Process pages one at a time on the main thread
    #[arg(long, env = "PDFHARVEST_SEQUENTIAL")]
    sequential: bool,

    /// Fail any page that takes longer than this many seconds
    #[arg(long, value_name = "SECONDS", env = "PDFHARVEST_PAGE_TIMEOUT")]
    page_timeout: Option<f64>,

    /// Include the document information dictionary in the output
    #[arg(long, env = "PDFHARVEST_WITH_METADATA")]
    with_metadata: bool,

    /// Write compact JSON
    #[arg(long, env = "PDFHARVEST_COMPACT")]
    compact: bool,

    /// Also append log lines to this file, rotated to FILE.1 at 1 MB
    #[arg(long, value_name = "FILE", env = "PDFHARVEST_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Disable the progress indicator
    #[arg(long, env = "PDFHARVEST_NO_PROGRESS")]
    no_progress: bool,
}

impl Cli {
    fn extract_options(&self) -> Result<ExtractOptions, Box<dyn std::error::Error>> {
        let mut options = ExtractOptions::new()
            .with_resolution(self.resolution)
            .with_image_dir(&self.image_dir)
            .with_metadata(self.with_metadata)
            .with_parallel(!self.sequential);

        if let Some(workers) = self.workers {
            options = options.with_workers(workers);
        }
        if let Some(seconds) = self.page_timeout {
            let timeout = Duration::try_from_secs_f64(seconds)
                .map_err(|e| format!("invalid --page-timeout {}: {}", seconds, e))?;
            options = options.with_page_timeout(timeout);
        }

        options.validate()?;
        Ok(options)
    }

    fn json_format(&self) -> JsonFormat {
        if self.compact {
            JsonFormat::Compact
        } else {
            JsonFormat::Pretty
        }
    }
}

/// Size at which the log file is rotated.
const LOG_ROTATE_BYTES: u64 = 1024 * 1024;

/// Writes log lines to stderr and to an append-mode log file.
///
/// Once the file would grow past `limit` bytes it is renamed to `<path>.1`,
/// replacing any previous backup, and a fresh file is started.
struct Tee {
    path: PathBuf,
    file: File,
    written: u64,
    limit: u64,
}

impl Tee {
    fn open(path: &Path, limit: u64) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            written,
            limit,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        fs::rename(&self.path, backup_path(&self.path))?;
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".1");
    PathBuf::from(name)
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        let len = buf.len() as u64;
        if self.written > 0 && self.written + len > self.limit {
            self.rotate()?;
        }
        self.file.write_all(buf)?;
        self.written += len;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> io::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(path) = log_file {
        let tee = Tee::open(path, LOG_ROTATE_BYTES)?;
        builder.target(env_logger::Target::Pipe(Box::new(tee)));
    }

    builder.init();
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_ref()) {
        eprintln!("{}: cannot open log file: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }

    if let Err(e) = run(&cli) {
        log::error!("{}", e);
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let options = cli.extract_options()?;
    let pb = progress_bar(cli.no_progress);

    let progress = |page: &PageResult| {
        pb.inc(1);
        if let Some(error) = &page.error {
            pb.set_message(format!("page {} failed: {}", page.page_num, error));
        }
    };
    let result = assemble_with(Arc::new(LopdfLoader), &cli.input, &options, progress);
    pb.finish_and_clear();
    let record = result?;

    render::save_json(&record, &cli.output, cli.json_format())?;

    let failed = record.failed_pages().count();
    let images = record.images().count();
    println!(
        "{} {} pages, {} images -> {}",
        "Done:".green().bold(),
        record.page_count(),
        images,
        cli.output.display()
    );
    if failed > 0 {
        println!(
            "  {} {} page(s) failed, see the error field in the output",
            "Warning:".yellow().bold(),
            failed
        );
    }

    Ok(())
}

fn progress_bar(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} {pos} pages processed {msg}")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
