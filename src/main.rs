//! Main entry point for the gzran CLI application.
//!
//! This binary builds checkpoint indexes for gzip/zlib files and reads
//! decompressed ranges through them, from the local filesystem or from
//! remote HTTP URLs.

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gzran::cli::{CatArgs, Command, IndexArgs, InfoArgs, is_http_url};
use gzran::{
    ByteSource, Cli, HttpRangeReader, HttpSource, Index, LocalFileReader, Session, build_index,
};

/// Size of the chunks handed from the decompressing thread to the writer.
const OUTPUT_CHUNK: usize = 256 * 1024;

/// Application entry point.
///
/// Parses command-line arguments, sets up logging and dispatches to the
/// handler for the chosen subcommand.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    let interrupt = Interrupt::listen();

    match &cli.command {
        Command::Index(args) => index_file(args, &cli, &interrupt).await,
        Command::Cat(args) => cat_range(args, &cli, &interrupt).await,
        Command::Info(args) => show_info(args).await,
    }
}

/// Process-wide Ctrl-C state.
///
/// Installing the signal handler replaces the default SIGINT behaviour for
/// the rest of the process, so it is installed once and every long-running
/// step has to watch it.
#[derive(Clone)]
struct Interrupt {
    rx: watch::Receiver<bool>,
}

impl Interrupt {
    fn listen() -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(true);
            }
        });
        Self { rx }
    }

    fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once Ctrl-C has been pressed.
    async fn wait(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|&set| set).await.is_err() {
            // No handler could be installed; never fires.
            std::future::pending::<()>().await;
        }
    }

    /// Run `task` unless Ctrl-C arrives first.
    async fn guard<T>(&self, task: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            result = task => result,
            _ = self.wait() => bail!("Interrupted"),
        }
    }
}

/// Log to stderr so decompressed output on stdout stays untouched.
///
/// `RUST_LOG` takes precedence over the level implied by `-q`.
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Where the compressed bytes come from.
///
/// Cheap to clone so that every blocking task can open its own source.
#[derive(Clone)]
enum Input {
    Local(PathBuf),
    Remote {
        reader: Arc<HttpRangeReader>,
        runtime: Handle,
    },
}

impl Input {
    async fn resolve(file: &str) -> Result<Self> {
        if is_http_url(file) {
            // Handle remote file via HTTP Range requests
            let reader = HttpRangeReader::new(file.to_string()).await?;
            Ok(Self::Remote {
                reader: Arc::new(reader),
                runtime: Handle::current(),
            })
        } else {
            Ok(Self::Local(PathBuf::from(file)))
        }
    }

    /// Open an independent, blocking byte source.
    fn open(&self) -> Result<Box<dyn ByteSource>> {
        match self {
            Self::Local(path) => {
                let reader = LocalFileReader::new(path)
                    .with_context(|| format!("cannot open {}", path.display()))?;
                Ok(Box::new(reader))
            }
            Self::Remote { reader, runtime } => {
                Ok(Box::new(HttpSource::new(reader.clone(), runtime.clone())))
            }
        }
    }

    fn compressed_len(&self) -> Result<u64> {
        match self {
            Self::Local(path) => Ok(std::fs::metadata(path)?.len()),
            Self::Remote { reader, .. } => Ok(reader.size()),
        }
    }

    /// Display network transfer statistics for HTTP sources
    fn report_transfer(&self, cli: &Cli) {
        if let Self::Remote { reader, .. } = self {
            if !cli.is_quiet() {
                eprintln!(
                    "Total bytes transferred: {}",
                    format_size(reader.transferred_bytes())
                );
            }
        }
    }
}

/// Build an index on a blocking thread, with a progress bar and Ctrl-C cancellation.
///
/// Returns `None` if the user interrupted the scan.
async fn build_with_progress(
    input: &Input,
    span: u64,
    cli: &Cli,
    interrupt: &Interrupt,
) -> Result<Option<Index>> {
    let bar = if cli.is_quiet() {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(input.compressed_len()?);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner} indexing [{bar:40}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("=> "),
        );
        bar
    };

    // Cancellation is cooperative: the flag is checked before every read.
    let interrupt = interrupt.clone();
    let input = input.clone();
    let progress_bar = bar.clone();
    let index = tokio::task::spawn_blocking(move || -> Result<Option<Index>> {
        let source = input.open()?;
        let index = build_index(source, span, |consumed| {
            progress_bar.set_position(consumed);
            !interrupt.is_set()
        })?;
        Ok(index)
    })
    .await?;

    bar.finish_and_clear();
    index
}

/// Handle `gzran index`: scan once and persist the checkpoints.
async fn index_file(args: &IndexArgs, cli: &Cli, interrupt: &Interrupt) -> Result<()> {
    if args.span == 0 {
        bail!("span must be greater than zero");
    }

    let input = Input::resolve(&args.file).await?;
    let output = match &args.output {
        Some(path) => path.clone(),
        None if is_http_url(&args.file) => bail!("-o is required when indexing a URL"),
        None => default_index_path(&args.file),
    };

    let Some(index) = build_with_progress(&input, args.span, cli, interrupt).await? else {
        if !cli.is_very_quiet() {
            eprintln!("Cancelled, no index written");
        }
        return Ok(());
    };

    let bytes = index.to_bytes();
    interrupt
        .guard(async {
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("cannot write {}", output.display()))
        })
        .await?;

    if !cli.is_quiet() {
        println!(
            "{}: {} checkpoints over {}, index {}",
            output.display(),
            index.len(),
            format_size(index.decompressed_size()),
            format_size(bytes.len() as u64)
        );
    }
    input.report_transfer(cli);

    Ok(())
}

/// Handle `gzran cat`: stream one decompressed range to stdout or a file.
///
/// Decompression runs on a blocking thread and hands chunks to the async
/// writer through a bounded channel.
async fn cat_range(args: &CatArgs, cli: &Cli, interrupt: &Interrupt) -> Result<()> {
    let input = Input::resolve(&args.file).await?;
    let index = Arc::new(load_or_build_index(args, &input, cli, interrupt).await?);

    let size = index.decompressed_size();
    if args.offset > size {
        bail!(
            "offset {} is past the end of the data ({})",
            args.offset,
            format_size(size)
        );
    }
    let length = args.length.unwrap_or(u64::MAX).min(size - args.offset);
    debug!(offset = args.offset, length, "extracting range");

    let (tx, rx) = mpsc::channel::<Vec<u8>>(4);
    let offset = args.offset;
    let reader_input = input.clone();
    let reader_interrupt = interrupt.clone();
    let reader = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut session = Session::open_at(index, reader_input.open()?, offset)?;
        let mut left = length;
        while left > 0 && !reader_interrupt.is_set() {
            let mut chunk = vec![0u8; left.min(OUTPUT_CHUNK as u64) as usize];
            let n = session.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            chunk.truncate(n);
            left -= n as u64;
            // The receiver only goes away if writing failed; that error wins.
            if tx.blocking_send(chunk).is_err() {
                break;
            }
        }
        session.close()?;
        Ok(())
    });

    let out: Box<dyn AsyncWrite + Unpin + Send> = match &args.output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };
    // Dropping the receiver on interrupt also stops the decompressing thread.
    interrupt.guard(drain(rx, out)).await?;

    reader.await??;
    input.report_transfer(cli);

    Ok(())
}

/// Copy chunks from the decompressing thread to `out` until the channel closes.
async fn drain<W>(mut rx: mpsc::Receiver<Vec<u8>>, mut out: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = rx.recv().await {
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    Ok(())
}

/// Find the index for `cat`: explicit path, `FILE.gzi` next to a local file,
/// or a fresh in-memory scan.
async fn load_or_build_index(
    args: &CatArgs,
    input: &Input,
    cli: &Cli,
    interrupt: &Interrupt,
) -> Result<Index> {
    let path = match &args.index {
        Some(path) => Some(path.clone()),
        None if is_http_url(&args.file) => None,
        None => Some(default_index_path(&args.file)).filter(|p| p.exists()),
    };

    if let Some(path) = path {
        return load_index(&path).await;
    }

    if args.span == 0 {
        bail!("span must be greater than zero");
    }
    match build_with_progress(input, args.span, cli, interrupt).await? {
        Some(index) => Ok(index),
        None => bail!("Cancelled"),
    }
}

async fn load_index(path: &Path) -> Result<Index> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    Index::from_bytes(&bytes).with_context(|| format!("cannot load {}", path.display()))
}

/// Handle `gzran info`: summarize an index, or list every checkpoint with `-v`.
async fn show_info(args: &InfoArgs) -> Result<()> {
    let index = load_index(&args.index).await?;

    println!(
        "Decompressed size: {} ({})",
        index.decompressed_size(),
        format_size(index.decompressed_size())
    );
    println!("Checkpoints:       {}", index.len());

    if !args.verbose {
        return Ok(());
    }

    println!();
    println!(
        "{:>6}  {:>14}  {:>4}  {:>14}  {:>10}",
        "#", "Compressed", "Bits", "Decompressed", "Spacing"
    );
    println!("{}", "-".repeat(56));

    let mut previous = None;
    for (i, cp) in index.checkpoints().iter().enumerate() {
        // Distance from the previous checkpoint, in decompressed bytes
        let spacing = match previous {
            Some(prev) => format_size(cp.decompressed_pos - prev),
            None => "-".to_string(),
        };
        println!(
            "{:>6}  {:>14}  {:>4}  {:>14}  {:>10}",
            i, cp.compressed_pos, cp.bit_remainder, cp.decompressed_pos, spacing
        );
        previous = Some(cp.decompressed_pos);
    }

    Ok(())
}

fn default_index_path(file: &str) -> PathBuf {
    PathBuf::from(format!("{}.gzi", file))
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
