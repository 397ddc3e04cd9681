use std::ffi::CString;
use std::fs::File;
use std::io::{self, BufReader};
use std::os::unix::ffi::OsStrExt as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use git2_alloc_trace::{EventListener, DEFAULT_SOCKET_PATH};

mod report;
mod scan;

use report::Summary;
use scan::Scan;

#[derive(Parser, Debug)]
#[command(name = "git2-leakscan")]
#[command(about = "Summarize live native allocations from a debug-allocator event stream.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a file-sink log.
    File {
        path: PathBuf,
        /// Replace PATH with a named pipe and read from it until the writer exits.
        #[arg(long, default_value_t = false)]
        fifo: bool,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Accept producers on the socket transport.
    Listen {
        #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
        socket: PathBuf,
        /// Producer connections to read, one after another.
        #[arg(long, default_value_t = 1)]
        connections: u32,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    try_main().map_err(|err| {
        eprintln!("{err:#}");
        err
    })
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let (scan, json) = match cli.command {
        Command::File { path, fifo, json } => (run_file(&path, fifo)?, json),
        Command::Listen {
            socket,
            connections,
            json,
        } => (run_listen(&socket, connections)?, json),
    };
    print_summary(scan, json)
}

fn run_file(path: &Path, fifo: bool) -> Result<Scan> {
    if fifo {
        make_fifo(path)?;
        eprintln!("Capturing allocations from {}...", path.display());
    }
    let file = File::open(path).with_context(|| format!("open log: {}", path.display()))?;
    let mut scan = Scan::new();
    scan.feed_lines(BufReader::new(file))
        .with_context(|| format!("read log: {}", path.display()))?;
    Ok(scan)
}

fn make_fifo(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err).with_context(|| format!("remove {}", path.display())),
    }
    let c_path = CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("path contains a NUL byte: {}", path.display()))?;
    if unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) } != 0 {
        return Err(io::Error::last_os_error()).with_context(|| format!("mkfifo {}", path.display()));
    }
    Ok(())
}

fn run_listen(socket: &Path, connections: u32) -> Result<Scan> {
    if connections == 0 {
        bail!("--connections must be at least 1");
    }
    let listener =
        EventListener::bind(socket).with_context(|| format!("bind {}", socket.display()))?;
    log::info!("listening on {}", listener.path().display());
    let mut scan = Scan::new();
    for n in 1..=connections {
        let mut conn = listener.accept().context("accept producer")?;
        log::info!("producer {n}/{connections} connected");
        scan.feed_connection(&mut conn)
            .with_context(|| format!("producer {n}"))?;
    }
    Ok(scan)
}

fn print_summary(scan: Scan, json: bool) -> Result<()> {
    let leaks = scan.tracker.leak_summary();
    if json {
        let summary = Summary {
            events: scan.events,
            stats: scan.tracker.stats(),
            leaks,
        };
        let out = serde_json::to_string_pretty(&summary).context("encode summary")?;
        println!("{out}");
    } else {
        print!("{}", report::render_table(&leaks));
    }
    Ok(())
}
