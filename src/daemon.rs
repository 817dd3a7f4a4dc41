use std::fs::{File, OpenOptions};
use std::io::{Seek as _, SeekFrom, Write as _};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use daemonize::Daemonize;
use fs2::FileExt as _;
use log::{LevelFilter, debug, warn};
use syslog::{BasicLogger, Facility, Formatter3164};
use tokio::signal::unix::{SignalKind, signal};

const LOCK_RETRY: Duration = Duration::from_millis(100);

/// Exclusive lock on the pid file, held until the process exits.
#[derive(Debug)]
pub struct PidLock {
    _file: File,
}

impl PidLock {
    /// Take the lock, retrying until `timeout`, then record our pid in the file.
    pub fn acquire(path: &Path, timeout: Duration) -> anyhow::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("could not open pid file {}", path.display()))?;

        let deadline = Instant::now() + timeout;
        while let Err(err) = file.try_lock_exclusive() {
            if Instant::now() >= deadline {
                return Err(err).with_context(|| {
                    format!(
                        "another instance holds {} (waited {:?})",
                        path.display(),
                        timeout
                    )
                });
            }
            thread::sleep(LOCK_RETRY);
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;
        Ok(PidLock { _file: file })
    }
}

/// Fork into the background. Must run before any runtime threads exist.
pub fn detach() -> anyhow::Result<()> {
    Daemonize::new()
        .working_directory("/")
        .start()
        .map_err(|err| anyhow::anyhow!("could not detach from the terminal: {}", err))
}

pub fn init_logging(foreground: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    if foreground {
        let mut builder = pretty_env_logger::formatted_timed_builder();
        builder.filter_level(level);
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        builder.try_init()?;
    } else {
        let formatter = Formatter3164 {
            facility: Facility::LOG_DAEMON,
            hostname: None,
            process: env!("CARGO_PKG_NAME").into(),
            pid: std::process::id(),
        };
        let logger = syslog::unix(formatter)
            .map_err(|err| anyhow::anyhow!("could not connect to syslog: {}", err))?;
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(err), _) | (_, Err(err)) => {
            warn!(
                "Could not install signal handlers, running until killed: {}",
                err
            );
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => debug!("Received SIGTERM"),
        _ = sigint.recv() => debug!("Received SIGINT"),
    }
}
