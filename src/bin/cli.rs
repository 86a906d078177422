//! News Crawler CLI
//!
//! Local execution entry point.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use news_crawler::{
    error::Result,
    models::{Config, LoggingConfig, Source},
    pipeline::{Scheduler, WorkerPool, download_articles, read_url_list},
    services::HtmlExtractor,
    storage::{LocalArchive, YamlSourceStore, find_articles_by_date, resolve_archive_dir},
};
use tokio::sync::watch;

/// News Crawler - batch news site archiver
#[derive(Parser, Debug)]
#[command(
    name = "news-crawler",
    version,
    about = "Crawls news sites in batches and archives their articles"
)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl sources in cycles until interrupted
    Run {
        /// Stop after one cycle (overrides settings.run_once = false)
        #[arg(long)]
        once: bool,
    },

    /// Validate the configuration file
    Validate,

    /// List configured sources
    Sources,

    /// List archived articles published on a date
    Find {
        /// Publish date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },

    /// Download every URL of a list file into one source folder
    Download {
        /// File with one article URL per line
        #[arg(long)]
        urls: PathBuf,

        /// Archive folder to save into (e.g. washingtonexaminer)
        #[arg(long)]
        source: String,
    },
}

/// Log sink writing every record to both writers (stderr and the log file).
struct Tee<A, B>(A, B);

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write_all(buf)?;
        self.1.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.1.flush()
    }
}

/// Initialize logging from the `logging` section.
///
/// `RUST_LOG` wins over the configured level; `--verbose` forces debug.
fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format_timestamp_secs();

    if let Some(path) = &logging.file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee(io::stderr(), file))));
    }

    builder.init();
    Ok(())
}

/// Wait for interrupts. The first one asks the scheduler to stop after the
/// current batch. Returns true when a second one arrives.
async fn handle_interrupts<F, Fut>(mut interrupt: F, shutdown_tx: watch::Sender<bool>) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    log::warn!("Interrupt received, finishing the current batch (Ctrl-C again to abort)");
    let _ = shutdown_tx.send(true);

    interrupt().await.is_ok()
}

fn spawn_interrupt_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if handle_interrupts(tokio::signal::ctrl_c, shutdown_tx).await {
            log::error!("Second interrupt, aborting");
            std::process::exit(130);
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    init_logging(&config.logging, cli.verbose)?;

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    log::info!("Loaded configuration from {}", cli.config.display());

    let settings = config.settings.clone();

    match cli.command {
        Command::Validate => {
            log::info!(
                "Config OK: {} sources ({} active)",
                config.news_sources.len(),
                config.active_sources().count()
            );
        }

        Command::Sources => {
            for entry in &config.news_sources {
                let source = Source::new(entry);
                println!(
                    "{:<24} {:<16} {:<8} {}",
                    source.name,
                    source.brand,
                    if entry.failed { "failed" } else { "active" },
                    source.url
                );
            }
        }

        Command::Find { date } => {
            let cwd = std::env::current_dir()?;
            let base_dir = resolve_archive_dir(&settings.base_archive_dir, &cwd).await?;
            for path in find_articles_by_date(&base_dir, date).await? {
                println!("{}", path.display());
            }
        }

        Command::Download { urls, source } => {
            let cwd = std::env::current_dir()?;
            let base_dir = resolve_archive_dir(&settings.base_archive_dir, &cwd).await?;
            let archive = Arc::new(LocalArchive::new(base_dir, settings.flavor()));
            log::info!("Archiving into {}", archive.root_dir().display());

            let extractor = Arc::new(HtmlExtractor::new(&settings)?);
            let urls = read_url_list(&urls).await?;
            let pool = WorkerPool::new(settings.max_workers);
            download_articles(extractor, archive, &pool, &source, urls).await?;
        }

        Command::Run { once } => {
            let cwd = std::env::current_dir()?;
            let base_dir = resolve_archive_dir(&settings.base_archive_dir, &cwd).await?;
            let archive = Arc::new(LocalArchive::new(base_dir, settings.flavor()));
            log::info!("Archiving into {}", archive.root_dir().display());

            let extractor = Arc::new(HtmlExtractor::new(&settings)?);
            let store = Arc::new(YamlSourceStore::new(&cli.config));

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            spawn_interrupt_handler(shutdown_tx);

            let run_once = settings.run_once || once;
            let mut scheduler = Scheduler::new(settings, store, extractor, archive, shutdown_rx)
                .with_sources(config.news_sources.clone());
            let cycles = scheduler.run(run_once).await;

            log::info!(
                "Stopped after {} cycle(s), {} source(s) circuit-broken",
                cycles,
                scheduler.tracker().broken_sources().len()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tee_writes_to_both_sinks() {
        let mut tee = Tee(Vec::new(), Vec::new());
        writeln!(tee, "[INFO] cycle 1 done").unwrap();
        tee.flush().unwrap();

        assert_eq!(tee.0, b"[INFO] cycle 1 done\n");
        assert_eq!(tee.0, tee.1);
    }

    #[tokio::test]
    async fn test_second_interrupt_aborts() {
        let (tx, rx) = watch::channel(false);
        assert!(handle_interrupts(|| async { Ok(()) }, tx).await);
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_single_interrupt_only_requests_shutdown() {
        let (tx, rx) = watch::channel(false);
        let mut calls = 0;
        let abort = handle_interrupts(
            || {
                calls += 1;
                let first = calls == 1;
                async move {
                    if first {
                        Ok(())
                    } else {
                        Err(io::Error::other("signal listener closed"))
                    }
                }
            },
            tx,
        )
        .await;

        assert!(!abort);
        assert!(*rx.borrow());
    }
}
