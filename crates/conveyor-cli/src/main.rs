//! conveyor demo: several producers, one worker, pause/resume in between.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use conveyor_core::{HandlerError, QueueBuilder, QueueOptions, WorkQueue};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conveyor", about = "Single-consumer work queue demo")]
struct Cli {
    /// TOML file with queue options (name, start_immediately, enqueue_when_stopped, clear_on_stop)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Producer threads
    #[arg(long, default_value_t = 3)]
    producers: usize,

    /// Items pushed by each producer
    #[arg(long, default_value_t = 20)]
    items: u64,

    /// Fail every n-th item (0 = never)
    #[arg(long, default_value_t = 7)]
    fail_every: u64,

    /// Simulated work per item, in milliseconds
    #[arg(long, default_value_t = 2)]
    work_ms: u64,

    /// Pause the worker while producers run, resume afterwards
    #[arg(long)]
    pause: bool,

    /// Override: discard the backlog when pausing
    #[arg(long)]
    clear_on_stop: bool,

    /// Override: drop items pushed while paused
    #[arg(long)]
    drop_when_stopped: bool,
}

#[derive(Debug, Clone, Copy)]
struct Job {
    producer: usize,
    seq: u64,
}

fn load_options(cli: &Cli) -> anyhow::Result<QueueOptions> {
    let mut options = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            QueueOptions::from_toml_str(&text)?
        }
        None => QueueOptions {
            name: "demo".to_string(),
            ..QueueOptions::default()
        },
    };
    if cli.clear_on_stop {
        options.clear_on_stop = true;
    }
    if cli.drop_when_stopped {
        options.enqueue_when_stopped = false;
    }
    Ok(options)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let options = load_options(&cli)?;
    info!(?options, "starting queue");

    // (A) handler と error handler を用意
    let fail_every = cli.fail_every;
    let work = Duration::from_millis(cli.work_ms);
    let queue = QueueBuilder::<Job>::new()
        .options(options)
        .handler(move |job: Job| -> Result<(), String> {
            thread::sleep(work);
            if fail_every > 0 && job.seq % fail_every == fail_every - 1 {
                return Err(format!("producer {} item {} rejected", job.producer, job.seq));
            }
            info!(producer = job.producer, seq = job.seq, "handled");
            Ok(())
        })
        .error_handler(|e: HandlerError| warn!(error = %e, "job failed"))
        .spawn()?;
    let queue: Arc<WorkQueue<Job>> = Arc::new(queue);

    // (B) 一時停止しておけば、producer の投入分は backlog に溜まる
    if cli.pause {
        queue.stop();
    }

    // (C) producer を起動
    let producers: Vec<_> = (0..cli.producers)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            let items = cli.items;
            thread::spawn(move || {
                let accepted = (0..items)
                    .filter(|&seq| queue.enqueue(Job { producer, seq }))
                    .count();
                info!(producer, accepted, "producer finished");
            })
        })
        .collect();
    for producer in producers {
        if producer.join().is_err() {
            warn!("producer thread panicked");
        }
    }

    // (D) 再開して backlog を流す
    if cli.pause {
        info!(backlog = queue.len(), "resuming");
        queue.start();
    }

    let stats = loop {
        let stats = queue.stats();
        if stats.processed + stats.failed + stats.cleared >= stats.enqueued {
            break stats;
        }
        thread::sleep(Duration::from_millis(20));
    };
    println!("{}", serde_json::to_string_pretty(&stats)?);

    let queue = Arc::into_inner(queue).context("queue still shared")?;
    queue.shutdown()?;
    Ok(())
}
