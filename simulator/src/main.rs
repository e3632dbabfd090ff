use anyhow::Context;
use clap::Parser;
use gui_bridge::bridge::{default_bind_address, GuiBridge};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::{ChannelArgs, WorkflowConfig};
use workflow::runner::{Runner, ShutdownHook};

mod generator;
mod gui_bridge;
mod workflow;

/// Exit status for a forced exit, as a shell reports SIGINT.
const FORCED_EXIT_CODE: i32 = 130;

#[derive(Parser)]
#[command(author, version, about = "Real-time sensing stream handoff driver")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 10_000)]
    queue_capacity: usize,
    #[arg(long, default_value_t = 64)]
    fft_len: usize,
    #[arg(long, default_value_t = 128)]
    freq_len: usize,
    #[arg(long, default_value_t = 128)]
    phase_window: usize,
    #[arg(long, default_value_t = 64)]
    mrf_window: usize,
    /// Consumer tick period in milliseconds (0 = unpaced)
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,
    /// Stop after this many ticks instead of waiting for Ctrl+C
    #[arg(long)]
    ticks: Option<u64>,
    /// Producer frame period in milliseconds
    #[arg(long)]
    frame_ms: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    producers: Option<usize>,
    /// Serve the latest render model over HTTP
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value_t = default_bind_address())]
    bind: SocketAddr,
    /// Append a JSON run summary to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = args.workflow.as_ref() {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(
            args.queue_capacity,
            ChannelArgs {
                fft_len: args.fft_len,
                freq_len: args.freq_len,
                phase_window: args.phase_window,
                mrf_window: args.mrf_window,
            },
            args.tick_ms,
            args.ticks,
        )?
    };
    if let Some(ticks) = args.ticks {
        workflow_config.max_ticks = Some(ticks);
    }
    if let Some(frame_ms) = args.frame_ms {
        workflow_config.generator.frame_interval_ms = frame_ms;
    }
    if let Some(seed) = args.seed {
        workflow_config.generator.seed = seed;
    }
    if let Some(producers) = args.producers {
        workflow_config.producers = producers;
    }

    let gui_bridge = GuiBridge::new();
    if args.serve {
        gui_bridge.serve(args.bind)?;
    }

    let runner = Runner::new(workflow_config);
    let pipeline = runner.prepare(&gui_bridge)?;
    spawn_signal_watcher(pipeline.shutdown_hook())?;
    gui_bridge.publish_status("Pipeline running (Ctrl+C to stop)...");

    let report = pipeline.run()?;
    println!(
        "Run -> ticks {}, exit {:?}, drained {}, rejected {}, failed ticks {}",
        report.ticks,
        report.exit,
        report.drain.applied,
        report.drain.rejected,
        report.drain.tick_failures
    );
    for view in &gui_bridge.snapshot().channels {
        println!("  {} -> {}", view.tag, view.label);
    }
    for err in &report.producer_errors {
        eprintln!("producer error: {}", err);
    }

    if let Some(report_path) = args.report {
        if let Some(parent) = report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&report_path)
            .with_context(|| format!("opening report {}", report_path.display()))?;
        let line = serde_json::to_string(&report).context("serializing run report")?;
        writeln!(file, "{}", line)?;
    }

    Ok(())
}

/// Waits for Ctrl+C on a side thread and performs producer-first shutdown.
/// A second Ctrl+C while shutdown is in progress exits immediately.
fn spawn_signal_watcher(hook: ShutdownHook) -> anyhow::Result<()> {
    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;
    thread::Builder::new()
        .name("signal-watcher".into())
        .spawn(move || {
            if let Err(err) = runtime.block_on(signal::ctrl_c()) {
                log::warn!("unable to listen for Ctrl+C: {}", err);
                return;
            }
            log::info!("interrupt received, shutting down (Ctrl+C again to force exit)");
            let shutdown = thread::Builder::new()
                .name("shutdown".into())
                .spawn(move || hook.trigger());
            if let Err(err) = shutdown {
                log::warn!("unable to start shutdown thread: {}", err);
                std::process::exit(FORCED_EXIT_CODE);
            }
            if runtime.block_on(signal::ctrl_c()).is_ok() {
                log::warn!("second interrupt, exiting without waiting for producers");
                std::process::exit(FORCED_EXIT_CODE);
            }
        })
        .context("spawning signal watcher")?;
    Ok(())
}
