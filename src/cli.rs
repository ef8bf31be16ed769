use crate::{
    config::Config,
    handoff::{self, HandoffListener},
    orchestrator::Orchestrator,
    queue::designated_output,
    supervisor::{OcrSupervisor, ProcessProbe},
    util::{ensure_dir, now_rfc3339},
    watcher::{self, DirectoryWatcher},
};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ocr-relay")]
#[command(about = "Unattended folder-watch OCR conversion orchestrator")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./ocr-relay.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch the configured folder and convert until interrupted.
    Run {
        #[arg(long)]
        watch_dir: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// One-shot discovery: list what a run would pick up right now.
    Scan {
        #[arg(long)]
        watch_dir: Option<PathBuf>,
    },
    /// Check the environment: folders, tool, viewer, hand-off endpoint.
    Doctor {},
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = Config::resolve_path(args.config.as_deref());
    let cfg = Config::load(&cfg_path)?;
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Run {
            watch_dir,
            output_dir,
        } => run(&cfg, watch_dir.as_deref(), output_dir.as_deref()),
        Command::Scan { watch_dir } => scan(&cfg, watch_dir.as_deref()),
        Command::Doctor {} => doctor(&cfg),
    }
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if cfg.logging.write_to_file {
        let path = if cfg.logging.file_path.is_empty() {
            PathBuf::from("ocr-relay.log")
        } else {
            PathBuf::from(&cfg.logging.file_path)
        };
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(&path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn effective_dirs(
    cfg: &Config,
    watch_override: Option<&Path>,
    output_override: Option<&Path>,
) -> Result<(PathBuf, PathBuf)> {
    let watch = watch_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&cfg.pipeline.watch_dir));
    if watch.as_os_str().is_empty() {
        bail!("no watch folder configured; set [pipeline] watch_dir or pass --watch-dir");
    }
    if !watch.is_dir() {
        bail!("invalid watch folder: {}", watch.display());
    }
    let output = output_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&cfg.pipeline.output_dir));
    Ok((watch, output))
}

fn run(cfg: &Config, watch_override: Option<&Path>, output_override: Option<&Path>) -> Result<()> {
    let (watch_dir, output_dir) = effective_dirs(cfg, watch_override, output_override)?;
    ensure_dir(&output_dir)?;

    let (tx, rx) = crossbeam_channel::unbounded();

    // Bind the hand-off endpoint before anything can start a job; a name
    // collision must stop the run here.
    let mut listener = HandoffListener::new(&cfg.handoff, tx.clone());
    listener.start()?;

    let supervisor = OcrSupervisor::new(
        cfg.tool.clone(),
        cfg.poller.clone(),
        tx.clone(),
        ProcessProbe::factory(),
    );
    let mut orchestrator = Orchestrator::new(
        watch_dir.clone(),
        output_dir,
        cfg.pipeline.profile_path(),
        supervisor,
    );

    let watcher = DirectoryWatcher::spawn(&watch_dir, &cfg.pipeline.extensions, tx)?;
    info!("watching {}", watch_dir.display());

    let result = orchestrator.run(&rx);

    watcher.stop();
    listener.stop();
    result
}

fn scan(cfg: &Config, watch_override: Option<&Path>) -> Result<()> {
    let (watch_dir, output_dir) = effective_dirs(cfg, watch_override, None)?;

    let found = watcher::scan_existing(&watch_dir, &cfg.pipeline.extensions);
    let mut pending = Vec::new();
    let mut skipped = 0usize;
    for source in &found {
        if designated_output(&watch_dir, &output_dir, source).exists() {
            skipped += 1;
        } else {
            pending.push(source.clone());
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "watch_dir": watch_dir,
            "found": found.len(),
            "pending": pending,
            "skipped_existing": skipped,
            "at": now_rfc3339(),
        }))?
    );
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    let watch_dir = Path::new(&cfg.pipeline.watch_dir);
    let watch_ok = !cfg.pipeline.watch_dir.is_empty() && watch_dir.is_dir();
    let tool_found = Path::new(&cfg.tool.executable).is_file();
    let viewer_found = Path::new(&cfg.viewer.executable).is_file();
    let endpoint_err = handoff::probe_endpoint(&cfg.handoff.endpoint)
        .err()
        .map(|e| format!("{e:#}"));

    let ok = watch_ok && endpoint_err.is_none();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "watch_dir_ok": watch_ok,
            "tool_found": tool_found,
            "viewer_found": viewer_found,
            "endpoint": cfg.handoff.endpoint,
            "endpoint_error": endpoint_err,
            "ok": ok,
            "at": now_rfc3339(),
        }))?
    );
    Ok(())
}
