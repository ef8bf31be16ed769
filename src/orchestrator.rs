use crate::queue::{JobQueue, designated_output};
use crate::supervisor::{FaultReason, OcrSupervisor};
use crate::util::{ensure_dir, now_rfc3339};
use crate::watcher::WatcherEvent;
use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Everything the control loop reacts to, from all four async sources.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// The watcher's one-time recursive scan result.
    InitialScan(Vec<PathBuf>),
    /// A live filesystem change under the watch root.
    Watch(WatcherEvent),
    /// The hand-off listener received a finished file's temp path.
    Completed(PathBuf),
    /// The poller gave up on the current job.
    Fault(FaultReason),
}

#[derive(Debug, Clone)]
pub struct Job {
    pub source: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub source: PathBuf,
    pub reason: String,
    pub at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub remaining: usize,
    pub processed: u64,
    pub skipped: u64,
    pub current: Option<PathBuf>,
    pub errors: Vec<FailureRecord>,
}

/// The single owner of queue, counters and the in-flight job. All
/// mutation happens on the thread draining `run`; the feeder threads only
/// send events.
pub struct Orchestrator {
    watch_root: PathBuf,
    output_root: PathBuf,
    profile: Option<PathBuf>,
    queue: JobQueue,
    current: Option<Job>,
    processed: u64,
    skipped: u64,
    errors: Vec<FailureRecord>,
    supervisor: OcrSupervisor,
}

impl Orchestrator {
    pub fn new(
        watch_root: PathBuf,
        output_root: PathBuf,
        profile: Option<PathBuf>,
        supervisor: OcrSupervisor,
    ) -> Self {
        Self {
            watch_root,
            output_root,
            profile,
            queue: JobQueue::new(),
            current: None,
            processed: 0,
            skipped: 0,
            errors: Vec::new(),
            supervisor,
        }
    }

    /// Drains pipeline events until the channel closes. Sequential by
    /// construction: the next job starts only from within a completion or
    /// fault handler, never concurrently.
    pub fn run(&mut self, events: &Receiver<PipelineEvent>) -> Result<()> {
        loop {
            let event = events
                .recv()
                .with_context(|| "pipeline event channel closed")?;
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::InitialScan(paths) => self.on_initial_scan(paths),
            PipelineEvent::Watch(ev) => self.on_watch_event(ev),
            PipelineEvent::Completed(temp) => self.on_completed(&temp),
            PipelineEvent::Fault(reason) => self.on_fault(&reason),
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            remaining: self.queue.len(),
            processed: self.processed,
            skipped: self.skipped,
            current: self.current.as_ref().map(|j| j.source.clone()),
            errors: self.errors.clone(),
        }
    }

    fn on_initial_scan(&mut self, paths: Vec<PathBuf>) {
        let count = self.queue.replace(paths);
        if let Some(job) = &self.current {
            self.queue.remove(&job.source);
        }
        info!("found {count} files");
        self.start_next_if_idle();
    }

    fn on_watch_event(&mut self, event: WatcherEvent) {
        match event {
            WatcherEvent::Created(path) | WatcherEvent::RenamedTo(path) => {
                let in_flight = self
                    .current
                    .as_ref()
                    .is_some_and(|job| job.source == path);
                if !in_flight && self.queue.push(path) {
                    info!("{} files remaining", self.queue.len());
                }
                self.start_next_if_idle();
            }
            WatcherEvent::Deleted(path) | WatcherEvent::RenamedFrom(path) => {
                if self.queue.remove(&path) {
                    info!("{} files remaining", self.queue.len());
                }
            }
            WatcherEvent::Updated(_) => {}
        }
    }

    fn on_completed(&mut self, temp: &Path) {
        // The tool stays open after handing its result off; reap it
        // before touching the output.
        self.supervisor.kill();
        let Some(job) = self.current.take() else {
            warn!("completion received with no job in flight: {}", temp.display());
            return;
        };

        if let Err(err) = relocate(temp, &job.output) {
            error!(
                "moving {} to {}: {err:#}",
                temp.display(),
                job.output.display()
            );
        } else {
            info!("finished {}", job.output.display());
        }
        self.processed += 1;
        self.start_next();
    }

    fn on_fault(&mut self, reason: &FaultReason) {
        self.supervisor.kill();
        let Some(job) = self.current.take() else {
            warn!("fault with no job in flight: {reason}");
            return;
        };

        error!("error processing {}: {reason}", job.source.display());
        self.errors.push(FailureRecord {
            source: job.source,
            reason: reason.to_string(),
            at: now_rfc3339(),
        });
        self.processed += 1;
        self.start_next();
    }

    fn start_next_if_idle(&mut self) {
        if self.current.is_none() {
            self.start_next();
        }
    }

    /// Pops candidates until one needs converting. Candidates whose output
    /// already exists are counted as skipped and never launched. Launch
    /// failures are recorded like faults and the scan continues.
    fn start_next(&mut self) {
        loop {
            let Some(source) = self.queue.pop_front() else {
                info!("queue empty; waiting for files");
                return;
            };
            let output = designated_output(&self.watch_root, &self.output_root, &source);
            if output.exists() {
                self.skipped += 1;
                info!("skipping {}: output already exists", source.display());
                continue;
            }
            match self.supervisor.start(&source, self.profile.as_deref()) {
                Ok(()) => {
                    info!("processing {}", source.display());
                    self.current = Some(Job { source, output });
                    return;
                }
                Err(err) => {
                    warn!("could not launch tool for {}: {err:#}", source.display());
                    self.errors.push(FailureRecord {
                        source,
                        reason: format!("launch failed: {err:#}"),
                        at: now_rfc3339(),
                    });
                    self.processed += 1;
                }
            }
        }
    }
}

/// Moves the tool's temp output into place, creating parent directories.
/// Falls back to copy-and-delete when the temp and output folders sit on
/// different filesystems.
fn relocate(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent)?;
    }
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).with_context(|| "copying output into place")?;
    std::fs::remove_file(from).with_context(|| "removing temp output")?;
    Ok(())
}
