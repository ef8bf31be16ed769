use crate::orchestrator::PipelineEvent;
use crate::util::matches_extension;
use anyhow::{Context, Result, bail};
use crossbeam_channel::{Sender, bounded, select, unbounded};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// One change in the watched tree, already extension-filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    Created(PathBuf),
    Deleted(PathBuf),
    Updated(PathBuf),
    RenamedFrom(PathBuf),
    RenamedTo(PathBuf),
}

pub struct WatcherHandle {
    stop: Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// Signals the watcher thread and waits for it to acknowledge. No
    /// events are delivered after this returns.
    pub fn stop(mut self) {
        self.stop.send(()).ok();
        if let Some(join) = self.join.take() {
            join.join().ok();
        }
    }
}

pub struct DirectoryWatcher;

impl DirectoryWatcher {
    /// Establishes the recursive watch, then spawns the watcher thread:
    /// one initial scan delivered as `InitialScan`, followed by filtered
    /// `Watch` events until stopped. Failure to establish the watch is
    /// fatal and reported before any thread starts.
    pub fn spawn(
        root: &Path,
        extensions: &[String],
        events: Sender<PipelineEvent>,
    ) -> Result<WatcherHandle> {
        if !root.is_dir() {
            bail!("watch folder is not a directory: {}", root.display());
        }

        let (raw_tx, raw_rx) = unbounded::<notify::Result<notify::Event>>();
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
            raw_tx.send(res).ok();
        })
        .with_context(|| "creating filesystem watcher")?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("watching {}", root.display()))?;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let root = root.to_path_buf();
        let extensions = extensions.to_vec();

        let join = std::thread::spawn(move || {
            // Keep the OS watch handle alive for the thread's lifetime;
            // dropping it on exit tears the watch down.
            let _watcher = watcher;

            let snapshot = scan_existing(&root, &extensions);
            if events.send(PipelineEvent::InitialScan(snapshot)).is_err() {
                return;
            }

            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(raw_rx) -> msg => match msg {
                        Ok(Ok(event)) => {
                            for ev in map_event(event, &extensions) {
                                debug!(?ev, "watch event");
                                if events.send(PipelineEvent::Watch(ev)).is_err() {
                                    return;
                                }
                            }
                        }
                        Ok(Err(err)) => warn!("filesystem watch error: {err}"),
                        Err(_) => break,
                    },
                }
            }
        });

        Ok(WatcherHandle {
            stop: stop_tx,
            join: Some(join),
        })
    }
}

/// Recursive scan for files matching the extension filter, in sorted
/// order so discovery order is stable. Files vanishing mid-scan are
/// skipped, not errors.
pub fn scan_existing(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| matches_extension(p, extensions))
        .collect()
}

fn map_event(event: notify::Event, extensions: &[String]) -> Vec<WatcherEvent> {
    let mut out = Vec::new();
    let mut push = |ev: WatcherEvent| {
        let path = match &ev {
            WatcherEvent::Created(p)
            | WatcherEvent::Deleted(p)
            | WatcherEvent::Updated(p)
            | WatcherEvent::RenamedFrom(p)
            | WatcherEvent::RenamedTo(p) => p,
        };
        if matches_extension(path, extensions) {
            out.push(ev);
        }
    };

    match event.kind {
        EventKind::Create(_) => {
            for p in event.paths {
                push(WatcherEvent::Created(p));
            }
        }
        EventKind::Remove(_) => {
            for p in event.paths {
                push(WatcherEvent::Deleted(p));
            }
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => {
                for p in event.paths {
                    push(WatcherEvent::RenamedFrom(p));
                }
            }
            RenameMode::To => {
                for p in event.paths {
                    push(WatcherEvent::RenamedTo(p));
                }
            }
            RenameMode::Both => {
                let mut paths = event.paths.into_iter();
                if let Some(from) = paths.next() {
                    push(WatcherEvent::RenamedFrom(from));
                }
                if let Some(to) = paths.next() {
                    push(WatcherEvent::RenamedTo(to));
                }
            }
            // Some backends report renames without a direction; whether
            // the path still exists decides which side this was.
            _ => {
                for p in event.paths {
                    if p.exists() {
                        push(WatcherEvent::RenamedTo(p));
                    } else {
                        push(WatcherEvent::RenamedFrom(p));
                    }
                }
            }
        },
        EventKind::Modify(_) => {
            for p in event.paths {
                push(WatcherEvent::Updated(p));
            }
        }
        _ => {}
    }

    out
}
