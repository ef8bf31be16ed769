use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Ordered backlog of source paths waiting for conversion. FIFO by
/// discovery order; a path is never queued twice while pending.
#[derive(Debug, Default)]
pub struct JobQueue {
    entries: VecDeque<PathBuf>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the backlog with an initial scan result, deduplicated but
    /// otherwise in the given order. Returns the resulting length.
    pub fn replace(&mut self, paths: Vec<PathBuf>) -> usize {
        self.entries.clear();
        for p in paths {
            self.push(p);
        }
        self.entries.len()
    }

    /// Appends a path unless it is already pending. Returns whether the
    /// queue changed.
    pub fn push(&mut self, path: PathBuf) -> bool {
        if self.entries.iter().any(|p| *p == path) {
            return false;
        }
        self.entries.push_back(path);
        true
    }

    /// Removes a pending path (delete / rename-away). Absent paths are a
    /// no-op: the file may already be in flight or never matched.
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.entries.len();
        self.entries.retain(|p| p != path);
        self.entries.len() != before
    }

    pub fn pop_front(&mut self) -> Option<PathBuf> {
        self.entries.pop_front()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|p| p == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where the converted file for `source` belongs: the source's path
/// relative to the watch root, mirrored under the output root, with the
/// final extension replaced by `.pdf`. The same rule applies to every
/// source type, PDF inputs included.
pub fn designated_output(watch_root: &Path, output_root: &Path, source: &Path) -> PathBuf {
    let rel = source
        .strip_prefix(watch_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(source.file_name().unwrap_or(source.as_os_str())));
    output_root.join(rel).with_extension("pdf")
}
