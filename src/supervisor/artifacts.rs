use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

const PID_LINE: &str = r"(?m)^PID:\s*(\d+)\s*$";

/// Locates the tool's working directory for one run. Each run directory
/// under the tool's temp subfolder carries a `*.loc` marker file whose
/// text names the owning process id; newest directories are tried first.
pub fn find_run_dir(temp_root: &Path, pid: u32) -> Option<PathBuf> {
    let re = Regex::new(PID_LINE).ok()?;
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(temp_root)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs.iter().rev() {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_loc = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("loc"));
            if !is_loc {
                continue;
            }
            let Ok(text) = std::fs::read_to_string(&path) else {
                continue;
            };
            let owned = re
                .captures_iter(&text)
                .any(|c| c[1].parse::<u32>() == Ok(pid));
            if owned {
                return Some(dir.clone());
            }
        }
    }
    None
}

/// Best-effort removal of the run directory plus stray `*.tmp` files the
/// tool leaves next to it. Every failure is swallowed; artifact cleanup
/// must never take the pipeline down.
pub fn purge_run_artifacts(temp_root: &Path, pid: u32) {
    if let Some(dir) = find_run_dir(temp_root, pid) {
        debug!("removing tool work dir {}", dir.display());
        let _ = std::fs::remove_dir_all(&dir);
    }

    let Ok(entries) = std::fs::read_dir(temp_root) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let is_tmp = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("tmp"));
        if is_tmp && path.is_file() {
            let _ = std::fs::remove_file(&path);
        }
    }
}
