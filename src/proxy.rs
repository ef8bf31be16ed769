use crate::config::Config;
use crate::handoff::send_path;
use anyhow::{Context, Result, bail};
use regex::Regex;
use std::ffi::OsString;
use std::io::{BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// What the proxy should do with the argument list the viewer would have
/// received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyAction {
    /// The first argument is a tool-generated temp output; hand it to the
    /// pipeline instead of opening it.
    Forward(PathBuf),
    /// Not ours (or no arguments at all): launch the real viewer with the
    /// original arguments, untouched.
    LaunchViewer(Vec<OsString>),
}

/// Matches the conversion tool's temporary output naming: a generated
/// `tmp*.pdf` file inside the tool's subfolder of the system temp
/// directory. Either separator is accepted so the pattern holds however
/// the path was spelled.
pub fn temp_output_pattern(temp_root: &Path, subdir: &str) -> Result<Regex> {
    let root = temp_root.to_string_lossy();
    let root = root.trim_end_matches(['/', '\\']);
    let pattern = format!(
        r"(?i)^{}[/\\]{}[/\\]tmp\w*\.pdf$",
        regex::escape(root),
        regex::escape(subdir)
    );
    Regex::new(&pattern).with_context(|| "building temp output pattern")
}

pub fn classify(pattern: &Regex, args: &[OsString]) -> ProxyAction {
    let Some(first) = args.first() else {
        return ProxyAction::LaunchViewer(Vec::new());
    };
    if pattern.is_match(&first.to_string_lossy()) {
        ProxyAction::Forward(PathBuf::from(first))
    } else {
        ProxyAction::LaunchViewer(args.to_vec())
    }
}

/// Entry point for the proxy executable. Invoked by the OS in place of
/// the real viewer, with the viewer's argument list.
pub fn run(cfg: &Config, args: &[OsString]) -> Result<()> {
    let pattern = temp_output_pattern(&std::env::temp_dir(), &cfg.tool.temp_subdir)?;
    match classify(&pattern, args) {
        ProxyAction::Forward(path) => forward(cfg, &path, args),
        ProxyAction::LaunchViewer(args) => launch_viewer(cfg, &args),
    }
}

fn forward(cfg: &Config, path: &Path, original_args: &[OsString]) -> Result<()> {
    match send_path(&cfg.handoff.endpoint, path) {
        Ok(()) => {
            info!("forwarded {}", path.display());
            Ok(())
        }
        Err(err) => {
            warn!("pipeline not listening: {err:#}");
            if open_anyway(path) {
                launch_viewer(cfg, original_args)
            } else {
                info!("abandoned {}", path.display());
                Ok(())
            }
        }
    }
}

/// The listener being unreachable is the operator's call: open the file
/// in the real viewer anyway, or abandon it. Without a terminal to ask
/// on, opening is the safe default.
fn open_anyway(path: &Path) -> bool {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return true;
    }
    eprintln!(
        "A converted file was detected but the pipeline is not listening.\n\
         {}\n\
         Open it in the viewer instead? [Y/n]",
        path.display()
    );
    let mut line = String::new();
    if stdin.lock().read_line(&mut line).is_err() {
        return true;
    }
    !line.trim().eq_ignore_ascii_case("n")
}

fn launch_viewer(cfg: &Config, args: &[OsString]) -> Result<()> {
    let viewer = Path::new(&cfg.viewer.executable);
    if !viewer.is_file() {
        bail!("viewer executable not found: {}", viewer.display());
    }
    Command::new(viewer)
        .args(args)
        .spawn()
        .with_context(|| format!("launching viewer {}", viewer.display()))?;
    info!("launched viewer for {} argument(s)", args.len());
    Ok(())
}
