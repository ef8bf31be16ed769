pub mod artifacts;
pub mod poller;
pub mod probe;

use crate::config::{Poller as PollerConfig, Tool as ToolConfig};
use crate::orchestrator::PipelineEvent;
use anyhow::{Context, Result, bail};
use crossbeam_channel::Sender;
use std::path::Path;
use std::process::{Child, Command};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub use poller::FaultReason;
pub use probe::{DialogProbe, ProbeFactory, ProbeObservation, ProcessProbe, ScriptedProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Launching,
    Running,
}

/// Owns the external conversion process for exactly one job at a time:
/// launch, health polling, forced termination, artifact cleanup. Faults
/// discovered by the poller arrive on the shared pipeline channel; the
/// control loop answers them with `kill()`.
pub struct OcrSupervisor {
    tool: ToolConfig,
    poller_cfg: PollerConfig,
    events: Sender<PipelineEvent>,
    probe_factory: ProbeFactory,
    state: SupervisorState,
    child: Option<Arc<Mutex<Child>>>,
    pid: u32,
    poller: Option<poller::PollerHandle>,
}

impl OcrSupervisor {
    pub fn new(
        tool: ToolConfig,
        poller_cfg: PollerConfig,
        events: Sender<PipelineEvent>,
        probe_factory: ProbeFactory,
    ) -> Self {
        Self {
            tool,
            poller_cfg,
            events,
            probe_factory,
            state: SupervisorState::Idle,
            child: None,
            pid: 0,
            poller: None,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Launches the tool for one source file, instructing it to hand the
    /// result to the (substituted) viewer, and starts the health poller.
    pub fn start(&mut self, source: &Path, profile: Option<&Path>) -> Result<()> {
        if self.state != SupervisorState::Idle {
            bail!("a conversion job is already running");
        }
        self.state = SupervisorState::Launching;

        let mut cmd = Command::new(&self.tool.executable);
        cmd.arg(source);
        if let Some(profile) = profile {
            cmd.arg(&self.tool.profile_flag).arg(profile);
        }
        cmd.args(&self.tool.send_args);

        let child = match cmd
            .spawn()
            .with_context(|| format!("spawning {}", self.tool.executable))
        {
            Ok(child) => child,
            Err(err) => {
                self.state = SupervisorState::Idle;
                return Err(err);
            }
        };

        let pid = child.id();
        let child = Arc::new(Mutex::new(child));
        let probe = (self.probe_factory)(child.clone(), pid);
        self.poller = Some(poller::spawn(
            probe,
            self.poller_cfg.clone(),
            self.events.clone(),
        ));
        self.child = Some(child);
        self.pid = pid;
        self.state = SupervisorState::Running;
        debug!(pid, "conversion tool launched");
        Ok(())
    }

    /// Tears the current job down: stops the poller, kills and reaps the
    /// process, purges its temp artifacts. Idempotent; safe when idle.
    /// Always leaves the supervisor `Idle`.
    pub fn kill(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        if let Some(child) = self.child.take() {
            {
                let mut child = child.lock().unwrap_or_else(|e| e.into_inner());
                if let Err(err) = child.kill() {
                    // Already exited is the common case here.
                    debug!("kill: {err}");
                }
                if let Err(err) = child.wait() {
                    warn!("waiting for killed process: {err}");
                }
            }
            let temp_root = std::env::temp_dir().join(&self.tool.temp_subdir);
            artifacts::purge_run_artifacts(&temp_root, self.pid);
            info!(pid = self.pid, "conversion tool stopped");
        }
        self.state = SupervisorState::Idle;
    }
}

impl Drop for OcrSupervisor {
    fn drop(&mut self) {
        self.kill();
    }
}
