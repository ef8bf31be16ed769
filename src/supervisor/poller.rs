use crate::config::Poller as PollerConfig;
use crate::orchestrator::PipelineEvent;
use crate::supervisor::probe::{DialogProbe, ProbeObservation};
use crossbeam_channel::{Sender, bounded, select, tick};
use std::fmt;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Why the poller gave up on the supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultReason {
    PhraseMatched(String),
    IdleTimeout { ticks: u32 },
    ExitedEarly,
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultReason::PhraseMatched(phrase) => write!(f, "failure phrase matched: {phrase}"),
            FaultReason::IdleTimeout { ticks } => {
                write!(f, "idle timeout: no dialog activity for {ticks} polls")
            }
            FaultReason::ExitedEarly => write!(f, "process exited before completion"),
        }
    }
}

/// Per-tick fault decision, kept separate from the timer thread so it can
/// be driven tick by tick in tests.
pub struct TickState {
    cfg: PollerConfig,
    idle_ticks: u32,
}

impl TickState {
    pub fn new(cfg: PollerConfig) -> Self {
        Self { cfg, idle_ticks: 0 }
    }

    pub fn on_observation(&mut self, obs: ProbeObservation) -> Option<FaultReason> {
        match obs {
            ProbeObservation::Exited => Some(FaultReason::ExitedEarly),
            ProbeObservation::Dialog(text) => {
                self.idle_ticks = 0;
                self.cfg
                    .failure_phrases
                    .iter()
                    .find(|phrase| text.contains(phrase.as_str()))
                    .map(|phrase| FaultReason::PhraseMatched(phrase.clone()))
            }
            ProbeObservation::NoDialog => {
                self.idle_ticks += 1;
                debug!(idle_ticks = self.idle_ticks, "no dialog activity");
                (self.idle_ticks >= self.cfg.idle_ticks).then(|| FaultReason::IdleTimeout {
                    ticks: self.idle_ticks,
                })
            }
            ProbeObservation::Unreadable => None,
        }
    }
}

pub struct PollerHandle {
    stop: Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn stop(mut self) {
        self.stop.send(()).ok();
        if let Some(join) = self.join.take() {
            join.join().ok();
        }
    }
}

/// Spawns the fixed-interval health-check thread. The first fault is sent
/// to the control loop and polling stops; the supervisor does the killing.
pub fn spawn(
    mut probe: Box<dyn DialogProbe>,
    cfg: PollerConfig,
    events: Sender<PipelineEvent>,
) -> PollerHandle {
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let interval = Duration::from_millis(cfg.interval_ms.max(1));

    let join = std::thread::spawn(move || {
        let ticker = tick(interval);
        let mut state = TickState::new(cfg);
        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(ticker) -> _ => {
                    if let Some(fault) = state.on_observation(probe.observe()) {
                        events.send(PipelineEvent::Fault(fault)).ok();
                        break;
                    }
                }
            }
        }
    });

    PollerHandle {
        stop: stop_tx,
        join: Some(join),
    }
}
