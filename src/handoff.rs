use crate::config::Handoff as HandoffConfig;
use crate::orchestrator::PipelineEvent;
use anyhow::{Context, Result, anyhow};
use crossbeam_channel::Sender;
use interprocess::local_socket::{
    GenericNamespaced, Listener, ListenerNonblockingMode, ListenerOptions, Stream, ToNsName,
    prelude::*,
};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{info, warn};

/// Local-socket server the viewer proxy reports finished files to. One
/// connection at a time; the entire payload of a connection is one UTF-8
/// path, emitted to the control loop as `Completed`. Restartable across
/// pipeline stop/start cycles.
pub struct HandoffListener {
    endpoint: String,
    accept_poll: Duration,
    events: Sender<PipelineEvent>,
    stop: Option<Arc<AtomicBool>>,
    join: Option<JoinHandle<()>>,
}

impl HandoffListener {
    pub fn new(cfg: &HandoffConfig, events: Sender<PipelineEvent>) -> Self {
        Self {
            endpoint: cfg.endpoint.clone(),
            accept_poll: Duration::from_millis(cfg.accept_poll_ms.max(1)),
            events,
            stop: None,
            join: None,
        }
    }

    /// Binds the well-known endpoint and starts the accept thread. A name
    /// already bound by another instance is a fatal configuration error.
    pub fn start(&mut self) -> Result<()> {
        if self.join.is_some() {
            return Err(anyhow!("hand-off listener already running"));
        }

        let name = self
            .endpoint
            .as_str()
            .to_ns_name::<GenericNamespaced>()
            .with_context(|| format!("endpoint name '{}'", self.endpoint))?;
        let listener = ListenerOptions::new().name(name).create_sync().map_err(|err| {
            if err.kind() == std::io::ErrorKind::AddrInUse {
                anyhow!(
                    "hand-off endpoint '{}' is already bound; is another instance running?",
                    self.endpoint
                )
            } else {
                anyhow!("binding hand-off endpoint '{}': {err}", self.endpoint)
            }
        })?;
        listener
            .set_nonblocking(ListenerNonblockingMode::Accept)
            .with_context(|| "setting nonblocking accept")?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let events = self.events.clone();
        let poll = self.accept_poll;
        let join = std::thread::spawn(move || accept_loop(listener, thread_stop, events, poll));

        self.stop = Some(stop);
        self.join = Some(join);
        info!("listening for hand-off paths on '{}'", self.endpoint);
        Ok(())
    }

    /// Stops the accept thread and releases the endpoint. Safe to call
    /// when not running.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::SeqCst);
        }
        if let Some(join) = self.join.take() {
            join.join().ok();
            info!("stopped listening for hand-off paths");
        }
    }
}

impl Drop for HandoffListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: Listener,
    stop: Arc<AtomicBool>,
    events: Sender<PipelineEvent>,
    poll: Duration,
) {
    loop {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok(mut conn) => {
                let mut payload = String::new();
                match conn.read_to_string(&mut payload) {
                    Ok(_) => {
                        let path = payload.trim();
                        if path.is_empty() {
                            warn!("empty hand-off payload");
                        } else {
                            info!("hand-off path received: {path}");
                            if events
                                .send(PipelineEvent::Completed(PathBuf::from(path)))
                                .is_err()
                            {
                                break;
                            }
                        }
                    }
                    Err(err) => warn!("reading hand-off payload: {err}"),
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(poll);
            }
            Err(err) => {
                warn!("hand-off accept failed: {err}");
                std::thread::sleep(poll);
            }
        }
    }
}

/// Client side of the protocol, used by the viewer proxy: connect, write
/// the path as the whole payload, close.
pub fn send_path(endpoint: &str, path: &Path) -> Result<()> {
    let name = endpoint
        .to_ns_name::<GenericNamespaced>()
        .with_context(|| format!("endpoint name '{endpoint}'"))?;
    let mut conn = Stream::connect(name)
        .with_context(|| format!("connecting to hand-off endpoint '{endpoint}'"))?;
    conn.write_all(path.to_string_lossy().as_bytes())
        .with_context(|| "writing hand-off path")?;
    conn.flush().with_context(|| "flushing hand-off path")?;
    Ok(())
}

/// Checks that the endpoint can be bound right now (diagnostics only);
/// the binding is released immediately.
pub fn probe_endpoint(endpoint: &str) -> Result<()> {
    let name = endpoint
        .to_ns_name::<GenericNamespaced>()
        .with_context(|| format!("endpoint name '{endpoint}'"))?;
    let _listener = ListenerOptions::new()
        .name(name)
        .create_sync()
        .with_context(|| format!("binding hand-off endpoint '{endpoint}'"))?;
    Ok(())
}
