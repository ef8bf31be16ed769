pub mod cli;
pub mod config;
pub mod handoff;
pub mod orchestrator;
pub mod proxy;
pub mod queue;
pub mod supervisor;
pub mod util;
pub mod watcher;
