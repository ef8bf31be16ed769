//! Stand-in for the real viewer executable. The conversion tool is told
//! to send its output here; tool-generated temp paths are relayed to the
//! pipeline, anything else falls through to the real viewer.

use anyhow::Result;
use ocr_relay::{config::Config, proxy};
use std::ffi::OsString;
use tracing::error;

fn main() -> Result<()> {
    // Arguments are the viewer's, passed through verbatim; only the
    // config path comes from the environment.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cfg_path = Config::resolve_path(
        std::env::var_os("OCR_RELAY_CONFIG")
            .map(std::path::PathBuf::from)
            .as_deref(),
    );
    let cfg = Config::load(&cfg_path)?;

    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    if let Err(err) = proxy::run(&cfg, &args) {
        error!("{:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
