use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub tool: Tool,
    #[serde(default)]
    pub viewer: Viewer,
    #[serde(default)]
    pub poller: Poller,
    #[serde(default)]
    pub handoff: Handoff,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Resolves the config file: the explicit path if given, else
    /// ./ocr-relay.toml if present, else the checked-in example.
    pub fn resolve_path(user: Option<&Path>) -> PathBuf {
        if let Some(p) = user {
            return p.to_path_buf();
        }
        let default = PathBuf::from("ocr-relay.toml");
        if default.exists() {
            default
        } else {
            PathBuf::from("ocr-relay.example.toml")
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: Default::default(),
            tool: Default::default(),
            viewer: Default::default(),
            poller: Default::default(),
            handoff: Default::default(),
            logging: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub watch_dir: String,
    pub output_dir: String,
    pub extensions: Vec<String>,
    pub profile: String,
}
impl Default for Pipeline {
    fn default() -> Self {
        Self {
            watch_dir: "".into(),
            output_dir: "out".into(),
            extensions: vec![".pdf".into()],
            profile: "".into(),
        }
    }
}

impl Pipeline {
    pub fn profile_path(&self) -> Option<PathBuf> {
        if self.profile.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.profile))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub executable: String,
    pub profile_flag: String,
    pub send_args: Vec<String>,
    pub temp_subdir: String,
}
impl Default for Tool {
    fn default() -> Self {
        Self {
            executable: "FineReader.exe".into(),
            profile_flag: "/OptionsFile".into(),
            send_args: vec!["/send".into(), "Acrobat".into()],
            temp_subdir: "FineReader10".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewer {
    pub executable: String,
}
impl Default for Viewer {
    fn default() -> Self {
        Self {
            executable: "Acrobat.exe".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poller {
    pub interval_ms: u64,
    pub idle_ticks: u32,
    pub failure_phrases: Vec<String>,
}
impl Default for Poller {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            idle_ticks: 20,
            failure_phrases: vec![
                "Some licenses cannot be used".into(),
                "Some of the pages have not been".into(),
                "Process failed".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handoff {
    pub endpoint: String,
    pub accept_poll_ms: u64,
}
impl Default for Handoff {
    fn default() -> Self {
        Self {
            endpoint: "ocr-relay-handoff".into(),
            accept_poll_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
