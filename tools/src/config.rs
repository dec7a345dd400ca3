//! Harness tools configuration loading and parsing

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "/etc/harness/tools.toml";

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub profiler: ProfilerSettings,
}

#[derive(Debug, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_master_host")]
    pub master_host: String,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default = "default_duration")]
    pub duration_seconds: u64,
    /// Number of tools the start latch waits for
    #[serde(default = "default_tools")]
    pub tools: usize,
    #[serde(default = "default_latch_timeout")]
    pub latch_timeout_seconds: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            master_host: default_master_host(),
            out_dir: default_out_dir(),
            duration_seconds: default_duration(),
            tools: default_tools(),
            latch_timeout_seconds: default_latch_timeout(),
        }
    }
}

/// Programs and names used to find and signal profiled processes
#[derive(Debug, Clone, Deserialize)]
pub struct ProfilerSettings {
    #[serde(default = "default_list_program")]
    pub list_program: String,
    #[serde(default = "default_probe_program")]
    pub probe_program: String,
    #[serde(default = "default_signal_program")]
    pub signal_program: String,
    /// Library whose presence marks a process as profiled
    #[serde(default = "default_library")]
    pub library: String,
    #[serde(default = "default_signal")]
    pub signal: String,
    /// Overrides the effective user for process listing
    #[serde(default)]
    pub user: Option<String>,
}

impl Default for ProfilerSettings {
    fn default() -> Self {
        Self {
            list_program: default_list_program(),
            probe_program: default_probe_program(),
            signal_program: default_signal_program(),
            library: default_library(),
            signal: default_signal(),
            user: None,
        }
    }
}

// Default value functions
fn default_log_level() -> String { "info".into() }
fn default_master_host() -> String { "localhost".into() }
fn default_out_dir() -> PathBuf { PathBuf::from("/var/tmp/harness/output") }
fn default_duration() -> u64 { 60 }
fn default_tools() -> usize { 1 }
fn default_latch_timeout() -> u64 { 120 }
fn default_list_program() -> String { "/usr/bin/ps".into() }
fn default_probe_program() -> String { "/usr/bin/pldd".into() }
fn default_signal_program() -> String { "kill".into() }
fn default_library() -> String { "libcollector".into() }
fn default_signal() -> String { "PROF".into() }

/// Load configuration from `HARNESS_TOOLS_CONFIG` or /etc/harness/tools.toml
pub fn load_config() -> Result<ToolsConfig> {
    let config_path = std::env::var("HARNESS_TOOLS_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(Path::new(&config_path))
}

pub fn load_config_from(config_path: &Path) -> Result<ToolsConfig> {
    if config_path.exists() {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config: ToolsConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;
        Ok(config)
    } else {
        tracing::warn!(
            "Config file not found at {}, using defaults",
            config_path.display()
        );
        Ok(ToolsConfig::default())
    }
}
