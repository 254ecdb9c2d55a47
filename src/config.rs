use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

// -----------------------------------------------------------------------------
// SandboxConfig (root)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Container CLI binary, e.g. `docker` or `podman`.
    pub docker_bin: String,
    pub images: ImageConfig,
    /// Host directory where sources are staged before being mounted.
    pub staging_dir: PathBuf,
    /// Container directory the staged source is mounted under.
    pub mount_dir: String,
    pub default_timeout_secs: u64,
    pub max_concurrent_sessions: usize,
    pub limits: ResourceLimits,
    pub search: SearchConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            images: ImageConfig::default(),
            staging_dir: std::env::temp_dir(),
            mount_dir: "/sandbox".to_string(),
            default_timeout_secs: 30,
            max_concurrent_sessions: 4,
            limits: ResourceLimits::default(),
            search: SearchConfig::default(),
        }
    }
}

impl SandboxConfig {
    /// Load a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config {}", path.display()))
            }
        };
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid sandbox config {}", path.display()))
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

// -----------------------------------------------------------------------------
// ImageConfig
// -----------------------------------------------------------------------------

/// Container images per toolchain. The C/C++ image needs gcc, g++, clang-tidy,
/// clang-format, cppcheck and valgrind; see `images/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub c_toolchain: String,
    pub cpp_toolchain: String,
    pub python_runtime: String,
    pub python_lint: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            c_toolchain: "copilot-sandbox/c-toolchain:latest".to_string(),
            cpp_toolchain: "copilot-sandbox/c-toolchain:latest".to_string(),
            python_runtime: "python:3.12-slim".to_string(),
            python_lint: "copilot-sandbox/python-lint:latest".to_string(),
        }
    }
}

// -----------------------------------------------------------------------------
// ResourceLimits
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Passed to `--memory`, e.g. `512m`.
    pub memory: Option<String>,
    pub pids: Option<u32>,
    pub network_disabled: bool,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory: Some("512m".to_string()),
            pids: Some(128),
            network_disabled: true,
        }
    }
}

// -----------------------------------------------------------------------------
// SearchConfig
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub result_count: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.bing.microsoft.com/v7.0/search".to_string(),
            api_key: None,
            result_count: 3,
        }
    }
}
