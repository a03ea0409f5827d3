//! Configuration for a terminal core instance

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Shell used when `$SHELL` is unset
pub const FALLBACK_SHELL: &str = "/bin/sh";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Program to run in the PTY
    pub shell: PathBuf,
    /// Arguments passed to the shell
    pub args: Vec<String>,
    /// Working directory; inherited when unset
    pub working_dir: Option<PathBuf>,
    /// Initial width in columns
    pub cols: u16,
    /// Initial height in rows
    pub rows: u16,
    /// Maximum scrollback lines
    pub scrollback_lines: usize,
    /// Pending write chunks before writes fail fast
    pub write_queue_capacity: usize,
    /// How long `close` waits after SIGTERM before SIGKILL
    pub close_grace_ms: u64,
    /// Reader poll timeout, bounds shutdown latency
    pub poll_interval_ms: u64,
    /// Extra environment variables for the shell
    pub env: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            args: Vec::new(),
            working_dir: None,
            cols: 80,
            rows: 24,
            scrollback_lines: 10000,
            write_queue_capacity: 256,
            close_grace_ms: 500,
            poll_interval_ms: 20,
            env: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Default configuration running `shell`
    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("failed to write {}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        if self.shell.as_os_str().is_empty() {
            return Err(Error::Config("shell must not be empty".to_string()));
        }
        if self.cols == 0 || self.rows == 0 {
            return Err(Error::Config(format!(
                "dimensions must be non-zero (got {}x{})",
                self.cols, self.rows
            )));
        }
        if self.write_queue_capacity == 0 {
            return Err(Error::Config(
                "write_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_shell() -> PathBuf {
    std::env::var_os("SHELL")
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(FALLBACK_SHELL))
}
