//! Gradeflow configuration loaded from `gradeflow.toml`.
//!
//! [`GradeflowConfig`] holds every tunable. Keys missing from the file fall
//! back to defaults. The `GRADEFLOW_TRANSITION_DELAY_MS` environment variable
//! takes precedence over the file.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::dispatcher::{ConsoleSink, Dispatcher, TracingSink};
use crate::error::GradeflowError;

/// File looked up by [`GradeflowConfig::load`].
pub const CONFIG_FILE: &str = "gradeflow.toml";

/// Environment override for [`GradeflowConfig::transition_delay_ms`].
pub const DELAY_ENV_VAR: &str = "GRADEFLOW_TRANSITION_DELAY_MS";

/// Delay shared by auto-submit and auto-grade.
pub const DEFAULT_TRANSITION_DELAY: Duration = Duration::from_millis(500);

/// Where notifications go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// `Observer → …` lines on stdout.
    #[default]
    Console,
    /// Structured `tracing` events.
    Log,
    /// No dispatcher at all.
    Silent,
}

/// Top-level configuration loaded from `gradeflow.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct GradeflowConfig {
    /// Milliseconds before a deferred auto-submit or auto-grade fires.
    #[serde(default = "default_transition_delay_ms")]
    pub transition_delay_ms: u64,

    /// Notification sink wired into every enrolled student.
    #[serde(default)]
    pub sink: SinkKind,
}

fn default_transition_delay_ms() -> u64 {
    DEFAULT_TRANSITION_DELAY.as_millis() as u64
}

impl Default for GradeflowConfig {
    fn default() -> Self {
        Self {
            transition_delay_ms: default_transition_delay_ms(),
            sink: SinkKind::default(),
        }
    }
}

impl GradeflowConfig {
    /// Load `gradeflow.toml` from the current directory, using defaults if it
    /// does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load configuration from `path`, using defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::read(path).with_context(|| format!("loading {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_delay_override(std::env::var(DELAY_ENV_VAR).ok())?;
        Ok(config)
    }

    /// Read and parse `path` with no defaults or environment override.
    pub fn read(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply a raw override for the transition delay. Empty values are ignored.
    pub fn apply_delay_override(&mut self, raw: Option<String>) -> crate::Result<()> {
        let Some(raw) = raw.filter(|v| !v.trim().is_empty()) else {
            return Ok(());
        };

        self.transition_delay_ms = raw.trim().parse().map_err(|_| {
            GradeflowError::Config(format!("{DELAY_ENV_VAR} must be milliseconds, got {raw:?}"))
        })?;
        Ok(())
    }

    pub fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_delay_ms)
    }

    /// Build the dispatcher selected by [`sink`](Self::sink).
    pub fn dispatcher(&self) -> Option<Arc<Dispatcher>> {
        let dispatcher = match self.sink {
            SinkKind::Console => Dispatcher::new().with_sink(Arc::new(ConsoleSink)),
            SinkKind::Log => Dispatcher::new().with_sink(Arc::new(TracingSink)),
            SinkKind::Silent => return None,
        };
        Some(Arc::new(dispatcher))
    }
}
