use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scu_ipc::{Bus, NoBus, SimBus, SimConfig};

use crate::error::ConfigError;

/// What a result mismatch does beyond stopping the worker that saw it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Log it; other workers keep going.
    #[default]
    Report,
    /// Stop every worker and make the run fail.
    Halt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// The in-process firmware.
    #[default]
    Sim,
    /// No firmware; the harness stays idle.
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// Mailbox unit to open. Discovered from the bus when absent.
    pub bus_id: Option<u32>,
    pub sim: SimConfig,
}

impl TransportConfig {
    pub fn bus(&self) -> Box<dyn Bus> {
        match self.kind {
            TransportKind::Sim => Box::new(SimBus {
                config: self.sim.clone(),
                faults: Vec::new(),
            }),
            TransportKind::None => Box::new(NoBus),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// Iterations per burst.
    pub iterations: u32,
    pub workers: usize,
    /// Pause between two bursts of a worker.
    pub pause_ms: u64,
    /// Delay between starting two workers.
    pub spawn_stagger_ms: u64,
    pub mismatch_policy: MismatchPolicy,
    pub transport: TransportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: String::from("info"),
            log_file: None,
            iterations: 500,
            workers: 1,
            pause_ms: 10,
            spawn_stagger_ms: 100,
            mismatch_policy: MismatchPolicy::Report,
            transport: TransportConfig::default(),
        }
    }
}

impl Config {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::ZeroCount {
                field: "iterations",
                value: 0,
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroCount {
                field: "workers",
                value: 0,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    #[inline]
    pub fn spawn_stagger(&self) -> Duration {
        Duration::from_millis(self.spawn_stagger_ms)
    }
}
