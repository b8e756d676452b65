use quartz_ring::{BackoffPolicy, InvalidParam, ReadMode, RingConfig, RingFlags, WriteMode};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct QuartzConfig {
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default)]
    pub ring: RingSettings,
    #[serde(default)]
    pub workload: WorkloadSettings,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RingSettings {
    #[serde(default = "defaults::capacity")]
    pub capacity: usize,
    /// Flag names, e.g. `["WRITE_BUSY", "READ_ONCE"]`.
    #[serde(default = "defaults::flags")]
    pub flags: Vec<String>,
    #[serde(default)]
    pub backoff: BackoffSetting,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffSetting {
    Spin,
    Yield,
    #[default]
    Exponential,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WorkloadSettings {
    #[serde(default = "defaults::producers")]
    pub producers: usize,
    #[serde(default = "defaults::consumers")]
    pub consumers: usize,
    /// Messages written by each producer.
    #[serde(default = "defaults::messages")]
    pub messages: u64,
    /// Pause between writes; 0 writes flat out.
    #[serde(default)]
    pub interval_us: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("unknown ring flag '{0}'")]
    UnknownFlag(String),

    #[error("invalid ring settings")]
    Invalid(#[from] InvalidParam),

    #[error("invalid workload: {0}")]
    Workload(&'static str),
}

mod defaults {
    pub fn log_level() -> String {
        "info".into()
    }

    pub fn capacity() -> usize {
        1 << 12
    }

    pub fn flags() -> Vec<String> {
        vec!["WRITE_LOCK".into(), "READ_ALL".into(), "READ_WAIT".into()]
    }

    pub fn producers() -> usize {
        2
    }

    pub fn consumers() -> usize {
        2
    }

    pub fn messages() -> u64 {
        100_000
    }
}

impl Default for QuartzConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level(),
            ring: RingSettings::default(),
            workload: WorkloadSettings::default(),
        }
    }
}

impl Default for RingSettings {
    fn default() -> Self {
        Self {
            capacity: defaults::capacity(),
            flags: defaults::flags(),
            backoff: BackoffSetting::default(),
        }
    }
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            producers: defaults::producers(),
            consumers: defaults::consumers(),
            messages: defaults::messages(),
            interval_us: 0,
        }
    }
}

impl From<BackoffSetting> for BackoffPolicy {
    fn from(setting: BackoffSetting) -> Self {
        match setting {
            BackoffSetting::Spin => BackoffPolicy::Spin,
            BackoffSetting::Yield => BackoffPolicy::Yield,
            BackoffSetting::Exponential => BackoffPolicy::Exponential,
        }
    }
}

impl QuartzConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&toml_to_str)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: QuartzConfig = toml::from_str(toml_str)?;
        Ok(config)
    }

    /// Resolve the ring settings and check that the workload fits the modes
    /// they select.
    pub fn validate(&self) -> Result<RingConfig, ConfigError> {
        let ring = self.ring.to_ring_config()?;
        let workload = &self.workload;
        if workload.producers == 0 {
            return Err(ConfigError::Workload("at least one producer is required"));
        }
        if workload.consumers == 0 {
            return Err(ConfigError::Workload("at least one consumer is required"));
        }
        if ring.write_mode() == WriteMode::SingleWriter && workload.producers > 1 {
            return Err(ConfigError::Workload("WRITE_SINGLE allows only one producer"));
        }
        if ring.read_mode() == ReadMode::SingleReader && workload.consumers > 1 {
            return Err(ConfigError::Workload("READ_SINGLE allows only one consumer"));
        }
        if workload.producers as u64 >= 1 << 16 || workload.messages >= 1 << 48 {
            return Err(ConfigError::Workload("producer id or sequence does not fit the payload"));
        }
        Ok(ring)
    }
}

impl RingSettings {
    /// Combine the flag names into a bitmask. Names are case-insensitive.
    pub fn flags(&self) -> Result<RingFlags, ConfigError> {
        self.flags.iter().try_fold(RingFlags::empty(), |acc, name| {
            RingFlags::from_name(&name.trim().to_ascii_uppercase())
                .map(|flag| acc | flag)
                .ok_or_else(|| ConfigError::UnknownFlag(name.clone()))
        })
    }

    pub fn to_ring_config(&self) -> Result<RingConfig, ConfigError> {
        let cfg = RingConfig::from_flags(self.capacity, self.flags()?)?;
        Ok(cfg.with_backoff(self.backoff.into()))
    }
}
