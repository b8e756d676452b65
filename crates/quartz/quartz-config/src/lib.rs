mod config;

pub use config::{BackoffSetting, ConfigError, QuartzConfig, RingSettings, WorkloadSettings};
