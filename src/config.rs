//! Layered runtime configuration.
//!
//! Every field has a default, so the service starts with no file at all. An
//! optional TOML file overrides the defaults, and `WINDSCOPE__*` environment
//! variables override the file (`WINDSCOPE__LINK__BAUD_RATE=57600`).

use serde::Deserialize;
use std::time::Duration;

use crate::engine::EngineSettings;
use crate::link::{
    LinkConfig, DEFAULT_BAUD_RATE, DEFAULT_DEVICE_PATHS, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_RECONNECT_DELAY_MS,
};
use crate::store::EnvironmentalReading;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

pub const ENV_PREFIX: &str = "WINDSCOPE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub link: LinkSection,
    pub engine: EngineSection,
    pub server: ServerSection,
    pub environment: EnvironmentSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkSection {
    pub device_paths: Vec<String>,
    pub baud_rate: u32,
    pub reconnect_delay_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            device_paths: DEFAULT_DEVICE_PATHS.iter().map(ToString::to_string).collect(),
            baud_rate: DEFAULT_BAUD_RATE,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

impl LinkSection {
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            device_paths: self.device_paths.clone(),
            baud_rate: self.baud_rate,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub min_range_yds: f64,
    pub max_range_yds: f64,
    pub zero_range_yds: f64,
    pub default_sample_points: usize,
    pub cache_capacity: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        let settings = EngineSettings::default();
        Self {
            min_range_yds: settings.min_range_yds,
            max_range_yds: settings.max_range_yds,
            zero_range_yds: settings.zero_range_yds,
            default_sample_points: settings.default_sample_points,
            cache_capacity: settings.cache_capacity,
        }
    }
}

impl EngineSection {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            min_range_yds: self.min_range_yds,
            max_range_yds: self.max_range_yds,
            zero_range_yds: self.zero_range_yds,
            default_sample_points: self.default_sample_points,
            cache_capacity: self.cache_capacity,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

/// Seed values for the store before the first telemetry arrives, standard
/// sea-level conditions by default.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct EnvironmentSection {
    pub wind_speed_mph: f64,
    pub wind_direction_deg: f64,
    pub temperature_f: f64,
    pub pressure_inhg: f64,
}

impl Default for EnvironmentSection {
    fn default() -> Self {
        Self {
            wind_speed_mph: 0.0,
            wind_direction_deg: 0.0,
            temperature_f: 59.0,
            pressure_inhg: 29.92,
        }
    }
}

impl EnvironmentSection {
    pub fn initial_reading(&self) -> EnvironmentalReading {
        EnvironmentalReading {
            wind_speed_mph: self.wind_speed_mph,
            wind_direction_deg: self.wind_direction_deg,
            temperature_f: self.temperature_f,
            pressure_inhg: self.pressure_inhg,
            timestamp_ms: 0,
        }
    }
}

pub fn load(path: Option<&str>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path));
    }
    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let config = AppConfig::default();
        assert_eq!(config.link.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.link.device_paths.len(), DEFAULT_DEVICE_PATHS.len());
        assert_eq!(config.server.bind_addr, DEFAULT_BIND_ADDR);
        assert!((config.engine.min_range_yds - 100.0).abs() < f64::EPSILON);
        assert!((config.environment.temperature_f - 59.0).abs() < f64::EPSILON);
    }

    #[test]
    fn initial_reading_starts_at_epoch() {
        let reading = EnvironmentSection::default().initial_reading();
        assert_eq!(reading.timestamp_ms, 0);
        assert!((reading.pressure_inhg - 29.92).abs() < f64::EPSILON);
    }

    #[test]
    fn link_section_converts_to_durations() {
        let section = LinkSection {
            reconnect_delay_ms: 250,
            read_timeout_ms: 50,
            ..LinkSection::default()
        };
        let link = section.link_config();
        assert_eq!(link.reconnect_delay, Duration::from_millis(250));
        assert_eq!(link.read_timeout, Duration::from_millis(50));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = std::env::temp_dir().join("windscope-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("windscope.toml");
        std::fs::write(
            &path,
            "[link]\nbaud_rate = 57600\n\n[engine]\nmax_range_yds = 1500.0\n",
        )
        .unwrap();

        let config = load(path.to_str()).unwrap();
        assert_eq!(config.link.baud_rate, 57_600);
        assert!((config.engine.max_range_yds - 1500.0).abs() < f64::EPSILON);
        assert_eq!(config.server.bind_addr, DEFAULT_BIND_ADDR);

        std::fs::remove_file(&path).ok();
    }
}
