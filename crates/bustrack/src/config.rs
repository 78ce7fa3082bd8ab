//! Configuration management for bustrack.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::animation::AnimationConfig;
use crate::error::{Error, Result};
use crate::publisher::PublisherConfig;
use crate::route::{Route, Waypoint};
use crate::store::DEFAULT_BROADCAST_CAPACITY;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "bustrack";

/// Environment variable prefix.
const ENV_PREFIX: &str = "BUSTRACK_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `BUSTRACK_`, `__` between section
///    and key, e.g. `BUSTRACK_PUBLISHER__TICK_INTERVAL_SECS`)
/// 2. TOML config file at `~/.config/bustrack/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Publisher configuration.
    pub publisher: PublisherSection,
    /// Store configuration.
    pub store: StoreSection,
    /// Marker animation configuration.
    pub animation: AnimationSection,
    /// Route configuration.
    pub route: RouteSection,
}

/// Publisher-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherSection {
    /// Seconds between publisher ticks.
    pub tick_interval_secs: u64,
}

/// Store-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Writes buffered per subscriber before it lags.
    pub broadcast_capacity: usize,
}

/// Animation-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSection {
    /// Duration of one marker glide in milliseconds.
    pub duration_ms: u64,
    /// Time between animation frames in milliseconds.
    pub frame_interval_ms: u64,
}

/// Route-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSection {
    /// Ordered waypoints, each `{ lat, lng }`.
    pub waypoints: Vec<Waypoint>,
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: 5,
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl Default for AnimationSection {
    fn default() -> Self {
        Self {
            duration_ms: 3000,
            frame_interval_ms: 16,
        }
    }
}

impl Default for RouteSection {
    fn default() -> Self {
        Self {
            waypoints: default_route(),
        }
    }
}

/// Built-in demo route: a short run along a city street grid.
fn default_route() -> Vec<Waypoint> {
    vec![
        Waypoint::new(37.774_929, -122.419_416),
        Waypoint::new(37.776_102, -122.417_930),
        Waypoint::new(37.777_310, -122.416_420),
        Waypoint::new(37.778_515, -122.414_910),
        Waypoint::new(37.779_720, -122.413_400),
        Waypoint::new(37.780_905, -122.411_895),
        Waypoint::new(37.781_340, -122.409_820),
        Waypoint::new(37.781_780, -122.407_750),
        Waypoint::new(37.782_215, -122.405_680),
        Waypoint::new(37.783_400, -122.404_170),
    ]
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `BUSTRACK_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.publisher.tick_interval_secs == 0 {
            return Err(Error::config_validation(
                "tick_interval_secs must be greater than 0",
            ));
        }

        if self.store.broadcast_capacity == 0 {
            return Err(Error::config_validation(
                "broadcast_capacity must be greater than 0",
            ));
        }

        if self.animation.duration_ms == 0 || self.animation.frame_interval_ms == 0 {
            return Err(Error::config_validation(
                "duration_ms and frame_interval_ms must be greater than 0",
            ));
        }

        if self.animation.frame_interval_ms > self.animation.duration_ms {
            return Err(Error::ConfigValidation {
                message: format!(
                    "frame_interval_ms ({}) cannot be greater than duration_ms ({})",
                    self.animation.frame_interval_ms, self.animation.duration_ms
                ),
            });
        }

        if let Some((index, waypoint)) = self
            .route
            .waypoints
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_valid())
        {
            return Err(Error::ConfigValidation {
                message: format!("invalid waypoint {index}: {waypoint}"),
            });
        }

        Ok(())
    }

    /// Get the tick interval as a Duration.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.publisher.tick_interval_secs)
    }

    /// Build the configured route.
    #[must_use]
    pub fn route(&self) -> Route {
        Route::new(self.route.waypoints.clone())
    }

    /// Get the animation settings.
    #[must_use]
    pub fn animation(&self) -> AnimationConfig {
        AnimationConfig {
            duration: Duration::from_millis(self.animation.duration_ms),
            frame_interval: Duration::from_millis(self.animation.frame_interval_ms),
        }
    }

    /// Get the publisher settings.
    #[must_use]
    pub fn publisher(&self) -> PublisherConfig {
        PublisherConfig {
            tick_interval: self.tick_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::animation::{DEFAULT_ANIMATION_DURATION, DEFAULT_FRAME_INTERVAL};
    use crate::publisher::DEFAULT_TICK_INTERVAL;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.publisher.tick_interval_secs, 5);
        assert_eq!(config.store.broadcast_capacity, DEFAULT_BROADCAST_CAPACITY);
        assert_eq!(config.animation.duration_ms, 3000);
        assert_eq!(config.animation.frame_interval_ms, 16);
        assert!(!config.route.waypoints.is_empty());
    }

    #[test]
    fn test_defaults_match_component_defaults() {
        let config = Config::default();

        assert_eq!(config.tick_interval(), DEFAULT_TICK_INTERVAL);
        assert_eq!(config.publisher(), PublisherConfig::default());
        assert_eq!(config.animation().duration, DEFAULT_ANIMATION_DURATION);
        assert_eq!(config.animation().frame_interval, DEFAULT_FRAME_INTERVAL);
    }

    #[test]
    fn test_default_route_is_valid() {
        assert!(default_route().iter().all(Waypoint::is_valid));
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_tick_interval() {
        let mut config = Config::default();
        config.publisher.tick_interval_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("tick_interval_secs"));
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = Config::default();
        config.store.broadcast_capacity = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("broadcast_capacity"));
    }

    #[test]
    fn test_validate_frame_interval_longer_than_duration() {
        let mut config = Config::default();
        config.animation.duration_ms = 10;
        config.animation.frame_interval_ms = 20;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("frame_interval_ms"));
    }

    #[test]
    fn test_validate_invalid_waypoint() {
        let mut config = Config::default();
        config.route.waypoints.push(Waypoint::new(91.0, 0.0));

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid waypoint"));
    }

    #[test]
    fn test_empty_route_is_allowed() {
        let mut config = Config::default();
        config.route.waypoints.clear();

        assert!(config.validate().is_ok());
        assert!(config.route().is_empty());
    }

    #[test]
    fn test_route_accessor() {
        let config = Config::default();
        let route = config.route();

        assert_eq!(route.len(), config.route.waypoints.len());
        assert_eq!(route.first(), config.route.waypoints.first().copied());
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("bustrack"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "bustrack-config-test-{}.toml",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[publisher]
tick_interval_secs = 60

[route]
waypoints = [{{ lat = 0.0, lng = 0.0 }}, {{ lat = 1.0, lng = 1.0 }}]
"#
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.tick_interval(), Duration::from_secs(60));
        assert_eq!(config.route().len(), 2);
        assert_eq!(config.animation, AnimationSection::default());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!(
            "bustrack-config-invalid-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[animation]\nduration_ms = 0\n").unwrap();

        let result = Config::load_from(Some(path.clone()));
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(Error::ConfigValidation { .. })));
    }

    #[test]
    fn test_route_section_deserialize() {
        let json = r#"{"waypoints": [{"lat": 1.5, "lng": -2.5}]}"#;
        let section: RouteSection = serde_json::from_str(json).unwrap();
        assert_eq!(section.waypoints, vec![Waypoint::new(1.5, -2.5)]);
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("tick_interval_secs"));
        assert!(json.contains("\"lat\""));
    }
}
