//! World configuration.
//!
//! Layout is fixed once a world is registered. Config comes either from
//! JSON:
//!
//! ```json
//! { "worlds": [ { "name": "plots", "plot_size": 42, "road_width": 7 } ] }
//! ```
//!
//! or from `PLOT_WORLD`, `PLOT_SIZE` and `ROAD_WIDTH`.

use std::collections::BTreeSet;

use plot_grid::GridLayout;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_WORLD: &str = "plots";
const DEFAULT_PLOT_SIZE: u32 = 42;
const DEFAULT_ROAD_WIDTH: u32 = 7;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON did not parse.
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    /// A world name is empty.
    #[error("world name must not be empty")]
    EmptyName,

    /// Two worlds share a name.
    #[error("world {0} is configured twice")]
    DuplicateWorld(String),

    /// Plot size is zero or the pitch overflows block coordinates.
    #[error("world {world}: invalid layout (plot_size {plot_size}, road_width {road_width})")]
    InvalidLayout {
        world: String,
        plot_size: u32,
        road_width: u32,
    },

    /// An environment variable did not parse.
    #[error("{var}={value:?} is not a valid number")]
    InvalidValue { var: &'static str, value: String },
}

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Geometry of one plot world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldConfig {
    pub name: String,
    #[serde(default = "default_plot_size")]
    pub plot_size: u32,
    #[serde(default = "default_road_width")]
    pub road_width: u32,
}

const fn default_plot_size() -> u32 {
    DEFAULT_PLOT_SIZE
}

const fn default_road_width() -> u32 {
    DEFAULT_ROAD_WIDTH
}

impl WorldConfig {
    /// A world with default geometry.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plot_size: DEFAULT_PLOT_SIZE,
            road_width: DEFAULT_ROAD_WIDTH,
        }
    }

    /// Validated grid layout.
    pub fn layout(&self) -> ConfigResult<GridLayout> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        GridLayout::new(self.plot_size, self.road_width).ok_or_else(|| {
            ConfigError::InvalidLayout {
                world: self.name.clone(),
                plot_size: self.plot_size,
                road_width: self.road_width,
            }
        })
    }
}

/// Every world the service manages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub worlds: Vec<WorldConfig>,
}

impl ServiceConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Single-world config from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_vars(|var| std::env::var(var).ok())
    }

    /// Single-world config from a variable lookup. Unset variables take
    /// their defaults.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let number = |var: &'static str, default: u32| match lookup(var) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { var, value }),
        };

        let world = WorldConfig {
            name: lookup("PLOT_WORLD").unwrap_or_else(|| DEFAULT_WORLD.to_owned()),
            plot_size: number("PLOT_SIZE", DEFAULT_PLOT_SIZE)?,
            road_width: number("ROAD_WIDTH", DEFAULT_ROAD_WIDTH)?,
        };
        let config = Self {
            worlds: vec![world],
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every world's layout and that names are unique.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = BTreeSet::new();
        for world in &self.worlds {
            world.layout()?;
            if !seen.insert(world.name.as_str()) {
                return Err(ConfigError::DuplicateWorld(world.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_json_defaults() {
        let config = ServiceConfig::from_json_str(
            r#"{ "worlds": [ { "name": "plots" }, { "name": "creative", "plot_size": 64, "road_width": 0 } ] }"#,
        )
        .unwrap();

        assert_eq!(config.worlds[0], WorldConfig::new("plots"));
        assert_eq!(config.worlds[1].plot_size, 64);
        assert_eq!(config.worlds[1].layout().unwrap().pitch(), 64);
    }

    #[test]
    fn test_json_rejects_bad_worlds() {
        assert!(matches!(
            ServiceConfig::from_json_str(r#"{ "worlds": [ { "name": "a" }, { "name": "a" } ] }"#),
            Err(ConfigError::DuplicateWorld(name)) if name == "a"
        ));
        assert!(matches!(
            ServiceConfig::from_json_str(r#"{ "worlds": [ { "name": "a", "plot_size": 0 } ] }"#),
            Err(ConfigError::InvalidLayout { .. })
        ));
        assert!(matches!(
            ServiceConfig::from_json_str(r#"{ "worlds": [ { "name": "" } ] }"#),
            Err(ConfigError::EmptyName)
        ));
        assert!(matches!(
            ServiceConfig::from_json_str("{ worlds"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_from_vars() {
        let vars: HashMap<&str, &str> = [("PLOT_WORLD", "city"), ("PLOT_SIZE", " 32 ")].into();
        let config = ServiceConfig::from_vars(|k| vars.get(k).map(|v| (*v).to_owned())).unwrap();

        assert_eq!(
            config.worlds,
            vec![WorldConfig {
                name: "city".to_owned(),
                plot_size: 32,
                road_width: DEFAULT_ROAD_WIDTH,
            }]
        );

        let err = ServiceConfig::from_vars(|k| (k == "ROAD_WIDTH").then(|| "wide".to_owned()));
        assert!(matches!(err, Err(ConfigError::InvalidValue { var: "ROAD_WIDTH", .. })));
    }
}
