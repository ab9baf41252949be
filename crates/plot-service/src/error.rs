//! Service error types.

use plot_grid::{BlockPos, WorldName};
use plot_topology::TopologyError;
use thiserror::Error;

use crate::ConfigError;

/// Service error type.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No world registered under this name.
    #[error("unknown world {0}")]
    UnknownWorld(WorldName),

    /// A world with this name is already registered.
    #[error("world {0} is already registered")]
    DuplicateWorld(WorldName),

    /// The position lies on a road, not inside a plot cell.
    #[error("position ({}, {}) is on a road", .0.x, .0.z)]
    Road(BlockPos),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Rejected by the topology engine.
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

impl ServiceError {
    /// The topology error, if this is one.
    #[must_use]
    pub fn as_topology(&self) -> Option<&TopologyError> {
        match self {
            Self::Topology(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
