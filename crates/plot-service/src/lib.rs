//! Plot query service.
//!
//! The one entry point callers use. Translates block positions into grid
//! cells, checks authorization, and runs lookups and mutations against the
//! per-world [`PlotTopology`](plot_topology::PlotTopology).
//!
//! ```text
//!   caller ──► PlotService ──► GridLayout   (block -> cell)
//!                  │      ├──► Authorizer   (may this actor?)
//!                  │      └──► PlotTopology (validate + commit)
//!                  └─────────► PersistenceWorker ──► PlotStore
//! ```
//!
//! # Example
//!
//! ```
//! use plot_service::{BlockPos, MembershipAuthorizer, PlotService, ServiceConfig};
//! use uuid::Uuid;
//!
//! let config = ServiceConfig::from_json_str(r#"{ "worlds": [ { "name": "plots" } ] }"#)?;
//! let service = PlotService::from_config(&config, MembershipAuthorizer::new())?;
//! let world = "plots".into();
//!
//! let owner = Uuid::new_v4();
//! let id = service.claim_at(&world, BlockPos::new(10, 10), owner)?;
//! assert_eq!(service.plot_at(&world, BlockPos::new(41, 0))?, Some(id));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod auth;
mod config;
mod error;
mod service;
mod store;

pub use auth::{Authorizer, MembershipAuthorizer};
pub use config::{ConfigError, ConfigResult, ServiceConfig, WorldConfig};
pub use error::{ServiceError, ServiceResult};
pub use plot_grid::{BlockPos, GridCoord, PlotId, WorldName};
pub use plot_topology::{FlagPolicy, PlotMembers, PlotRecord, PlotRegion, PlotSnapshot, TopologyError};
pub use service::{LoadSummary, PlotService};
pub use store::{PersistenceWorker, PlotChange, PlotStore};
