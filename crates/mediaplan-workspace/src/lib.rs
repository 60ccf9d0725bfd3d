//! # mediaplan-workspace
//!
//! A workspace is a directory of plan JSON files plus the configuration
//! that says which schema versions it accepts.
//!
//! - [`config`] loads [`ToolkitConfig`] from defaults, a file and the
//!   environment.
//! - [`store`] reads and writes plan documents.
//! - [`loader`] loads plans, migrating older versions on the way in.
//! - [`upgrader`] migrates a whole workspace, with backups and a pre-flight
//!   check that refuses to start when any plan is unsupported.

pub mod config;
pub mod error;
pub mod loader;
pub mod store;
pub mod upgrader;

pub use config::{LoggingConfig, SchemaConfig, ToolkitConfig, WorkspaceConfig};
pub use error::{WorkspaceError, WorkspaceResult};
pub use loader::{LoadedPlan, PlanLoader, PreparedDocument};
pub use store::{LocalJsonStore, PlanStore};
pub use upgrader::{FailedPlan, UpgradeOptions, UpgradeReport, WorkspaceUpgrader};
