//! logsend core library: sender registry, routing model, configuration.
//!
//! Public API surface:
//! - [`registry`]: [`Sender`], [`SenderKind`], [`SenderHandle`], [`SenderRegistry`]
//! - [`routing`]: [`Group`], [`Rule`], [`RoutingTable`], [`route_line`]
//! - [`config`]: [`ConfigDocument`], [`interpret`], [`load_config_file`]
//! - [`types`]: [`RunSettings`], [`ReadMode`], [`Match`]
//! - [`error`]: [`ConfigError`], [`RegistryError`], [`SenderError`]

pub mod config;
pub mod error;
pub mod registry;
pub mod routing;
pub mod types;

pub use config::{interpret, load_config_file, ConfigDocument, GroupDef, RuleDef};
pub use error::{ConfigError, RegistryError, SenderError};
pub use registry::{Sender, SenderHandle, SenderKind, SenderRegistry};
pub use routing::{route_line, Group, RoutingTable, Rule, RuleSummary};
pub use types::{Match, ReadMode, RunSettings};
