//! Configuration.
//!
//! # Data Flow
//! ```text
//! config file (TOML, or JSON by extension)
//!     → loader.rs (parse & deserialize, resolve named args)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → handed to Switchyard::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the routing table is built from it once
//! - Every section defaults, so a file with only sources and routes is valid
//! - serde rejects malformed files; validation.rs collects every semantic problem

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ChannelConfig;
pub use schema::ConnectionConfig;
pub use schema::EventSourceConfig;
pub use schema::EventTypeConfig;
pub use schema::ObservabilityConfig;
pub use schema::RouteConfig;
pub use schema::RouterConfig;
