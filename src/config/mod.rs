//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DaemonConfig (validated, immutable)
//!     → FeatureFlags handed to the startup sequencer
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; flags never change during a run
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    AggregationConfig, AssetConfig, AuthConfig, DaemonConfig, EventLogConfig, FeatureFlags,
    ListenerConfig, ObservabilityConfig, SatelliteConfig, TimeoutConfig, DEFAULT_PORT,
};
