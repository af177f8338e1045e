//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CoreConfig (validated, immutable)
//!     → owned by the ResilienceRegistry, read by every component
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Per-dependency sections replace the default breaker/retry section wholesale
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BreakerConfig, CacheConfig, CoreConfig, DedupConfig, DependencyConfig,
    ObservabilityConfig, PersistenceConfig, RetryConfig, StoreConfig,
};
pub use validation::{validate_config, ValidationError};
