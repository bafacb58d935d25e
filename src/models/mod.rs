// src/models/mod.rs

//! Domain models for the bulletin service.

mod bulletin;
mod config;

// Re-export all public types
pub use bulletin::{BulletinRecord, Locale, ResolvedIdentifiers, YearFilter, latest, parse_year};
pub use config::{
    AuthConfig, CacheConfig, Config, HttpConfig, LoggingConfig, ResolverMode, ServerConfig,
    UpstreamConfig,
};
