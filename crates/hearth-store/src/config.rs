//! Timeline cache configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the cache works with zero
//! configuration.

use std::path::PathBuf;
use std::str::FromStr;

use hearth_shared::constants::{
    DEFAULT_MEDIA_MAX_ENTRIES, DEFAULT_PROFILE_CACHE_CAPACITY, DEFAULT_ROOM_CACHE_CAPACITY,
};

use crate::error::Result;
use crate::store::Store;

/// Retention budget for the media collection. `None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBudget {
    pub max_entries: Option<usize>,
    pub max_bytes: Option<u64>,
}

impl Default for MediaBudget {
    fn default() -> Self {
        Self {
            max_entries: Some(DEFAULT_MEDIA_MAX_ENTRIES),
            max_bytes: None,
        }
    }
}

/// Timeline cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Database file.
    /// Env: `HEARTH_DB_PATH`
    /// Default: the platform data directory (see [`Store::default_path`]).
    pub db_path: Option<PathBuf>,

    /// In-memory user profile cache capacity.
    /// Env: `HEARTH_PROFILE_CACHE`
    /// Default: `100`
    pub profile_cache_capacity: usize,

    /// In-memory room cache capacity.
    /// Env: `HEARTH_ROOM_CACHE`
    /// Default: `100`
    pub room_cache_capacity: usize,

    /// Media retention budget.
    /// Env: `HEARTH_MEDIA_MAX_ENTRIES`, `HEARTH_MEDIA_MAX_BYTES` (0 = unbounded)
    /// Default: 500 records, no byte limit.
    pub media_budget: MediaBudget,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            profile_cache_capacity: DEFAULT_PROFILE_CACHE_CAPACITY,
            room_cache_capacity: DEFAULT_ROOM_CACHE_CAPACITY,
            media_budget: MediaBudget::default(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("HEARTH_DB_PATH").filter(|p| !p.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(n) = parse_var(&lookup, "HEARTH_PROFILE_CACHE") {
            config.profile_cache_capacity = n;
        }

        if let Some(n) = parse_var(&lookup, "HEARTH_ROOM_CACHE") {
            config.room_cache_capacity = n;
        }

        if let Some(n) = parse_var::<usize>(&lookup, "HEARTH_MEDIA_MAX_ENTRIES") {
            config.media_budget.max_entries = (n > 0).then_some(n);
        }

        if let Some(n) = parse_var::<u64>(&lookup, "HEARTH_MEDIA_MAX_BYTES") {
            config.media_budget.max_bytes = (n > 0).then_some(n);
        }

        config
    }

    /// The configured database path, or the platform default.
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Store::default_path(),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let value = lookup(name)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(var = name, value = %value, "Invalid value, using default");
            None
        }
    }
}
