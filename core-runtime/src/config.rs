//! # Core Configuration Module
//!
//! Provides configuration management for the catalog core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding every setting the composition root needs: where the
//! catalog database lives, which files the folder scanner picks up, how events
//! are buffered and how logging is set up. Validation is fail-fast: `build()`
//! refuses an inconsistent configuration with an actionable message.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/catalog.db")
//!     .follow_symlinks(false)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No database location was chosen
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing database location");
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use std::path::{Path, PathBuf};

/// Audio extensions picked up by the folder scanner unless overridden.
pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] =
    &["mp3", "m4a", "flac", "ogg", "wav", "aac", "wma", "aiff"];

/// Default capacity of the broadcast event bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Default upper bound on pooled SQLite connections.
pub const DEFAULT_MAX_DB_CONNECTIONS: u32 = 5;

/// Where the catalog database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// SQLite database file on disk
    File(PathBuf),
    /// Private in-memory database, discarded on shutdown
    InMemory,
}

/// Settings consumed by the folder scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Lowercase file extensions (without the dot) considered audio
    pub extensions: Vec<String>,
    /// Whether symbolic links are followed while walking
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            follow_symlinks: true,
        }
    }
}

impl ScanConfig {
    /// Case-insensitive check of a path's extension against the allow-list.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    pub fn validate(&self) -> Result<()> {
        if self.extensions.is_empty() {
            return Err(Error::Config(
                "At least one supported extension is required".to_string(),
            ));
        }

        if let Some(bad) = self
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']))
        {
            return Err(Error::Config(format!(
                "Invalid extension '{}': use a bare extension such as \"flac\"",
                bad
            )));
        }

        Ok(())
    }
}

/// Core configuration for the catalog.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Catalog database location
    pub database: DatabaseLocation,

    /// Maximum number of pooled database connections
    pub max_db_connections: u32,

    /// Folder scanner settings
    pub scan: ScanConfig,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,

    /// Logging settings applied by the host at startup
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Connection pool and event buffer sizes are in range
    /// - The extension allow-list is usable
    pub fn validate(&self) -> Result<()> {
        if let DatabaseLocation::File(path) = &self.database {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        if self.max_db_connections == 0 {
            return Err(Error::Config(
                "Database pool needs at least one connection".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > 65_536 {
            return Err(Error::Config(
                "Event buffer size exceeds maximum of 65,536 events".to_string(),
            ));
        }

        self.scan.validate()
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.database, DatabaseLocation::InMemory)
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) once all options are set.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database: Option<DatabaseLocation>,
    max_db_connections: Option<u32>,
    extensions: Option<Vec<String>>,
    follow_symlinks: Option<bool>,
    event_buffer_size: Option<usize>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/path/to/catalog.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database = Some(DatabaseLocation::File(path.into()));
        self
    }

    /// Uses a private in-memory database (tests, throwaway sessions).
    pub fn in_memory_database(mut self) -> Self {
        self.database = Some(DatabaseLocation::InMemory);
        self
    }

    /// Sets the maximum pooled connection count.
    ///
    /// Default: 5
    pub fn max_db_connections(mut self, max: u32) -> Self {
        self.max_db_connections = Some(max);
        self
    }

    /// Replaces the supported extension allow-list.
    ///
    /// Extensions are normalised to lowercase.
    pub fn supported_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = Some(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().to_ascii_lowercase())
                .collect(),
        );
        self
    }

    /// Enables or disables following symbolic links while scanning.
    ///
    /// Default: true
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = Some(follow);
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: 256
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if no database location was chosen or if any value
    /// fails [`CoreConfig::validate`].
    pub fn build(self) -> Result<CoreConfig> {
        let database = self.database.ok_or_else(|| {
            Error::Config(
                "Database location is required. Use .database_path() or .in_memory_database()."
                    .to_string(),
            )
        })?;

        let defaults = ScanConfig::default();
        let config = CoreConfig {
            database,
            max_db_connections: self
                .max_db_connections
                .unwrap_or(DEFAULT_MAX_DB_CONNECTIONS),
            scan: ScanConfig {
                extensions: self.extensions.unwrap_or(defaults.extensions),
                follow_symlinks: self.follow_symlinks.unwrap_or(defaults.follow_symlinks),
            },
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
