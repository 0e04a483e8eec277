//! Error types for the playback guard
//!
//! The guard's runtime paths never return errors: a resume that the host
//! rejects is swallowed and retried on the next enforcement cycle. This enum
//! covers library-boundary misuse and host plumbing only.

use thiserror::Error;

/// Result type alias for guard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur around the guard
#[derive(Error, Debug)]
pub enum Error {
    /// A guard is already attached to this page/frame
    #[error("Guard already attached: {0}")]
    AlreadyAttached(String),

    /// Failed to parse a page fixture
    #[error("Fixture parse failed: {0}")]
    FixtureError(String),

    /// Failed to load or parse a scenario file
    #[error("Scenario error: {0}")]
    ScenarioError(String),

    /// Invalid policy configuration
    #[error("Invalid policy: {0}")]
    ConfigError(String),

    /// The async driver's worker thread is gone
    #[error("Driver error: {0}")]
    DriverError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
