//! Error types for the peercache library.
//!
//! ## Key Components
//!
//! - [`LoadError`]: Returned by the read path ([`Group::get`](crate::group::Group::get))
//!   and by [`Loader`](crate::traits::Loader) / [`PeerFetcher`](crate::traits::PeerFetcher)
//!   implementations. Cloneable so a coalesced load can hand every waiting
//!   caller the leader's outcome.
//! - [`ConfigError`]: Returned when group configuration is invalid
//!   (empty name, duplicate registration, missing loader).
//!
//! ## Example Usage
//!
//! ```
//! use peercache::builder::GroupBuilder;
//! use peercache::error::LoadError;
//!
//! let group = GroupBuilder::new("error-doc")
//!     .cache_bytes(1 << 10)
//!     .loader(|key: &str| -> Result<Vec<u8>, LoadError> {
//!         Err(LoadError::not_found(format!("{key} not exist")))
//!     })
//!     .try_build()
//!     .unwrap();
//!
//! // Loader errors are surfaced verbatim to the caller.
//! let err = group.get("Tom").unwrap_err();
//! assert_eq!(err.to_string(), "Tom not exist");
//!
//! // Invalid configuration is caught without panicking.
//! let dup = GroupBuilder::new("error-doc")
//!     .loader(|_: &str| -> Result<Vec<u8>, LoadError> { Ok(Vec::new()) })
//!     .try_build();
//! assert!(dup.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

/// Error produced while resolving a key through the read path.
///
/// Peer-fetch failures are recovered inside the coordinator (the call falls
/// through to the local loader); every other variant is surfaced to the
/// caller. The type is `Clone` because a single-flight leader's outcome is
/// broadcast to all coalesced waiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The caller passed an empty key.
    EmptyKey,
    /// The loader reports that the key does not exist. The message is
    /// surfaced verbatim.
    NotFound(String),
    /// The loader failed for any other reason.
    Loader(String),
    /// A peer fetch failed. Recoverable: the coordinator logs it and loads
    /// locally instead.
    Peer(String),
}

impl LoadError {
    /// Creates a [`LoadError::NotFound`] with the given message.
    #[inline]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a [`LoadError::Loader`] with the given message.
    #[inline]
    pub fn loader(msg: impl Into<String>) -> Self {
        Self::Loader(msg.into())
    }

    /// Creates a [`LoadError::Peer`] with the given message.
    #[inline]
    pub fn peer(msg: impl Into<String>) -> Self {
        Self::Peer(msg.into())
    }

    /// Returns `true` for the not-found variant.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey => f.write_str("key is required"),
            Self::NotFound(msg) | Self::Loader(msg) | Self::Peer(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for LoadError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when group configuration parameters are invalid.
///
/// Produced by [`GroupBuilder::try_build`](crate::builder::GroupBuilder::try_build)
/// and by direct registration with an empty or already-registered name.
/// Carries a human-readable description of which parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
