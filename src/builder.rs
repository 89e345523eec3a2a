//! Fluent construction for cache groups.
//!
//! Wraps [`Group`](crate::group::Group) registration behind a builder so
//! configuration errors surface through `try_build` instead of panics.
//!
//! ## Example
//!
//! ```
//! use peercache::builder::GroupBuilder;
//!
//! let group = GroupBuilder::new("builder-doc")
//!     .cache_bytes(2 << 10)
//!     .loader(|key: &str| -> Result<Vec<u8>, peercache::error::LoadError> {
//!         Ok(key.as_bytes().to_vec())
//!     })
//!     .try_build()
//!     .unwrap();
//!
//! assert_eq!(group.get("Tom").unwrap().to_string(), "Tom");
//! ```

use std::sync::Arc;

use crate::error::ConfigError;
use crate::group::Group;
use crate::traits::Loader;

/// Builder for creating and registering a [`Group`].
pub struct GroupBuilder {
    name: String,
    cache_bytes: u64,
    loader: Option<Box<dyn Loader>>,
}

impl GroupBuilder {
    /// Starts a builder for a group with the given name.
    ///
    /// The byte budget defaults to 0 (unbounded) and no loader is set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache_bytes: 0,
            loader: None,
        }
    }

    /// Sets the local cache byte budget (0 = unbounded).
    pub fn cache_bytes(mut self, bytes: u64) -> Self {
        self.cache_bytes = bytes;
        self
    }

    /// Sets the authoritative loader. Required.
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Builds and registers the group.
    ///
    /// Fails when the loader is missing, the name is empty, or the name is
    /// already registered.
    pub fn try_build(self) -> Result<Arc<Group>, ConfigError> {
        let loader = self
            .loader
            .ok_or_else(|| ConfigError::new("group requires a loader"))?;
        Group::register(self.name, self.cache_bytes, loader)
    }

    /// Builds and registers the group, panicking on invalid configuration.
    pub fn build(self) -> Arc<Group> {
        self.try_build()
            .unwrap_or_else(|err| panic!("invalid group configuration: {err}"))
    }
}
