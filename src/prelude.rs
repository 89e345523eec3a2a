pub use crate::builder::GroupBuilder;
pub use crate::ds::{FlightGroup, HashRing, DEFAULT_REPLICAS};
pub use crate::error::{ConfigError, LoadError};
pub use crate::group::{group, Group};
pub use crate::policy::{ConcurrentLruCache, LruCore};
pub use crate::traits::{Loader, PeerFetcher, PeerPicker, Weighted};
pub use crate::view::ByteView;

#[cfg(feature = "metrics")]
pub use crate::metrics::GroupMetrics;
