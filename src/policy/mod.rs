pub mod lru;

pub use lru::{ConcurrentLruCache, EvictionListener, LruCore};
