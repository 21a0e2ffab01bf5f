//! Disk cache for response bodies
//!
//! This module derives cache keys from request URLs, stores bodies as flat
//! files under one directory, and judges freshness by file modification time.
//! Stale entries are never deleted here; they are overwritten on the next miss.

mod key;
mod locks;
mod store;

pub use key::CacheKey;
pub use locks::KeyLocks;
pub use store::{CacheError, CacheStore, CachedData};
