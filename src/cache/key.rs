//! Cache key derivation
//!
//! Turns a `(url, name)` pair into a stable, filesystem-safe identifier.

use md5::{Digest, Md5};
use std::fmt;

/// Hash-derived identifier for a cached request
///
/// The key is the lowercase hex MD5 digest of `url` immediately followed by
/// `name`. Plain concatenation keeps the on-disk names compatible with caches
/// written by earlier deployments, so `("ab", "c")` and `("a", "bc")` share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a URL and an optional disambiguating name
    pub fn derive(url: &str, name: &str) -> Self {
        let mut hasher = Md5::new();
        hasher.update(url.as_bytes());
        hasher.update(name.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the on-disk file name: `<prefix><key><extension>`
    pub fn file_name(&self, prefix: &str, extension: &str) -> String {
        format!("{}{}{}", prefix, self.0, extension)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
