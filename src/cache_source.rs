//! The cache-backed source: serves requests from already-cached variants,
//! downscales larger copies into fresh cache entries, and persists whatever
//! the fallback chain brings back.
use std::fmt::Write as _;
use std::io;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use crate::cancel::CancelToken;
use crate::error::LoadError;
use crate::eviction::{EvictionStrategy, RarelyUsedFirst};
use crate::image::LoadedImage;
use crate::index::{CacheIndex, CacheItem};
use crate::size::{CacheCapacity, Size};
use crate::traits::{BlobStore, Codec, FetchSource};

/// Configuration for a [`CacheSource`].
#[derive(Clone, derive_builder::Builder)]
pub struct CacheConfig {
    /// Cache budget.  `None` disables eviction entirely.
    #[builder(default = "Some(CacheCapacity::bytes(50 * 1024 * 1024))")]
    pub capacity: Option<CacheCapacity>,
    /// Replace derived keys with a SHA-256 hex digest.  Required when keys
    /// double as filesystem-safe names.
    #[builder(default = "false")]
    pub hashed_keys: bool,
    /// Victim selection once the budget would be exceeded.
    #[builder(default = "Arc::new(RarelyUsedFirst)")]
    pub strategy: Arc<dyn EvictionStrategy>,
}

impl Default for CacheConfig {
    fn default() -> CacheConfig {
        CacheConfig {
            capacity: Some(CacheCapacity::bytes(50 * 1024 * 1024)),
            hashed_keys: false,
            strategy: Arc::new(RarelyUsedFirst),
        }
    }
}

/// A [`FetchSource`] backed by a [`CacheIndex`] and a [`BlobStore`].
///
/// On a request it scans the ranked candidates, purging stale index entries
/// whose blobs have gone missing.  A candidate larger than desired is
/// downscaled through the [`Codec`] and the downscaled bytes cached as a new
/// variant next to the original.  Results sourced from the fallback chain are
/// persisted through [`FetchSource::on_fallback_result`].
///
/// Persistence is awaited and error-isolated: a failed blob write is logged,
/// the just-added index entry rolled back, and nothing retried.
pub struct CacheSource<S: BlobStore, C: Codec> {
    index: CacheIndex,
    store: S,
    codec: C,
    hashed_keys: bool,
    bootstrap_token: Mutex<CancelToken>,
}

impl<S: BlobStore, C: Codec> CacheSource<S, C> {
    pub fn new(store: S, codec: C, config: CacheConfig) -> CacheSource<S, C> {
        CacheSource {
            index: CacheIndex::new(config.capacity, config.strategy),
            store,
            codec,
            hashed_keys: config.hashed_keys,
            bootstrap_token: Mutex::new(CancelToken::new()),
        }
    }

    pub fn index(&self) -> &CacheIndex {
        &self.index
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuild the index from whatever the store currently holds.
    ///
    /// A rebuild still in flight is cancelled first, so redirecting a loader
    /// to a fresh store never leaves two enumerations racing.
    pub fn refresh_from_store(&self) -> io::Result<()> {
        let token = {
            let mut current = self.bootstrap_token.lock().unwrap();
            current.cancel();
            *current = CancelToken::new();
            current.clone()
        };

        self.index.clear();
        let items = self.store.enumerate(&token)?;
        if !token.is_cancelled() {
            self.index.insert(items);
        }
        Ok(())
    }

    /// The storage key for a locator: its path-and-query, optionally pushed
    /// through a stable digest.
    fn key_for(&self, locator: &str) -> String {
        let normalized = path_and_query(locator);
        if self.hashed_keys {
            hex_digest(normalized)
        } else {
            normalized.to_string()
        }
    }

    /// Drop a stale index entry and its blob, if any is still around.
    fn purge(&self, item: &CacheItem) {
        self.index.remove(item);
        if let Err(err) = self.store.delete(item) {
            log::warn!(
                "could not delete blob for '{}' at {}: {}",
                item.key,
                item.image_size,
                err
            );
        }
    }

    fn persist(&self, image: &LoadedImage) {
        let key = self.key_for(&image.locator);
        let item = CacheItem::new(key, image.size, image.data.len() as u64);

        for victim in self.index.reserve(self.index.weight_of(item.size_bytes)) {
            if let Err(err) = self.store.delete(&victim) {
                log::warn!(
                    "could not delete evicted blob for '{}' at {}: {}",
                    victim.key,
                    victim.image_size,
                    err
                );
            }
        }

        if !self.index.insert_one(item.clone()) {
            // This variant is already cached.
            return;
        }

        if let Err(err) = self.store.put(&item, &image.data) {
            log::warn!(
                "could not persist '{}' at {}: {}",
                item.key,
                item.image_size,
                err
            );
            self.index.remove(&item);
        }
    }
}

impl<S: BlobStore, C: Codec> FetchSource for CacheSource<S, C> {
    fn fetch(
        &self,
        locator: &str,
        desired: Size,
        cancel: &CancelToken,
    ) -> Result<Option<LoadedImage>, LoadError> {
        let key = self.key_for(locator);
        let ranked = self.index.rank_candidates(&key, desired);

        let mut chosen = None;
        for item in ranked.items {
            if cancel.is_cancelled() {
                break;
            }

            match self.store.get(&item) {
                Ok(Some(bytes)) if !bytes.is_empty() => {
                    chosen = Some((item, bytes));
                    break;
                }
                Ok(_) => self.purge(&item),
                Err(err) => {
                    log::warn!(
                        "could not read blob for '{}' at {}: {}",
                        item.key,
                        item.image_size,
                        err
                    );
                    self.purge(&item);
                }
            }
        }

        let (item, bytes) = match chosen {
            Some(found) if !cancel.is_cancelled() => found,
            _ => return Ok(None),
        };

        self.index.touch(&item);

        if item.image_size.exceeds(desired) {
            let (data, actual) = self
                .codec
                .resize(&bytes, desired, true)
                .map_err(|source| LoadError::Codec {
                    locator: locator.to_string(),
                    source,
                })?;
            let image = LoadedImage::new(
                locator,
                actual,
                data,
                ranked.axis.matches(actual, desired),
            );
            // Cache the downscaled copy alongside the original.
            self.persist(&image);
            Ok(Some(image))
        } else {
            let is_final = ranked.axis.matches(item.image_size, desired);
            Ok(Some(LoadedImage::new(
                locator,
                item.image_size,
                bytes,
                is_final,
            )))
        }
    }

    fn on_fallback_result(&self, image: &LoadedImage) {
        self.persist(image);
    }
}

/// Strip scheme and authority off a locator, leaving its path and query.
fn path_and_query(locator: &str) -> &str {
    match locator.find("://") {
        Some(scheme_end) => {
            let rest = &locator[scheme_end + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => locator,
    }
}

fn hex_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
