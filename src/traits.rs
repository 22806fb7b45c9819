//! The capability seams the pipeline is built from.
//!
//! A [`FetchSource`] is one link of a fallback chain.  A [`BlobStore`] keeps
//! the raw bytes of cached variants, and a [`Codec`] turns bytes into bytes of
//! another pixel size.  The cache logic drives these traits and never touches
//! pixels, sockets, or the filesystem itself.
use std::io;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::error::{CodecError, LoadError};
use crate::image::LoadedImage;
use crate::index::CacheItem;
use crate::size::Size;

/// Decodes, scales, and re-encodes image bytes.  Platform-supplied.
pub trait Codec: Send + Sync + 'static {
    /// Resize `bytes` to `target`.
    ///
    /// With `keep_aspect` set, implementations scale uniformly by the smaller
    /// of the two axis ratios and round as [`Size::fit_within`] does, and the
    /// returned size reports what was actually produced.  Malformed input
    /// must fail with [`CodecError::Decode`].
    fn resize(
        &self,
        bytes: &[u8],
        target: Size,
        keep_aspect: bool,
    ) -> Result<(Vec<u8>, Size), CodecError>;
}

/// Durable byte storage for cached image variants, keyed by
/// `(key, image_size)`.
///
/// Stores are not required to lock anything on behalf of the cache; the cache
/// never calls them while holding its index lock.
pub trait BlobStore: Send + Sync + 'static {
    /// Fetch the bytes of a variant, or `None` when the blob is gone.
    fn get(&self, item: &CacheItem) -> io::Result<Option<Vec<u8>>>;

    /// Persist the bytes of a variant.
    fn put(&self, item: &CacheItem, bytes: &[u8]) -> io::Result<()>;

    /// Delete a variant's bytes.  Must tolerate a blob that does not exist.
    fn delete(&self, item: &CacheItem) -> io::Result<()>;

    /// List the variants currently persisted, for index bootstrap.
    ///
    /// Implementations check `cancel` between entries so a superseded
    /// enumeration stops early.
    fn enumerate(&self, cancel: &CancelToken) -> io::Result<Vec<CacheItem>>;
}

/// One image source in a fallback chain.
///
/// A source produces at most one image per invocation; streaming several
/// progressively better results is the chain's job, not the source's.
pub trait FetchSource: Send + Sync + 'static {
    /// Fetch the image behind `locator`, aiming for `desired`.
    ///
    /// `Ok(None)` means this source has nothing, which sends the chain on to
    /// the fallback.  Errors are reported, not swallowed; the chain recovers
    /// them by delegating when a fallback is configured.
    fn fetch(
        &self,
        locator: &str,
        desired: Size,
        cancel: &CancelToken,
    ) -> Result<Option<LoadedImage>, LoadError>;

    /// Called for every result the fallback produced, before it is forwarded
    /// to the caller.  Cache-backed sources persist the result here.
    fn on_fallback_result(&self, _image: &LoadedImage) {}
}

impl<T: Codec> Codec for Arc<T> {
    fn resize(
        &self,
        bytes: &[u8],
        target: Size,
        keep_aspect: bool,
    ) -> Result<(Vec<u8>, Size), CodecError> {
        (**self).resize(bytes, target, keep_aspect)
    }
}

impl<T: BlobStore> BlobStore for Arc<T> {
    fn get(&self, item: &CacheItem) -> io::Result<Option<Vec<u8>>> {
        (**self).get(item)
    }

    fn put(&self, item: &CacheItem, bytes: &[u8]) -> io::Result<()> {
        (**self).put(item, bytes)
    }

    fn delete(&self, item: &CacheItem) -> io::Result<()> {
        (**self).delete(item)
    }

    fn enumerate(&self, cancel: &CancelToken) -> io::Result<Vec<CacheItem>> {
        (**self).enumerate(cancel)
    }
}

impl<T: FetchSource> FetchSource for Arc<T> {
    fn fetch(
        &self,
        locator: &str,
        desired: Size,
        cancel: &CancelToken,
    ) -> Result<Option<LoadedImage>, LoadError> {
        (**self).fetch(locator, desired, cancel)
    }

    fn on_fallback_result(&self, image: &LoadedImage) {
        (**self).on_fallback_result(image)
    }
}
