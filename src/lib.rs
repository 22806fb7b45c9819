//! A layered, size-aware image cache with fallback-chain loading.
//!
//! Image-heavy applications keep asking for the same picture at different
//! pixel sizes: a thumbnail in a list, a medium copy in a detail view, the
//! full-size original somewhere else.  Refetching and redecoding for every
//! request is costly, but a plain URL-to-bytes map can't exploit the fact
//! that a larger cached copy can be downscaled locally, or that a smaller one
//! is worth showing immediately while the right one downloads.  This crate
//! provides that machinery via a handful of types and traits:
//!
//! - [`Loader`] composes any number of [`FetchSource`]s into a fallback
//!   chain.  A request streams [`LoadedImage`]s through an [`ImageStream`]:
//!   intermediate results arrive as soon as any layer has something to show,
//!   and the chain keeps delegating until a result is final.  Dropping the
//!   stream cancels the request.
//! - [`CacheSource`] is the cache-backed link: it ranks the cached variants
//!   of a resource by how well they serve the requested size, downscales
//!   larger copies through a [`Codec`] into fresh cache entries, persists
//!   whatever deeper sources produce, and evicts via a pluggable
//!   [`EvictionStrategy`] ([`RarelyUsedFirst`] or [`LargestFirst`]) once the
//!   configured [`CacheCapacity`] would be exceeded.
//! - [`BlobStore`] keeps the actual bytes; [`FsStore`] and [`MemoryStore`]
//!   cover the common cases, and [`BlobStore::enumerate`] lets a loader
//!   rebuild its index from whatever survived the last run.
//! - [`ThrottledSource`] gates a remote transport behind an
//!   [`AdmissionQueue`] so at most a fixed number of fetches are in flight.
//!
//! To use the crate, implement [`Codec`] over your platform's imaging API
//! (and [`BlobStore`]/[`FetchSource`] if the bundled ones don't fit), then
//! chain loaders with [`Loader::with_fallback`].
mod admission;
mod cache_source;
mod cancel;
mod chain;
mod error;
mod eviction;
mod fs_store;
mod image;
mod index;
mod mem_store;
mod size;
mod static_source;
mod throttled;
mod traits;

pub use admission::*;
pub use cache_source::*;
pub use cancel::*;
pub use chain::*;
pub use error::*;
pub use eviction::*;
pub use fs_store::*;
pub use image::*;
pub use index::*;
pub use mem_store::*;
pub use size::*;
pub use static_source::*;
pub use throttled::*;
pub use traits::*;
