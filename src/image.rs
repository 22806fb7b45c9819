//! The result value streamed back to a requester.
use crate::size::Size;

/// One loaded image, as produced by a source in the fallback chain.
///
/// A single request may observe several of these: a smaller cached copy is
/// forwarded immediately while a better one is still being fetched.  The
/// `is_final` flag marks a result whose size satisfies the request along the
/// dominant axis, at which point no further fallback delegation happens.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub locator: String,
    pub size: Size,
    pub data: Vec<u8>,
    pub is_final: bool,
}

impl LoadedImage {
    pub fn new(locator: impl Into<String>, size: Size, data: Vec<u8>, is_final: bool) -> LoadedImage {
        LoadedImage {
            locator: locator.into(),
            size,
            data,
            is_final,
        }
    }
}
