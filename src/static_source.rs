//! A placeholder source serving one fixed image for every request.
use crate::cancel::CancelToken;
use crate::error::LoadError;
use crate::image::LoadedImage;
use crate::size::Size;
use crate::traits::FetchSource;

/// Serves the same bytes for any locator, never finally.
///
/// Put this at the front of a chain to show a placeholder immediately while
/// the real image loads behind it; because its results are never final, the
/// chain always continues past it.
pub struct StaticSource {
    data: Vec<u8>,
}

impl StaticSource {
    pub fn new(data: Vec<u8>) -> StaticSource {
        StaticSource { data }
    }
}

impl FetchSource for StaticSource {
    fn fetch(
        &self,
        locator: &str,
        desired: Size,
        _cancel: &CancelToken,
    ) -> Result<Option<LoadedImage>, LoadError> {
        Ok(Some(LoadedImage::new(
            locator,
            desired,
            self.data.clone(),
            false,
        )))
    }
}
