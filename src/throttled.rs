//! A remote-style source whose fetches pass through an [`AdmissionQueue`].
use crate::admission::AdmissionQueue;
use crate::cancel::CancelToken;
use crate::error::LoadError;
use crate::image::LoadedImage;
use crate::size::Size;
use crate::traits::FetchSource;

/// What a transport reports when it fails.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Wraps a transport function with bounded-concurrency admission.
///
/// The transport does the actual remote work (download, decode, scale) and
/// returns the bytes plus the size it actually produced.  Its results are
/// always final: a remote source is the end of the line, there is nothing
/// better a fallback could add.  A caller that cancels while still pending
/// never reaches the transport at all.
pub struct ThrottledSource<F> {
    gate: AdmissionQueue,
    transport: F,
}

impl<F> ThrottledSource<F>
where
    F: Fn(&str, Size) -> Result<(Vec<u8>, Size), TransportError> + Send + Sync + 'static,
{
    pub fn new(transport: F) -> ThrottledSource<F> {
        ThrottledSource {
            gate: AdmissionQueue::new(),
            transport,
        }
    }

    pub fn with_limit(limit: usize, transport: F) -> ThrottledSource<F> {
        ThrottledSource {
            gate: AdmissionQueue::with_limit(limit),
            transport,
        }
    }
}

impl<F> FetchSource for ThrottledSource<F>
where
    F: Fn(&str, Size) -> Result<(Vec<u8>, Size), TransportError> + Send + Sync + 'static,
{
    fn fetch(
        &self,
        locator: &str,
        desired: Size,
        cancel: &CancelToken,
    ) -> Result<Option<LoadedImage>, LoadError> {
        let _permit = match self.gate.admit(cancel) {
            Some(permit) => permit,
            None => return Ok(None),
        };

        let (data, size) =
            (self.transport)(locator, desired).map_err(|source| LoadError::SourceUnavailable {
                locator: locator.to_string(),
                source,
            })?;

        Ok(Some(LoadedImage::new(locator, size, data, true)))
    }
}
