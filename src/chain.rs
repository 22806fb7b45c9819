//! The fallback chain: composes independent sources so a miss or a partial
//! answer in one falls through to the next, streaming every result to the
//! caller as it arrives.
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread;

use crate::cancel::CancelToken;
use crate::error::LoadError;
use crate::image::LoadedImage;
use crate::size::Size;
use crate::traits::FetchSource;

/// A [`FetchSource`] wired with at most one fallback loader.
///
/// A request first runs this loader's own fetch.  A final result ends the
/// stream; anything less (no result, a non-final result, or an error with a
/// fallback configured) delegates the request to the fallback, whose results
/// are reported to this loader's source through
/// [`FetchSource::on_fallback_result`] and then forwarded to the caller.
#[derive(Clone)]
pub struct Loader {
    source: Arc<dyn FetchSource>,
    fallback: Option<Arc<Loader>>,
}

impl Loader {
    pub fn new(source: impl FetchSource) -> Loader {
        Loader {
            source: Arc::new(source),
            fallback: None,
        }
    }

    /// Configure the loader consulted when this one cannot finish the
    /// request on its own.
    pub fn with_fallback(mut self, fallback: Loader) -> Loader {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Request the image behind `locator` at `desired`.
    ///
    /// Fails synchronously, before any work, on an empty locator or a
    /// desired size with a zero dimension.  The returned stream yields every
    /// result in emission order; dropping it cancels the request.
    pub fn request(&self, locator: &str, desired: Size) -> Result<ImageStream, LoadError> {
        self.request_with_min(locator, desired, Size::new(0, 0))
    }

    /// Like [`Loader::request`], with a minimum size below which results are
    /// not worth producing.  The minimum travels down the chain, rising to
    /// the best size obtained so far at each delegation.
    pub fn request_with_min(
        &self,
        locator: &str,
        desired: Size,
        min_acceptable: Size,
    ) -> Result<ImageStream, LoadError> {
        if locator.is_empty() {
            return Err(LoadError::InvalidArgument("locator must not be empty"));
        }
        if desired.is_degenerate() {
            return Err(LoadError::InvalidArgument(
                "desired size must have positive width and height",
            ));
        }

        let (tx, rx) = channel();
        let cancel = CancelToken::new();
        let node = self.clone();
        let token = cancel.clone();
        let locator = locator.to_string();
        thread::spawn(move || {
            node.run(&locator, desired, min_acceptable, &token, &mut |result| {
                tx.send(result).is_ok()
            });
        });

        Ok(ImageStream { rx, cancel })
    }

    /// Run this node's fetch and the delegation rules, pushing every result
    /// into `sink`.  The sink returns false once the caller has gone away.
    fn run(
        &self,
        locator: &str,
        desired: Size,
        min_acceptable: Size,
        cancel: &CancelToken,
        sink: &mut dyn FnMut(Result<LoadedImage, LoadError>) -> bool,
    ) {
        if cancel.is_cancelled() {
            return;
        }

        match self.source.fetch(locator, desired, cancel) {
            Err(err) => match &self.fallback {
                Some(fallback) => {
                    log::debug!("source failed for '{}', falling back: {}", locator, err);
                    self.delegate(fallback, locator, desired, min_acceptable, cancel, sink);
                }
                None => {
                    sink(Err(err));
                }
            },
            Ok(own) => {
                let mut best: Option<(Size, bool)> = None;
                if let Some(image) = own {
                    best = Some((image.size, image.is_final));
                    if !sink(Ok(image)) {
                        return;
                    }
                }

                let done = matches!(best, Some((_, true)));
                if let (Some(fallback), false) = (&self.fallback, done) {
                    let min = best.map(|(size, _)| size).unwrap_or(min_acceptable);
                    self.delegate(fallback, locator, desired, min, cancel, sink);
                }
            }
        }
    }

    fn delegate(
        &self,
        fallback: &Loader,
        locator: &str,
        desired: Size,
        min_acceptable: Size,
        cancel: &CancelToken,
        sink: &mut dyn FnMut(Result<LoadedImage, LoadError>) -> bool,
    ) {
        let source = &self.source;
        let mut forward = |result: Result<LoadedImage, LoadError>| {
            if cancel.is_cancelled() {
                return false;
            }
            if let Ok(image) = &result {
                source.on_fallback_result(image);
            }
            sink(result)
        };

        fallback.run(locator, desired, min_acceptable, cancel, &mut forward);
    }
}

/// The results of one request, in emission order.
///
/// Iterating blocks until the next result arrives; the stream ends when the
/// chain completes.  Dropping the stream cancels the request: no further
/// results are forwarded, though I/O already in flight runs to completion in
/// the background.
pub struct ImageStream {
    rx: Receiver<Result<LoadedImage, LoadError>>,
    cancel: CancelToken,
}

impl ImageStream {
    /// Block for the next result, or `None` when the stream has terminated.
    pub fn next_result(&self) -> Option<Result<LoadedImage, LoadError>> {
        self.rx.recv().ok()
    }
}

impl Iterator for ImageStream {
    type Item = Result<LoadedImage, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

impl Drop for ImageStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
