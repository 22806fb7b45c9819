//! Cooperative cancellation shared between a result stream and the workers
//! feeding it.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag checked between cache candidates, while pending in the
/// admission queue, and before every forwarded result.
///
/// Cancellation stops further forwarding; I/O already in flight runs to
/// completion in the background.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        Default::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
