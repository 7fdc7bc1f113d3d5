//! Cancellation tokens, built on the [`Ready`] latch.

use crate::ready::Ready;

/// The owning side of a cancellation token.
#[derive(Clone, Debug, Default)]
pub struct AbortController {
    ready: Ready<()>,
}

/// The observing side of a cancellation token.
///
/// A signal whose controller is dropped without aborting never fires.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    ready: Ready<()>,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            ready: self.ready.clone(),
        }
    }

    /// Abort every operation observing this controller's signal.  Aborting
    /// twice has no further effect.
    pub fn abort(&self) {
        self.ready.complete(());
    }
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.ready.is_complete()
    }

    /// Resolves once the controller aborts.
    pub async fn aborted(&self) {
        self.ready.wait().await
    }
}
