use std::{fmt, sync::Arc};

use tokio::sync::watch::{channel, Receiver, Sender};

/// A single-assignment latch.
///
/// A `Ready` starts out empty and may be [`complete`](Ready::complete)d
/// with a value exactly once; every clone shares the same slot.  Any
/// number of [`ReadySubscription`]s may wait on it, and a subscription
/// taken after completion returns immediately.
///
/// This is what the runtime uses wherever a value is produced in one place
/// and awaited elsewhere, such as the hot reload handler waiting for the
/// router that the hydration bootstrap has yet to construct.
pub struct Ready<T> {
    inner: Arc<ReadyInner<T>>,
}

struct ReadyInner<T> {
    sender: Sender<Option<T>>,
}

/// A subscription to a [`Ready`] latch.
pub struct ReadySubscription<T> {
    // keeps the sender alive so an abandoned latch waits forever rather
    // than erroring out
    _ready: Ready<T>,
    receiver: Receiver<Option<T>>,
}

impl<T> Clone for Ready<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> Default for Ready<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Ready<T> {
    pub fn new() -> Self {
        let (sender, _) = channel(None);
        Self {
            inner: ReadyInner { sender }.into(),
        }
    }

    /// Complete the latch, waking every subscriber.
    ///
    /// Returns `false` without replacing anything if the latch was already
    /// complete.
    pub fn complete(&self, value: T) -> bool {
        let mut value = Some(value);
        self.inner.sender.send_if_modified(|current| {
            if current.is_some() {
                false
            } else {
                *current = value.take();
                true
            }
        })
    }

    pub fn is_complete(&self) -> bool {
        self.inner.sender.borrow().is_some()
    }

    /// The value, if the latch is complete.
    pub fn get(&self) -> Option<T> {
        self.inner.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> ReadySubscription<T> {
        ReadySubscription {
            _ready: self.clone(),
            receiver: self.inner.sender.subscribe(),
        }
    }

    /// Wait for the latch to complete and return its value.
    pub async fn wait(&self) -> T {
        self.subscribe().wait().await
    }
}

impl<T: Clone> ReadySubscription<T> {
    /// Asynchronously wait for the latch to complete.
    ///
    /// Returns immediately if it already has.
    pub async fn wait(mut self) -> T {
        let value = match self.receiver.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        match value {
            Some(value) => value,
            None => std::future::pending().await,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Ready<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ready")
            .field("value", &*self.inner.sender.borrow())
            .field("subscribers", &self.inner.sender.receiver_count())
            .finish()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadySubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadySubscription")
            .field("ready", &self._ready)
            .finish()
    }
}
