//! Pending saves and the handles callers await.

use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::{SaveError, SaveOutcome, SaveResult};
use crate::object::Saveable;

/// An object waiting to be saved, paired with the channel that settles its
/// [`SaveHandle`].
pub struct PendingSave {
    object: Arc<dyn Saveable>,
    reply: oneshot::Sender<SaveResult>,
}

impl PendingSave {
    pub fn new(object: Arc<dyn Saveable>) -> (Self, SaveHandle) {
        let (reply, rx) = oneshot::channel();
        (Self { object, reply }, SaveHandle { rx })
    }

    pub fn object(&self) -> &Arc<dyn Saveable> {
        &self.object
    }

    pub fn resolve(self, outcome: SaveOutcome) {
        self.settle(Ok(outcome));
    }

    pub fn reject(self, error: SaveError) {
        self.settle(Err(error));
    }

    fn settle(self, result: SaveResult) {
        // The caller may have stopped waiting
        let _ = self.reply.send(result);
    }
}

impl fmt::Debug for PendingSave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSave")
            .field("type", &self.object.model().table_singular)
            .field("is_new", &self.object.is_new())
            .finish()
    }
}

/// Resolves once the queue has settled the save.
///
/// Resolves to [`SaveError::Cancelled`] if the queue dropped the save
/// without settling it.
#[derive(Debug)]
pub struct SaveHandle {
    rx: oneshot::Receiver<SaveResult>,
}

impl Future for SaveHandle {
    type Output = SaveResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.rx
            .poll_unpin(cx)
            .map(|received| received.unwrap_or_else(|_| Err(SaveError::Cancelled)))
    }
}
