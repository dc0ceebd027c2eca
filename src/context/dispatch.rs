//! Event delivery to trap and monitor callbacks.
//!
//! The engine only queues events. Callbacks run wherever the application
//! drains the queue: synchronously with [`Context::dispatch_pending`] or on
//! a tokio task with [`Context::run_dispatcher`]. Only one consumer drains
//! at a time.

use super::Context;
use crate::engine::Engine;

impl<E: Engine> Context<E> {
    /// Deliver every queued event on the calling thread.
    ///
    /// Returns the number of events delivered. Returns 0 without waiting if
    /// another consumer is draining the queue or the context is destroyed.
    pub fn dispatch_pending(&self) -> usize {
        if self.is_destroyed() {
            return 0;
        }
        let Ok(mut receiver) = self.inner.receiver.try_lock() else {
            return 0;
        };
        let mut delivered = 0;
        while let Ok(event) = receiver.try_recv() {
            self.inner.deliver(event);
            delivered += 1;
        }
        if delivered > 0 {
            tracing::trace!(jip.context = %self.inner.id, jip.events = delivered, "events dispatched");
        }
        delivered
    }

    /// Deliver events as they arrive until the context is destroyed.
    ///
    /// Returns immediately on a destroyed context. The future holds this
    /// handle, so a spawned dispatcher keeps the context alive; end it with
    /// [`Context::destroy`].
    ///
    /// ```rust
    /// use jip_model::Context;
    /// use jip_model::engine::MemoryEngine;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> jip_model::Result<()> {
    /// let context = Context::client().build(MemoryEngine::new())?;
    /// let dispatcher = tokio::spawn({
    ///     let context = context.clone();
    ///     async move { context.run_dispatcher().await }
    /// });
    /// context.destroy()?;
    /// dispatcher.await.unwrap();
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_dispatcher(&self) {
        if self.is_destroyed() {
            return;
        }
        let mut receiver = self.inner.receiver.lock().await;
        tracing::debug!(jip.context = %self.inner.id, "dispatcher started");
        loop {
            tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => break,
                event = receiver.recv() => match event {
                    Some(event) => self.inner.deliver(event),
                    None => break,
                },
            }
        }
        tracing::debug!(jip.context = %self.inner.id, "dispatcher stopped");
    }
}
