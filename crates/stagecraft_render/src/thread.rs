//! # Render Thread

use std::io;
use std::thread::{self, JoinHandle};

use crate::channel::RenderReceiver;
use crate::manager::RenderManager;

/// A dedicated thread rendering every received batch in order.
///
/// The thread exits once the dispatcher is dropped and all batches are
/// drained; joining it hands the manager back.
pub struct RenderThread {
    handle: JoinHandle<RenderManager>,
}

impl RenderThread {
    /// Starts the render loop.
    ///
    /// # Errors
    ///
    /// Fails if the OS refuses to create the thread.
    pub fn spawn(mut manager: RenderManager, receiver: RenderReceiver) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name("stagecraft-render".into())
            .spawn(move || {
                tracing::debug!("render thread started");
                while let Some(mut batch) = receiver.recv() {
                    let result = manager.render(&mut batch);
                    tracing::trace!(
                        frame = result.frame,
                        messages = result.messages,
                        draw_calls = result.draw_calls,
                        rendered = result.rendered,
                        "render frame"
                    );
                    receiver.recycle(batch.messages);
                }
                tracing::debug!(stats = ?manager.stats(), "render thread stopped");
                manager
            })?;
        Ok(Self { handle })
    }

    /// Returns `true` once the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the loop to exit and returns the manager.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the render thread panicked.
    pub fn join(self) -> thread::Result<RenderManager> {
        self.handle.join()
    }
}
