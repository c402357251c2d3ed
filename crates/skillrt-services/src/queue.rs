//! Mutating-operation queue.
//!
//! A fair async mutex: waiters are admitted in arrival order, and the next
//! body starts only after the previous one settled, whether it succeeded or
//! failed. In-process only; several processes sharing one data root are not
//! serialized against each other.

use std::future::Future;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MutationQueue {
    gate: Mutex<()>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `body` once every earlier body has settled.
    pub async fn run<F, T>(&self, body: F) -> T
    where
        F: Future<Output = T>,
    {
        let _turn = self.gate.lock().await;
        body.await
    }
}
