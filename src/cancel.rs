// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Resettable cancellation tokens for blocking socket operations.

use std::sync::Arc;

use tokio::sync::watch;

/// A cancellation flag that can be signalled from any thread, awaited by
/// an in-flight operation, and re-armed before the next operation.
///
/// Each blocking socket operation races its work against
/// [`cancelled`](Self::cancelled) and calls [`reset`](Self::reset) on
/// entry so that a cancellation left over from a previous operation does
/// not abort the new one.
#[derive(Clone)]
pub(crate) struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signals cancellation and wakes every pending wait.
    pub(crate) fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Clears a previous cancellation.
    pub(crate) fn reset(&self) {
        self.tx.send_replace(false);
    }

    /// Resolves once the token is cancelled.
    pub(crate) async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // The sender cannot go away while this token is alive.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("cancelled() did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_pre_cancelled_resolves_immediately() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("cancelled() did not resolve");
    }

    #[tokio::test]
    async fn test_reset_rearms_token() {
        let token = CancelToken::new();
        token.cancel();
        token.reset();
        let pending = tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(pending.is_err(), "reset token must not report cancellation");
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("cancelled() did not resolve after re-cancel");
    }
}
