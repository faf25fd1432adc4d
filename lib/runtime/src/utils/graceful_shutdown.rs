// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Tracks work that must drain before the process shuts down, such as
/// in-flight chat completions.
pub struct GracefulShutdownTracker {
    active: AtomicUsize,
    drained: Notify,
}

impl std::fmt::Debug for GracefulShutdownTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GracefulShutdownTracker")
            .field("active", &self.active.load(Ordering::SeqCst))
            .finish()
    }
}

impl Default for GracefulShutdownTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl GracefulShutdownTracker {
    pub fn new() -> Self {
        Self {
            active: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// Register one unit of work; the returned guard unregisters it on drop.
    pub fn register(self: &Arc<Self>) -> GracefulShutdownGuard {
        let count = self.active.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("work registered, total active: {} -> {}", count, count + 1);
        GracefulShutdownGuard {
            tracker: self.clone(),
        }
    }

    fn unregister(&self) {
        let prev = self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!("work unregistered, remaining active: {} -> {}", prev, prev - 1);
        if prev == 1 {
            tracing::debug!("last tracked work completed, notifying waiters");
            self.drained.notify_waiters();
        }
    }

    /// Current count of registered work
    pub fn get_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub async fn wait_for_completion(&self) {
        loop {
            // Create the waiter BEFORE checking the condition
            let notified = self.drained.notified();

            let count = self.active.load(Ordering::SeqCst);
            if count == 0 {
                tracing::debug!("all tracked work completed");
                break;
            }

            tracing::debug!("waiting for {} in-flight requests to complete", count);
            notified.await;
        }
    }
}

/// Keeps one unit of work registered with a [`GracefulShutdownTracker`].
#[derive(Debug)]
pub struct GracefulShutdownGuard {
    tracker: Arc<GracefulShutdownTracker>,
}

impl Drop for GracefulShutdownGuard {
    fn drop(&mut self) {
        self.tracker.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_immediately_when_idle() {
        let tracker = Arc::new(GracefulShutdownTracker::new());
        tokio::time::timeout(Duration::from_millis(50), tracker.wait_for_completion())
            .await
            .expect("idle tracker should not block");
    }

    #[tokio::test]
    async fn test_wait_blocks_until_guards_drop() {
        let tracker = Arc::new(GracefulShutdownTracker::new());
        let first = tracker.register();
        let second = tracker.register();
        assert_eq!(tracker.get_count(), 2);

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_for_completion().await })
        };

        drop(first);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(second);
        tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .expect("waiter should finish once drained")
            .unwrap();
        assert_eq!(tracker.get_count(), 0);
    }
}
