// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Concurrency groups
//!
//! Each group key holds at most one running run and at most one pending run.
//! A newer arrival always cancels the pending one; with cancel-in-progress it
//! also cancels the running one. A pending run starts once the running run has
//! released the group, so two runs of one group never overlap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, info};

use super::CancelToken;
use crate::errors::TagrelError;

#[derive(Debug)]
struct Slot {
    run_id: String,
    token: CancelToken,
}

#[derive(Debug, Default)]
struct Group {
    running: Option<Slot>,
    pending: Option<Slot>,
}

impl Group {
    fn is_empty(&self) -> bool {
        self.running.is_none() && self.pending.is_none()
    }
}

/// Registry of concurrency groups shared by all runs of a process
#[derive(Debug, Default)]
pub struct ConcurrencyGate {
    groups: Mutex<HashMap<String, Group>>,
    released: Notify,
}

impl ConcurrencyGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn groups(&self) -> MutexGuard<'_, HashMap<String, Group>> {
        self.groups.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enter the group `key` as run `run_id`
    ///
    /// Returns once the run holds the group exclusively. Fails with
    /// [`TagrelError::Cancelled`] if a newer run supersedes this one while it
    /// is still waiting.
    pub async fn acquire(
        self: &Arc<Self>,
        key: &str,
        run_id: &str,
        cancel_in_progress: bool,
    ) -> Result<GateGuard, TagrelError> {
        let token = CancelToken::new();

        {
            let mut groups = self.groups();
            let group = groups.entry(key.to_string()).or_default();

            if let Some(older) = group.pending.take() {
                info!(group = key, run = %older.run_id, "Cancelling pending run");
                older.token.cancel();
            }

            if cancel_in_progress {
                if let Some(running) = &group.running {
                    info!(group = key, run = %running.run_id, superseded_by = run_id, "Cancelling in-progress run");
                    running.token.cancel();
                }
            }

            group.pending = Some(Slot {
                run_id: run_id.to_string(),
                token: token.clone(),
            });
        }

        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            {
                let mut groups = self.groups();
                let group = groups.entry(key.to_string()).or_default();

                if token.is_cancelled() {
                    if group.pending.as_ref().is_some_and(|s| s.run_id == run_id) {
                        group.pending = None;
                    }
                    if group.is_empty() {
                        groups.remove(key);
                    }
                    return Err(TagrelError::Cancelled {
                        reason: format!("superseded in concurrency group '{}' before starting", key),
                    });
                }

                if group.running.is_none() {
                    group.running = group.pending.take();
                    debug!(group = key, run = run_id, "Acquired concurrency group");
                    return Ok(GateGuard {
                        gate: Arc::clone(self),
                        key: key.to_string(),
                        run_id: run_id.to_string(),
                        token,
                    });
                }
            }

            debug!(group = key, run = run_id, "Waiting for concurrency group");
            tokio::select! {
                _ = &mut released => {}
                _ = token.cancelled() => {}
            }
        }
    }

    /// Running runs as `(group, run_id)`
    pub fn active(&self) -> Vec<(String, String)> {
        let mut active: Vec<(String, String)> = self
            .groups()
            .iter()
            .filter_map(|(key, group)| {
                group
                    .running
                    .as_ref()
                    .map(|slot| (key.clone(), slot.run_id.clone()))
            })
            .collect();
        active.sort();
        active
    }

    /// Cancel every running and pending run
    pub fn cancel_all(&self) {
        for group in self.groups().values() {
            for slot in group.running.iter().chain(group.pending.iter()) {
                slot.token.cancel();
            }
        }
    }

    fn release(&self, key: &str, run_id: &str) {
        let mut groups = self.groups();
        if let Some(group) = groups.get_mut(key) {
            if group.running.as_ref().is_some_and(|s| s.run_id == run_id) {
                group.running = None;
            }
            if group.is_empty() {
                groups.remove(key);
            }
        }
        drop(groups);

        debug!(group = key, run = run_id, "Released concurrency group");
        self.released.notify_waiters();
    }
}

/// Exclusive hold on a concurrency group, released on drop
#[derive(Debug)]
pub struct GateGuard {
    gate: Arc<ConcurrencyGate>,
    key: String,
    run_id: String,
    token: CancelToken,
}

impl GateGuard {
    /// Group key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Cancellation token of the holding run
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.release(&self.key, &self.run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_new_run_cancels_in_flight_run() {
        let gate = ConcurrencyGate::new();
        let first = gate.acquire("release-v1", "run-1", true).await.unwrap();

        let second = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire("release-v1", "run-2", true).await })
        };

        tokio::time::timeout(Duration::from_secs(1), first.token().cancelled())
            .await
            .expect("first run cancelled");

        // The superseding run starts only after the old one lets go
        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(1), second)
            .await
            .expect("second acquired")
            .unwrap()
            .unwrap();

        assert!(!second.token().is_cancelled());
        assert_eq!(
            gate.active(),
            vec![("release-v1".to_string(), "run-2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_distinct_groups_do_not_interfere() {
        let gate = ConcurrencyGate::new();
        let a = gate.acquire("release-v1", "run-1", true).await.unwrap();
        let b = gate.acquire("release-v2", "run-2", true).await.unwrap();

        assert!(!a.token().is_cancelled());
        assert!(!b.token().is_cancelled());
        assert_eq!(gate.active().len(), 2);
    }

    #[tokio::test]
    async fn test_queue_without_cancel_in_progress() {
        let gate = ConcurrencyGate::new();
        let first = gate.acquire("g", "run-1", false).await.unwrap();

        let second = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire("g", "run-2", false).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!first.token().is_cancelled());
        assert!(!second.is_finished());

        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(1), second)
            .await
            .expect("second acquired")
            .unwrap()
            .unwrap();
        assert_eq!(second.key(), "g");
    }

    #[tokio::test]
    async fn test_newer_pending_run_supersedes_older_pending_run() {
        let gate = ConcurrencyGate::new();
        let first = gate.acquire("g", "run-1", false).await.unwrap();

        let second = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire("g", "run-2", false).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let third = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire("g", "run-3", false).await })
        };

        let second = tokio::time::timeout(Duration::from_secs(1), second)
            .await
            .expect("second resolved")
            .unwrap();
        assert!(matches!(second, Err(TagrelError::Cancelled { .. })));

        drop(first);
        let third = tokio::time::timeout(Duration::from_secs(1), third)
            .await
            .expect("third acquired")
            .unwrap();
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_release_frees_group() {
        let gate = ConcurrencyGate::new();
        {
            let _guard = gate.acquire("g", "run-1", true).await.unwrap();
            assert_eq!(gate.active().len(), 1);
        }
        assert!(gate.active().is_empty());
    }
}
