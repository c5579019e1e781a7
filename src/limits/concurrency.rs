//! Bounded concurrency with optional FIFO waiting.

use super::{BucketKey, BucketType};
use crate::commands::Context;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// A concurrency rule: at most `number` invocations in flight per bucket.
#[derive(Debug, Clone)]
pub struct MaxConcurrency {
    pub number: usize,
    pub per: BucketType,
    /// Queue instead of failing when the bucket is full.
    pub wait: bool,
}

impl MaxConcurrency {
    /// A limit of zero is treated as one.
    pub fn new(number: usize, per: BucketType, wait: bool) -> Self {
        Self {
            number: number.max(1),
            per,
            wait,
        }
    }
}

/// The bucket was full and the rule does not wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Saturated;

#[derive(Debug, Default)]
struct SlotState {
    in_flight: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// In-flight counter and wait queue for one bucket key.
#[derive(Debug)]
pub struct ConcurrencyBucket {
    max: usize,
    state: Mutex<SlotState>,
}

impl ConcurrencyBucket {
    fn new(max: usize) -> Self {
        Self {
            max,
            state: Mutex::new(SlotState::default()),
        }
    }

    /// Number of admissions currently held.
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Number of queued waiters, including abandoned ones not yet skipped.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }

    fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.in_flight == 0 && state.waiters.is_empty()
    }

    /// Free a slot, handing it straight to the oldest live waiter.
    fn release(&self) {
        let mut state = self.state.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.send(()).is_ok() {
                return;
            }
        }
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

/// A held slot. Releasing happens exactly once, when the admission drops.
#[derive(Debug)]
pub struct Admission {
    bucket: Arc<ConcurrencyBucket>,
}

impl Admission {
    /// Release the slot now.
    pub fn leave(self) {}
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.bucket.release();
    }
}

/// A queued admission. Dropping it before the slot arrives removes it from
/// the queue without touching the in-flight count.
struct PendingAdmission {
    rx: Option<oneshot::Receiver<()>>,
    bucket: Arc<ConcurrencyBucket>,
}

impl PendingAdmission {
    /// Returns `true` once a slot has been handed over.
    async fn wait(&mut self) -> bool {
        let Some(rx) = self.rx.as_mut() else {
            return false;
        };
        let granted = rx.await.is_ok();
        self.rx = None;
        granted
    }
}

impl Drop for PendingAdmission {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            // A slot handed over after cancellation goes back to the bucket
            if rx.try_recv().is_ok() {
                self.bucket.release();
            }
        }
    }
}

/// Concurrency buckets for every command, keyed by bucket.
#[derive(Debug, Default)]
pub struct ConcurrencyManager {
    buckets: DashMap<(String, BucketKey), Arc<ConcurrencyBucket>>,
}

impl ConcurrencyManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, command: &str, rule: &MaxConcurrency, ctx: &Context) -> Arc<ConcurrencyBucket> {
        let key = (command.to_string(), rule.per.key(ctx));
        Arc::clone(
            &self
                .buckets
                .entry(key)
                .or_insert_with(|| Arc::new(ConcurrencyBucket::new(rule.number))),
        )
    }

    /// Take a slot for `command`, queuing if the rule waits.
    ///
    /// Cancelling the returned future while queued gives up the place in
    /// line without consuming a slot.
    pub async fn enter(
        &self,
        command: &str,
        rule: &MaxConcurrency,
        ctx: &Context,
    ) -> Result<Admission, Saturated> {
        let bucket = self.bucket(command, rule, ctx);

        loop {
            let rx = {
                let mut state = bucket.state.lock();
                if state.in_flight < bucket.max {
                    state.in_flight += 1;
                    return Ok(Admission {
                        bucket: Arc::clone(&bucket),
                    });
                }
                if !rule.wait {
                    debug!(command = %command, max = bucket.max, "concurrency limit reached");
                    return Err(Saturated);
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                rx
            };

            debug!(command = %command, "waiting for concurrency slot");
            let mut pending = PendingAdmission {
                rx: Some(rx),
                bucket: Arc::clone(&bucket),
            };
            if pending.wait().await {
                return Ok(Admission { bucket });
            }
        }
    }

    /// Admissions currently held in the bucket `ctx` falls into.
    pub fn in_flight(&self, command: &str, rule: &MaxConcurrency, ctx: &Context) -> usize {
        self.buckets
            .get(&(command.to_string(), rule.per.key(ctx)))
            .map(|b| b.in_flight())
            .unwrap_or(0)
    }

    /// Evict buckets nobody holds or waits on. Returns the number evicted.
    pub fn cleanup(&self) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| Arc::strong_count(bucket) > 1 || !bucket.is_idle());
        before.saturating_sub(self.buckets.len())
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context_for;
    use std::time::Duration;

    fn one_per_user(wait: bool) -> MaxConcurrency {
        MaxConcurrency::new(1, BucketType::User, wait)
    }

    #[tokio::test]
    async fn second_enter_is_rejected_without_wait() {
        let manager = ConcurrencyManager::new();
        let rule = one_per_user(false);
        let ctx = context_for(1);

        let first = manager.enter("cmd", &rule, &ctx).await.unwrap();
        assert_eq!(manager.enter("cmd", &rule, &ctx).await.unwrap_err(), Saturated);
        assert_eq!(manager.in_flight("cmd", &rule, &ctx), 1);

        first.leave();
        assert_eq!(manager.in_flight("cmd", &rule, &ctx), 0);
        assert!(manager.enter("cmd", &rule, &ctx).await.is_ok());
    }

    #[tokio::test]
    async fn other_keys_are_not_blocked() {
        let manager = ConcurrencyManager::new();
        let rule = one_per_user(false);

        let _held = manager.enter("cmd", &rule, &context_for(1)).await.unwrap();
        assert!(manager.enter("cmd", &rule, &context_for(2)).await.is_ok());
    }

    #[tokio::test]
    async fn waiter_is_admitted_after_leave() {
        let manager = Arc::new(ConcurrencyManager::new());
        let rule = one_per_user(true);
        let ctx = Arc::new(context_for(1));

        let first = manager.enter("cmd", &rule, &ctx).await.unwrap();

        let task = {
            let manager = Arc::clone(&manager);
            let rule = rule.clone();
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move { manager.enter("cmd", &rule, &ctx).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        drop(first);
        task.await.unwrap().unwrap();
        assert_eq!(manager.in_flight("cmd", &rule, &ctx), 0);
    }

    #[tokio::test]
    async fn waiters_are_admitted_in_arrival_order() {
        let manager = Arc::new(ConcurrencyManager::new());
        let rule = one_per_user(true);
        let ctx = Arc::new(context_for(1));
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = manager.enter("cmd", &rule, &ctx).await.unwrap();

        let mut tasks = Vec::new();
        for n in 0..3 {
            let manager = Arc::clone(&manager);
            let rule = rule.clone();
            let ctx = Arc::clone(&ctx);
            let order = Arc::clone(&order);
            tasks.push(tokio::spawn(async move {
                let admission = manager.enter("cmd", &rule, &ctx).await.unwrap();
                order.lock().push(n);
                tokio::task::yield_now().await;
                drop(admission);
            }));
            // Make sure the waiters queue up in spawn order
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        drop(first);
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_consume_a_slot() {
        let manager = Arc::new(ConcurrencyManager::new());
        let rule = one_per_user(true);
        let ctx = Arc::new(context_for(1));

        let first = manager.enter("cmd", &rule, &ctx).await.unwrap();

        let waiter = {
            let manager = Arc::clone(&manager);
            let rule = rule.clone();
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                let _ = manager.enter("cmd", &rule, &ctx).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        waiter.abort();
        let _ = waiter.await;

        drop(first);
        assert_eq!(manager.in_flight("cmd", &rule, &ctx), 0);
        assert!(manager.enter("cmd", &rule, &ctx).await.is_ok());
    }

    #[tokio::test]
    async fn cleanup_keeps_held_buckets() {
        let manager = ConcurrencyManager::new();
        let rule = one_per_user(false);

        let held = manager.enter("cmd", &rule, &context_for(1)).await.unwrap();
        drop(manager.enter("cmd", &rule, &context_for(2)).await.unwrap());

        assert_eq!(manager.cleanup(), 1);
        assert_eq!(manager.len(), 1);
        drop(held);
        assert_eq!(manager.cleanup(), 1);
        assert!(manager.is_empty());
    }
}
