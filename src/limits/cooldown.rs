//! Sliding-window cooldowns.
//!
//! Each rule keeps one window per bucket key. Windows are lazy: nothing runs
//! in the background, the window is reset on the first attempt after it has
//! expired.

use super::{BucketKey, BucketType};
use crate::commands::Context;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A cooldown rule: at most `rate` invocations per `per` for each bucket.
#[derive(Debug, Clone)]
pub struct Cooldown {
    rate: u32,
    per: Duration,
    bucket: BucketType,
}

impl Cooldown {
    /// A rate of zero is treated as one.
    pub fn new(rate: u32, per: Duration, bucket: BucketType) -> Self {
        Self {
            rate: rate.max(1),
            per,
            bucket,
        }
    }

    #[inline]
    pub fn rate(&self) -> u32 {
        self.rate
    }

    #[inline]
    pub fn per(&self) -> Duration {
        self.per
    }

    #[inline]
    pub fn bucket(&self) -> &BucketType {
        &self.bucket
    }
}

/// A denied cooldown acquisition.
#[derive(Debug, Clone)]
pub struct CooldownDenied {
    /// The violated rule with the longest wait.
    pub cooldown: Cooldown,
    /// Time until that rule allows again.
    pub retry_after: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
    last_used: Instant,
    per: Duration,
}

impl Window {
    fn new(now: Instant, per: Duration) -> Self {
        Self {
            started: now,
            count: 0,
            last_used: now,
            per,
        }
    }

    /// Count one attempt. Returns the wait if the attempt exceeds the rate.
    fn attempt(&mut self, rate: u32, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= self.per {
            self.started = now;
            self.count = 0;
        }
        self.last_used = now;
        // Capped so a flood of denials cannot overflow the counter
        self.count = self.count.saturating_add(1).min(rate.saturating_add(1));
        if self.count > rate {
            let elapsed = now.saturating_duration_since(self.started);
            Some(self.per.saturating_sub(elapsed))
        } else {
            None
        }
    }

    fn is_idle(&self, now: Instant, retention: Duration) -> bool {
        now.saturating_duration_since(self.started) >= self.per
            && now.saturating_duration_since(self.last_used) >= retention
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    command: String,
    rule: usize,
    bucket: BucketKey,
}

/// Cooldown windows for every command and rule, keyed by bucket.
///
/// Each window lives in its own map entry, so attempts on different keys
/// never contend beyond the shard lock.
#[derive(Debug, Default)]
pub struct CooldownManager {
    windows: DashMap<WindowKey, Window>,
}

impl CooldownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an invocation of `command` against all of its rules.
    pub fn acquire(
        &self,
        command: &str,
        rules: &[Cooldown],
        ctx: &Context,
    ) -> Result<(), CooldownDenied> {
        self.acquire_at(command, rules, ctx, Instant::now())
    }

    /// [`CooldownManager::acquire`] with an explicit clock reading.
    ///
    /// Every rule counts the attempt; the denial reports the rule with the
    /// longest remaining wait.
    pub fn acquire_at(
        &self,
        command: &str,
        rules: &[Cooldown],
        ctx: &Context,
        now: Instant,
    ) -> Result<(), CooldownDenied> {
        let mut denied: Option<CooldownDenied> = None;

        for (index, rule) in rules.iter().enumerate() {
            let key = WindowKey {
                command: command.to_string(),
                rule: index,
                bucket: rule.bucket.key(ctx),
            };
            let wait = self
                .windows
                .entry(key)
                .or_insert_with(|| Window::new(now, rule.per))
                .attempt(rule.rate, now);

            if let Some(retry_after) = wait {
                debug!(command = %command, bucket = %rule.bucket, ?retry_after, "cooldown exceeded");
                if denied.as_ref().is_none_or(|d| retry_after > d.retry_after) {
                    denied = Some(CooldownDenied {
                        cooldown: rule.clone(),
                        retry_after,
                    });
                }
            }
        }

        match denied {
            Some(d) => Err(d),
            None => Ok(()),
        }
    }

    /// Forget the windows `ctx` falls into for `command`.
    pub fn reset(&self, command: &str, rules: &[Cooldown], ctx: &Context) {
        for (index, rule) in rules.iter().enumerate() {
            self.windows.remove(&WindowKey {
                command: command.to_string(),
                rule: index,
                bucket: rule.bucket.key(ctx),
            });
        }
    }

    /// Drop every window of `command`.
    pub fn clear_command(&self, command: &str) {
        self.windows.retain(|key, _| key.command != command);
    }

    /// Evict windows that expired and have been unused for `retention`.
    ///
    /// Returns the number of evicted windows.
    pub fn cleanup(&self, retention: Duration) -> usize {
        self.cleanup_at(retention, Instant::now())
    }

    pub fn cleanup_at(&self, retention: Duration, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_idle(now, retention));
        let evicted = before.saturating_sub(self.windows.len());
        if evicted > 0 {
            debug!(evicted, "evicted idle cooldown windows");
        }
        evicted
    }

    /// Number of live windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context_in, context_for};

    fn per_user(rate: u32, secs: u64) -> Cooldown {
        Cooldown::new(rate, Duration::from_secs(secs), BucketType::User)
    }

    #[test]
    fn third_attempt_in_window_is_denied() {
        let manager = CooldownManager::new();
        let rules = [per_user(2, 10)];
        let ctx = context_for(1);
        let start = Instant::now();

        assert!(manager.acquire_at("cmd", &rules, &ctx, start).is_ok());
        assert!(
            manager
                .acquire_at("cmd", &rules, &ctx, start + Duration::from_millis(500))
                .is_ok()
        );
        let denied = manager
            .acquire_at("cmd", &rules, &ctx, start + Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(denied.retry_after, Duration::from_secs(9));
        assert_eq!(denied.cooldown.rate(), 2);
    }

    #[test]
    fn window_resets_after_expiry() {
        let manager = CooldownManager::new();
        let rules = [per_user(1, 5)];
        let ctx = context_for(1);
        let start = Instant::now();

        assert!(manager.acquire_at("cmd", &rules, &ctx, start).is_ok());
        assert!(manager.acquire_at("cmd", &rules, &ctx, start + Duration::from_secs(4)).is_err());
        assert!(manager.acquire_at("cmd", &rules, &ctx, start + Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn keys_are_independent() {
        let manager = CooldownManager::new();
        let rules = [per_user(1, 60)];
        let now = Instant::now();

        assert!(manager.acquire_at("cmd", &rules, &context_for(1), now).is_ok());
        assert!(manager.acquire_at("cmd", &rules, &context_for(2), now).is_ok());
        assert!(manager.acquire_at("other", &rules, &context_for(1), now).is_ok());
        assert!(manager.acquire_at("cmd", &rules, &context_for(1), now).is_err());
    }

    #[test]
    fn denial_reports_longest_wait() {
        let manager = CooldownManager::new();
        let rules = [
            per_user(1, 5),
            Cooldown::new(1, Duration::from_secs(30), BucketType::Scope),
        ];
        let ctx = context_in(1, 10, 20);
        let now = Instant::now();

        assert!(manager.acquire_at("cmd", &rules, &ctx, now).is_ok());
        let denied = manager
            .acquire_at("cmd", &rules, &ctx, now + Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(denied.retry_after, Duration::from_secs(29));
        assert_eq!(denied.cooldown.per(), Duration::from_secs(30));
    }

    #[test]
    fn zero_rate_means_one() {
        assert_eq!(per_user(0, 1).rate(), 1);
    }

    #[test]
    fn reset_clears_the_callers_window() {
        let manager = CooldownManager::new();
        let rules = [per_user(1, 60)];
        let ctx = context_for(1);
        let now = Instant::now();

        assert!(manager.acquire_at("cmd", &rules, &ctx, now).is_ok());
        manager.reset("cmd", &rules, &ctx);
        assert!(manager.acquire_at("cmd", &rules, &ctx, now).is_ok());
    }

    #[test]
    fn cleanup_evicts_idle_windows_only() {
        let manager = CooldownManager::new();
        let rules = [per_user(1, 10)];
        let now = Instant::now();

        manager.acquire_at("cmd", &rules, &context_for(1), now).unwrap();
        manager
            .acquire_at("cmd", &rules, &context_for(2), now + Duration::from_secs(50))
            .unwrap();
        assert_eq!(manager.len(), 2);

        let evicted = manager.cleanup_at(Duration::from_secs(30), now + Duration::from_secs(55));
        assert_eq!(evicted, 1);
        assert_eq!(manager.len(), 1);
    }
}
