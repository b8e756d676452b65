//! Spin / yield backoff for retry loops.

use std::hint;
use std::thread;
use std::time::Instant;

/// Exponential spinning stops growing after `2^SPIN_LIMIT` iterations.
const SPIN_LIMIT: u32 = 6;
/// Past this step the backoff is considered exhausted (see [`Backoff::is_completed`]).
const YIELD_LIMIT: u32 = 10;

/// How a spinning thread waits between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffPolicy {
    /// Retry immediately with a single `spin_loop` hint.
    Spin,
    /// Give the time slice back to the scheduler on every retry.
    Yield,
    /// Spin `1, 2, 4, ... 64` iterations, then fall back to yielding.
    #[default]
    Exponential,
}

#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    step: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, step: 0 }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Back off after losing a CAS race. Never yields under the `Spin` and
    /// `Exponential` policies: the winner is already making progress.
    #[inline]
    pub fn spin(&mut self) {
        match self.policy {
            BackoffPolicy::Spin => hint::spin_loop(),
            BackoffPolicy::Yield => thread::yield_now(),
            BackoffPolicy::Exponential => {
                for _ in 0..1u32 << self.step.min(SPIN_LIMIT) {
                    hint::spin_loop();
                }
            }
        }
        self.advance();
    }

    /// Back off while waiting for another thread to publish something.
    #[inline]
    pub fn snooze(&mut self) {
        match self.policy {
            BackoffPolicy::Spin => hint::spin_loop(),
            BackoffPolicy::Yield => thread::yield_now(),
            BackoffPolicy::Exponential => {
                if self.step <= SPIN_LIMIT {
                    for _ in 0..1u32 << self.step {
                        hint::spin_loop();
                    }
                } else {
                    thread::yield_now();
                }
            }
        }
        self.advance();
    }

    /// True once enough rounds have passed that blocking would be cheaper
    /// than continuing to spin.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.step > YIELD_LIMIT
    }

    /// Poll until `poll` yields a value or `deadline` passes.
    pub fn spin_until<R>(
        policy: BackoffPolicy,
        deadline: Option<Instant>,
        mut poll: impl FnMut() -> Option<R>,
    ) -> Option<R> {
        let mut backoff = Self::new(policy);
        loop {
            if let Some(value) = poll() {
                return Some(value);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return None;
            }
            backoff.snooze();
        }
    }

    #[inline(always)]
    fn advance(&mut self) {
        if self.step <= YIELD_LIMIT {
            self.step += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn completes_after_enough_rounds_for_every_policy() {
        for policy in [BackoffPolicy::Spin, BackoffPolicy::Yield, BackoffPolicy::Exponential] {
            let mut backoff = Backoff::new(policy);
            assert!(!backoff.is_completed());
            for _ in 0..=YIELD_LIMIT {
                backoff.snooze();
            }
            assert!(backoff.is_completed(), "{policy:?}");
            backoff.reset();
            assert!(!backoff.is_completed());
        }
    }

    #[test]
    fn spin_until_returns_the_first_ready_value() {
        let mut calls = 0;
        let got = Backoff::spin_until(BackoffPolicy::Exponential, None, || {
            calls += 1;
            (calls == 5).then_some(calls)
        });
        assert_eq!(got, Some(5));
    }

    #[test]
    fn spin_until_gives_up_at_the_deadline() {
        let deadline = Instant::now() + Duration::from_millis(5);
        let got: Option<()> = Backoff::spin_until(BackoffPolicy::Yield, Some(deadline), || None);
        assert!(got.is_none());
        assert!(Instant::now() >= deadline);
    }
}
