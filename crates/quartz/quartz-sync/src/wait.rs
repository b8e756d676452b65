//! Futex-style wait/wake on a 32-bit word.
//!
//! On Linux this maps directly onto `futex(2)`. Elsewhere the same contract is
//! emulated with a [`Monitor`]: the waiter checks the word under the monitor
//! lock and the waker takes that lock before notifying, so a wake issued after
//! the word changed can never slip between the check and the sleep.

#[cfg(not(target_os = "linux"))]
use crate::monitor::Monitor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Why [`WaitWord::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// Woken by `wake_one`/`wake_all` (or spuriously).
    Woken,
    /// The word no longer held the expected value; the caller never slept.
    Mismatch,
    TimedOut,
}

#[derive(Debug, Default)]
pub struct WaitWord {
    word: AtomicU32,
    #[cfg(not(target_os = "linux"))]
    monitor: Monitor<()>,
}

impl WaitWord {
    pub fn new(value: u32) -> Self {
        Self {
            word: AtomicU32::new(value),
            #[cfg(not(target_os = "linux"))]
            monitor: Monitor::new(()),
        }
    }

    #[inline]
    pub fn load(&self) -> u32 {
        self.word.load(Ordering::Acquire)
    }

    /// Wrapping increment, returning the previous value.
    #[inline]
    pub fn bump(&self) -> u32 {
        self.word.fetch_add(1, Ordering::Release)
    }

    /// Sleep while the word equals `expected`, until woken or `timeout`
    /// elapses. Returns immediately with [`WaitResult::Mismatch`] if the word
    /// already differs.
    pub fn wait(&self, expected: u32, timeout: Option<Duration>) -> WaitResult {
        #[cfg(target_os = "linux")]
        {
            crate::futex::wait(&self.word, expected, timeout)
        }

        #[cfg(not(target_os = "linux"))]
        {
            let mut guard = self.monitor.lock();
            if self.word.load(Ordering::Acquire) != expected {
                return WaitResult::Mismatch;
            }
            match timeout {
                None => {
                    self.monitor.wait(&mut guard);
                    WaitResult::Woken
                }
                Some(d) if self.monitor.wait_for(&mut guard, d) => WaitResult::TimedOut,
                Some(_) => WaitResult::Woken,
            }
        }
    }

    /// Wake at most one thread sleeping in [`wait`](Self::wait).
    pub fn wake_one(&self) {
        #[cfg(target_os = "linux")]
        crate::futex::wake(&self.word, 1);

        #[cfg(not(target_os = "linux"))]
        {
            let _guard = self.monitor.lock();
            self.monitor.notify_one();
        }
    }

    pub fn wake_all(&self) {
        #[cfg(target_os = "linux")]
        crate::futex::wake(&self.word, i32::MAX);

        #[cfg(not(target_os = "linux"))]
        {
            let _guard = self.monitor.lock();
            self.monitor.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn mismatch_returns_without_sleeping() {
        let word = WaitWord::new(3);
        assert_eq!(word.wait(4, None), WaitResult::Mismatch);
    }

    #[test]
    fn timeout_elapses_when_nobody_wakes() {
        let word = WaitWord::new(0);
        let start = Instant::now();
        let mut result = word.wait(0, Some(Duration::from_millis(10)));
        // a spurious wakeup is allowed; retry once with the remaining budget
        if result == WaitResult::Woken {
            result = word.wait(0, Some(Duration::from_millis(10)));
        }
        assert_eq!(result, WaitResult::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn wake_all_releases_every_waiter() {
        let word = Arc::new(WaitWord::new(0));
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let word = Arc::clone(&word);
                thread::spawn(move || {
                    while word.load() == 0 {
                        word.wait(0, None);
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(10));
        word.bump();
        word.wake_all();
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }
}
