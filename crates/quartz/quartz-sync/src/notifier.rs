use crate::wait::{WaitResult, WaitWord};
use std::sync::atomic::{AtomicU32, Ordering, fence};
use std::time::Instant;

/// Event count: lets consumers sleep until a predicate holds without making
/// producers pay for a syscall when nobody is asleep.
///
/// Producers change shared state first and then call `notify_*`. Consumers
/// register, snapshot the epoch, re-check the predicate and only then sleep on
/// the snapshot. The `SeqCst` fences on both sides guarantee that either the
/// producer sees the registration (and bumps the epoch), or the consumer's
/// re-check sees the producer's state change.
#[derive(Debug, Default)]
pub struct Notifier {
    epoch: WaitWord,
    waiters: AtomicU32,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn notify_one(&self) {
        if self.should_wake() {
            self.epoch.bump();
            self.epoch.wake_one();
        }
    }

    #[inline]
    pub fn notify_all(&self) {
        if self.should_wake() {
            self.epoch.bump();
            self.epoch.wake_all();
        }
    }

    /// Call `poll` until it returns `Some`, sleeping between attempts.
    ///
    /// Returns `None` only if `deadline` passes first.
    pub fn wait_until<R>(
        &self,
        deadline: Option<Instant>,
        mut poll: impl FnMut() -> Option<R>,
    ) -> Option<R> {
        loop {
            if let Some(value) = poll() {
                return Some(value);
            }
            let timeout = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    Some(deadline - now)
                }
                None => None,
            };

            self.waiters.fetch_add(1, Ordering::SeqCst);
            fence(Ordering::SeqCst);
            let observed = self.epoch.load();

            if let Some(value) = poll() {
                self.waiters.fetch_sub(1, Ordering::Relaxed);
                return Some(value);
            }
            let result = self.epoch.wait(observed, timeout);
            self.waiters.fetch_sub(1, Ordering::Relaxed);

            if result == WaitResult::TimedOut {
                // one last look so a message published right at the deadline
                // is not reported as a timeout
                return poll();
            }
        }
    }

    #[inline(always)]
    fn should_wake(&self) -> bool {
        fence(Ordering::SeqCst);
        self.waiters.load(Ordering::Relaxed) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn notify_without_waiters_is_cheap_and_harmless() {
        let notifier = Notifier::new();
        notifier.notify_all();
        notifier.notify_one();
        assert_eq!(notifier.waiters.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn sleeper_wakes_when_flag_is_published() {
        let notifier = Arc::new(Notifier::new());
        let flag = Arc::new(AtomicBool::new(false));

        let sleeper = {
            let notifier = Arc::clone(&notifier);
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                notifier.wait_until(None, || flag.load(Ordering::Acquire).then_some(()))
            })
        };

        thread::sleep(Duration::from_millis(10));
        flag.store(true, Ordering::Release);
        notifier.notify_all();
        assert_eq!(sleeper.join().unwrap(), Some(()));
        assert_eq!(notifier.waiters.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn deadline_without_progress_yields_none() {
        let notifier = Notifier::new();
        let deadline = Instant::now() + Duration::from_millis(5);
        assert_eq!(notifier.wait_until::<()>(Some(deadline), || None), None);
    }
}
