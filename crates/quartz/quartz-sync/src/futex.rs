//! Thin wrappers over the Linux `futex(2)` syscall (process-private).

use crate::wait::WaitResult;
use std::io;
use std::ptr;
use std::sync::atomic::AtomicU32;
use std::time::Duration;

pub(crate) fn wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) -> WaitResult {
    let ts = timeout.map(|d| libc::timespec {
        tv_sec: d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: d.subsec_nanos() as _,
    });
    let ts_ptr = ts
        .as_ref()
        .map_or(ptr::null(), |t| t as *const libc::timespec);

    // SAFETY: `word` is a live, aligned u32 for the duration of the call and
    // `ts_ptr` is either null or points at `ts`, which outlives the call.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            ts_ptr,
        )
    };
    if rc == 0 {
        return WaitResult::Woken;
    }
    match io::Error::last_os_error().raw_os_error() {
        Some(libc::EAGAIN) => WaitResult::Mismatch,
        Some(libc::ETIMEDOUT) => WaitResult::TimedOut,
        // EINTR and friends: report a (spurious) wakeup, callers re-check.
        _ => WaitResult::Woken,
    }
}

pub(crate) fn wake(word: &AtomicU32, count: i32) -> usize {
    // SAFETY: FUTEX_WAKE only uses the address as a key; it never dereferences
    // beyond the aligned u32 behind `word`.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            count,
        )
    };
    rc.max(0) as usize
}
