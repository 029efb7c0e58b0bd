//! Counting permits bounding the jobs in flight.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct PermitState {
    in_flight: usize,
    peak: usize,
}

/// Backpressure for the controller: every submitted job holds a permit until
/// its completion has been applied.
#[derive(Debug)]
pub struct JobPermits {
    state: Mutex<PermitState>,
    condvar: Condvar,
    max_permits: usize,
}

/// RAII guard that releases a job permit when dropped.
#[derive(Debug)]
pub struct JobPermit<'a> {
    permits: &'a JobPermits,
}

impl JobPermits {
    /// `max_permits` below 1 is raised to 1.
    pub fn new(max_permits: usize) -> Self {
        Self {
            state: Mutex::new(PermitState::default()),
            condvar: Condvar::new(),
            max_permits: max_permits.max(1),
        }
    }

    // The state is two counters updated atomically under the lock, so a
    // panic elsewhere never leaves it inconsistent.
    fn lock(&self) -> MutexGuard<'_, PermitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until fewer than `max_permits` jobs are in flight.
    pub fn acquire(&self) -> JobPermit<'_> {
        let mut state = self.lock();
        while state.in_flight >= self.max_permits {
            state = self.condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.in_flight += 1;
        state.peak = state.peak.max(state.in_flight);
        JobPermit { permits: self }
    }

    /// Blocks until every permit has been released.
    pub fn wait_idle(&self) {
        let mut state = self.lock();
        while state.in_flight > 0 {
            state = self.condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Highest number of permits held at once so far.
    pub fn peak(&self) -> usize {
        self.lock().peak
    }

    pub fn max_permits(&self) -> usize {
        self.max_permits
    }
}

impl Drop for JobPermit<'_> {
    fn drop(&mut self) {
        let mut state = self.permits.lock();
        state.in_flight -= 1;
        // Both acquirers and wait_idle wait on the same condvar.
        self.permits.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_permits_are_released_on_drop() {
        let permits = JobPermits::new(2);
        let a = permits.acquire();
        let b = permits.acquire();
        assert_eq!(permits.in_flight(), 2);
        drop(a);
        assert_eq!(permits.in_flight(), 1);
        drop(b);
        assert_eq!(permits.in_flight(), 0);
        assert_eq!(permits.peak(), 2);
    }

    #[test]
    fn test_acquire_blocks_at_limit() {
        let permits = JobPermits::new(3);
        let running = AtomicUsize::new(0);
        let worst = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..12 {
                scope.spawn(|| {
                    let _permit = permits.acquire();
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    worst.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(2));
                    running.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert!(worst.load(Ordering::SeqCst) <= 3);
        assert!(permits.peak() <= 3);
        assert_eq!(permits.in_flight(), 0);
    }

    #[test]
    fn test_wait_idle_returns_after_release() {
        let permits = JobPermits::new(1);
        thread::scope(|scope| {
            let permit = permits.acquire();
            scope.spawn(move || {
                thread::sleep(Duration::from_millis(5));
                drop(permit);
            });
            permits.wait_idle();
            assert_eq!(permits.in_flight(), 0);
        });
    }

    #[test]
    fn test_zero_is_raised_to_one() {
        assert_eq!(JobPermits::new(0).max_permits(), 1);
    }
}
