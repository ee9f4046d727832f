//! Guarded cell — a single value shared between concurrent callers.
//!
//! Access is serialized by an admission permit taken from a bounded
//! `tokio::sync::mpsc` channel of capacity 1. Reserving the only slot
//! (`Sender::reserve`) means "inside the critical section"; dropping the
//! reservation hands the slot back. No message is ever sent, and the cell
//! keeps the receiver alive so the channel stays open for its lifetime.
//!
//! ```text
//!   FREE ──reserve()──▶ HELD
//!    ▲                   │
//!    └────drop(permit)───┘
//! ```

use std::cell::UnsafeCell;
use std::fmt;

use tokio::sync::mpsc;

/// State of the admission permit pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitState {
    /// The token is available.
    Free,
    /// One in-flight operation holds the token.
    Held,
}

/// Holds exactly one value of type `T` and arbitrates concurrent access.
///
/// Every operation takes the permit, touches the value, and releases the
/// permit on every exit path (including a panic in [`GuardedCell::with`]).
/// Waiting for the permit is cancel safe: a caller dropped before it was
/// admitted never held the slot and releases nothing.
pub struct GuardedCell<T> {
    value: UnsafeCell<T>,
    permits: mpsc::Sender<()>,
    // Never read. Owning it keeps `reserve()` from failing with a closed channel.
    _slot: mpsc::Receiver<()>,
}

// SAFETY: `value` is only accessed through `CriticalSection`, which exists
// only while the single channel slot is reserved. At most one reservation
// exists at a time, so accesses never overlap.
unsafe impl<T: Send> Sync for GuardedCell<T> {}

/// Scope guard for one admission. Releases the permit when dropped.
struct CriticalSection<'a, T> {
    cell: &'a GuardedCell<T>,
    _permit: mpsc::Permit<'a, ()>,
}

impl<T> CriticalSection<'_, T> {
    fn value_mut(&mut self) -> &mut T {
        // SAFETY: the permit held by `self` is the only one in circulation.
        unsafe { &mut *self.cell.value.get() }
    }
}

impl<T> GuardedCell<T> {
    /// Create a cell holding `initial`. The permit pool starts FREE.
    pub fn new(initial: T) -> Self {
        let (permits, slot) = mpsc::channel(1);
        Self {
            value: UnsafeCell::new(initial),
            permits,
            _slot: slot,
        }
    }

    /// Block until the permit is available and take it.
    async fn enter(&self) -> CriticalSection<'_, T> {
        let permit = self
            .permits
            .reserve()
            .await
            .expect("permit channel receiver is owned by the cell");
        CriticalSection {
            cell: self,
            _permit: permit,
        }
    }

    /// Current state of the permit pool.
    pub fn permit_state(&self) -> PermitState {
        if self.permits.capacity() == 0 {
            PermitState::Held
        } else {
            PermitState::Free
        }
    }

    /// Replace the stored value.
    pub async fn write(&self, value: T) {
        let mut section = self.enter().await;
        *section.value_mut() = value;
    }

    /// Replace the stored value and return the previous one.
    pub async fn replace(&self, value: T) -> T {
        let mut section = self.enter().await;
        std::mem::replace(section.value_mut(), value)
    }

    /// Run `f` against the stored value inside the critical section.
    ///
    /// `f` is synchronous, so nothing can suspend while the permit is held.
    pub async fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut section = self.enter().await;
        f(section.value_mut())
    }
}

impl<T: Clone> GuardedCell<T> {
    /// Return a copy of the stored value.
    pub async fn read(&self) -> T {
        let mut section = self.enter().await;
        section.value_mut().clone()
    }
}

impl<T: Default> Default for GuardedCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for GuardedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedCell")
            .field("permit", &self.permit_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_initial_value_is_read_back() {
        let cell = GuardedCell::new(1622366082_i64);
        assert_eq!(cell.read().await, 1622366082);
        assert_eq!(cell.permit_state(), PermitState::Free);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let cell = GuardedCell::new(0_i64);
        for v in [-100, 0, 1906357250, i64::MIN, i64::MAX] {
            cell.write(v).await;
            assert_eq!(cell.read().await, v);
        }
    }

    #[tokio::test]
    async fn test_replace_returns_previous() {
        let cell = GuardedCell::new(String::from("old"));
        let prev = cell.replace(String::from("new")).await;
        assert_eq!(prev, "old");
        assert_eq!(cell.read().await, "new");
    }

    #[tokio::test]
    async fn test_cells_are_independent() {
        let a = GuardedCell::new(1_i64);
        let b = GuardedCell::new(1_i64);
        a.write(2).await;
        assert_eq!(a.read().await, 2);
        assert_eq!(b.read().await, 1);
    }

    #[tokio::test]
    async fn test_permit_held_inside_critical_section() {
        let cell = GuardedCell::new(0_u8);
        let state = cell.with(|_| cell.permit_state()).await;
        assert_eq!(state, PermitState::Held);
        assert_eq!(cell.permit_state(), PermitState::Free);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_torn_values_under_concurrent_writers() {
        // Composite value: a torn write would leave the halves disagreeing.
        let cell = Arc::new(GuardedCell::new((0_i64, 0_i64)));
        let writers = (1..=64_i64).map(|n| {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move {
                for _ in 0..50 {
                    cell.write((n, -n)).await;
                }
            })
        });
        let readers = (0..16).map(|_| {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let (a, b) = cell.read().await;
                    assert_eq!(a, -b);
                    assert!((0..=64).contains(&a));
                }
            })
        });
        let handles: Vec<_> = writers.chain(readers).collect();
        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }
        let (a, b) = cell.read().await;
        assert!((1..=64).contains(&a));
        assert_eq!(a, -b);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_lost_updates() {
        let cell = Arc::new(GuardedCell::new(0_u64));
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let cell = Arc::clone(&cell);
                tokio::spawn(async move {
                    for _ in 0..100 {
                        cell.with(|v| *v += 1).await;
                    }
                })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }
        assert_eq!(cell.read().await, 32 * 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_critical_sections_do_not_overlap() {
        let cell = Arc::new(GuardedCell::new(Vec::<(Instant, Instant)>::new()));
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cell = Arc::clone(&cell);
                tokio::spawn(async move {
                    for _ in 0..10 {
                        cell.with(|log| {
                            let entered = Instant::now();
                            std::thread::sleep(Duration::from_micros(200));
                            log.push((entered, Instant::now()));
                        })
                        .await;
                    }
                })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }

        let mut intervals = cell.read().await;
        assert_eq!(intervals.len(), 160);
        intervals.sort_by_key(|(entered, _)| *entered);
        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "critical sections overlapped");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_waiter_does_not_leak_permit() {
        let cell = Arc::new(GuardedCell::new(0_i64));
        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();
        let (leave_tx, leave_rx) = std::sync::mpsc::channel::<()>();

        // Hold the permit from a blocking thread so the waiter below must queue.
        let holder = {
            let cell = Arc::clone(&cell);
            tokio::task::spawn_blocking(move || {
                tokio::runtime::Handle::current().block_on(cell.with(|v| {
                    let _ = entered_tx.send(());
                    let _ = leave_rx.recv();
                    *v = 7;
                }))
            })
        };
        entered_rx.await.unwrap();
        assert_eq!(cell.permit_state(), PermitState::Held);

        let waiter = tokio::time::timeout(Duration::from_millis(20), cell.write(99)).await;
        assert!(waiter.is_err(), "waiter should still be queued when cancelled");

        leave_tx.send(()).unwrap();
        holder.await.unwrap();

        assert_eq!(cell.permit_state(), PermitState::Free);
        let read = tokio::time::timeout(Duration::from_secs(1), cell.read()).await;
        assert_eq!(read.unwrap(), 7);
    }

    #[test]
    fn test_waiter_pends_while_permit_held() {
        use tokio_test::{assert_pending, assert_ready, task};

        let cell = GuardedCell::new(1_i64);
        let mut outer = task::spawn(cell.with(|_| {
            let mut waiter = task::spawn(cell.write(5));
            assert_pending!(waiter.poll());
            // Dropping the queued waiter must not touch the held permit.
            drop(waiter);
            cell.permit_state()
        }));
        assert_eq!(assert_ready!(outer.poll()), PermitState::Held);
        drop(outer);

        let mut read = task::spawn(cell.read());
        assert_eq!(assert_ready!(read.poll()), 1);
        assert_eq!(cell.permit_state(), PermitState::Free);
    }

    #[tokio::test]
    async fn test_panic_inside_section_releases_permit() {
        let cell = Arc::new(GuardedCell::new(1_i64));
        let result = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move {
                cell.with(|v| {
                    *v = 2;
                    panic!("boom");
                })
                .await
            })
            .await
        };
        assert!(result.is_err());
        assert_eq!(cell.permit_state(), PermitState::Free);
        let read = tokio::time::timeout(Duration::from_secs(1), cell.read()).await;
        assert_eq!(read.unwrap(), 2);
    }
}
