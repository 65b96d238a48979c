//! Counting admission gate bounding the number of in-flight advances

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use eyre::{Result, eyre};
use tokio::sync::Semaphore;
use tracing::debug;

/// Counting gate with a fixed capacity
///
/// Every successful [`acquire`](Self::acquire) or [`try_acquire`](Self::try_acquire)
/// must be paired with exactly one [`release`](Self::release). Waiters of
/// `acquire` are woken in FIFO order.
#[derive(Debug)]
pub struct ConcurrencyGate {
    capacity: usize,
    permits: Semaphore,
    held: AtomicUsize,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl ConcurrencyGate {
    /// Create a gate with `capacity` slots
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "ConcurrencyGate::new: called");
        assert!(capacity > 0, "ConcurrencyGate capacity must be at least 1");
        Self {
            capacity,
            permits: Semaphore::new(capacity),
            held: AtomicUsize::new(0),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Wait until a slot is free, then reserve it
    pub async fn acquire(&self) -> Result<()> {
        debug!(held = self.held(), "ConcurrencyGate::acquire: called");
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| eyre!("Concurrency gate closed"))?;
        permit.forget();
        self.mark_acquired();
        Ok(())
    }

    /// Reserve a slot only if one is free right now
    pub fn try_acquire(&self) -> bool {
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.mark_acquired();
                debug!(held = self.held(), "ConcurrencyGate::try_acquire: slot reserved");
                true
            }
            Err(_) => {
                debug!(held = self.held(), "ConcurrencyGate::try_acquire: gate full");
                false
            }
        }
    }

    /// Free a slot previously reserved
    ///
    /// # Panics
    ///
    /// Panics when no slot is held. Over-release would silently raise the bound.
    pub fn release(&self) {
        let previous = self
            .held
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |held| held.checked_sub(1));
        match previous {
            Ok(held) => {
                self.released.fetch_add(1, Ordering::SeqCst);
                self.permits.add_permits(1);
                debug!(held = held - 1, "ConcurrencyGate::release: slot freed");
            }
            Err(_) => panic!("ConcurrencyGate::release called without a matching acquire"),
        }
    }

    fn mark_acquired(&self) {
        self.held.fetch_add(1, Ordering::SeqCst);
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    /// Slots currently reserved
    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }

    /// Whether every slot is reserved
    pub fn is_full(&self) -> bool {
        self.held() >= self.capacity
    }

    /// Total successful acquisitions since creation
    pub fn acquired_total(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Total releases since creation
    pub fn released_total(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_try_acquire_respects_capacity() {
        let gate = ConcurrencyGate::new(2);
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(gate.is_full());
        assert!(!gate.try_acquire());
        assert_eq!(gate.held(), 2);

        gate.release();
        assert!(!gate.is_full());
        assert!(gate.try_acquire());
    }

    #[test]
    fn test_balance_counters() {
        let gate = ConcurrencyGate::new(3);
        for _ in 0..3 {
            assert!(gate.try_acquire());
        }
        for _ in 0..3 {
            gate.release();
        }
        assert_eq!(gate.held(), 0);
        assert_eq!(gate.acquired_total(), 3);
        assert_eq!(gate.released_total(), 3);
    }

    #[test]
    #[should_panic(expected = "without a matching acquire")]
    fn test_release_without_acquire_panics() {
        let gate = ConcurrencyGate::new(1);
        gate.release();
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn test_zero_capacity_panics() {
        let _ = ConcurrencyGate::new(0);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let gate = Arc::new(ConcurrencyGate::new(1));
        gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.acquire().await.unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "second acquire should still be waiting");

        gate.release();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap();
        assert_eq!(gate.held(), 1);
    }
}
