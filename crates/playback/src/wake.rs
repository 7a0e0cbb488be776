//! Keeping the device awake while playing

use crate::handle::TransportHandle;
use tokio::task::JoinHandle;

/// A platform wake lock, not reference counted
pub trait WakeLock: Send + 'static {
    fn acquire(&mut self);
    fn release(&mut self);
}

/// Holds the wake lock at most once
///
/// Dropping the guard releases a held lock.
pub struct WakeGuard<L: WakeLock> {
    lock: L,
    held: bool,
}

impl<L: WakeLock> WakeGuard<L> {
    pub fn new(lock: L) -> Self {
        Self { lock, held: false }
    }

    /// Acquires or releases the lock; repeated calls do nothing
    pub fn stay_awake(&mut self, awake: bool) {
        if awake == self.held {
            return;
        }

        if awake {
            self.lock.acquire();
            log::debug!("Wake lock acquired");
        } else {
            self.lock.release();
            log::debug!("Wake lock released");
        }
        self.held = awake;
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Keeps the lock held exactly while the transport plays
    pub fn observe(self, transport: &TransportHandle) -> WakeObserver {
        let mut snapshots = transport.snapshots();
        let mut guard = self;

        let task = tokio::spawn(async move {
            loop {
                let playing = snapshots.borrow_and_update().state.is_playing();
                guard.stay_awake(playing);
                if snapshots.changed().await.is_err() {
                    break;
                }
            }
            guard.stay_awake(false);
        });

        WakeObserver { task }
    }
}

impl<L: WakeLock> Drop for WakeGuard<L> {
    fn drop(&mut self) {
        self.stay_awake(false);
    }
}

/// The task behind [`WakeGuard::observe`]; aborting it releases the lock
pub struct WakeObserver {
    task: JoinHandle<()>,
}

impl WakeObserver {
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for WakeObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A wake lock that only logs, for hosts without one
#[derive(Debug, Default)]
pub struct LogWakeLock;

impl WakeLock for LogWakeLock {
    fn acquire(&mut self) {
        log::info!("Staying awake");
    }

    fn release(&mut self) {
        log::info!("Allowing sleep");
    }
}
