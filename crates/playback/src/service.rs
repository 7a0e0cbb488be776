//! Wiring of transport, sampler, sleep timer and wake guard

use crate::bookmarks::BookmarkSink;
use crate::engine::{Engine, EventReceiver};
use crate::handle::TransportHandle;
use crate::sampler::PositionSampler;
use crate::shake::ShakeSource;
use crate::sleep_timer::{SleepTimer, SleepTimerConfig};
use crate::transport::{Transport, TransportConfig};
use crate::wake::{WakeGuard, WakeLock, WakeObserver};
use lectern_config::Settings;
use lectern_core::TransportSnapshot;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Capabilities the host supplies
pub struct Platform<L: WakeLock> {
    pub wake_lock: L,
    pub shakes: Arc<dyn ShakeSource>,
    pub bookmarks: Arc<dyn BookmarkSink>,
}

/// One playback core per process
///
/// Everything it starts runs on tokio tasks that end with
/// [`shutdown`](Self::shutdown) or when the service is dropped.
pub struct PlaybackService {
    transport: TransportHandle,
    sampler: PositionSampler,
    sleep_timer: SleepTimer,
    wake: WakeObserver,
    actor: JoinHandle<()>,
}

impl PlaybackService {
    /// Starts the core around `engine`; must be called inside a tokio runtime
    pub fn start<E, L>(
        engine: E,
        events: EventReceiver,
        settings: &Settings,
        platform: Platform<L>,
    ) -> Self
    where
        E: Engine,
        L: WakeLock,
    {
        let transport = Transport::new(engine, TransportConfig::from(&settings.player));
        let (handle, actor) = TransportHandle::spawn(transport, events);

        let sampler = PositionSampler::spawn(handle.clone());
        let sleep_timer = SleepTimer::new(
            handle.clone(),
            SleepTimerConfig::from(&settings.sleep_timer),
            platform.shakes,
            platform.bookmarks,
        );
        let wake = WakeGuard::new(platform.wake_lock).observe(&handle);

        log::info!("Playback service started");
        Self {
            transport: handle,
            sampler,
            sleep_timer,
            wake,
            actor,
        }
    }

    pub fn transport(&self) -> &TransportHandle {
        &self.transport
    }

    pub fn sampler(&self) -> &PositionSampler {
        &self.sampler
    }

    pub fn sleep_timer(&self) -> &SleepTimer {
        &self.sleep_timer
    }

    /// Cancels the sleep timer, stops the engine and waits for the
    /// transport task to finish
    pub async fn shutdown(self) -> TransportSnapshot {
        self.sleep_timer.set_active(false);
        let snapshot = self.transport.shutdown().await;
        self.sampler.stop();
        self.wake.stop();

        let Self { actor, .. } = self;
        if let Err(e) = actor.await {
            if !e.is_cancelled() {
                log::error!("Transport task failed: {}", e);
            }
        }

        log::info!("Playback service stopped");
        snapshot
    }
}
