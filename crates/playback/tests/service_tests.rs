//! The assembled playback core

use lectern_config::Settings;
use lectern_core::{Book, Chapter, PlaybackState};
use lectern_playback::{
    event_channel, MemoryBookmarks, NoShake, PlaybackService, Platform, SimulatedControl,
    SimulatedEngine, WakeLock,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Clone, Default)]
struct SharedLock {
    held: Arc<AtomicBool>,
    acquisitions: Arc<AtomicUsize>,
}

impl WakeLock for SharedLock {
    fn acquire(&mut self) {
        self.held.store(true, Ordering::SeqCst);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&mut self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

fn start() -> (PlaybackService, SimulatedControl, SharedLock) {
    let _ = env_logger::builder().is_test(true).try_init();

    let (events_tx, events_rx) = event_channel();
    let (engine, control) = SimulatedEngine::new(events_tx);
    let lock = SharedLock::default();
    let platform = Platform {
        wake_lock: lock.clone(),
        shakes: Arc::new(NoShake),
        bookmarks: Arc::new(MemoryBookmarks::new()),
    };

    let service = PlaybackService::start(engine, events_rx, &Settings::default(), platform);
    (service, control, lock)
}

fn book(durations: &[u64]) -> Book {
    let chapters = durations
        .iter()
        .map(|&d| Chapter::new("Chapter", d, Vec::new()).unwrap())
        .collect();
    Book::new("Service Book", chapters).unwrap()
}

async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_sampler_publishes_each_second() {
    let (service, _control, _lock) = start();
    let mut progress = service.sampler().progress();
    service.transport().init(book(&[60_000])).await;
    service.transport().play().await;

    sleep(Duration::from_millis(3100)).await;
    let snapshot = *progress.borrow_and_update();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.position.unwrap().position_ms, 3000);

    // nothing new until the next second
    sleep(Duration::from_millis(800)).await;
    assert!(!progress.has_changed().unwrap());

    sleep(Duration::from_millis(200)).await;
    assert_eq!(progress.borrow().position.unwrap().position_ms, 4000);
}

#[tokio::test(start_paused = true)]
async fn test_sampler_stops_while_paused() {
    let (service, _control, _lock) = start();
    let progress = service.sampler().progress();
    service.transport().init(book(&[60_000])).await;
    service.transport().play().await;
    sleep(Duration::from_millis(2100)).await;

    service.transport().pause(false).await;
    settle().await;
    let paused = *progress.borrow();
    assert_eq!(paused.state, PlaybackState::Paused);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(*progress.borrow(), paused);
}

#[tokio::test(start_paused = true)]
async fn test_sampler_follows_chapter_change() {
    let (service, _control, _lock) = start();
    let progress = service.sampler().progress();
    service.transport().init(book(&[3000, 4000])).await;
    service.transport().play().await;

    sleep(Duration::from_millis(3100)).await;
    let position = progress.borrow().position.unwrap();
    assert_eq!(position.chapter_index, 1);
    assert_eq!(position.global_position_ms, 3000);
}

#[tokio::test(start_paused = true)]
async fn test_wake_lock_follows_playback() {
    let (service, _control, lock) = start();
    service.transport().init(book(&[60_000])).await;
    settle().await;
    assert!(!lock.held.load(Ordering::SeqCst));

    service.transport().play().await;
    settle().await;
    assert!(lock.held.load(Ordering::SeqCst));

    // seeking while playing keeps the single acquisition
    service.transport().skip(true).await;
    settle().await;
    assert_eq!(lock.acquisitions.load(Ordering::SeqCst), 1);

    service.transport().pause(true).await;
    settle().await;
    assert!(!lock.held.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_everything() {
    let (service, control, lock) = start();
    let transport = service.transport().clone();
    transport.init(book(&[60_000])).await;
    transport.play().await;
    service.sleep_timer().set_active(true);
    settle().await;
    assert!(lock.held.load(Ordering::SeqCst));

    let snapshot = service.shutdown().await;
    settle().await;

    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(!control.probe().prepared);
    assert!(!lock.held.load(Ordering::SeqCst));
    assert_eq!(transport.play().await.state, PlaybackState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_settings_reach_transport() {
    let mut settings = Settings::default();
    settings.player.seek_time_secs = 5;

    let (events_tx, events_rx) = event_channel();
    let (engine, _control) = SimulatedEngine::new(events_tx);
    let platform = Platform {
        wake_lock: SharedLock::default(),
        shakes: Arc::new(NoShake),
        bookmarks: Arc::new(MemoryBookmarks::new()),
    };
    let service = PlaybackService::start(engine, events_rx, &settings, platform);

    service.transport().init(book(&[60_000])).await;
    let snapshot = service.transport().skip(true).await;
    assert_eq!(snapshot.position.unwrap().position_ms, 5000);
    assert_eq!(service.sleep_timer().config().duration_ms, 20 * 60_000);
}
