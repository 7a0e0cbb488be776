//! Position sampling while playing
//!
//! The transport only publishes at settle points. While it plays the
//! sampler asks it for the engine position every [`SAMPLE_PERIOD`] and
//! republishes when the displayed second changes. Anything the transport
//! publishes itself (seeks, chapter changes, state changes) is forwarded
//! straight away.

use crate::handle::TransportHandle;
use lectern_core::{BookId, TransportSnapshot};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const SAMPLE_PERIOD: Duration = Duration::from_millis(200);

/// Lets a sampled position through once per second of playback
///
/// Within one chapter the published second never goes backwards; only an
/// explicit [`reset`](Self::reset) moves it back.
#[derive(Debug, Default)]
pub struct SecondFilter {
    last: Option<(BookId, usize, u64)>,
}

impl SecondFilter {
    pub fn accept(&mut self, snapshot: &TransportSnapshot) -> bool {
        let Some(position) = snapshot.position else {
            return false;
        };
        let second = position.position_ms / 1000;

        match self.last {
            Some((book, chapter, last))
                if book == position.book_id && chapter == position.chapter_index =>
            {
                if second > last {
                    self.last = Some((book, chapter, second));
                    true
                } else {
                    false
                }
            }
            _ => {
                self.last = Some((position.book_id, position.chapter_index, second));
                true
            }
        }
    }

    /// Starts over from a position published by the transport
    pub fn reset(&mut self, snapshot: &TransportSnapshot) {
        self.last = snapshot
            .position
            .map(|p| (p.book_id, p.chapter_index, p.position_ms / 1000));
    }
}

/// Republishes the transport position for display and checkpointing
pub struct PositionSampler {
    progress: watch::Receiver<TransportSnapshot>,
    task: JoinHandle<()>,
}

impl PositionSampler {
    pub fn spawn(transport: TransportHandle) -> Self {
        let (sender, progress) = watch::channel(transport.snapshot());
        let task = tokio::spawn(run(transport, sender));
        Self { progress, task }
    }

    pub fn progress(&self) -> watch::Receiver<TransportSnapshot> {
        self.progress.clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PositionSampler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(transport: TransportHandle, progress: watch::Sender<TransportSnapshot>) {
    let mut snapshots = transport.snapshots();
    let mut filter = SecondFilter::default();
    forward(&mut snapshots, &mut filter, &progress);

    loop {
        if !snapshots.borrow().state.is_playing() {
            if snapshots.changed().await.is_err() {
                break;
            }
            forward(&mut snapshots, &mut filter, &progress);
            continue;
        }

        let mut ticker = interval_at(Instant::now() + SAMPLE_PERIOD, SAMPLE_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        log::debug!("Transport gone, sampler finished");
                        return;
                    }
                    if !forward(&mut snapshots, &mut filter, &progress) {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let sampled = transport.sample().await;
                    if sampled.state.is_playing() && filter.accept(&sampled) {
                        progress.send_replace(sampled);
                    }
                }
            }
        }
    }
}

/// Publishes the latest transport snapshot; true while playing
fn forward(
    snapshots: &mut watch::Receiver<TransportSnapshot>,
    filter: &mut SecondFilter,
    progress: &watch::Sender<TransportSnapshot>,
) -> bool {
    let snapshot = *snapshots.borrow_and_update();
    filter.reset(&snapshot);
    progress.send_replace(snapshot);
    snapshot.state.is_playing()
}
