//! Lectern playback core
//!
//! The transport state machine and everything that runs around it:
//!
//! - [`Transport`]: play, pause, skip, chapter and mark navigation over an
//!   [`Engine`], run on its own task behind a [`TransportHandle`]
//! - [`PositionSampler`]: per-second position updates while playing
//! - [`SleepTimer`]: countdown with fade, shake-to-reset and bookmarks
//! - [`WakeGuard`]: keeps the device awake while playing
//! - [`position`]: the chapter and mark arithmetic
//!
//! [`PlaybackService`] starts all of them for one engine.

mod bookmarks;
mod engine;
mod error;
mod handle;
pub mod position;
mod sampler;
mod service;
mod shake;
mod simulated;
mod sleep_timer;
mod transport;
mod wake;

pub use bookmarks::{BookmarkSink, MemoryBookmarks};
pub use engine::{event_channel, Engine, EngineEvent, EnginePosition, EventReceiver, EventSender};
pub use error::{EngineError, EngineResult};
pub use handle::{TransportCommand, TransportHandle};
pub use position::{NextTarget, PreviousTarget};
pub use sampler::{PositionSampler, SecondFilter, SAMPLE_PERIOD};
pub use service::{PlaybackService, Platform};
pub use shake::{ChannelShakeSource, NoShake, ShakeSource};
pub use simulated::{EngineProbe, SimulatedControl, SimulatedEngine};
pub use sleep_timer::{
    fade_multiplier, Countdown, SleepTimer, SleepTimerConfig, Tick, COUNTDOWN_STEP_MS,
    FADE_WINDOW_MS, RESUME_WINDOW,
};
pub use transport::{Transport, TransportConfig};
pub use wake::{LogWakeLock, WakeGuard, WakeLock, WakeObserver};
