//! Transport actor
//!
//! One tokio task owns the [`Transport`] and with it the engine. Commands
//! from any task are queued on an unbounded channel and applied one at a
//! time, so a command never observes another one half-done. Engine events
//! are handled on the same task, ahead of queued commands.

use crate::engine::{Engine, EventReceiver};
use crate::transport::Transport;
use lectern_core::{
    Book, ChapterId, InterruptKind, PlaybackState, StateTransition, TransportSnapshot,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Commands applied by the transport task
#[derive(Debug)]
pub enum TransportCommand {
    Load(Book),
    Init(Book),
    Play,
    Pause { rewind: bool },
    PauseFor(InterruptKind),
    InterruptEnded(InterruptKind),
    Skip { forward: bool },
    Previous { to_chapter_start: bool },
    Next,
    ChangePosition {
        position_ms: i64,
        chapter: Option<ChapterId>,
    },
    SetSpeed(f32),
    SetLoudnessGain(i32),
    SetSkipSilence(bool),
    SetVolume(f32),
    Sample,
    Stop,
    /// Stops the engine and ends the task
    Shutdown,
}

struct Envelope {
    command: TransportCommand,
    reply: Option<oneshot::Sender<TransportSnapshot>>,
}

/// Cloneable handle to the transport task
///
/// Every async method resolves once the command has been applied and returns
/// the snapshot right after it. When the task is gone the last published
/// snapshot is returned instead.
#[derive(Clone)]
pub struct TransportHandle {
    commands: mpsc::UnboundedSender<Envelope>,
    snapshots: watch::Receiver<TransportSnapshot>,
    transitions: broadcast::Sender<StateTransition>,
}

impl TransportHandle {
    /// Moves `transport` onto a new task fed by `events`
    ///
    /// Must be called inside a tokio runtime. The task ends when every
    /// handle is dropped or after [`shutdown`](Self::shutdown), stopping the
    /// engine on the way out.
    pub fn spawn<E: Engine>(
        transport: Transport<E>,
        events: EventReceiver,
    ) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let handle = Self {
            commands,
            snapshots: transport.subscribe(),
            transitions: transport.transition_sender(),
        };

        let task = tokio::spawn(run(transport, receiver, events));
        (handle, task)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> TransportSnapshot {
        *self.snapshots.borrow()
    }

    pub fn state(&self) -> PlaybackState {
        self.snapshots.borrow().state
    }

    pub fn snapshots(&self) -> watch::Receiver<TransportSnapshot> {
        self.snapshots.clone()
    }

    pub fn transitions(&self) -> broadcast::Receiver<StateTransition> {
        self.transitions.subscribe()
    }

    pub async fn load(&self, book: Book) -> TransportSnapshot {
        self.request(TransportCommand::Load(book)).await
    }

    pub async fn init(&self, book: Book) -> TransportSnapshot {
        self.request(TransportCommand::Init(book)).await
    }

    pub async fn play(&self) -> TransportSnapshot {
        self.request(TransportCommand::Play).await
    }

    pub async fn pause(&self, rewind: bool) -> TransportSnapshot {
        self.request(TransportCommand::Pause { rewind }).await
    }

    pub async fn pause_for(&self, kind: InterruptKind) -> TransportSnapshot {
        self.request(TransportCommand::PauseFor(kind)).await
    }

    pub async fn interrupt_ended(&self, kind: InterruptKind) -> TransportSnapshot {
        self.request(TransportCommand::InterruptEnded(kind)).await
    }

    pub async fn skip(&self, forward: bool) -> TransportSnapshot {
        self.request(TransportCommand::Skip { forward }).await
    }

    pub async fn previous(&self, to_chapter_start: bool) -> TransportSnapshot {
        self.request(TransportCommand::Previous { to_chapter_start }).await
    }

    pub async fn next(&self) -> TransportSnapshot {
        self.request(TransportCommand::Next).await
    }

    pub async fn change_position(
        &self,
        position_ms: i64,
        chapter: Option<ChapterId>,
    ) -> TransportSnapshot {
        self.request(TransportCommand::ChangePosition {
            position_ms,
            chapter,
        })
        .await
    }

    pub async fn set_playback_speed(&self, speed: f32) -> TransportSnapshot {
        self.request(TransportCommand::SetSpeed(speed)).await
    }

    pub async fn set_loudness_gain(&self, gain_mb: i32) -> TransportSnapshot {
        self.request(TransportCommand::SetLoudnessGain(gain_mb)).await
    }

    pub async fn set_skip_silence(&self, enabled: bool) -> TransportSnapshot {
        self.request(TransportCommand::SetSkipSilence(enabled)).await
    }

    /// Reads the engine position without publishing it
    pub async fn sample(&self) -> TransportSnapshot {
        self.request(TransportCommand::Sample).await
    }

    pub async fn stop(&self) -> TransportSnapshot {
        self.request(TransportCommand::Stop).await
    }

    /// Fire-and-forget volume change
    pub fn set_volume(&self, volume: f32) {
        self.send(TransportCommand::SetVolume(volume));
    }

    /// Queues a command without waiting for it
    pub fn send(&self, command: TransportCommand) {
        let envelope = Envelope {
            command,
            reply: None,
        };
        if self.commands.send(envelope).is_err() {
            log::debug!("Transport task gone, command dropped");
        }
    }

    /// Stops the engine and ends the transport task
    ///
    /// Commands sent afterwards are dropped.
    pub async fn shutdown(&self) -> TransportSnapshot {
        self.request(TransportCommand::Shutdown).await
    }

    async fn request(&self, command: TransportCommand) -> TransportSnapshot {
        let (reply, response) = oneshot::channel();
        let envelope = Envelope {
            command,
            reply: Some(reply),
        };

        if self.commands.send(envelope).is_err() {
            log::debug!("Transport task gone, returning last snapshot");
            return self.snapshot();
        }

        response.await.unwrap_or_else(|_| self.snapshot())
    }
}

async fn run<E: Engine>(
    mut transport: Transport<E>,
    mut commands: mpsc::UnboundedReceiver<Envelope>,
    mut events: EventReceiver,
) {
    let mut events_open = true;

    loop {
        tokio::select! {
            biased;

            event = events.recv(), if events_open => match event {
                Some(event) => transport.handle_event(event),
                None => {
                    log::debug!("Engine event channel closed");
                    events_open = false;
                }
            },

            envelope = commands.recv() => match envelope {
                Some(Envelope { command: TransportCommand::Shutdown, reply }) => {
                    transport.stop();
                    if let Some(reply) = reply {
                        let _ = reply.send(transport.snapshot());
                    }
                    break;
                }
                Some(Envelope { command, reply }) => {
                    let snapshot = apply(&mut transport, command);
                    if let Some(reply) = reply {
                        // The caller may have given up waiting
                        let _ = reply.send(snapshot);
                    }
                }
                None => break,
            },
        }
    }

    if transport.state() != PlaybackState::Idle {
        transport.stop();
    }
    log::debug!("Transport task finished");
}

fn apply<E: Engine>(transport: &mut Transport<E>, command: TransportCommand) -> TransportSnapshot {
    match command {
        TransportCommand::Load(book) => transport.load(book),
        TransportCommand::Init(book) => transport.init(book),
        TransportCommand::Play => transport.play(),
        TransportCommand::Pause { rewind } => transport.pause(rewind),
        TransportCommand::PauseFor(kind) => transport.pause_for(kind),
        TransportCommand::InterruptEnded(kind) => transport.interrupt_ended(kind),
        TransportCommand::Skip { forward } => transport.skip(forward),
        TransportCommand::Previous { to_chapter_start } => transport.previous(to_chapter_start),
        TransportCommand::Next => transport.next(),
        TransportCommand::ChangePosition {
            position_ms,
            chapter,
        } => transport.change_position(position_ms, chapter),
        TransportCommand::SetSpeed(speed) => transport.set_playback_speed(speed),
        TransportCommand::SetLoudnessGain(gain) => transport.set_loudness_gain(gain),
        TransportCommand::SetSkipSilence(enabled) => transport.set_skip_silence(enabled),
        TransportCommand::SetVolume(volume) => transport.set_volume(volume),
        TransportCommand::Sample => return transport.sample(),
        TransportCommand::Stop | TransportCommand::Shutdown => transport.stop(),
    }
    transport.snapshot()
}
