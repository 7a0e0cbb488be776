//! Shake gesture capability
//!
//! The sleep timer asks for a fresh stream every time it arms shake
//! listening and drops it to disarm. A stream that ended is never polled
//! again.

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

const SHAKE_CAPACITY: usize = 16;

/// Produces shake events
pub trait ShakeSource: Send + Sync + 'static {
    /// Starts listening; dropping the stream stops listening
    fn listen(&self) -> BoxStream<'static, ()>;
}

/// A source for devices without a motion sensor
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShake;

impl ShakeSource for NoShake {
    fn listen(&self) -> BoxStream<'static, ()> {
        stream::pending().boxed()
    }
}

/// Shake events pushed by hand, e.g. from a sensor callback or a test
#[derive(Debug, Clone)]
pub struct ChannelShakeSource {
    sender: broadcast::Sender<()>,
}

impl ChannelShakeSource {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SHAKE_CAPACITY);
        Self { sender }
    }

    /// Delivers a shake to every armed listener; returns how many got it
    pub fn shake(&self) -> usize {
        self.sender.send(()).unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChannelShakeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ShakeSource for ChannelShakeSource {
    fn listen(&self) -> BoxStream<'static, ()> {
        stream::unfold(self.sender.subscribe(), |mut receiver| async move {
            match receiver.recv().await {
                Ok(()) => Some(((), receiver)),
                // Missed shakes still mean the device was shaken
                Err(RecvError::Lagged(_)) => Some(((), receiver)),
                Err(RecvError::Closed) => None,
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shake_reaches_armed_listener() {
        let source = ChannelShakeSource::new();
        assert_eq!(source.shake(), 0);

        let mut shakes = source.listen();
        assert_eq!(source.listener_count(), 1);
        assert_eq!(source.shake(), 1);
        assert_eq!(shakes.next().await, Some(()));
    }

    #[tokio::test]
    async fn test_dropping_stream_disarms() {
        let source = ChannelShakeSource::new();
        let shakes = source.listen();
        drop(shakes);
        assert_eq!(source.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_ends_with_source() {
        let source = ChannelShakeSource::new();
        let mut shakes = source.listen();
        drop(source);
        assert_eq!(shakes.next().await, None);
    }
}
