// SPDX-License-Identifier: MPL-2.0
//! Delivery callbacks from the playback loop to the presentation layer.
//!
//! Every callback runs on the playback thread. Frame and sample views borrow
//! the converter's buffer and are only valid for the duration of the call: a
//! sink that hands data to another thread must copy it before returning,
//! which is what [`ChannelSink`] does.

use tokio::sync::mpsc;

use crate::domain::media::{AudioSamples, OwnedAudioSamples, OwnedVideoFrame, VideoFrameView};
use crate::error::Error;

/// Why and how playback ended.
#[derive(Debug, Clone)]
pub struct PlaybackEnded {
    /// `true` when the caller stopped playback, `false` at natural end of
    /// stream or after a fatal error.
    pub user_initiated: bool,
    /// The fatal error that terminated the loop, if any.
    pub error: Option<Error>,
}

impl PlaybackEnded {
    #[must_use]
    pub fn by_user() -> Self {
        Self {
            user_initiated: true,
            error: None,
        }
    }

    #[must_use]
    pub fn naturally() -> Self {
        Self {
            user_initiated: false,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: Error) -> Self {
        Self {
            user_initiated: false,
            error: Some(error),
        }
    }
}

/// Receives everything the playback loop produces.
///
/// All methods default to doing nothing.
pub trait PlaybackSink: Send {
    fn on_video_frame(&mut self, _frame: &VideoFrameView<'_>) {}

    fn on_audio_samples(&mut self, _samples: &AudioSamples<'_>) {}

    /// Progress fraction in `[0, 1]` after each delivered video frame.
    fn on_progress(&mut self, _fraction: f64) {}

    fn on_loading_changed(&mut self, _loading: bool) {}

    /// Fired exactly once per play segment.
    fn on_playback_ended(&mut self, _ended: &PlaybackEnded) {}
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PlaybackSink for NullSink {}

/// Owned event forwarded by [`ChannelSink`].
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    VideoFrame(OwnedVideoFrame),
    AudioSamples(OwnedAudioSamples),
    Progress(f64),
    LoadingChanged(bool),
    Ended(PlaybackEnded),
}

/// Sink forwarding owned copies into a bounded channel.
///
/// Frames, samples and the end notification use a blocking send, so a full
/// channel throttles the playback loop instead of buffering without bound.
/// Progress and loading updates never block: they are dropped with a warning
/// when the channel is full.
///
/// The receiver must be drained on another thread than the one calling
/// [`MediaPlayer::stop`](super::MediaPlayer::stop), which may deliver the end
/// notification.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<PlaybackEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver the presentation layer reads from.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    fn send_blocking(&self, event: PlaybackEvent) {
        // A closed receiver means nobody is watching; playback goes on.
        let _ = self.tx.blocking_send(event);
    }

    fn send_control(&self, event: PlaybackEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.tx.try_send(event) {
            tracing::warn!(?event, "event channel full, dropping control event");
        }
    }
}

impl PlaybackSink for ChannelSink {
    fn on_video_frame(&mut self, frame: &VideoFrameView<'_>) {
        self.send_blocking(PlaybackEvent::VideoFrame(frame.to_owned_frame()));
    }

    fn on_audio_samples(&mut self, samples: &AudioSamples<'_>) {
        self.send_blocking(PlaybackEvent::AudioSamples(samples.to_owned_samples()));
    }

    fn on_progress(&mut self, fraction: f64) {
        self.send_control(PlaybackEvent::Progress(fraction));
    }

    fn on_loading_changed(&mut self, loading: bool) {
        self.send_control(PlaybackEvent::LoadingChanged(loading));
    }

    fn on_playback_ended(&mut self, ended: &PlaybackEnded) {
        self.send_blocking(PlaybackEvent::Ended(ended.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::{PixelFormat, TimeBase};

    #[tokio::test]
    async fn channel_sink_copies_frames() {
        let (mut sink, mut rx) = ChannelSink::new(4);
        let pixels = vec![9u8; 16];

        // blocking_send must not run on the runtime thread
        let handle = std::thread::spawn(move || {
            let view = VideoFrameView {
                data: &pixels,
                width: 2,
                height: 2,
                stride: 8,
                format: PixelFormat::Bgra,
                pts: Some(3),
                time_base: TimeBase::new(1, 25),
            };
            sink.on_video_frame(&view);
            sink.on_progress(0.25);
            sink.on_playback_ended(&PlaybackEnded::naturally());
        });

        match rx.recv().await {
            Some(PlaybackEvent::VideoFrame(frame)) => {
                assert_eq!(frame.pts, Some(3));
                assert_eq!(frame.data.len(), 16);
            }
            other => panic!("expected a frame, got {other:?}"),
        }
        assert!(matches!(rx.recv().await, Some(PlaybackEvent::Progress(p)) if (p - 0.25).abs() < 1e-12));
        assert!(matches!(
            rx.recv().await,
            Some(PlaybackEvent::Ended(PlaybackEnded { user_initiated: false, error: None }))
        ));
        handle.join().expect("sender thread");
    }

    #[tokio::test]
    async fn full_channel_drops_progress_updates() {
        let (mut sink, mut rx) = ChannelSink::new(1);
        sink.on_loading_changed(true);
        sink.on_loading_changed(false);
        sink.on_progress(0.5);
        assert!(matches!(rx.recv().await, Some(PlaybackEvent::LoadingChanged(true))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn end_notification_waits_for_a_lagging_consumer() {
        let (mut sink, mut rx) = ChannelSink::new(1);
        let handle = std::thread::spawn(move || {
            sink.on_audio_samples(&AudioSamples {
                data: &[0, 0, 0, 0],
                channels: 2,
                sample_rate: 48_000,
                format: crate::domain::media::SampleFormat::S16,
                frames: 1,
                pts: Some(0),
                time_base: TimeBase::new(1, 48_000),
            });
            // Channel is full now
            sink.on_progress(1.0);
            sink.on_playback_ended(&PlaybackEnded::naturally());
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(matches!(rx.recv().await, Some(PlaybackEvent::AudioSamples(_))));
        assert!(matches!(
            rx.recv().await,
            Some(PlaybackEvent::Ended(PlaybackEnded { user_initiated: false, error: None }))
        ));
        handle.join().expect("sender thread");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn closed_receiver_is_ignored() {
        let (mut sink, rx) = ChannelSink::new(1);
        drop(rx);
        sink.on_playback_ended(&PlaybackEnded::by_user());
        sink.on_audio_samples(&AudioSamples {
            data: &[0, 0, 0, 0],
            channels: 2,
            sample_rate: 48_000,
            format: crate::domain::media::SampleFormat::S16,
            frames: 1,
            pts: None,
            time_base: TimeBase::new(1, 48_000),
        });
    }
}
