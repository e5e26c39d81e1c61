// SPDX-License-Identifier: MPL-2.0
//! Playback session: the control surface of the pipeline.
//!
//! [`MediaPlayer`] opens a source, owns the playback thread and translates
//! control calls into [`PlayerCommand`]s. Calls that need an answer (seek,
//! capture, recording) wait for the loop to reply; the rest return at once.
//!
//! Native parts live exactly as long as a play segment needs them. `stop`
//! releases them; the next `start` reopens the same source.
//!
//! # Example
//!
//! ```no_run
//! use playwire::config::PlayerConfig;
//! use playwire::domain::media::HwAccel;
//! use playwire::video_player::{MediaPlayer, NullSink};
//!
//! let mut player = MediaPlayer::new(PlayerConfig::default(), Box::new(NullSink));
//! player.open("movie.mkv", &HwAccel::None)?;
//! player.start()?;
//! player.seek_to_fraction(0.5, true)?;
//! player.stop();
//! # Ok::<(), playwire::error::Error>(())
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::command::PlayerCommand;
use super::pipeline::{AudioLane, Pipeline, PipelineOptions, VideoLane};
use super::sink::{NullSink, PlaybackSink};
use super::state::SharedState;
use crate::application::port::{MediaBackend, PacketSource};
use crate::config::PlayerConfig;
use crate::diagnostics::ResourceTracker;
use crate::domain::media::{first_of_kind, HwAccel, MediaKind, OwnedVideoFrame, StreamDescriptor};
use crate::domain::playback::{PlaybackSpeed, PlaybackState, SeekFraction, SeekRequest};
use crate::error::{Error, Result, SeekError};
use crate::infrastructure::FfmpegBackend;
use crate::media::frame_export::{self, ExportFormat};

const THREAD_NAME: &str = "playwire-playback";

/// What `open` was called with, kept so `start` can reopen after `stop`.
#[derive(Debug, Clone)]
struct OpenedSource {
    url: String,
    hw_accel: HwAccel,
}

/// A media playback session.
///
/// One session plays one source at a time. Opening a new source closes the
/// previous one.
pub struct MediaPlayer<B: MediaBackend = FfmpegBackend> {
    backend: Arc<B>,
    config: PlayerConfig,
    shared: Arc<SharedState>,
    opened: Option<OpenedSource>,
    /// Native parts while no thread runs.
    idle: Option<Pipeline<B>>,
    worker: Option<JoinHandle<Pipeline<B>>>,
    cancel: Option<Arc<AtomicBool>>,
    commands: Option<mpsc::Sender<PlayerCommand>>,
    descriptors: Vec<StreamDescriptor>,
    speed: PlaybackSpeed,
    /// Sink held while no pipeline exists.
    sink: Option<Box<dyn PlaybackSink>>,
}

impl MediaPlayer<FfmpegBackend> {
    /// Creates a session on the `FFmpeg` backend.
    #[must_use]
    pub fn new(config: PlayerConfig, sink: Box<dyn PlaybackSink>) -> Self {
        Self::with_backend(FfmpegBackend::new(), config, sink)
    }

    /// Native resource counters of this session's backend.
    #[must_use]
    pub fn tracker(&self) -> &ResourceTracker {
        self.backend.tracker()
    }
}

impl<B: MediaBackend> MediaPlayer<B> {
    /// Creates a session on a custom backend.
    #[must_use]
    pub fn with_backend(backend: B, config: PlayerConfig, sink: Box<dyn PlaybackSink>) -> Self {
        Self {
            backend: Arc::new(backend),
            speed: config.playback_speed(),
            config,
            shared: Arc::new(SharedState::default()),
            opened: None,
            idle: None,
            worker: None,
            cancel: None,
            commands: None,
            descriptors: Vec::new(),
            sink: Some(sink),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current playback state.
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    /// Progress of the most recently delivered frame, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.shared.progress()
    }

    /// Video frames delivered since the native parts were last opened.
    #[must_use]
    pub fn frames_delivered(&self) -> u64 {
        self.shared.video_frames()
    }

    /// Audio buffers delivered since the native parts were last opened.
    #[must_use]
    pub fn audio_buffers_delivered(&self) -> u64 {
        self.shared.audio_buffers()
    }

    /// Streams of the open source (first video and first audio only).
    #[must_use]
    pub fn descriptors(&self) -> &[StreamDescriptor] {
        &self.descriptors
    }

    /// Whether a source is open. Stays `true` across `stop`.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.opened.is_some()
    }

    #[must_use]
    pub fn playback_speed(&self) -> PlaybackSpeed {
        self.speed
    }

    /// Whether a recording is attached. A failing encoder detaches itself.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.shared.is_recording()
    }

    fn primary_stream(&self) -> Option<&StreamDescriptor> {
        first_of_kind(&self.descriptors, MediaKind::Video)
            .or_else(|| first_of_kind(&self.descriptors, MediaKind::Audio))
    }

    /// Opens `url` (file path or network URL) and prepares every stage.
    ///
    /// The sink sees `on_loading_changed(true)` immediately; it turns false
    /// with the first delivered frame after [`start`](Self::start), or right
    /// away if opening fails.
    ///
    /// # Errors
    ///
    /// Fatal errors propagate: [`Error::Open`], [`Error::Codec`],
    /// [`Error::UnsupportedFormat`] (planar audio target, planar video
    /// target) and [`Error::Config`]. Nothing stays open on failure.
    pub fn open(&mut self, url: &str, hw_accel: &HwAccel) -> Result<()> {
        self.close();
        self.assemble(url, hw_accel)?;
        self.opened = Some(OpenedSource {
            url: url.to_string(),
            hw_accel: hw_accel.clone(),
        });
        tracing::info!(url, hw_accel = %hw_accel, "session opened");
        Ok(())
    }

    /// Opens every native part and parks the pipeline in `idle`.
    fn assemble(&mut self, url: &str, hw_accel: &HwAccel) -> Result<()> {
        let mut sink = self.sink.take().unwrap_or_else(|| Box::new(NullSink));
        sink.on_loading_changed(true);

        let (source, video, audio) = match self.open_parts(url, hw_accel) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(url, error = %e, "open failed");
                sink.on_loading_changed(false);
                self.sink = Some(sink);
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(self.config.command_queue_capacity());
        self.descriptors = source.descriptors().to_vec();
        self.shared = Arc::new(SharedState::default());
        let options = PipelineOptions {
            speed: self.speed,
            pause_poll: self.config.pause_poll_interval(),
            recording: self.config.recording_settings(),
        };
        let pipeline = Pipeline::new(
            Arc::clone(&self.backend),
            source,
            video,
            audio,
            sink,
            options,
            Arc::clone(&self.shared),
            rx,
        );
        self.cancel = Some(pipeline.cancel_flag());
        self.commands = Some(tx);
        self.idle = Some(pipeline);
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn open_parts(
        &self,
        url: &str,
        hw_accel: &HwAccel,
    ) -> Result<(B::Source, Option<VideoLane<B>>, Option<AudioLane<B>>)> {
        let video_target = self.config.video_target()?;
        let audio_target = self.config.audio_target()?;
        let source = self.backend.open_source(url)?;

        let video = match source.first_stream(MediaKind::Video).cloned() {
            Some(descriptor) => Some(VideoLane {
                index: descriptor.index,
                decoder: self.backend.open_decoder(&source, &descriptor, hw_accel)?,
                converter: self.backend.video_converter(&descriptor, video_target)?,
            }),
            None => None,
        };
        let audio = match source.first_stream(MediaKind::Audio).cloned() {
            Some(descriptor) => Some(AudioLane {
                index: descriptor.index,
                decoder: self
                    .backend
                    .open_decoder(&source, &descriptor, &HwAccel::None)?,
                resampler: self.backend.audio_resampler(&descriptor, audio_target)?,
                rate_hint: descriptor.audio().map_or(0, |audio| audio.sample_rate),
            }),
            None => None,
        };
        if video.is_none() && audio.is_none() {
            return Err(Error::Open(format!("{url}: no audio or video stream found")));
        }
        Ok((source, video, audio))
    }

    /// Reopens the native parts released by `stop`.
    fn ensure_assembled(&mut self) -> Result<()> {
        self.reap_finished();
        if self.idle.is_some() || self.worker.is_some() {
            return Ok(());
        }
        let opened = self
            .opened
            .clone()
            .ok_or_else(|| Error::NotOpen("no media source is open".to_string()))?;
        tracing::debug!(url = %opened.url, "reopening source");
        self.assemble(&opened.url, &opened.hw_accel)
    }

    /// Joins the playback thread if it already exited on its own.
    fn reap_finished(&mut self) {
        if self.worker.as_ref().is_some_and(JoinHandle::is_finished) {
            self.join_worker();
        }
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(pipeline) => self.idle = Some(pipeline),
                Err(_) => {
                    tracing::error!("playback thread panicked, native parts lost");
                    self.shared.set_state(PlaybackState::Stopped);
                    self.commands = None;
                    self.cancel = None;
                }
            }
        }
    }

    /// Starts playback from the beginning. No-op while already playing or paused.
    ///
    /// After [`stop`](Self::stop) the source is opened again first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] without an open source, any error of
    /// [`open`](Self::open) when reopening fails, or [`Error::Io`] if the
    /// playback thread cannot be spawned.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_assembled()?;
        if self.worker.is_some() {
            return Ok(());
        }
        let mut pipeline = self
            .idle
            .take()
            .ok_or_else(|| Error::NotOpen("no media source is open".to_string()))?;

        pipeline.set_speed(self.speed);
        pipeline.prepare_for_start();
        self.shared.reset_ended();
        self.shared.set_state(PlaybackState::Playing);

        let worker = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || pipeline.run())
            .map_err(|e| {
                self.shared.set_state(PlaybackState::Stopped);
                Error::Io(format!("failed to spawn playback thread: {e}"))
            })?;
        self.worker = Some(worker);
        tracing::info!("playback started");
        Ok(())
    }

    /// Stops playback, joins the playback thread and releases every native
    /// part. The source stays known, so [`start`](Self::start) plays it again.
    ///
    /// Fires `on_playback_ended` with `user_initiated = true` unless playback
    /// had already ended on its own.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.as_ref() {
            let finished_before = worker.is_finished();
            if let Some(cancel) = &self.cancel {
                cancel.store(true, Ordering::Release);
            }
            self.join_worker();
            self.shared.set_state(PlaybackState::Stopped);
            if let Some(pipeline) = self.idle.as_mut() {
                if !finished_before {
                    pipeline.report_stopped_by_user();
                }
            }
            tracing::info!("playback stopped");
        }
        self.release();
    }

    /// Closes the parked pipeline and takes the sink back.
    fn release(&mut self) {
        self.commands = None;
        self.cancel = None;
        if let Some(pipeline) = self.idle.take() {
            self.sink = Some(pipeline.into_sink());
            tracing::debug!("native parts released");
        }
        self.shared.set_state(PlaybackState::Stopped);
    }

    /// Pauses (`true`) or resumes (`false`). Repeating a call has no further
    /// effect; calls on a stopped session are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] if the command queue is full or closed.
    pub fn pause(&mut self, paused: bool) -> Result<()> {
        let (from, to) = if paused {
            (PlaybackState::Playing, PlaybackState::Paused)
        } else {
            (PlaybackState::Paused, PlaybackState::Playing)
        };
        if self.worker.is_none() || !self.shared.transition(from, to) {
            return Ok(());
        }
        self.send(PlayerCommand::Pause(paused))
    }

    /// Seeks to a normalized position. A stopped session starts playing first.
    ///
    /// Returns once the loop applied the seek.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for NaN or infinite fractions
    /// - [`SeekError::NotOpen`] without an open source
    /// - [`SeekError::Unbounded`] for live sources; nothing changes
    /// - [`SeekError::Native`] if the demuxer refused the position
    pub fn seek_to_fraction(&mut self, fraction: f64, backward: bool) -> Result<()> {
        let fraction = SeekFraction::try_new(fraction).ok_or_else(|| {
            Error::InvalidArgument(format!("seek fraction must be finite, got {fraction}"))
        })?;
        if !self.is_open() {
            return Err(SeekError::NotOpen.into());
        }
        if !self.primary_stream().is_some_and(StreamDescriptor::is_bounded) {
            return Err(SeekError::Unbounded.into());
        }

        self.reap_finished();
        if self.worker.is_none() {
            self.start()?;
        }
        let (reply, rx) = oneshot::channel();
        self.send(PlayerCommand::Seek {
            request: SeekRequest::new(fraction, backward),
            reply,
        })?;
        self.await_reply(rx)
    }

    /// Changes pacing speed. Any finite positive multiplier is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for zero, negative or non-finite
    /// values; the speed is left unchanged.
    pub fn set_playback_speed(&mut self, speed: f64) -> Result<()> {
        let speed = PlaybackSpeed::try_new(speed).ok_or_else(|| {
            Error::InvalidArgument(format!("playback speed must be positive, got {speed}"))
        })?;
        self.speed = speed;
        self.reap_finished();
        if let Some(pipeline) = self.idle.as_mut() {
            pipeline.set_speed(speed);
        } else if self.worker.is_some() {
            self.send(PlayerCommand::SetSpeed(speed))?;
        }
        Ok(())
    }

    /// Copies the most recently converted video frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFrame`] before the first frame (and after a
    /// [`stop`](Self::stop)) and [`Error::NotOpen`] without an open source.
    pub fn capture_frame(&mut self) -> Result<OwnedVideoFrame> {
        self.with_pipeline(|pipeline| pipeline.capture_frame(), |reply| {
            PlayerCommand::Capture { reply }
        })
    }

    /// Encodes the most recently converted video frame as an image file.
    ///
    /// # Errors
    ///
    /// See [`capture_frame`](Self::capture_frame); encoding failures return
    /// [`Error::Image`].
    pub fn capture_current_frame(&mut self, format: ExportFormat) -> Result<Vec<u8>> {
        let frame = self.capture_frame()?;
        frame_export::encode_frame(&frame.as_view(), format)
    }

    /// Starts re-encoding delivered video frames to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recording`] if a recording is already running, the
    /// source has no video or the encoder cannot be opened.
    pub fn start_recording(&mut self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        let idle_path = path.clone();
        self.with_pipeline(
            move |pipeline| pipeline.start_recording(idle_path),
            move |reply| PlayerCommand::StartRecording { path, reply },
        )
    }

    /// Finishes the running recording and returns the number of frames written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recording`] if nothing is being recorded or the file
    /// cannot be finalized.
    pub fn stop_recording(&mut self) -> Result<u64> {
        self.with_pipeline(Pipeline::stop_recording, |reply| {
            PlayerCommand::StopRecording { reply }
        })
    }

    /// Runs `idle` directly on a parked pipeline, or sends the command built
    /// by `command` to the running loop and waits for its reply.
    fn with_pipeline<T>(
        &mut self,
        idle: impl FnOnce(&mut Pipeline<B>) -> Result<T>,
        command: impl FnOnce(oneshot::Sender<Result<T>>) -> PlayerCommand,
    ) -> Result<T> {
        self.ensure_assembled()?;
        if let Some(pipeline) = self.idle.as_mut() {
            return idle(pipeline);
        }
        let (reply, rx) = oneshot::channel();
        self.send(command(reply))?;
        self.await_reply(rx)
    }

    fn send(&self, command: PlayerCommand) -> Result<()> {
        let tx = self
            .commands
            .as_ref()
            .ok_or_else(|| Error::NotOpen("no media source is open".to_string()))?;
        tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(command) => Error::NotOpen(format!(
                "command queue full, {} dropped",
                command.name()
            )),
            mpsc::error::TrySendError::Closed(_) => {
                Error::NotOpen("playback loop is gone".to_string())
            }
        })
    }

    /// Waits for the loop to answer. If the loop exits first, the command is
    /// still queued: the parked pipeline answers it instead.
    fn await_reply<T>(&mut self, mut rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        let poll = self.config.pause_poll_interval().max(Duration::from_millis(1));
        loop {
            match rx.try_recv() {
                Ok(result) => return result,
                Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(Error::NotOpen("playback loop dropped the request".to_string()))
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
            if self.worker.as_ref().is_none_or(JoinHandle::is_finished) {
                self.join_worker();
                if let Some(pipeline) = self.idle.as_mut() {
                    pipeline.process_idle_commands();
                }
                return rx
                    .try_recv()
                    .unwrap_or_else(|_| Err(Error::NotOpen("playback ended".to_string())));
            }
            thread::sleep(poll);
        }
    }

    /// Stops playback and forgets the source. The session can open another
    /// source afterwards.
    pub fn close(&mut self) {
        self.stop();
        if self.opened.take().is_some() {
            tracing::debug!("session closed");
        }
        self.descriptors.clear();
    }
}

impl<B: MediaBackend> Drop for MediaPlayer<B> {
    fn drop(&mut self) {
        self.close();
    }
}
