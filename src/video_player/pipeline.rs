// SPDX-License-Identifier: MPL-2.0
//! The read/decode/convert/deliver loop.
//!
//! A [`Pipeline`] owns every native part of an open session. While playing it
//! lives on the playback thread; when the loop exits the thread hands it back
//! through its join handle so the session can restart, record or capture
//! without reopening the source.
//!
//! Per iteration:
//!
//! 1. drain the command queue (pause, seek, speed, capture, recording)
//! 2. check cancellation
//! 3. while paused on a bounded source, sleep one poll interval
//! 4. read one packet; at end of stream drain both decoders and exit
//! 5. with a seek pending, drop the packet and apply the seek
//! 6. while paused on a live source, drop the packet
//! 7. otherwise decode, convert and deliver
//!
//! Per-frame errors are logged and the frame is skipped. Only a failing
//! packet read terminates the loop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};

use super::clock::PlaybackClock;
use super::command::{PlayerCommand, Reply};
use super::sink::{PlaybackEnded, PlaybackSink};
use super::state::SharedState;
use crate::application::port::{
    AudioResampler, MediaBackend, MediaPacket, PacketSource, Received, RecordingInput,
    StreamDecoder, VideoConverter, VideoRecorder,
};
use crate::domain::media::{OwnedVideoFrame, RecordingSettings, StreamDescriptor};
use crate::domain::playback::{PlaybackSpeed, PlaybackState, SeekRequest};
use crate::error::{Error, Result, SeekError};

/// Consecutive receive errors tolerated before a decoder is left until the
/// next packet.
const MAX_RECEIVE_ERRORS: usize = 8;

/// Decoder plus converter for the video stream.
pub(crate) struct VideoLane<B: MediaBackend> {
    pub(crate) index: usize,
    pub(crate) decoder: B::Decoder,
    pub(crate) converter: B::VideoConverter,
}

/// Decoder plus resampler for the audio stream.
pub(crate) struct AudioLane<B: MediaBackend> {
    pub(crate) index: usize,
    pub(crate) decoder: B::Decoder,
    pub(crate) resampler: B::AudioResampler,
    /// Sample rate from the stream parameters, for frames that carry none.
    pub(crate) rate_hint: u32,
}

/// Why the loop stopped.
#[derive(Debug)]
pub(crate) enum LoopExit {
    Cancelled,
    Ended,
    Failed(Error),
}

/// Settings fixed for the lifetime of a pipeline.
pub(crate) struct PipelineOptions {
    pub(crate) speed: PlaybackSpeed,
    pub(crate) pause_poll: Duration,
    pub(crate) recording: RecordingSettings,
}

/// All parts of an open session.
pub(crate) struct Pipeline<B: MediaBackend> {
    backend: Arc<B>,
    source: B::Source,
    video: Option<VideoLane<B>>,
    audio: Option<AudioLane<B>>,
    clock: PlaybackClock,
    speed: PlaybackSpeed,
    paused: bool,
    pending_seek: Option<(SeekRequest, Reply<()>)>,
    recorder: Option<B::Recorder>,
    recording: RecordingSettings,
    sink: Box<dyn PlaybackSink>,
    loading: bool,
    pause_poll: Duration,
    shared: Arc<SharedState>,
    cancel: Arc<AtomicBool>,
    commands: mpsc::Receiver<PlayerCommand>,
}

impl<B: MediaBackend> Pipeline<B> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        backend: Arc<B>,
        source: B::Source,
        video: Option<VideoLane<B>>,
        audio: Option<AudioLane<B>>,
        sink: Box<dyn PlaybackSink>,
        options: PipelineOptions,
        shared: Arc<SharedState>,
        commands: mpsc::Receiver<PlayerCommand>,
    ) -> Self {
        let duration_seconds = video
            .as_ref()
            .map(|lane| lane.decoder.descriptor())
            .or_else(|| audio.as_ref().map(|lane| lane.decoder.descriptor()))
            .map_or(0.0, StreamDescriptor::duration_seconds);

        Self {
            backend,
            source,
            video,
            audio,
            clock: PlaybackClock::new(duration_seconds),
            speed: options.speed,
            paused: false,
            pending_seek: None,
            recorder: None,
            recording: options.recording,
            sink,
            // Opening already reported loading
            loading: true,
            pause_poll: options.pause_poll,
            shared,
            cancel: Arc::new(AtomicBool::new(false)),
            commands,
        }
    }

    pub(crate) fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub(crate) fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.speed = speed;
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.sink.on_loading_changed(loading);
        }
    }

    /// Resets everything a new play segment starts from.
    ///
    /// The source is rewound to the beginning; a live source that cannot seek
    /// simply continues from where it is.
    pub(crate) fn prepare_for_start(&mut self) {
        if let Err(e) = self.source.rewind() {
            tracing::warn!(error = %e, "could not rewind source, continuing from current position");
        }
        self.flush_decoders();
        self.clock.reset_for_start();
        self.paused = false;
        self.cancel.store(false, Ordering::Release);
        self.set_loading(true);
    }

    fn flush_decoders(&mut self) {
        if let Some(lane) = self.video.as_mut() {
            lane.decoder.flush();
        }
        if let Some(lane) = self.audio.as_mut() {
            lane.decoder.flush();
        }
    }

    /// Thread body: runs the loop, reports how it ended and returns the parts.
    pub(crate) fn run(mut self) -> Self {
        tracing::debug!("playback loop started");
        let exit = self.run_loop();
        self.finish_recording("playback stopped");
        self.reject_pending_seek();

        match exit {
            LoopExit::Cancelled => {
                tracing::debug!("playback loop cancelled");
            }
            LoopExit::Ended => {
                tracing::info!(
                    frames = self.shared.video_frames(),
                    audio_buffers = self.shared.audio_buffers(),
                    "playback ended"
                );
                self.report_end(PlaybackEnded::naturally());
            }
            LoopExit::Failed(error) => {
                tracing::error!(error = %error, "playback loop terminated");
                self.report_end(PlaybackEnded::failed(error));
            }
        }
        self
    }

    fn report_end(&mut self, ended: PlaybackEnded) {
        self.shared.set_state(PlaybackState::Stopped);
        if self.shared.claim_ended() {
            self.sink.on_playback_ended(&ended);
        }
    }

    /// Fires the end-of-playback notification for a caller-initiated stop.
    pub(crate) fn report_stopped_by_user(&mut self) {
        self.report_end(PlaybackEnded::by_user());
    }

    fn run_loop(&mut self) -> LoopExit {
        loop {
            if let Err(exit) = self.drain_commands() {
                return exit;
            }
            if self.cancel.load(Ordering::Acquire) {
                return LoopExit::Cancelled;
            }

            let bounded = self.source.is_bounded();
            if self.paused && bounded && self.pending_seek.is_none() {
                thread::sleep(self.pause_poll);
                continue;
            }

            let packet = match self.source.read_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    if self.pending_seek.is_some() {
                        self.apply_pending_seek();
                        continue;
                    }
                    self.drain_decoders();
                    return LoopExit::Ended;
                }
                Err(e) => return LoopExit::Failed(e),
            };

            if self.pending_seek.is_some() {
                drop(packet);
                self.apply_pending_seek();
                continue;
            }
            if self.paused {
                // Live source: freshness over completeness
                continue;
            }

            self.dispatch(&packet);
        }
    }

    /// Consumes every queued command. A closed queue means the session is gone.
    fn drain_commands(&mut self) -> std::result::Result<(), LoopExit> {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Err(LoopExit::Cancelled),
            }
        }
    }

    /// Handles commands queued while the loop was not running. Seeks are
    /// applied immediately.
    pub(crate) fn process_idle_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.handle_command(command);
        }
        self.apply_pending_seek();
    }

    fn handle_command(&mut self, command: PlayerCommand) {
        tracing::trace!(command = command.name(), "command received");
        match command {
            PlayerCommand::Pause(paused) => {
                if self.paused && !paused {
                    self.clock.mark_resumed();
                }
                self.paused = paused;
            }
            PlayerCommand::Seek { request, reply } => {
                if let Some((_, superseded)) = self.pending_seek.replace((request, reply)) {
                    let _ = superseded.send(Err(SeekError::Native(
                        "superseded by a newer seek".to_string(),
                    )
                    .into()));
                }
            }
            PlayerCommand::SetSpeed(speed) => self.speed = speed,
            PlayerCommand::Capture { reply } => {
                let _ = reply.send(self.capture_frame());
            }
            PlayerCommand::StartRecording { path, reply } => {
                let _ = reply.send(self.start_recording(path));
            }
            PlayerCommand::StopRecording { reply } => {
                let _ = reply.send(self.stop_recording());
            }
        }
    }

    fn apply_pending_seek(&mut self) {
        if let Some((request, reply)) = self.pending_seek.take() {
            let result = self.seek_now(request);
            if let Err(e) = &result {
                tracing::warn!(error = %e, "seek failed");
            }
            let _ = reply.send(result);
        }
    }

    fn reject_pending_seek(&mut self) {
        if let Some((_, reply)) = self.pending_seek.take() {
            let _ = reply.send(Err(SeekError::NotOpen.into()));
        }
    }

    /// Seeks the source and flushes decoder history. Nothing changes if the
    /// source refuses the seek.
    fn seek_now(&mut self, request: SeekRequest) -> Result<()> {
        let index = self
            .video
            .as_ref()
            .map(|lane| lane.index)
            .or_else(|| self.audio.as_ref().map(|lane| lane.index))
            .ok_or(SeekError::NotOpen)?;

        self.source
            .seek_to_fraction(index, request.fraction.value(), request.direction)?;
        self.flush_decoders();
        self.clock.mark_seeked();
        self.set_loading(true);
        tracing::debug!(fraction = request.fraction.value(), "seek applied");
        Ok(())
    }

    fn dispatch(&mut self, packet: &B::Packet) {
        let index = packet.stream_index();
        if self.video.as_ref().is_some_and(|lane| lane.index == index) {
            self.decode_video(Some(packet));
        } else if self.audio.as_ref().is_some_and(|lane| lane.index == index) {
            self.decode_audio(Some(packet));
        }
    }

    /// End of stream: pull out everything the decoders still buffer.
    fn drain_decoders(&mut self) {
        self.decode_video(None);
        self.decode_audio(None);
        self.flush_decoders();
    }

    fn decode_video(&mut self, packet: Option<&B::Packet>) {
        let Some(lane) = self.video.as_mut() else {
            return;
        };
        if let Err(e) = lane.decoder.submit_packet(packet) {
            tracing::warn!(error = %e, "video packet dropped");
            return;
        }

        let mut receive_errors = 0;
        loop {
            let frame = match lane.decoder.try_receive_frame() {
                Ok(Received::Frame(frame)) => frame,
                Ok(Received::NeedMoreInput | Received::EndOfStream) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "video frame dropped");
                    receive_errors += 1;
                    if receive_errors >= MAX_RECEIVE_ERRORS {
                        break;
                    }
                    // Later frames may still be queued behind the bad one
                    continue;
                }
            };
            receive_errors = 0;
            let view = match lane.converter.convert(frame) {
                Ok(view) => view,
                Err(e) => {
                    tracing::warn!(error = %e, "video frame skipped");
                    continue;
                }
            };

            let delay = self.clock.pace(view.pts, view.time_base, self.speed);
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            let progress = self.clock.progress(self.clock.last_seconds());
            self.shared.set_progress(progress);
            self.sink.on_progress(progress);
            self.sink.on_video_frame(&view);
            self.shared.count_video_frame();

            let recording_failed = self
                .recorder
                .as_mut()
                .and_then(|recorder| recorder.encode_frame(&view).err());

            if self.loading {
                self.loading = false;
                self.sink.on_loading_changed(false);
            }
            if let Some(e) = recording_failed {
                tracing::warn!(error = %e, "recording stopped after encoder failure");
                finish_recorder(&mut self.recorder, &self.shared, "recording failed");
            }
        }
    }

    fn decode_audio(&mut self, packet: Option<&B::Packet>) {
        let Some(lane) = self.audio.as_mut() else {
            return;
        };
        if let Err(e) = lane.decoder.submit_packet(packet) {
            tracing::warn!(error = %e, "audio packet dropped");
            return;
        }
        let audio_only = self.video.is_none();

        let mut receive_errors = 0;
        loop {
            let frame = match lane.decoder.try_receive_frame() {
                Ok(Received::Frame(frame)) => frame,
                Ok(Received::NeedMoreInput | Received::EndOfStream) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "audio frame dropped");
                    receive_errors += 1;
                    if receive_errors >= MAX_RECEIVE_ERRORS {
                        break;
                    }
                    continue;
                }
            };
            receive_errors = 0;
            let samples = match lane.resampler.convert(frame, lane.rate_hint) {
                Ok(samples) => samples,
                Err(e) => {
                    tracing::warn!(error = %e, "audio frame skipped");
                    continue;
                }
            };

            if audio_only {
                // No video to pace against; progress follows audio timestamps.
                if let Some(seconds) = samples.pts.map(|pts| samples.time_base.seconds(pts)) {
                    let progress = self.clock.progress(seconds);
                    self.shared.set_progress(progress);
                    self.sink.on_progress(progress);
                }
            }
            self.sink.on_audio_samples(&samples);
            self.shared.count_audio_buffer();

            if audio_only && self.loading {
                self.loading = false;
                self.sink.on_loading_changed(false);
            }
        }
    }

    /// Copies the most recently converted frame.
    pub(crate) fn capture_frame(&self) -> Result<OwnedVideoFrame> {
        self.video
            .as_ref()
            .and_then(|lane| lane.converter.last_output())
            .map(|view| view.to_owned_frame())
            .ok_or_else(|| Error::NoFrame("no video frame has been converted yet".to_string()))
    }

    pub(crate) fn start_recording(&mut self, path: PathBuf) -> Result<()> {
        if self.recorder.is_some() {
            return Err(Error::Recording("a recording is already running".to_string()));
        }
        let lane = self
            .video
            .as_ref()
            .ok_or_else(|| Error::Recording("source has no video stream".to_string()))?;
        let target = lane.converter.target();
        let input = RecordingInput {
            width: target.width,
            height: target.height,
            format: target.format,
        };
        let recorder = self
            .backend
            .start_recording(&path, input, &self.recording)?;
        tracing::info!(path = %path.display(), "recording attached to playback");
        self.recorder = Some(recorder);
        self.shared.set_recording(true);
        Ok(())
    }

    pub(crate) fn stop_recording(&mut self) -> Result<u64> {
        let mut recorder = self
            .recorder
            .take()
            .ok_or_else(|| Error::Recording("no recording is running".to_string()))?;
        self.shared.set_recording(false);
        recorder.finish()
    }

    fn finish_recording(&mut self, reason: &str) {
        finish_recorder(&mut self.recorder, &self.shared, reason);
    }

    /// Releases every native part. Idempotent.
    pub(crate) fn close(&mut self) {
        self.finish_recording("session closed");
        self.reject_pending_seek();
        if let Some(lane) = self.video.as_mut() {
            lane.decoder.close();
        }
        if let Some(lane) = self.audio.as_mut() {
            lane.decoder.close();
        }
        self.source.close();
    }

    /// Gives the sink back to the session when the pipeline is discarded.
    pub(crate) fn into_sink(mut self) -> Box<dyn PlaybackSink> {
        self.close();
        std::mem::replace(&mut self.sink, Box::new(super::sink::NullSink))
    }
}

/// Finalizes and drops the recorder in `slot`, if any.
fn finish_recorder<R: VideoRecorder>(slot: &mut Option<R>, shared: &SharedState, reason: &str) {
    if let Some(mut recorder) = slot.take() {
        shared.set_recording(false);
        match recorder.finish() {
            Ok(frames) => tracing::info!(frames, reason, "recording finalized"),
            Err(e) => tracing::warn!(error = %e, reason, "recording could not be finalized"),
        }
    }
}
