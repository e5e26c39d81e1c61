// SPDX-License-Identifier: MPL-2.0
//! Scripted in-memory backend for exercising the playback loop without media files.
//!
//! The script describes a ten second clip: 250 video frames at 25 fps with a
//! keyframe every 5 frames, and 1024-sample audio packets at 48 kHz. The video
//! decoder holds one frame back like a real reordering decoder and refuses
//! non-key packets right after a flush.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::sink::{PlaybackEnded, PlaybackSink};
use super::time_units;
use crate::application::port::{
    AudioResampler, DecoderState, MediaBackend, MediaPacket, PacketSource, Received,
    RecordingInput, StreamDecoder, VideoConverter, VideoRecorder,
};
use crate::diagnostics::{ResourceGuard, ResourceKind, ResourceTracker};
use crate::domain::media::{
    AudioParams, AudioSamples, AudioTarget, HwAccel, MediaKind, RecordingSettings,
    StreamDescriptor, StreamParams, TimeBase, VideoFrameView, VideoParams, VideoTarget,
};
use crate::domain::playback::SeekDirection;
use crate::error::{Error, Result, SeekError};

const VIDEO_INDEX: usize = 0;
const AUDIO_INDEX: usize = 1;
const FRAME_COUNT: i64 = 250;
const GOP: i64 = 5;
const AUDIO_RATE: i64 = 48_000;
const AUDIO_PACKET: i64 = 1024;
const FRAME_WIDTH: u32 = 4;
const FRAME_HEIGHT: u32 = 2;

/// What the scripted source contains and where it misbehaves.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    /// Timestamps run `speedup` times faster than real time.
    speedup: i32,
    live: bool,
    video: bool,
    audio: bool,
    corrupt_video: HashSet<i64>,
    damaged_video: HashSet<i64>,
    failing_conversions: HashSet<i64>,
    fail_read_at: Option<usize>,
    recorder_fail_after: Option<usize>,
}

impl Script {
    pub(crate) fn ten_seconds() -> Self {
        Self {
            speedup: 1,
            live: false,
            video: true,
            audio: true,
            corrupt_video: HashSet::new(),
            damaged_video: HashSet::new(),
            failing_conversions: HashSet::new(),
            fail_read_at: None,
            recorder_fail_after: None,
        }
    }

    /// Plays the clip a hundred times faster.
    pub(crate) fn fast(mut self) -> Self {
        self.speedup = 100;
        self
    }

    /// No duration; packets arrive in real time.
    pub(crate) fn live(mut self) -> Self {
        self.live = true;
        self
    }

    pub(crate) fn without_video(mut self) -> Self {
        self.video = false;
        self
    }

    pub(crate) fn corrupt_video(mut self, frames: &[i64]) -> Self {
        self.corrupt_video.extend(frames);
        self
    }

    /// Decoding these packets reports a bad frame ahead of the good one.
    pub(crate) fn damaged_video(mut self, frames: &[i64]) -> Self {
        self.damaged_video.extend(frames);
        self
    }

    pub(crate) fn failing_conversions(mut self, frames: &[i64]) -> Self {
        self.failing_conversions.extend(frames);
        self
    }

    /// The read at packet position `position` fails.
    pub(crate) fn failing_read_at(mut self, position: usize) -> Self {
        self.fail_read_at = Some(position);
        self
    }

    pub(crate) fn failing_recorder_after(mut self, frames: usize) -> Self {
        self.recorder_fail_after = Some(frames);
        self
    }

    pub(crate) fn audio_packet_count(&self) -> usize {
        if !self.audio {
            return 0;
        }
        let total = FRAME_COUNT * AUDIO_RATE / 25;
        usize::try_from((total + AUDIO_PACKET - 1) / AUDIO_PACKET).unwrap_or_default()
    }

    fn video_time_base(&self) -> TimeBase {
        TimeBase::new(1, 25 * self.speedup)
    }

    fn audio_time_base(&self) -> TimeBase {
        TimeBase::new(1, 48_000 * self.speedup)
    }

    fn descriptors(&self) -> Vec<StreamDescriptor> {
        let mut descriptors = Vec::new();
        if self.video {
            descriptors.push(StreamDescriptor {
                index: VIDEO_INDEX,
                codec: "scripted".into(),
                time_base: self.video_time_base(),
                duration: if self.live { 0 } else { FRAME_COUNT },
                params: StreamParams::Video(VideoParams {
                    width: FRAME_WIDTH,
                    height: FRAME_HEIGHT,
                    pixel_format: "yuv420p".into(),
                }),
            });
        }
        if self.audio {
            descriptors.push(StreamDescriptor {
                index: AUDIO_INDEX,
                codec: "scripted".into(),
                time_base: self.audio_time_base(),
                duration: if self.live { 0 } else { FRAME_COUNT * AUDIO_RATE / 25 },
                params: StreamParams::Audio(AudioParams {
                    sample_rate: 48_000,
                    channels: 2,
                    sample_format: "fltp".into(),
                }),
            });
        }
        descriptors
    }

    /// Every packet in container order.
    fn packets(&self) -> Vec<ScriptedPacket> {
        let mut packets = Vec::new();
        if self.video {
            let time_base = self.video_time_base();
            packets.extend((0..FRAME_COUNT).map(|pts| ScriptedPacket {
                stream_index: VIDEO_INDEX,
                pts,
                seconds: time_base.seconds(pts),
                key: pts % GOP == 0,
                corrupt: self.corrupt_video.contains(&pts),
                damaged: self.damaged_video.contains(&pts),
                fail_convert: self.failing_conversions.contains(&pts),
            }));
        }
        if self.audio {
            let time_base = self.audio_time_base();
            let count = i64::try_from(self.audio_packet_count()).unwrap_or_default();
            packets.extend((0..count).map(|k| {
                let pts = k * AUDIO_PACKET;
                ScriptedPacket {
                    stream_index: AUDIO_INDEX,
                    pts,
                    seconds: time_base.seconds(pts),
                    key: true,
                    corrupt: false,
                    damaged: false,
                    fail_convert: false,
                }
            }));
        }
        packets.sort_by(|a, b| {
            a.seconds
                .total_cmp(&b.seconds)
                .then(a.stream_index.cmp(&b.stream_index))
        });
        packets
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedPacket {
    stream_index: usize,
    pts: i64,
    seconds: f64,
    key: bool,
    corrupt: bool,
    damaged: bool,
    fail_convert: bool,
}

impl MediaPacket for ScriptedPacket {
    fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn pts(&self) -> Option<i64> {
        Some(self.pts)
    }
}

/// Decoded frame of either kind.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedFrame {
    kind: MediaKind,
    pts: i64,
    fail_convert: bool,
    damaged: bool,
}

/// What one recorder received.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingLog {
    /// Encoder timestamps in submission order.
    pub(crate) counters: Vec<u64>,
    pub(crate) finished: bool,
}

pub(crate) struct ScriptedBackend {
    script: Script,
    tracker: ResourceTracker,
    seeks: Arc<AtomicUsize>,
    recordings: Arc<Mutex<Vec<RecordingLog>>>,
}

impl ScriptedBackend {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            tracker: ResourceTracker::new(),
            seeks: Arc::new(AtomicUsize::new(0)),
            recordings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    /// Seeks the sources of this backend accepted or refused.
    pub(crate) fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    pub(crate) fn recordings(&self) -> Vec<RecordingLog> {
        self.recordings.lock().expect("recordings lock").clone()
    }
}

impl MediaBackend for ScriptedBackend {
    type Packet = ScriptedPacket;
    type Frame = ScriptedFrame;
    type Source = ScriptedSource;
    type Decoder = ScriptedDecoder;
    type VideoConverter = ScriptedConverter;
    type AudioResampler = ScriptedResampler;
    type Recorder = ScriptedRecorder;

    fn open_source(&self, url: &str) -> Result<ScriptedSource> {
        if url.ends_with("missing") {
            return Err(Error::Open(format!("{url}: no such source")));
        }
        Ok(ScriptedSource {
            descriptors: self.script.descriptors(),
            packets: self.script.packets(),
            cursor: 0,
            live: self.script.live,
            live_origin: None,
            fail_read_at: self.script.fail_read_at,
            seeks: Arc::clone(&self.seeks),
            guard: Some(self.tracker.acquire(ResourceKind::Source)),
        })
    }

    fn open_decoder(
        &self,
        _source: &ScriptedSource,
        descriptor: &StreamDescriptor,
        _hw_accel: &HwAccel,
    ) -> Result<ScriptedDecoder> {
        Ok(ScriptedDecoder {
            descriptor: descriptor.clone(),
            state: DecoderState::Open,
            held: None,
            ready: VecDeque::new(),
            current: None,
            needs_key: true,
            guard: Some(self.tracker.acquire(ResourceKind::Decoder)),
        })
    }

    fn video_converter(
        &self,
        descriptor: &StreamDescriptor,
        target: VideoTarget,
    ) -> Result<ScriptedConverter> {
        let Some(bytes_per_pixel) = target.format.packed_bytes_per_pixel() else {
            return Err(Error::UnsupportedFormat(format!("{} is planar", target.format)));
        };
        let target = target.resolve(FRAME_WIDTH, FRAME_HEIGHT);
        let stride = target.width as usize * bytes_per_pixel;
        Ok(ScriptedConverter {
            target,
            time_base: descriptor.time_base,
            stride,
            buffer: vec![0; stride * target.height as usize],
            last_pts: None,
            _guard: self.tracker.acquire(ResourceKind::VideoConverter),
        })
    }

    fn audio_resampler(
        &self,
        descriptor: &StreamDescriptor,
        target: AudioTarget,
    ) -> Result<ScriptedResampler> {
        if target.format.is_planar() {
            return Err(Error::UnsupportedFormat(format!(
                "planar sample format {} is not supported",
                target.format
            )));
        }
        Ok(ScriptedResampler {
            target,
            time_base: descriptor.time_base,
            buffer: Vec::new(),
            _guard: self.tracker.acquire(ResourceKind::AudioResampler),
        })
    }

    fn start_recording(
        &self,
        _path: &Path,
        _input: RecordingInput,
        _settings: &RecordingSettings,
    ) -> Result<ScriptedRecorder> {
        let mut logs = self.recordings.lock().expect("recordings lock");
        logs.push(RecordingLog::default());
        Ok(ScriptedRecorder {
            slot: logs.len() - 1,
            logs: Arc::clone(&self.recordings),
            fail_after: self.script.recorder_fail_after,
            frames: 0,
            finished: false,
            _guard: self.tracker.acquire(ResourceKind::Recorder),
        })
    }
}

pub(crate) struct ScriptedSource {
    descriptors: Vec<StreamDescriptor>,
    packets: Vec<ScriptedPacket>,
    cursor: usize,
    live: bool,
    /// Wall-clock instant of timestamp zero for live sources.
    live_origin: Option<Instant>,
    fail_read_at: Option<usize>,
    seeks: Arc<AtomicUsize>,
    guard: Option<ResourceGuard>,
}

impl PacketSource for ScriptedSource {
    type Packet = ScriptedPacket;

    fn descriptors(&self) -> &[StreamDescriptor] {
        &self.descriptors
    }

    fn read_packet(&mut self) -> Result<Option<ScriptedPacket>> {
        if self.guard.is_none() {
            return Err(Error::NotOpen("source is closed".into()));
        }
        if self.fail_read_at == Some(self.cursor) {
            return Err(Error::Decode("scripted read failure".into()));
        }
        let Some(packet) = self.packets.get(self.cursor).cloned() else {
            return Ok(None);
        };
        self.cursor += 1;

        if self.live {
            let origin = *self.live_origin.get_or_insert_with(Instant::now);
            let due = origin + Duration::from_secs_f64(packet.seconds);
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }
        Ok(Some(packet))
    }

    fn seek_to_fraction(
        &mut self,
        stream_index: usize,
        fraction: f64,
        direction: SeekDirection,
    ) -> Result<()> {
        self.seeks.fetch_add(1, Ordering::SeqCst);
        let descriptor = self
            .descriptors
            .iter()
            .find(|d| d.index == stream_index)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown stream {stream_index}")))?;
        if !descriptor.is_bounded() {
            return Err(SeekError::Unbounded.into());
        }
        let target = time_units::fraction_to_pts(descriptor.duration, fraction);

        let mut candidates = self
            .packets
            .iter()
            .enumerate()
            .filter(|(_, p)| p.stream_index == stream_index && p.key);
        let position = match direction {
            SeekDirection::Backward => candidates
                .filter(|(_, p)| p.pts <= target)
                .last()
                .map(|(i, _)| i),
            SeekDirection::Forward => candidates.find(|(_, p)| p.pts >= target).map(|(i, _)| i),
        };
        self.cursor = position.unwrap_or(self.packets.len());
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        if self.live {
            return Err(SeekError::Unbounded.into());
        }
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.guard = None;
    }

    fn is_open(&self) -> bool {
        self.guard.is_some()
    }
}

pub(crate) struct ScriptedDecoder {
    descriptor: StreamDescriptor,
    state: DecoderState,
    /// Frame held back to model reordering delay.
    held: Option<ScriptedFrame>,
    ready: VecDeque<ScriptedFrame>,
    current: Option<ScriptedFrame>,
    needs_key: bool,
    guard: Option<ResourceGuard>,
}

impl StreamDecoder for ScriptedDecoder {
    type Packet = ScriptedPacket;
    type Frame = ScriptedFrame;

    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn state(&self) -> DecoderState {
        self.state
    }

    fn submit_packet(&mut self, packet: Option<&ScriptedPacket>) -> Result<()> {
        if self.state == DecoderState::Closed {
            return Err(Error::Decode("decoder is closed".into()));
        }
        let Some(packet) = packet else {
            self.state = DecoderState::Flushing;
            if let Some(frame) = self.held.take() {
                self.ready.push_back(frame);
            }
            return Ok(());
        };
        // Like EAGAIN: decoded frames must be drained before new input
        if !self.ready.is_empty() {
            return Err(Error::Decode(format!(
                "packet rejected at pts {}: output not drained",
                packet.pts
            )));
        }
        if packet.corrupt {
            return Err(Error::Decode(format!("corrupt packet at pts {}", packet.pts)));
        }
        if self.needs_key && !packet.key {
            return Err(Error::Decode(format!(
                "no reference frame for pts {}",
                packet.pts
            )));
        }
        self.needs_key = false;
        self.state = DecoderState::Decoding;

        let frame = ScriptedFrame {
            kind: self.descriptor.kind(),
            pts: packet.pts,
            fail_convert: packet.fail_convert,
            damaged: false,
        };
        match frame.kind {
            MediaKind::Video => {
                if packet.damaged {
                    self.ready.push_back(ScriptedFrame {
                        damaged: true,
                        ..frame.clone()
                    });
                }
                if let Some(previous) = self.held.replace(frame) {
                    self.ready.push_back(previous);
                }
            }
            MediaKind::Audio => self.ready.push_back(frame),
        }
        Ok(())
    }

    fn try_receive_frame(&mut self) -> Result<Received<&ScriptedFrame>> {
        match self.ready.pop_front() {
            Some(frame) if frame.damaged => {
                Err(Error::Decode(format!("damaged frame near pts {}", frame.pts)))
            }
            Some(frame) => {
                self.current = Some(frame);
                Ok(self.current.as_ref().map_or(Received::NeedMoreInput, Received::Frame))
            }
            None if self.state == DecoderState::Flushing => Ok(Received::EndOfStream),
            None => Ok(Received::NeedMoreInput),
        }
    }

    fn flush(&mut self) {
        self.held = None;
        self.ready.clear();
        self.needs_key = true;
        if self.state != DecoderState::Closed {
            self.state = DecoderState::Open;
        }
    }

    fn close(&mut self) {
        self.flush();
        self.state = DecoderState::Closed;
        self.guard = None;
    }
}

pub(crate) struct ScriptedConverter {
    target: VideoTarget,
    time_base: TimeBase,
    stride: usize,
    buffer: Vec<u8>,
    last_pts: Option<i64>,
    _guard: ResourceGuard,
}

impl ScriptedConverter {
    fn view(&self, pts: i64) -> VideoFrameView<'_> {
        VideoFrameView {
            data: &self.buffer,
            width: self.target.width,
            height: self.target.height,
            stride: self.stride,
            format: self.target.format,
            pts: Some(pts),
            time_base: self.time_base,
        }
    }
}

impl VideoConverter for ScriptedConverter {
    type Frame = ScriptedFrame;

    fn target(&self) -> VideoTarget {
        self.target
    }

    fn convert(&mut self, frame: &ScriptedFrame) -> Result<VideoFrameView<'_>> {
        if frame.kind != MediaKind::Video || frame.fail_convert {
            return Err(Error::Convert(format!("cannot scale frame {}", frame.pts)));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        self.buffer.fill(frame.pts as u8);
        self.last_pts = Some(frame.pts);
        Ok(self.view(frame.pts))
    }

    fn last_output(&self) -> Option<VideoFrameView<'_>> {
        self.last_pts.map(|pts| self.view(pts))
    }
}

pub(crate) struct ScriptedResampler {
    target: AudioTarget,
    time_base: TimeBase,
    buffer: Vec<u8>,
    _guard: ResourceGuard,
}

impl AudioResampler for ScriptedResampler {
    type Frame = ScriptedFrame;

    fn target(&self) -> AudioTarget {
        self.target
    }

    fn convert(&mut self, frame: &ScriptedFrame, _source_rate_hint: u32) -> Result<AudioSamples<'_>> {
        if frame.kind != MediaKind::Audio {
            return Err(Error::Convert("not an audio frame".into()));
        }
        let frames = usize::try_from(AUDIO_PACKET).unwrap_or_default();
        let len = crate::domain::media::interleaved_byte_len(
            frames,
            self.target.channels,
            self.target.format,
        );
        self.buffer.resize(len, 0);
        Ok(AudioSamples {
            data: &self.buffer,
            channels: self.target.channels,
            sample_rate: self.target.sample_rate,
            format: self.target.format,
            frames,
            pts: Some(frame.pts),
            time_base: self.time_base,
        })
    }
}

pub(crate) struct ScriptedRecorder {
    slot: usize,
    logs: Arc<Mutex<Vec<RecordingLog>>>,
    fail_after: Option<usize>,
    frames: u64,
    finished: bool,
    _guard: ResourceGuard,
}

impl ScriptedRecorder {
    fn with_log<T>(&self, f: impl FnOnce(&mut RecordingLog) -> T) -> T {
        let mut logs = self.logs.lock().expect("recordings lock");
        f(&mut logs[self.slot])
    }
}

impl VideoRecorder for ScriptedRecorder {
    fn encode_frame(&mut self, _frame: &VideoFrameView<'_>) -> Result<()> {
        if self.finished {
            return Err(Error::Recording("recording already finished".into()));
        }
        if self
            .fail_after
            .is_some_and(|limit| self.frames >= limit as u64)
        {
            return Err(Error::Recording("scripted encoder failure".into()));
        }
        let counter = self.frames;
        self.with_log(|log| log.counters.push(counter));
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(&mut self) -> Result<u64> {
        if !self.finished {
            self.finished = true;
            self.with_log(|log| log.finished = true);
        }
        Ok(self.frames)
    }
}

/// One observed sink callback.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Video { pts: i64 },
    Audio,
    Progress(f64),
    Loading(bool),
    Ended { user_initiated: bool },
}

#[derive(Default)]
struct SinkRecord {
    events: Vec<Event>,
    video_times: Vec<Instant>,
    ended: Vec<PlaybackEnded>,
}

/// Sink recording every callback in order.
pub(crate) struct CollectingSink {
    record: Arc<Mutex<SinkRecord>>,
}

/// Read side of a [`CollectingSink`].
#[derive(Clone)]
pub(crate) struct SinkLog {
    record: Arc<Mutex<SinkRecord>>,
}

impl CollectingSink {
    pub(crate) fn new() -> (Self, SinkLog) {
        let record = Arc::new(Mutex::new(SinkRecord::default()));
        (
            Self {
                record: Arc::clone(&record),
            },
            SinkLog { record },
        )
    }

    fn push(&self, event: Event) {
        self.record.lock().expect("sink lock").events.push(event);
    }
}

impl PlaybackSink for CollectingSink {
    fn on_video_frame(&mut self, frame: &VideoFrameView<'_>) {
        let mut record = self.record.lock().expect("sink lock");
        record.events.push(Event::Video {
            pts: frame.pts.unwrap_or(-1),
        });
        record.video_times.push(Instant::now());
    }

    fn on_audio_samples(&mut self, _samples: &AudioSamples<'_>) {
        self.push(Event::Audio);
    }

    fn on_progress(&mut self, fraction: f64) {
        self.push(Event::Progress(fraction));
    }

    fn on_loading_changed(&mut self, loading: bool) {
        self.push(Event::Loading(loading));
    }

    fn on_playback_ended(&mut self, ended: &PlaybackEnded) {
        let mut record = self.record.lock().expect("sink lock");
        record.events.push(Event::Ended {
            user_initiated: ended.user_initiated,
        });
        record.ended.push(ended.clone());
    }
}

impl SinkLog {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.record.lock().expect("sink lock").events.clone()
    }

    pub(crate) fn ended(&self) -> Vec<PlaybackEnded> {
        self.record.lock().expect("sink lock").ended.clone()
    }

    pub(crate) fn video_pts(&self) -> Vec<i64> {
        self.record
            .lock()
            .expect("sink lock")
            .events
            .iter()
            .filter_map(|event| match event {
                Event::Video { pts } => Some(*pts),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn audio_buffers(&self) -> usize {
        self.record
            .lock()
            .expect("sink lock")
            .events
            .iter()
            .filter(|event| matches!(event, Event::Audio))
            .count()
    }

    /// Wall-clock arrival of each video frame.
    pub(crate) fn delivery_times(&self) -> Vec<Instant> {
        self.record.lock().expect("sink lock").video_times.clone()
    }
}
