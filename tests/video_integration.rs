// SPDX-License-Identifier: MPL-2.0
//! Integration tests running the full pipeline on real containers.
//!
//! Clips are synthesized with the recorder first, so the tests need no
//! fixtures. They are skipped when the `FFmpeg` build has no video encoder.

use playwire::application::port::{MediaBackend, RecordingInput, VideoRecorder};
use playwire::config::PlayerConfig;
use playwire::domain::media::{
    AudioSamples, HwAccel, MediaKind, PixelFormat, RecordingSettings, TimeBase, VideoFrameView,
};
use playwire::domain::playback::PlaybackState;
use playwire::error::Error;
use playwire::infrastructure::FfmpegBackend;
use playwire::media::ExportFormat;
use playwire::video_player::{MediaPlayer, PlaybackEnded, PlaybackSink};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const CLIP_FRAMES: u64 = 50;
const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
/// Keyframe spacing of synthesized clips: a tenth of the clip.
const KEYFRAME_INTERVAL: u32 = 5;

/// Encodes a short gradient clip. Returns `None` if no encoder is available.
fn synth_clip(dir: &Path, name: &str) -> Option<PathBuf> {
    let path = dir.join(name);
    let backend = FfmpegBackend::new();
    let input = RecordingInput {
        width: WIDTH,
        height: HEIGHT,
        format: PixelFormat::Bgra,
    };
    let settings = RecordingSettings {
        keyframe_interval: KEYFRAME_INTERVAL,
        ..RecordingSettings::default()
    };
    let mut recorder = match backend.start_recording(&path, input, &settings) {
        Ok(recorder) => recorder,
        Err(e) => {
            eprintln!("Skipping test: {e}");
            return None;
        }
    };

    let stride = WIDTH as usize * 4;
    for i in 0..CLIP_FRAMES {
        let shade = u8::try_from(i * 5).unwrap_or(u8::MAX);
        let pixels = vec![shade; stride * HEIGHT as usize];
        let view = VideoFrameView {
            data: &pixels,
            width: WIDTH,
            height: HEIGHT,
            stride,
            format: PixelFormat::Bgra,
            pts: None,
            time_base: TimeBase::new(1, 25),
        };
        recorder.encode_frame(&view).expect("encode synthetic frame");
    }
    assert_eq!(recorder.finish().expect("finish synthetic clip"), CLIP_FRAMES);
    Some(path)
}

#[derive(Default)]
struct Observed {
    pts: Vec<i64>,
    progress: Vec<f64>,
    audio: usize,
    ended: Vec<PlaybackEnded>,
}

#[derive(Clone, Default)]
struct ObservingSink {
    observed: Arc<Mutex<Observed>>,
}

impl ObservingSink {
    fn snapshot<T>(&self, f: impl FnOnce(&Observed) -> T) -> T {
        f(&self.observed.lock().expect("sink lock"))
    }

    fn wait_for_end(&self) {
        let deadline = Instant::now() + Duration::from_secs(30);
        while self.snapshot(|o| o.ended.is_empty()) {
            assert!(Instant::now() < deadline, "playback did not end in time");
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

impl PlaybackSink for ObservingSink {
    fn on_video_frame(&mut self, frame: &VideoFrameView<'_>) {
        assert_eq!((frame.width, frame.height), (WIDTH, HEIGHT));
        assert_eq!(frame.format, PixelFormat::Bgra);
        let pts = frame.pts.unwrap_or(-1);
        self.observed.lock().expect("sink lock").pts.push(pts);
    }

    fn on_audio_samples(&mut self, _samples: &AudioSamples<'_>) {
        self.observed.lock().expect("sink lock").audio += 1;
    }

    fn on_progress(&mut self, fraction: f64) {
        self.observed.lock().expect("sink lock").progress.push(fraction);
    }

    fn on_playback_ended(&mut self, ended: &PlaybackEnded) {
        self.observed
            .lock()
            .expect("sink lock")
            .ended
            .push(ended.clone());
    }
}

fn fast_config() -> PlayerConfig {
    let mut config = PlayerConfig::default();
    config.playback.speed = 8.0;
    config
}

#[test]
fn test_generated_clip_plays_to_the_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let Some(clip) = synth_clip(dir.path(), "clip.mp4") else {
        return;
    };
    let sink = ObservingSink::default();
    let mut player = MediaPlayer::new(fast_config(), Box::new(sink.clone()));
    player
        .open(clip.to_str().expect("utf-8 path"), &HwAccel::None)
        .expect("open generated clip");

    let descriptors = player.descriptors();
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].kind(), MediaKind::Video);

    player.start().expect("start");
    sink.wait_for_end();
    player.stop();

    sink.snapshot(|observed| {
        assert_eq!(observed.pts.len() as u64, CLIP_FRAMES);
        assert!(observed.pts.windows(2).all(|w| w[0] < w[1]));
        assert!(observed.progress.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(observed.audio, 0);
        assert_eq!(observed.ended.len(), 1);
        assert!(!observed.ended[0].user_initiated);
        assert!(observed.ended[0].error.is_none());
    });
    assert_eq!(player.state(), PlaybackState::Stopped);

    let tracker = player.tracker().clone();
    player.close();
    assert_eq!(tracker.live_total(), 0);
}

#[test]
fn test_seek_halfway_skips_the_first_half() {
    let dir = tempfile::tempdir().expect("tempdir");
    let Some(clip) = synth_clip(dir.path(), "clip.mp4") else {
        return;
    };
    let sink = ObservingSink::default();
    let mut player = MediaPlayer::new(fast_config(), Box::new(sink.clone()));
    player
        .open(clip.to_str().expect("utf-8 path"), &HwAccel::None)
        .expect("open generated clip");

    player.seek_to_fraction(0.5, true).expect("seek");
    sink.wait_for_end();
    player.stop();

    sink.snapshot(|observed| {
        // Frames before the seek stay well below a quarter of the clip
        let landing = observed
            .progress
            .iter()
            .copied()
            .find(|p| *p >= 0.25)
            .expect("progress after the seek");
        let granularity = f64::from(KEYFRAME_INTERVAL) / CLIP_FRAMES as f64;
        assert!(
            landing >= 0.5 - granularity - 0.01 && landing <= 0.5 + 0.01,
            "seek landed at {landing}"
        );
        assert!((observed.pts.len() as u64) < CLIP_FRAMES);
        assert!(observed.progress.last().copied().unwrap_or_default() > 0.9);
    });
}

#[test]
fn test_screenshot_after_playback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let Some(clip) = synth_clip(dir.path(), "clip.mp4") else {
        return;
    };
    let sink = ObservingSink::default();
    let mut player = MediaPlayer::new(fast_config(), Box::new(sink.clone()));
    player
        .open(clip.to_str().expect("utf-8 path"), &HwAccel::None)
        .expect("open generated clip");
    assert!(matches!(player.capture_frame(), Err(Error::NoFrame(_))));

    player.start().expect("start");
    sink.wait_for_end();

    let png = player
        .capture_current_frame(ExportFormat::Png)
        .expect("capture png");
    let decoded = image_rs::load_from_memory(&png).expect("decode png");
    assert_eq!((decoded.width(), decoded.height()), (WIDTH, HEIGHT));
}

#[test]
fn test_recording_while_playing_produces_playable_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let Some(clip) = synth_clip(dir.path(), "clip.mp4") else {
        return;
    };
    let copy = dir.path().join("copy.mp4");

    let sink = ObservingSink::default();
    let mut player = MediaPlayer::new(fast_config(), Box::new(sink.clone()));
    player
        .open(clip.to_str().expect("utf-8 path"), &HwAccel::None)
        .expect("open generated clip");
    player.start_recording(&copy).expect("start recording");
    player.start().expect("start");
    sink.wait_for_end();
    player.stop();
    assert!(!player.is_recording());
    player.close();

    let sink = ObservingSink::default();
    let mut replay = MediaPlayer::new(fast_config(), Box::new(sink.clone()));
    replay
        .open(copy.to_str().expect("utf-8 path"), &HwAccel::None)
        .expect("open recording");
    replay.start().expect("start replay");
    sink.wait_for_end();
    replay.stop();

    sink.snapshot(|observed| {
        assert_eq!(observed.pts.len() as u64, CLIP_FRAMES);
    });
}
