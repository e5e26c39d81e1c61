// SPDX-License-Identifier: MPL-2.0
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use playwire::config::{self, PlayerConfig};
use playwire::domain::media::{AudioSamples, HwAccel, VideoFrameView};
use playwire::error::{Error, Result};
use playwire::media::frame_export::{self, ExportFormat};
use playwire::video_player::{MediaPlayer, PlaybackEnded, PlaybackSink};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
playwire - play a media source headlessly

USAGE:
  playwire [OPTIONS] <SOURCE>

OPTIONS:
  --config-dir DIR     Read settings.toml from DIR
  --hw NAME            Hardware decoder device (cuda, vaapi, ...)
  --speed X            Playback speed multiplier, > 0
  --seek F             Start at fraction F of the duration
  --frames N           Stop after N video frames
  --record OUT         Record converted video to OUT (file or directory)
  --screenshot OUT     Save the last frame to OUT (file or directory)
  -h, --help           Print help
";

struct Args {
    source: String,
    config_dir: Option<PathBuf>,
    hw: Option<String>,
    speed: Option<f64>,
    seek: Option<f64>,
    frames: Option<u64>,
    record: Option<PathBuf>,
    screenshot: Option<PathBuf>,
}

fn parse_args() -> std::result::Result<Option<Args>, pico_args::Error> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(None);
    }
    let parsed = Args {
        config_dir: args.opt_value_from_str("--config-dir")?,
        hw: args.opt_value_from_str("--hw")?,
        speed: args.opt_value_from_str("--speed")?,
        seek: args.opt_value_from_str("--seek")?,
        frames: args.opt_value_from_str("--frames")?,
        record: args.opt_value_from_str("--record")?,
        screenshot: args.opt_value_from_str("--screenshot")?,
        source: args.free_from_str()?,
    };
    Ok(Some(parsed))
}

#[derive(Default)]
struct Summary {
    frames: u64,
    audio_buffers: u64,
    last_progress: f64,
    ended: Option<PlaybackEnded>,
}

/// Keeps counters only; frames are not displayed.
struct SummarySink {
    summary: Arc<Mutex<Summary>>,
}

impl SummarySink {
    fn update(&self, f: impl FnOnce(&mut Summary)) {
        if let Ok(mut summary) = self.summary.lock() {
            f(&mut summary);
        }
    }
}

impl PlaybackSink for SummarySink {
    fn on_video_frame(&mut self, _frame: &VideoFrameView<'_>) {
        self.update(|s| s.frames += 1);
    }

    fn on_audio_samples(&mut self, _samples: &AudioSamples<'_>) {
        self.update(|s| s.audio_buffers += 1);
    }

    fn on_progress(&mut self, fraction: f64) {
        self.update(|s| s.last_progress = fraction);
    }

    fn on_loading_changed(&mut self, loading: bool) {
        tracing::debug!(loading, "loading changed");
    }

    fn on_playback_ended(&mut self, ended: &PlaybackEnded) {
        let ended = ended.clone();
        self.update(|s| s.ended = Some(ended));
    }
}

fn load_config(dir: Option<&Path>) -> PlayerConfig {
    let loaded = match dir {
        Some(dir) => {
            let path = dir.join("settings.toml");
            if path.exists() {
                config::load_from_path(&path)
            } else {
                Ok(PlayerConfig::default())
            }
        }
        None => config::load(),
    };
    loaded.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not read settings, using defaults");
        PlayerConfig::default()
    })
}

fn resolve_output(out: &Path, file_name: impl FnOnce() -> PathBuf) -> PathBuf {
    if out.is_dir() {
        out.join(file_name())
    } else {
        out.to_path_buf()
    }
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args.config_dir.as_deref());
    let hw_accel = args
        .hw
        .as_deref()
        .map_or_else(|| config.hw_accel(), HwAccel::parse);
    let capture_format = config.capture_format();

    let summary = Arc::new(Mutex::new(Summary::default()));
    let sink = SummarySink {
        summary: Arc::clone(&summary),
    };
    let mut player = MediaPlayer::new(config, Box::new(sink));
    player.open(&args.source, &hw_accel)?;
    for descriptor in player.descriptors() {
        tracing::info!(
            index = descriptor.index,
            kind = %descriptor.kind(),
            codec = %descriptor.codec,
            duration_secs = descriptor.duration_seconds(),
            "stream"
        );
    }

    if let Some(speed) = args.speed {
        player.set_playback_speed(speed)?;
    }
    if let Some(out) = &args.record {
        let path = resolve_output(out, || {
            frame_export::generate_recording_path(Path::new(""), &args.source, chrono::Local::now())
        });
        player.start_recording(&path)?;
        tracing::info!(path = %path.display(), "recording");
    }

    let started = Instant::now();
    match args.seek {
        Some(fraction) => player.seek_to_fraction(fraction, true)?,
        None => player.start()?,
    }

    loop {
        let (frames, ended) = summary
            .lock()
            .map(|s| (s.frames, s.ended.is_some()))
            .unwrap_or((0, true));
        if ended || args.frames.is_some_and(|limit| frames >= limit) {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    if args.record.is_some() && player.is_recording() {
        let written = player.stop_recording()?;
        tracing::info!(frames = written, "recording finished");
    }
    if let Some(out) = &args.screenshot {
        let frame = player.capture_frame()?;
        let position = frame.pts_secs().unwrap_or_default();
        let path = resolve_output(out, || {
            PathBuf::from(frame_export::generate_default_filename(
                &args.source,
                position,
                capture_format,
            ))
        });
        let format = ExportFormat::from_path(&path).unwrap_or(capture_format);
        frame_export::save_frame(&frame.as_view(), &path, Some(format))?;
        tracing::info!(path = %path.display(), format = format.extension(), "screenshot saved");
    }
    player.stop();

    let elapsed = started.elapsed();
    let summary = summary
        .lock()
        .map_err(|_| Error::Io("summary lock poisoned".to_string()))?;
    println!(
        "{} video frames, {} audio buffers, progress {:.1}%, {:.2}s",
        summary.frames,
        summary.audio_buffers,
        summary.last_progress * 100.0,
        elapsed.as_secs_f64()
    );
    match &summary.ended {
        Some(PlaybackEnded {
            error: Some(error), ..
        }) => Err(error.clone()),
        _ => Ok(()),
    }
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("playwire=info")),
        )
        .try_init();

    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}\n\n{HELP}");
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "playback failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
