//! Export pipelines: numbered-frame rendering plus ffmpeg encoding for
//! MP4/GIF, and in-memory asciicast assembly for terminal recordings.
//!
//! The encoder binary is probed before any frame is produced. Temp storage
//! lives for exactly one export run and is removed afterwards whether the
//! run succeeded or not; cleanup failures are logged and swallowed so they
//! never mask the primary result.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use image::RgbImage;

use crate::capture::{self, VirtualTerminal};
use crate::deck::Deck;
use crate::raster;
use crate::renderer::{RenderError, Renderer};
use crate::screen::ScreenError;
use crate::theme::Rgb;

/// Output format, derived solely from the output path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Mp4,
    Gif,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<OutputFormat, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "mp4" => Ok(OutputFormat::Mp4),
            "gif" => Ok(OutputFormat::Gif),
            other => Err(ExportError::UnsupportedOutputFormat(other.to_string())),
        }
    }
}

/// Errors from the export pipelines.
#[derive(Debug)]
pub enum ExportError {
    /// The encoder binary is not on the search path.
    EncoderUnavailable,
    /// The output extension selects no known format.
    UnsupportedOutputFormat(String),
    /// The encoder exited non-zero.
    EncodingFailure {
        exit_code: Option<i32>,
        stderr: String,
    },
    /// A slide failed to render.
    Render(RenderError),
    /// Frame or artifact I/O failed.
    Io(std::io::Error),
    /// Writing a frame image failed.
    Image(image::ImageError),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::EncoderUnavailable => {
                write!(
                    f,
                    "ffmpeg not found. Please install it, e.g.:\n\n    apt install ffmpeg\n    brew install ffmpeg\n"
                )
            }
            ExportError::UnsupportedOutputFormat(ext) => {
                write!(
                    f,
                    "Unsupported output extension '.{}'. Use .mp4 or .gif.",
                    ext
                )
            }
            ExportError::EncodingFailure { exit_code, stderr } => {
                write!(f, "ffmpeg exited with code {:?}\n{}", exit_code, stderr)
            }
            ExportError::Render(e) => write!(f, "{}", e),
            ExportError::Io(e) => write!(f, "I/O error: {}", e),
            ExportError::Image(e) => write!(f, "Failed to write frame: {}", e),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Render(e) => Some(e),
            ExportError::Io(e) => Some(e),
            ExportError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RenderError> for ExportError {
    fn from(e: RenderError) -> Self {
        ExportError::Render(e)
    }
}

impl From<ScreenError> for ExportError {
    fn from(e: ScreenError) -> Self {
        ExportError::Render(RenderError::Screen(e))
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<image::ImageError> for ExportError {
    fn from(e: image::ImageError) -> Self {
        ExportError::Image(e)
    }
}

/// Video/GIF export parameters.
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub width: u16,
    pub height: u16,
    pub fps: u32,
    pub slide_time_secs: f64,
    /// 1 (smallest file) to 100 (best quality).
    pub quality: u8,
}

/// Asciicast recording parameters.
#[derive(Debug, Clone, Copy)]
pub struct RecordOptions {
    pub width: u16,
    pub height: u16,
    pub slide_time_secs: f64,
}

/// Scoped temp storage and frame counter for one export run.
pub struct ExportSession {
    dir: tempfile::TempDir,
    frames: u32,
    width: u16,
    height: u16,
    fps: u32,
}

impl ExportSession {
    pub fn new(width: u16, height: u16, fps: u32) -> Result<ExportSession, ExportError> {
        let dir = tempfile::Builder::new().prefix("glitchdeck-").tempdir()?;
        log::debug!(
            "export session {}x{} @ {} fps at {}",
            width,
            height,
            fps,
            dir.path().display()
        );
        Ok(ExportSession {
            dir,
            frames: 0,
            width,
            height,
            fps,
        })
    }

    pub fn dimensions(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn frame_count(&self) -> u32 {
        self.frames
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    fn frame_path(&self, index: u32) -> PathBuf {
        self.dir.path().join(format!("frame_{:06}.png", index))
    }

    /// Input pattern handed to the encoder.
    fn frame_pattern(&self) -> PathBuf {
        self.dir.path().join("frame_%06d.png")
    }

    /// Persist the next sequentially numbered frame.
    pub fn write_frame(&mut self, img: &RgbImage) -> Result<(), ExportError> {
        let path = self.frame_path(self.frames);
        img.save(&path)?;
        self.frames += 1;
        Ok(())
    }

    /// Best-effort removal of the temp storage. Failures are swallowed.
    pub fn close(self) {
        if let Err(e) = self.dir.close() {
            log::warn!("failed to remove export temp dir: {}", e);
        }
    }
}

/// Check that ffmpeg is on the executable search path. Fatal, pre-flight:
/// runs before any frame is produced.
pub fn ensure_encoder() -> Result<(), ExportError> {
    let status = Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => Err(ExportError::EncoderUnavailable),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExportError::EncoderUnavailable)
        }
        Err(e) => Err(ExportError::Io(e)),
    }
}

fn run_encoder(args: &[&str]) -> Result<(), ExportError> {
    log::debug!("ffmpeg {}", args.join(" "));
    let output = Command::new("ffmpeg")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExportError::EncoderUnavailable
            } else {
                ExportError::Io(e)
            }
        })?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail: String = stderr
        .lines()
        .rev()
        .take(20)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n");
    Err(ExportError::EncodingFailure {
        exit_code: output.status.code(),
        stderr: tail,
    })
}

/// Map quality 1–100 linearly onto the inverse CRF scale, clamped.
pub fn crf_for_quality(quality: u8) -> u8 {
    let q = quality.clamp(1, 100) as f32;
    ((51.0 - q / 100.0 * 50.0).round() as u8).clamp(1, 51)
}

/// Render every slide into numbered frames: run the slide's transition
/// once, then hold the revealed slide for `slide_time * fps` frames with a
/// forced redraw per frame so the rain keeps animating under static
/// content. Must run inside a `LocalSet`.
pub async fn render_frames(
    deck: &Deck,
    session: &mut ExportSession,
    opts: &ExportOptions,
    seed: Option<u64>,
) -> Result<(), ExportError> {
    let mut renderer = Renderer::new(opts.width, opts.height, deck.theme.clone(), false, seed);
    renderer.start_rain();
    let background = Rgb::from_hex(&deck.theme.colors.background).unwrap_or_default();
    let hold = (opts.slide_time_secs * opts.fps as f64).round() as u32;
    let frame_gap = Duration::from_secs_f64(1.0 / opts.fps.max(1) as f64);
    for slide in &deck.slides {
        log::info!("rendering slide {} '{}'", slide.index, slide.frontmatter.title);
        renderer.render_slide(slide).await?;
        for _ in 0..hold {
            tokio::time::sleep(frame_gap).await;
            renderer.force_redraw()?;
            let mut vt = VirtualTerminal::new(opts.width, opts.height);
            capture::capture_to_virtual(&renderer.stage().borrow().screen, &mut vt);
            let img = raster::rasterize(&vt, background);
            session.write_frame(&img)?;
        }
    }
    renderer.teardown();
    Ok(())
}

/// Full video/GIF pipeline: probe the encoder, render all frames, invoke
/// ffmpeg once, and always remove the session storage.
pub async fn export_deck(
    deck: &Deck,
    opts: &ExportOptions,
    out: &Path,
    seed: Option<u64>,
) -> Result<(), ExportError> {
    let format = OutputFormat::from_path(out)?;
    ensure_encoder()?;
    let mut session = ExportSession::new(opts.width, opts.height, opts.fps)?;
    let result = match render_frames(deck, &mut session, opts, seed).await {
        Ok(()) => {
            log::info!("{} frames rendered, encoding {}", session.frame_count(), out.display());
            match format {
                OutputFormat::Mp4 => encode_mp4(&session, out, opts.quality),
                OutputFormat::Gif => encode_gif(&session, out),
            }
        }
        Err(e) => Err(e),
    };
    session.close();
    result
}

fn encode_mp4(session: &ExportSession, out: &Path, quality: u8) -> Result<(), ExportError> {
    let fps = session.fps.to_string();
    let crf = crf_for_quality(quality).to_string();
    let pattern = session.frame_pattern();
    run_encoder(&[
        "-y",
        "-framerate",
        &fps,
        "-start_number",
        "0",
        "-i",
        &pattern.to_string_lossy(),
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-crf",
        &crf,
        "-r",
        &fps,
        &out.to_string_lossy(),
    ])
}

/// Two-pass GIF encode: a shared palette computed over the whole sequence
/// with diff statistics, then a re-encode against it with ordered (Bayer)
/// dithering. The palette file is removed whatever the outcome.
fn encode_gif(session: &ExportSession, out: &Path) -> Result<(), ExportError> {
    let fps = session.fps.to_string();
    let pattern = session.frame_pattern();
    let palette = session.dir().join("palette.png");
    let result = run_encoder(&[
        "-y",
        "-framerate",
        &fps,
        "-start_number",
        "0",
        "-i",
        &pattern.to_string_lossy(),
        "-vf",
        "palettegen=stats_mode=diff",
        &palette.to_string_lossy(),
    ])
    .and_then(|_| {
        run_encoder(&[
            "-y",
            "-framerate",
            &fps,
            "-start_number",
            "0",
            "-i",
            &pattern.to_string_lossy(),
            "-i",
            &palette.to_string_lossy(),
            "-lavfi",
            "paletteuse=dither=bayer",
            &out.to_string_lossy(),
        ])
    });
    if palette.exists() {
        if let Err(e) = std::fs::remove_file(&palette) {
            log::warn!("failed to remove palette file: {}", e);
        }
    }
    result
}

/// One captured text frame: elapsed seconds, the `"o"` output stream tag,
/// and the frame text.
#[derive(Debug, Clone)]
pub struct AsciicastFrame {
    pub time: f64,
    pub data: String,
}

/// An asciicast v2 artifact assembled in memory.
#[derive(Debug, Clone)]
pub struct Asciicast {
    width: u16,
    height: u16,
    timestamp: u64,
    frames: Vec<AsciicastFrame>,
}

impl Asciicast {
    pub fn new(width: u16, height: u16) -> Asciicast {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Asciicast {
            width,
            height,
            timestamp,
            frames: Vec::new(),
        }
    }

    pub fn frames(&self) -> &[AsciicastFrame] {
        &self.frames
    }

    /// Append a frame. Timestamps must be non-decreasing; a regression is
    /// clamped to the previous timestamp.
    pub fn push(&mut self, time: f64, data: String) {
        let time = match self.frames.last() {
            Some(last) if time < last.time => {
                log::warn!("asciicast timestamp regressed, clamping to {}", last.time);
                last.time
            }
            _ => time,
        };
        self.frames.push(AsciicastFrame { time, data });
    }

    /// The artifact text: one JSON header line, then one JSON array line
    /// per frame, each newline-terminated.
    pub fn to_text(&self) -> String {
        let header = serde_json::json!({
            "version": 2,
            "width": self.width,
            "height": self.height,
            "timestamp": self.timestamp,
            "env": { "TERM": "xterm-256color" }
        });
        let mut out = header.to_string();
        out.push('\n');
        for frame in &self.frames {
            // A tuple serializes as the [time, "o", data] event array.
            let line = serde_json::to_string(&(frame.time, "o", &frame.data))
                .unwrap_or_else(|_| "[0.0,\"o\",\"\"]".to_string());
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Text-cast pipeline: render each slide once, capture one ANSI frame, and
/// accumulate elapsed time by the fixed per-slide duration. No encoder
/// involved. Must run inside a `LocalSet`.
pub async fn record_deck(
    deck: &Deck,
    opts: &RecordOptions,
    seed: Option<u64>,
) -> Result<Asciicast, ExportError> {
    let mut renderer = Renderer::new(opts.width, opts.height, deck.theme.clone(), false, seed);
    renderer.start_rain();
    let mut cast = Asciicast::new(opts.width, opts.height);
    let mut elapsed = 0.0;
    for slide in &deck.slides {
        renderer.render_slide(slide).await?;
        let text = capture::capture_to_ansi(&renderer.stage().borrow().screen, opts.height);
        cast.push(elapsed, text);
        elapsed += opts.slide_time_secs;
    }
    renderer.teardown();
    Ok(cast)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            OutputFormat::from_path(Path::new("deck.mp4")).unwrap(),
            OutputFormat::Mp4
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("deck.GIF")).unwrap(),
            OutputFormat::Gif
        );
        assert!(matches!(
            OutputFormat::from_path(Path::new("deck.webm")),
            Err(ExportError::UnsupportedOutputFormat(_))
        ));
        assert!(matches!(
            OutputFormat::from_path(Path::new("deck")),
            Err(ExportError::UnsupportedOutputFormat(_))
        ));
    }

    #[test]
    fn test_crf_mapping_is_inverse_and_clamped() {
        assert_eq!(crf_for_quality(100), 1);
        assert_eq!(crf_for_quality(1), 51);
        assert!(crf_for_quality(50) < crf_for_quality(10));
        // Out-of-range input clamps rather than wrapping.
        assert_eq!(crf_for_quality(0), 51);
        assert_eq!(crf_for_quality(255), 1);
    }

    #[test]
    fn test_asciicast_header_shape() {
        let cast = Asciicast::new(80, 24);
        let text = cast.to_text();
        let header: serde_json::Value =
            serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(header["version"], 2);
        assert_eq!(header["width"], 80);
        assert_eq!(header["height"], 24);
        assert_eq!(header["env"]["TERM"], "xterm-256color");
    }

    #[test]
    fn test_asciicast_frames_serialize_as_events() {
        let mut cast = Asciicast::new(10, 5);
        cast.push(0.0, "a".to_string());
        cast.push(2.0, "b".to_string());
        let text = cast.to_text();
        let lines: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(lines.len(), 2);
        let event: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(event[0], 2.0);
        assert_eq!(event[1], "o");
        assert_eq!(event[2], "b");
    }

    #[test]
    fn test_asciicast_timestamps_never_decrease() {
        let mut cast = Asciicast::new(10, 5);
        cast.push(5.0, "a".to_string());
        cast.push(3.0, "b".to_string());
        assert_eq!(cast.frames()[1].time, 5.0);
    }

    #[test]
    fn test_session_numbers_frames_sequentially() {
        let mut session = ExportSession::new(8, 2, 10).unwrap();
        let img = RgbImage::from_pixel(8, 16, image::Rgb([0, 0, 0]));
        session.write_frame(&img).unwrap();
        session.write_frame(&img).unwrap();
        assert_eq!(session.frame_count(), 2);
        assert!(session.dir().join("frame_000000.png").exists());
        assert!(session.dir().join("frame_000001.png").exists());
        let dir = session.dir().to_path_buf();
        session.close();
        assert!(!dir.exists());
    }
}
