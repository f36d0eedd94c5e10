use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind};
use futures_util::StreamExt;

use glitchdeck::config::Config;
use glitchdeck::deck::Deck;
use glitchdeck::export::{self, ExportOptions, RecordOptions};
use glitchdeck::renderer::Renderer;

const DEFAULT_WIDTH: u16 = 100;
const DEFAULT_HEIGHT: u16 = 30;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_SLIDE_TIME: f64 = 3.0;
const DEFAULT_QUALITY: u8 = 80;

/// Parse and validate a terminal dimension (1-500 cells)
fn parse_dimension(s: &str) -> Result<u16, String> {
    let value: u16 = s.parse().map_err(|_| format!("'{}' is not a valid size", s))?;
    if !(1..=500).contains(&value) {
        return Err(format!("Size must be between 1 and 500 cells, got {}", value));
    }
    Ok(value)
}

/// Parse and validate framerate (1-120 fps)
fn parse_fps(s: &str) -> Result<u32, String> {
    let fps: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid framerate", s))?;
    if !(1..=120).contains(&fps) {
        return Err(format!(
            "Framerate must be between 1 and 120 fps, got {}",
            fps
        ));
    }
    Ok(fps)
}

/// Parse and validate quality (1-100)
fn parse_quality(s: &str) -> Result<u8, String> {
    let quality: u8 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid quality", s))?;
    if !(1..=100).contains(&quality) {
        return Err(format!("Quality must be between 1 and 100, got {}", quality));
    }
    Ok(quality)
}

/// Parse and validate per-slide duration in seconds
fn parse_slide_time(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{}' is not a valid duration", s))?;
    if !(secs > 0.0 && secs <= 600.0) {
        return Err(format!(
            "Slide time must be between 0 and 600 seconds, got {}",
            secs
        ));
    }
    Ok(secs)
}

/// glitchdeck: animated terminal slide decks
#[derive(Parser)]
#[command(name = "glitchdeck")]
#[command(version, about = "Animated terminal slide decks")]
#[command(long_about = "Present slide decks in the terminal with glitch, fade and \
    typewriter reveals over a matrix rain background, or export a deck as an \
    MP4/GIF video or an asciicast recording.")]
#[command(after_help = "EXAMPLES:
    # Present a deck live
    glitchdeck present talk.json

    # Export to video
    glitchdeck export talk.json -o talk.mp4 --fps 30 --slide-time 3

    # Export to GIF at lower quality
    glitchdeck export talk.json -o talk.gif --quality 50

    # Record an asciicast
    glitchdeck record talk.json -o talk.cast")]
struct Cli {
    /// Custom config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Present a deck live in the terminal
    Present {
        /// Deck file (JSON)
        deck: PathBuf,
        /// Screen width in cells (defaults to the terminal width)
        #[arg(long, value_parser = parse_dimension)]
        width: Option<u16>,
        /// Screen height in cells (defaults to the terminal height)
        #[arg(long, value_parser = parse_dimension)]
        height: Option<u16>,
    },

    /// Export a deck as an MP4 or GIF file
    Export {
        /// Deck file (JSON)
        deck: PathBuf,
        /// Output path; the extension selects the format (.mp4 or .gif)
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, value_parser = parse_dimension)]
        width: Option<u16>,
        #[arg(long, value_parser = parse_dimension)]
        height: Option<u16>,
        /// Frames per second
        #[arg(long, value_parser = parse_fps)]
        fps: Option<u32>,
        /// Seconds each slide is held after its reveal
        #[arg(long, value_parser = parse_slide_time)]
        slide_time: Option<f64>,
        /// Encoding quality, 1 (smallest) to 100 (best)
        #[arg(long, value_parser = parse_quality)]
        quality: Option<u8>,
    },

    /// Record a deck as an asciicast v2 file
    Record {
        /// Deck file (JSON)
        deck: PathBuf,
        /// Output path for the .cast file
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, value_parser = parse_dimension)]
        width: Option<u16>,
        #[arg(long, value_parser = parse_dimension)]
        height: Option<u16>,
        /// Seconds each slide stays on screen
        #[arg(long, value_parser = parse_slide_time)]
        slide_time: Option<f64>,
    },
}

/// Raw-mode/alternate-screen guard for live presentation. Restores the
/// terminal on drop, including on error paths.
struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    fn enter() -> io::Result<TerminalGuard> {
        crossterm::terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(
            stdout,
            crossterm::terminal::EnterAlternateScreen,
            crossterm::cursor::Hide
        )?;
        Ok(TerminalGuard { active: true })
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.active {
            self.active = false;
            let mut stdout = io::stdout();
            crossterm::execute!(
                stdout,
                crossterm::cursor::Show,
                crossterm::terminal::LeaveAlternateScreen
            )?;
            crossterm::terminal::disable_raw_mode()?;
            stdout.flush()?;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

async fn run_present(
    deck: Deck,
    width: Option<u16>,
    height: Option<u16>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    if deck.slides.is_empty() {
        return Err("deck has no slides".into());
    }
    let (term_w, term_h) = crossterm::terminal::size().unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT));
    let width = width.or(config.present.width).unwrap_or(term_w);
    let height = height.or(config.present.height).unwrap_or(term_h);

    let mut guard = TerminalGuard::enter()?;
    let mut renderer = Renderer::new(width, height, deck.theme.clone(), true, None);
    renderer.start_rain();

    let mut events = EventStream::new();
    let mut index = 0usize;
    if let Err(e) = renderer.render_slide(&deck.slides[index]).await {
        log::warn!("slide {} failed to render: {}", index, e);
    }

    loop {
        let Some(event) = events.next().await else { break };
        let Ok(Event::Key(key)) = event else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let target = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Char(' ') | KeyCode::Char('n') | KeyCode::Right | KeyCode::Enter => {
                (index + 1).min(deck.slides.len() - 1)
            }
            KeyCode::Char('p') | KeyCode::Left => index.saturating_sub(1),
            _ => continue,
        };
        if target != index {
            index = target;
            if let Err(e) = renderer.render_slide(&deck.slides[index]).await {
                // Fatal for this slide only.
                log::warn!("slide {} failed to render: {}", index, e);
            }
        }
    }

    renderer.teardown();
    guard.restore()?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Present {
            deck,
            width,
            height,
        } => {
            let deck = Deck::load(&deck)?;
            run_present(deck, width, height, &config).await
        }
        Commands::Export {
            deck,
            output,
            width,
            height,
            fps,
            slide_time,
            quality,
        } => {
            let deck = Deck::load(&deck)?;
            let opts = ExportOptions {
                width: width.or(config.export.width).unwrap_or(DEFAULT_WIDTH),
                height: height.or(config.export.height).unwrap_or(DEFAULT_HEIGHT),
                fps: fps.or(config.export.fps).unwrap_or(DEFAULT_FPS),
                slide_time_secs: slide_time
                    .or(config.export.slide_time)
                    .unwrap_or(DEFAULT_SLIDE_TIME),
                quality: quality.or(config.export.quality).unwrap_or(DEFAULT_QUALITY),
            };
            export::export_deck(&deck, &opts, &output, None).await?;
            println!("Wrote {}", output.display());
            Ok(())
        }
        Commands::Record {
            deck,
            output,
            width,
            height,
            slide_time,
        } => {
            let deck = Deck::load(&deck)?;
            let opts = RecordOptions {
                width: width.or(config.export.width).unwrap_or(DEFAULT_WIDTH),
                height: height.or(config.export.height).unwrap_or(DEFAULT_HEIGHT),
                slide_time_secs: slide_time
                    .or(config.export.slide_time)
                    .unwrap_or(DEFAULT_SLIDE_TIME),
            };
            let cast = export::record_deck(&deck, &opts, None).await?;
            std::fs::write(&output, cast.to_text())?;
            println!("Wrote {}", output.display());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    let local = tokio::task::LocalSet::new();
    if let Err(e) = runtime.block_on(local.run_until(run(cli))) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension("80"), Ok(80));
        assert!(parse_dimension("0").is_err());
        assert!(parse_dimension("9999").is_err());
        assert!(parse_dimension("wide").is_err());
    }

    #[test]
    fn test_parse_fps() {
        assert_eq!(parse_fps("30"), Ok(30));
        assert!(parse_fps("0").is_err());
        assert!(parse_fps("121").is_err());
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!(parse_quality("80"), Ok(80));
        assert!(parse_quality("0").is_err());
        assert!(parse_quality("101").is_err());
    }

    #[test]
    fn test_parse_slide_time() {
        assert_eq!(parse_slide_time("2.5"), Ok(2.5));
        assert!(parse_slide_time("0").is_err());
        assert!(parse_slide_time("-1").is_err());
    }
}
