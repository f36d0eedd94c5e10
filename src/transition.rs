//! Slide reveal animations.
//!
//! Every algorithm shares one contract: whatever intermediate frames were
//! drawn, the window ends up holding the byte-exact final content. Draws go
//! through the shared stage; a destroyed screen surfaces as an error to the
//! caller and is fatal for that slide's render only.

use rand::Rng;
use tokio::time::sleep;

use crate::screen::{ScreenError, SharedStage, WindowId};
use crate::theme::Theme;

/// Fixed delay after each glitch scramble pass, in milliseconds.
const GLITCH_PASS_DELAY_MS: u64 = 20;

/// Number of probabilistic reveal steps in the fade.
const FADE_STEPS: u32 = 10;

/// Replacement glyphs for scrambled characters.
const GLITCH_GLYPHS: &[char] = &[
    '#', '$', '%', '&', '@', '*', '+', '=', '?', '!', '<', '>', '/', '\\', '|', '~', '░', '▒',
    '▓', '█',
];

/// The closed set of reveal algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transition {
    #[default]
    Instant,
    Glitch,
    Fade,
    Typewriter,
}

impl Transition {
    /// Convert an untrusted transition name. Unrecognized names collapse to
    /// `Instant` here, at the boundary, and nowhere else.
    pub fn from_name(name: &str) -> Transition {
        match name.trim().to_ascii_lowercase().as_str() {
            "glitch" => Transition::Glitch,
            "fade" => Transition::Fade,
            "typewriter" => Transition::Typewriter,
            _ => Transition::Instant,
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Instant => write!(f, "instant"),
            Transition::Glitch => write!(f, "glitch"),
            Transition::Fade => write!(f, "fade"),
            Transition::Typewriter => write!(f, "typewriter"),
        }
    }
}

/// Characters that are never scrambled: whitespace, punctuation, box
/// drawing, block elements, and arrows.
fn is_protected(ch: char) -> bool {
    ch.is_whitespace()
        || ch.is_ascii_punctuation()
        || ('\u{2500}'..='\u{257f}').contains(&ch)
        || ('\u{2580}'..='\u{259f}').contains(&ch)
        || ('\u{2190}'..='\u{21ff}').contains(&ch)
}

fn draw(stage: &SharedStage, win: WindowId, text: &str) -> Result<(), ScreenError> {
    let mut stage = stage.borrow_mut();
    stage.stack.set_content(win, text.to_string())?;
    stage.redraw()
}

/// Reveal `content` onto the window using the given algorithm.
pub async fn reveal<R: Rng>(
    stage: &SharedStage,
    theme: &Theme,
    rng: &mut R,
    win: WindowId,
    content: &str,
    mode: Transition,
) -> Result<(), ScreenError> {
    match mode {
        Transition::Instant => instant(stage, win, content),
        Transition::Glitch => glitch(stage, theme, rng, win, content).await,
        Transition::Fade => fade(stage, theme, rng, win, content).await,
        Transition::Typewriter => typewriter(stage, theme, win, content).await,
    }
}

fn instant(stage: &SharedStage, win: WindowId, content: &str) -> Result<(), ScreenError> {
    draw(stage, win, content)
}

/// Replace each unprotected character with a random glitch glyph with
/// probability `ratio`.
fn scramble_line<R: Rng>(line: &str, ratio: f32, rng: &mut R) -> String {
    line.chars()
        .map(|ch| {
            if !is_protected(ch) && rng.random::<f32>() < ratio {
                GLITCH_GLYPHS[rng.random_range(0..GLITCH_GLYPHS.len())]
            } else {
                ch
            }
        })
        .collect()
}

async fn glitch<R: Rng>(
    stage: &SharedStage,
    theme: &Theme,
    rng: &mut R,
    win: WindowId,
    content: &str,
) -> Result<(), ScreenError> {
    let iterations = theme.animations.glitch_iterations;
    let mut done: Vec<&str> = Vec::new();
    for line in content.split('\n') {
        for i in (0..=iterations).rev() {
            let ratio = if iterations == 0 {
                0.0
            } else {
                i as f32 / iterations as f32
            };
            let pass = scramble_line(line, ratio, rng);
            let mut partial = done.join("\n");
            if !done.is_empty() {
                partial.push('\n');
            }
            partial.push_str(&pass);
            draw(stage, win, &partial)?;
            sleep(theme.scale_delay(GLITCH_PASS_DELAY_MS)).await;
        }
        done.push(line);
        draw(stage, win, &done.join("\n"))?;
        if !line.trim().is_empty() {
            sleep(theme.scale_delay(theme.line_delay_ms())).await;
        }
    }
    Ok(())
}

async fn fade<R: Rng>(
    stage: &SharedStage,
    theme: &Theme,
    rng: &mut R,
    win: WindowId,
    content: &str,
) -> Result<(), ScreenError> {
    let step_delay = theme.scale_delay(theme.line_delay_ms() * 2 / FADE_STEPS as u64);
    for step in 0..FADE_STEPS {
        let probability = step as f32 / FADE_STEPS as f32;
        let partial: String = content
            .chars()
            .map(|ch| {
                if ch == '\n' || is_protected(ch) || rng.random::<f32>() < probability {
                    ch
                } else {
                    ' '
                }
            })
            .collect();
        draw(stage, win, &partial)?;
        sleep(step_delay).await;
    }
    draw(stage, win, content)
}

async fn typewriter(
    stage: &SharedStage,
    theme: &Theme,
    win: WindowId,
    content: &str,
) -> Result<(), ScreenError> {
    let char_delay = theme.scale_delay(theme.line_delay_ms() / 5);
    let mut buf = String::with_capacity(content.len());
    for ch in content.chars() {
        buf.push(ch);
        draw(stage, win, &buf)?;
        if !ch.is_whitespace() {
            sleep(char_delay).await;
        }
    }
    Ok(())
}
