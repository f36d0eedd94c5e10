//! Matrix rain background animation.
//!
//! The rain ticks on its own interval task, independent of the slide
//! lifecycle, and paints into the screen's background layer. It is
//! deliberately not synchronized with transitions: windows are opaque, so a
//! tick interleaving with an in-progress reveal only bleeds through where no
//! window covers the grid.

use std::cell::Cell as StdCell;
use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::Rng;
use tokio::time::MissedTickBehavior;

use crate::screen::{Cell, CellColor, Screen, SharedStage};
use crate::theme::{Rgb, Theme};

/// Screen cells per rain glyph, horizontally and vertically.
pub const GLYPH_CELL_W: u16 = 2;
pub const GLYPH_CELL_H: u16 = 1;

const TRAIL_MIN: usize = 5;
const TRAIL_MAX: usize = 14;

/// One falling glyph column.
#[derive(Debug, Clone)]
struct Drop {
    column: u16,
    row: f32,
    speed: f32,
    trail: Vec<char>,
}

/// The full rain state for one screen.
pub struct MatrixRain {
    cols: u16,
    rows: u16,
    drops: Vec<Drop>,
    base: Rgb,
}

impl MatrixRain {
    /// Seed `matrix_density` drops on a grid sized by the screen dimensions
    /// divided by the glyph cell size.
    pub fn init<R: Rng>(width: u16, height: u16, theme: &Theme, rng: &mut R) -> MatrixRain {
        let cols = (width / GLYPH_CELL_W).max(1);
        let rows = (height / GLYPH_CELL_H).max(1);
        let glyphs: Vec<char> = theme.glyphs.chars().collect();
        let base = Rgb::from_hex(&theme.colors.primary).unwrap_or(Rgb::new(0, 255, 102));
        let drops = (0..theme.animations.matrix_density)
            .map(|_| spawn_drop(cols, rows, &glyphs, rng, true))
            .collect();
        MatrixRain {
            cols,
            rows,
            drops,
            base,
        }
    }

    pub fn drop_count(&self) -> usize {
        self.drops.len()
    }

    /// Advance every drop by its speed, respawn drops whose trailing edge
    /// fell below the visible area, and repaint the rain layer with
    /// brightness falling off from head to tail plus per-glyph flicker.
    pub fn tick<R: Rng>(&mut self, screen: &mut Screen, theme: &Theme, rng: &mut R) {
        let glyphs: Vec<char> = theme.glyphs.chars().collect();
        for drop in &mut self.drops {
            drop.row += drop.speed;
            if drop.row - drop.trail.len() as f32 > self.rows as f32 {
                *drop = spawn_drop(self.cols, self.rows, &glyphs, rng, false);
            }
        }
        screen.clear_rain();
        for drop in &self.drops {
            let head = drop.row.floor() as i32;
            let len = drop.trail.len();
            for (t, ch) in drop.trail.iter().enumerate() {
                let y = head - t as i32;
                if y < 0 || y >= self.rows as i32 {
                    continue;
                }
                let falloff = 1.0 - (t as f32 / len as f32) * 0.8;
                let flicker = 0.9 + rng.random::<f32>() * 0.2;
                let color = if t == 0 {
                    Rgb::lerp(self.base, Rgb::WHITE, 0.6)
                } else {
                    self.base.scale(falloff * flicker)
                };
                screen.set_rain_cell(
                    drop.column * GLYPH_CELL_W,
                    y as u16 * GLYPH_CELL_H,
                    Cell {
                        ch: *ch,
                        fg: CellColor::Rgb(color),
                    },
                );
            }
        }
    }
}

fn spawn_drop<R: Rng>(
    cols: u16,
    rows: u16,
    glyphs: &[char],
    rng: &mut R,
    anywhere: bool,
) -> Drop {
    let len = rng.random_range(TRAIL_MIN..=TRAIL_MAX);
    let trail = (0..len)
        .map(|_| glyphs[rng.random_range(0..glyphs.len())])
        .collect();
    Drop {
        column: rng.random_range(0..cols),
        row: if anywhere {
            rng.random_range(0..rows) as f32
        } else {
            0.0
        },
        speed: rng.random_range(0.3..1.5),
        trail,
    }
}

/// Handle to the rain ticker task. `stop` is idempotent.
pub struct RainHandle {
    stop: Rc<StdCell<bool>>,
}

impl RainHandle {
    /// Stop scheduling further ticks. In-flight work is not preempted; the
    /// task observes the flag on its next tick and exits.
    pub fn stop(&self) {
        self.stop.set(true);
    }
}

/// Spawn the rain interval task on the current `LocalSet`. The task exits
/// when stopped or when the screen has been destroyed, so no timer outlives
/// the renderer.
pub fn spawn_ticker(
    stage: SharedStage,
    mut state: MatrixRain,
    theme: Theme,
    mut rng: SmallRng,
) -> RainHandle {
    let stop = Rc::new(StdCell::new(false));
    let flag = Rc::clone(&stop);
    tokio::task::spawn_local(async move {
        let mut interval = tokio::time::interval(theme.matrix_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if flag.get() {
                break;
            }
            let mut stage = stage.borrow_mut();
            if !stage.screen.is_alive() {
                break;
            }
            state.tick(&mut stage.screen, &theme, &mut rng);
            if let Err(e) = stage.redraw() {
                // Torn down mid-suspension; the tick becomes a no-op.
                log::debug!("rain tick after teardown: {}", e);
                break;
            }
        }
    });
    RainHandle { stop }
}
