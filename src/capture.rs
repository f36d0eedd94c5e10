//! Pure reads of screen state: a virtual-terminal raster grid for the
//! image pipeline, and an ANSI text frame for asciicast recording.
//!
//! Neither capture mutates the screen.

use crate::screen::{CellColor, Screen};
use crate::theme::Rgb;

/// One cell of the captured raster grid: a character and a fully decoded
/// foreground color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VtCell {
    pub ch: char,
    pub fg: Rgb,
}

impl Default for VtCell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Rgb::WHITE,
        }
    }
}

/// In-memory raster representation of captured screen state.
#[derive(Debug, Clone)]
pub struct VirtualTerminal {
    width: u16,
    height: u16,
    cells: Vec<VtCell>,
}

impl VirtualTerminal {
    pub fn new(width: u16, height: u16) -> Self {
        let len = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![VtCell::default(); len],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<VtCell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.cells[(y as usize) * (self.width as usize) + (x as usize)])
    }

    fn set(&mut self, x: u16, y: u16, cell: VtCell) {
        if x < self.width && y < self.height {
            self.cells[(y as usize) * (self.width as usize) + (x as usize)] = cell;
        }
    }
}

/// Decode a cell attribute to a concrete color. Direct colors pass through,
/// palette indices expand, and anything else defaults to white.
pub fn decode_color(color: CellColor) -> Rgb {
    match color {
        CellColor::Rgb(rgb) => rgb,
        CellColor::Indexed(i) => xterm_256(i),
        CellColor::Default => Rgb::WHITE,
    }
}

/// The standard 256-entry terminal palette: 16 named colors, a 6×6×6 color
/// cube for 16–231, and a 24-step gray ramp for 232–255.
pub fn xterm_256(index: u8) -> Rgb {
    const NAMED: [(u8, u8, u8); 16] = [
        (0x00, 0x00, 0x00),
        (0x80, 0x00, 0x00),
        (0x00, 0x80, 0x00),
        (0x80, 0x80, 0x00),
        (0x00, 0x00, 0x80),
        (0x80, 0x00, 0x80),
        (0x00, 0x80, 0x80),
        (0xc0, 0xc0, 0xc0),
        (0x80, 0x80, 0x80),
        (0xff, 0x00, 0x00),
        (0x00, 0xff, 0x00),
        (0xff, 0xff, 0x00),
        (0x00, 0x00, 0xff),
        (0xff, 0x00, 0xff),
        (0x00, 0xff, 0xff),
        (0xff, 0xff, 0xff),
    ];
    match index {
        0..=15 => {
            let (r, g, b) = NAMED[index as usize];
            Rgb::new(r, g, b)
        }
        16..=231 => {
            let n = index - 16;
            let level = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
            Rgb::new(level(n / 36), level((n / 6) % 6), level(n % 6))
        }
        232..=255 => {
            let v = 8 + (index - 232) * 10;
            Rgb::new(v, v, v)
        }
    }
}

/// Copy every cell of the composited screen into the destination grid,
/// decoding attributes to concrete colors. Destination cells beyond the
/// screen bounds stay blank.
pub fn capture_to_virtual(screen: &Screen, dest: &mut VirtualTerminal) {
    for y in 0..dest.height() {
        for x in 0..dest.width() {
            let cell = match screen.cell(x, y) {
                Some(cell) => VtCell {
                    ch: cell.ch,
                    fg: decode_color(cell.fg),
                },
                None => VtCell::default(),
            };
            dest.set(x, y, cell);
        }
    }
}

fn color_escape(color: CellColor) -> String {
    match color {
        CellColor::Default => "\x1b[39m".to_string(),
        CellColor::Indexed(i) => format!("\x1b[38;5;{}m", i),
        CellColor::Rgb(rgb) => format!("\x1b[38;2;{};{};{}m", rgb.r, rgb.g, rgb.b),
    }
}

/// Emit the screen as one ANSI text frame: a full clear/home escape, then
/// one line per row with a foreground escape only where the color changes
/// and a reset at row end if any color was set. Rows beyond the buffer come
/// out as blank lines.
pub fn capture_to_ansi(screen: &Screen, rows: u16) -> String {
    let mut out = String::from("\x1b[2J\x1b[H");
    for y in 0..rows {
        if y < screen.height() {
            let mut last = CellColor::Default;
            let mut any_color = false;
            for x in 0..screen.width() {
                let Some(cell) = screen.cell(x, y) else {
                    continue;
                };
                if cell.fg != last {
                    out.push_str(&color_escape(cell.fg));
                    last = cell.fg;
                    if cell.fg != CellColor::Default {
                        any_color = true;
                    }
                }
                out.push(cell.ch);
            }
            if any_color {
                out.push_str("\x1b[0m");
            }
        }
        out.push_str("\r\n");
    }
    out
}
