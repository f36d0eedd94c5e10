//! Rasterize a captured virtual terminal into an RGB image.
//!
//! Each character cell becomes an 8×16 pixel block. Printable ASCII renders
//! through a built-in 5×7 bitmap font (rows doubled vertically); box-drawing
//! characters render as connected line segments across the full cell so
//! window borders stay continuous; shade blocks render as dither fills.
//! Anything else falls back to a dense pseudo-glyph keyed by codepoint so
//! the rain glyph set stays visually varied.

use image::RgbImage;

use crate::capture::VirtualTerminal;
use crate::theme::Rgb;

/// Pixel width of one character cell.
pub const CELL_W: u32 = 8;
/// Pixel height of one character cell.
pub const CELL_H: u32 = 16;

/// Render the grid into an image of `width*CELL_W` × `height*CELL_H` pixels
/// over the given background color.
pub fn rasterize(vt: &VirtualTerminal, background: Rgb) -> RgbImage {
    let px_w = (vt.width() as u32).max(1) * CELL_W;
    let px_h = (vt.height() as u32).max(1) * CELL_H;
    let bg = image::Rgb([background.r, background.g, background.b]);
    let mut img = RgbImage::from_pixel(px_w, px_h, bg);
    for y in 0..vt.height() {
        for x in 0..vt.width() {
            let Some(cell) = vt.cell(x, y) else { continue };
            if cell.ch == ' ' {
                continue;
            }
            draw_cell(
                &mut img,
                x as u32 * CELL_W,
                y as u32 * CELL_H,
                cell.ch,
                cell.fg,
            );
        }
    }
    img
}

fn draw_cell(img: &mut RgbImage, x0: u32, y0: u32, ch: char, fg: Rgb) {
    let px = image::Rgb([fg.r, fg.g, fg.b]);
    if let Some((up, down, left, right)) = box_segments(ch) {
        draw_box_lines(img, x0, y0, up, down, left, right, px);
        return;
    }
    if let Some(density) = shade_density(ch) {
        draw_shade(img, x0, y0, density, px);
        return;
    }
    let rows = glyph(ch).unwrap_or_else(|| pseudo_glyph(ch));
    draw_glyph(img, x0, y0, &rows, px);
}

/// Paint a 5×7 glyph with each font row doubled to two pixel rows.
fn draw_glyph(img: &mut RgbImage, x0: u32, y0: u32, rows: &[u8; 7], px: image::Rgb<u8>) {
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..5u32 {
            if bits & (0x10 >> col) == 0 {
                continue;
            }
            let x = x0 + 1 + col;
            let y = y0 + 1 + row as u32 * 2;
            put(img, x, y, px);
            put(img, x, y + 1, px);
        }
    }
}

fn put(img: &mut RgbImage, x: u32, y: u32, px: image::Rgb<u8>) {
    if x < img.width() && y < img.height() {
        img.put_pixel(x, y, px);
    }
}

/// Line-segment arms for box-drawing characters, as (up, down, left, right).
fn box_segments(ch: char) -> Option<(bool, bool, bool, bool)> {
    Some(match ch {
        '─' | '━' | '═' => (false, false, true, true),
        '│' | '┃' | '║' => (true, true, false, false),
        '┌' | '╔' | '╭' => (false, true, false, true),
        '┐' | '╗' | '╮' => (false, true, true, false),
        '└' | '╚' | '╰' => (true, false, false, true),
        '┘' | '╝' | '╯' => (true, false, true, false),
        '├' => (true, true, false, true),
        '┤' => (true, true, true, false),
        '┬' => (false, true, true, true),
        '┴' => (true, false, true, true),
        '┼' => (true, true, true, true),
        _ => return None,
    })
}

fn draw_box_lines(
    img: &mut RgbImage,
    x0: u32,
    y0: u32,
    up: bool,
    down: bool,
    left: bool,
    right: bool,
    px: image::Rgb<u8>,
) {
    let cx = CELL_W / 2 - 1;
    let cy = CELL_H / 2 - 1;
    if left {
        for x in 0..=cx + 1 {
            put(img, x0 + x, y0 + cy, px);
            put(img, x0 + x, y0 + cy + 1, px);
        }
    }
    if right {
        for x in cx..CELL_W {
            put(img, x0 + x, y0 + cy, px);
            put(img, x0 + x, y0 + cy + 1, px);
        }
    }
    if up {
        for y in 0..=cy + 1 {
            put(img, x0 + cx, y0 + y, px);
            put(img, x0 + cx + 1, y0 + y, px);
        }
    }
    if down {
        for y in cy..CELL_H {
            put(img, x0 + cx, y0 + y, px);
            put(img, x0 + cx + 1, y0 + y, px);
        }
    }
}

/// Fill fraction for shade/block characters, in quarters.
fn shade_density(ch: char) -> Option<u8> {
    Some(match ch {
        '░' => 1,
        '▒' => 2,
        '▓' => 3,
        '█' => 4,
        _ => return None,
    })
}

fn draw_shade(img: &mut RgbImage, x0: u32, y0: u32, density: u8, px: image::Rgb<u8>) {
    for y in 0..CELL_H {
        for x in 0..CELL_W {
            let on = match density {
                1 => x % 2 == 0 && y % 2 == 0,
                2 => (x + y) % 2 == 0,
                3 => (x + y) % 4 != 0,
                _ => true,
            };
            if on {
                put(img, x0 + x, y0 + y, px);
            }
        }
    }
}

/// Deterministic dense pattern for glyphs outside the font, keyed by
/// codepoint so different rain glyphs stay distinguishable.
fn pseudo_glyph(ch: char) -> [u8; 7] {
    let hash = (ch as u32).wrapping_mul(0x9e37_79b1);
    let mut rows = [0u8; 7];
    for (row, out) in rows.iter_mut().enumerate() {
        let mut bits = 0u8;
        for col in 0..5 {
            let idx = (row * 5 + col) % 31;
            if (hash >> idx) & 1 == 1 {
                bits |= 0x10 >> col;
            }
        }
        *out = bits;
    }
    rows
}

/// 5×7 bitmaps for printable ASCII; bit 4 is the leftmost pixel.
fn glyph(ch: char) -> Option<[u8; 7]> {
    Some(match ch {
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        '"' => [0x0a, 0x0a, 0x0a, 0x00, 0x00, 0x00, 0x00],
        '#' => [0x0a, 0x0a, 0x1f, 0x0a, 0x1f, 0x0a, 0x0a],
        '$' => [0x04, 0x0f, 0x14, 0x0e, 0x05, 0x1e, 0x04],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        '&' => [0x0c, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0d],
        '\'' => [0x0c, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        '*' => [0x00, 0x04, 0x15, 0x0e, 0x15, 0x04, 0x00],
        '+' => [0x00, 0x04, 0x04, 0x1f, 0x04, 0x04, 0x00],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0c, 0x04, 0x08],
        '-' => [0x00, 0x00, 0x00, 0x1f, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0c, 0x0c],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '0' => [0x0e, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0e],
        '1' => [0x04, 0x0c, 0x04, 0x04, 0x04, 0x04, 0x0e],
        '2' => [0x0e, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1f],
        '3' => [0x1f, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0e],
        '4' => [0x02, 0x06, 0x0a, 0x12, 0x1f, 0x02, 0x02],
        '5' => [0x1f, 0x10, 0x1e, 0x01, 0x01, 0x11, 0x0e],
        '6' => [0x06, 0x08, 0x10, 0x1e, 0x11, 0x11, 0x0e],
        '7' => [0x1f, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0e, 0x11, 0x11, 0x0e, 0x11, 0x11, 0x0e],
        '9' => [0x0e, 0x11, 0x11, 0x0f, 0x01, 0x02, 0x0c],
        ':' => [0x00, 0x0c, 0x0c, 0x00, 0x0c, 0x0c, 0x00],
        ';' => [0x00, 0x0c, 0x0c, 0x00, 0x0c, 0x04, 0x08],
        '<' => [0x02, 0x04, 0x08, 0x10, 0x08, 0x04, 0x02],
        '=' => [0x00, 0x00, 0x1f, 0x00, 0x1f, 0x00, 0x00],
        '>' => [0x08, 0x04, 0x02, 0x01, 0x02, 0x04, 0x08],
        '?' => [0x0e, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
        '@' => [0x0e, 0x11, 0x01, 0x0d, 0x15, 0x15, 0x0e],
        'A' => [0x0e, 0x11, 0x11, 0x11, 0x1f, 0x11, 0x11],
        'B' => [0x1e, 0x11, 0x11, 0x1e, 0x11, 0x11, 0x1e],
        'C' => [0x0e, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0e],
        'D' => [0x1c, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1c],
        'E' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x1f],
        'F' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x10],
        'G' => [0x0e, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0f],
        'H' => [0x11, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11],
        'I' => [0x0e, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0e],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0c],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1f],
        'M' => [0x11, 0x1b, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'P' => [0x1e, 0x11, 0x11, 0x1e, 0x10, 0x10, 0x10],
        'Q' => [0x0e, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0d],
        'R' => [0x1e, 0x11, 0x11, 0x1e, 0x14, 0x12, 0x11],
        'S' => [0x0f, 0x10, 0x10, 0x0e, 0x01, 0x01, 0x1e],
        'T' => [0x1f, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0a, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0a],
        'X' => [0x11, 0x11, 0x0a, 0x04, 0x0a, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0a, 0x04, 0x04, 0x04],
        'Z' => [0x1f, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1f],
        '[' => [0x0e, 0x08, 0x08, 0x08, 0x08, 0x08, 0x0e],
        '\\' => [0x00, 0x10, 0x08, 0x04, 0x02, 0x01, 0x00],
        ']' => [0x0e, 0x02, 0x02, 0x02, 0x02, 0x02, 0x0e],
        '^' => [0x04, 0x0a, 0x11, 0x00, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1f],
        '`' => [0x08, 0x04, 0x02, 0x00, 0x00, 0x00, 0x00],
        'a' => [0x00, 0x00, 0x0e, 0x01, 0x0f, 0x11, 0x0f],
        'b' => [0x10, 0x10, 0x1e, 0x11, 0x11, 0x11, 0x1e],
        'c' => [0x00, 0x00, 0x0e, 0x10, 0x10, 0x11, 0x0e],
        'd' => [0x01, 0x01, 0x0f, 0x11, 0x11, 0x11, 0x0f],
        'e' => [0x00, 0x00, 0x0e, 0x11, 0x1f, 0x10, 0x0e],
        'f' => [0x06, 0x09, 0x08, 0x1c, 0x08, 0x08, 0x08],
        'g' => [0x00, 0x0f, 0x11, 0x11, 0x0f, 0x01, 0x0e],
        'h' => [0x10, 0x10, 0x1e, 0x11, 0x11, 0x11, 0x11],
        'i' => [0x04, 0x00, 0x0c, 0x04, 0x04, 0x04, 0x0e],
        'j' => [0x02, 0x00, 0x06, 0x02, 0x02, 0x12, 0x0c],
        'k' => [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12],
        'l' => [0x0c, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0e],
        'm' => [0x00, 0x00, 0x1a, 0x15, 0x15, 0x15, 0x15],
        'n' => [0x00, 0x00, 0x1e, 0x11, 0x11, 0x11, 0x11],
        'o' => [0x00, 0x00, 0x0e, 0x11, 0x11, 0x11, 0x0e],
        'p' => [0x00, 0x1e, 0x11, 0x11, 0x1e, 0x10, 0x10],
        'q' => [0x00, 0x0f, 0x11, 0x11, 0x0f, 0x01, 0x01],
        'r' => [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10],
        's' => [0x00, 0x00, 0x0f, 0x10, 0x0e, 0x01, 0x1e],
        't' => [0x08, 0x08, 0x1c, 0x08, 0x08, 0x09, 0x06],
        'u' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0d],
        'v' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x0a, 0x04],
        'w' => [0x00, 0x00, 0x11, 0x11, 0x15, 0x15, 0x0a],
        'x' => [0x00, 0x00, 0x11, 0x0a, 0x04, 0x0a, 0x11],
        'y' => [0x00, 0x11, 0x11, 0x11, 0x0f, 0x01, 0x0e],
        'z' => [0x00, 0x00, 0x1f, 0x02, 0x04, 0x08, 0x1f],
        '{' => [0x02, 0x04, 0x04, 0x08, 0x04, 0x04, 0x02],
        '|' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        '}' => [0x08, 0x04, 0x04, 0x02, 0x04, 0x04, 0x08],
        '~' => [0x00, 0x08, 0x15, 0x02, 0x00, 0x00, 0x00],
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{capture_to_virtual, VirtualTerminal};
    use crate::screen::{Cell, CellColor, Stage};

    fn vt_with(ch: char, fg: Rgb) -> VirtualTerminal {
        let mut stage = Stage::new(4, 2, false);
        stage.screen.set_rain_cell(
            1,
            0,
            Cell {
                ch,
                fg: CellColor::Rgb(fg),
            },
        );
        stage.redraw().unwrap();
        let mut vt = VirtualTerminal::new(4, 2);
        capture_to_virtual(&stage.screen, &mut vt);
        vt
    }

    fn count_fg(img: &RgbImage, fg: Rgb) -> usize {
        img.pixels()
            .filter(|p| p.0 == [fg.r, fg.g, fg.b])
            .count()
    }

    #[test]
    fn test_image_dimensions() {
        let vt = VirtualTerminal::new(10, 4);
        let img = rasterize(&vt, Rgb::new(0, 0, 0));
        assert_eq!(img.width(), 10 * CELL_W);
        assert_eq!(img.height(), 4 * CELL_H);
    }

    #[test]
    fn test_letter_renders_nonblank() {
        let fg = Rgb::new(10, 200, 30);
        let vt = vt_with('A', fg);
        let img = rasterize(&vt, Rgb::new(0, 0, 0));
        assert!(count_fg(&img, fg) > 10);
    }

    #[test]
    fn test_blank_grid_is_background_only() {
        let vt = VirtualTerminal::new(3, 3);
        let bg = Rgb::new(1, 2, 3);
        let img = rasterize(&vt, bg);
        assert_eq!(count_fg(&img, bg), (3 * CELL_W * 3 * CELL_H) as usize);
    }

    #[test]
    fn test_full_block_fills_cell() {
        let fg = Rgb::new(255, 255, 255);
        let vt = vt_with('█', fg);
        let img = rasterize(&vt, Rgb::new(0, 0, 0));
        assert_eq!(count_fg(&img, fg), (CELL_W * CELL_H) as usize);
    }

    #[test]
    fn test_shade_densities_are_ordered() {
        let fg = Rgb::new(255, 255, 255);
        let counts: Vec<usize> = ['░', '▒', '▓', '█']
            .iter()
            .map(|&ch| count_fg(&rasterize(&vt_with(ch, fg), Rgb::new(0, 0, 0)), fg))
            .collect();
        assert!(counts[0] < counts[1]);
        assert!(counts[1] < counts[2]);
        assert!(counts[2] < counts[3]);
    }

    #[test]
    fn test_horizontal_line_spans_cell_width() {
        let fg = Rgb::new(255, 255, 255);
        let vt = vt_with('─', fg);
        let img = rasterize(&vt, Rgb::new(0, 0, 0));
        let y = CELL_H / 2 - 1;
        for x in 0..CELL_W {
            assert_eq!(img.get_pixel(CELL_W + x, y).0, [255, 255, 255]);
        }
    }

    #[test]
    fn test_pseudo_glyphs_vary_by_codepoint() {
        assert_ne!(pseudo_glyph('ｱ'), pseudo_glyph('ｲ'));
    }
}
