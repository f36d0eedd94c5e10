//! Gradient-colored block-glyph headers for slides with `big_text`.

use crate::theme::Theme;

const GLYPH_HEIGHT: usize = 5;

type BlockGlyph = [&'static str; GLYPH_HEIGHT];

/// Render `text` as block-glyph lines, one gradient sample per character
/// embedded as inline hex markup. An unknown gradient renders unstyled; no
/// gradient at all colors the header with the theme primary.
pub fn render(text: &str, gradient: Option<&str>, theme: &Theme) -> Vec<String> {
    let chars: Vec<char> = text
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let span = chars.len().saturating_sub(1).max(1) as f32;
    let mut rows = vec![String::new(); GLYPH_HEIGHT];
    for (i, ch) in chars.iter().enumerate() {
        let marker = match gradient {
            Some(name) => match theme.sample_gradient(name, i as f32 / span) {
                Ok(color) => Some(format!("^[{}]", color.to_hex())),
                Err(e) => {
                    log::debug!("big text falls back to unstyled: {}", e);
                    None
                }
            },
            None => Some("^[primary]".to_string()),
        };
        let glyph = block_glyph(*ch);
        for (row, pattern) in glyph.iter().enumerate() {
            if let Some(marker) = &marker {
                rows[row].push_str(marker);
            }
            for bit in pattern.chars() {
                rows[row].push(if bit == '1' { '█' } else { ' ' });
            }
            if i + 1 < chars.len() {
                rows[row].push(' ');
            }
        }
    }
    for row in &mut rows {
        if row.contains("^[") {
            row.push_str("^[/]");
        }
    }
    rows
}

fn block_glyph(ch: char) -> BlockGlyph {
    match ch {
        'A' => ["01110", "10001", "11111", "10001", "10001"],
        'B' => ["11110", "10001", "11110", "10001", "11110"],
        'C' => ["01111", "10000", "10000", "10000", "01111"],
        'D' => ["11110", "10001", "10001", "10001", "11110"],
        'E' => ["11111", "10000", "11110", "10000", "11111"],
        'F' => ["11111", "10000", "11110", "10000", "10000"],
        'G' => ["01111", "10000", "10111", "10001", "01111"],
        'H' => ["10001", "10001", "11111", "10001", "10001"],
        'I' => ["11111", "00100", "00100", "00100", "11111"],
        'J' => ["00111", "00010", "00010", "10010", "01100"],
        'K' => ["10001", "10010", "11100", "10010", "10001"],
        'L' => ["10000", "10000", "10000", "10000", "11111"],
        'M' => ["10001", "11011", "10101", "10001", "10001"],
        'N' => ["10001", "11001", "10101", "10011", "10001"],
        'O' => ["01110", "10001", "10001", "10001", "01110"],
        'P' => ["11110", "10001", "11110", "10000", "10000"],
        'Q' => ["01110", "10001", "10001", "10011", "01111"],
        'R' => ["11110", "10001", "11110", "10010", "10001"],
        'S' => ["01111", "10000", "01110", "00001", "11110"],
        'T' => ["11111", "00100", "00100", "00100", "00100"],
        'U' => ["10001", "10001", "10001", "10001", "01110"],
        'V' => ["10001", "10001", "10001", "01010", "00100"],
        'W' => ["10001", "10001", "10101", "11011", "10001"],
        'X' => ["10001", "01010", "00100", "01010", "10001"],
        'Y' => ["10001", "01010", "00100", "00100", "00100"],
        'Z' => ["11111", "00010", "00100", "01000", "11111"],
        '0' => ["01110", "10011", "10101", "11001", "01110"],
        '1' => ["00100", "01100", "00100", "00100", "01110"],
        '2' => ["01110", "10001", "00010", "00100", "11111"],
        '3' => ["11110", "00001", "00110", "00001", "11110"],
        '4' => ["00010", "00110", "01010", "11111", "00010"],
        '5' => ["11111", "10000", "11110", "00001", "11110"],
        '6' => ["01110", "10000", "11110", "10001", "01110"],
        '7' => ["11111", "00010", "00100", "01000", "01000"],
        '8' => ["01110", "10001", "01110", "10001", "01110"],
        '9' => ["01110", "10001", "01111", "00001", "01110"],
        '-' => ["00000", "00000", "11111", "00000", "00000"],
        '.' => ["00000", "00000", "00000", "00110", "00110"],
        '!' => ["00100", "00100", "00100", "00000", "00100"],
        '?' => ["01110", "10001", "00110", "00000", "00100"],
        ' ' => ["00000", "00000", "00000", "00000", "00000"],
        _ => ["11111", "10001", "10001", "10001", "11111"],
    }
}
