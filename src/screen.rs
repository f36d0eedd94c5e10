//! The shared screen grid, bordered windows, and the window stack.
//!
//! The `Screen` is the single shared mutable resource of a presentation
//! session. The matrix rain paints into a background layer; windows are
//! blitted on top of it, in stack order, on every redraw. All mutation
//! happens on one cooperative scheduler, so the grid lives behind a plain
//! `Rc<RefCell<Stage>>` with borrows never held across an await.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::theme::{BorderStyle, Rgb, Theme};

/// Foreground attribute of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellColor {
    /// Terminal default foreground.
    #[default]
    Default,
    /// An index into the 256-color palette.
    Indexed(u8),
    /// A direct 24-bit color.
    Rgb(Rgb),
}

/// A single character cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: CellColor,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: CellColor::Default,
        }
    }
}

/// Errors from the draw primitives.
#[derive(Debug)]
pub enum ScreenError {
    /// The screen was destroyed; the draw was refused.
    Destroyed,
    /// The window no longer exists (the stack was cleared under it).
    NoSuchWindow(usize),
    /// Writing to the live terminal failed.
    Io(io::Error),
}

impl std::fmt::Display for ScreenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreenError::Destroyed => write!(f, "screen has been destroyed"),
            ScreenError::NoSuchWindow(id) => write!(f, "window {} no longer exists", id),
            ScreenError::Io(e) => write!(f, "terminal write failed: {}", e),
        }
    }
}

impl std::error::Error for ScreenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScreenError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ScreenError {
    fn from(e: io::Error) -> Self {
        ScreenError::Io(e)
    }
}

/// The bounded character grid.
pub struct Screen {
    width: u16,
    height: u16,
    /// Background layer owned by the matrix rain.
    rain: Vec<Cell>,
    /// Composited output of the last redraw.
    frame: Vec<Cell>,
    repaints: u64,
    alive: bool,
}

impl Screen {
    pub fn new(width: u16, height: u16) -> Self {
        let len = (width as usize) * (height as usize);
        Self {
            width,
            height,
            rain: vec![Cell::default(); len],
            frame: vec![Cell::default(); len],
            repaints: 0,
            alive: true,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Number of composites performed since creation.
    pub fn repaints(&self) -> u64 {
        self.repaints
    }

    /// Mark the screen dead. Subsequent draws fail with `Destroyed`.
    pub fn destroy(&mut self) {
        self.alive = false;
    }

    #[inline]
    fn idx(&self, x: u16, y: u16) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize) * (self.width as usize) + (x as usize))
    }

    /// Composited cell at `(x, y)`, if in bounds.
    pub fn cell(&self, x: u16, y: u16) -> Option<Cell> {
        self.idx(x, y).map(|i| self.frame[i])
    }

    /// Reset the rain layer to blank cells.
    pub fn clear_rain(&mut self) {
        self.rain.fill(Cell::default());
    }

    /// Paint one cell of the rain layer. Out-of-bounds writes are ignored.
    pub fn set_rain_cell(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(i) = self.idx(x, y) {
            self.rain[i] = cell;
        }
    }

    fn put(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(i) = self.idx(x, y) {
            self.frame[i] = cell;
        }
    }

    /// Recomposite the frame: rain layer first, then every window in stack
    /// order as an opaque region.
    pub fn composite(&mut self, stack: &WindowStack) -> Result<(), ScreenError> {
        if !self.alive {
            return Err(ScreenError::Destroyed);
        }
        self.frame.copy_from_slice(&self.rain);
        for window in &stack.windows {
            self.blit_window(window);
        }
        self.repaints += 1;
        Ok(())
    }

    fn blit_window(&mut self, win: &Window) {
        let style = win.theme.window;
        let border = if style.border_style == BorderStyle::None { 0 } else { 1 };

        if style.shadow {
            let shade = Cell {
                ch: '░',
                fg: CellColor::Indexed(238),
            };
            for yy in 1..=win.height {
                self.put(win.x + win.width, win.y + yy, shade);
            }
            for xx in 1..=win.width {
                self.put(win.x + xx, win.y + win.height, shade);
            }
        }

        for yy in win.y..win.y.saturating_add(win.height) {
            for xx in win.x..win.x.saturating_add(win.width) {
                self.put(xx, yy, Cell::default());
            }
        }

        if border == 1 {
            self.blit_border(win);
        }

        let pad = style.padding;
        let inner_x = win.x + border + pad;
        let inner_y = win.y + border + pad;
        let inner_w = win.width.saturating_sub(2 * (border + pad));
        let inner_h = win.height.saturating_sub(2 * (border + pad));

        let styled = parse_markup(&win.content, &win.theme);
        let mut row = 0u16;
        let mut col = 0u16;
        for (ch, color) in styled {
            if ch == '\n' {
                row += 1;
                col = 0;
                continue;
            }
            if row < inner_h && col < inner_w {
                self.put(inner_x + col, inner_y + row, Cell { ch, fg: color });
            }
            col += 1;
        }
    }

    fn blit_border(&mut self, win: &Window) {
        let (tl, tr, bl, br, horiz, vert) = match win.theme.window.border_style {
            BorderStyle::Single => ('┌', '┐', '└', '┘', '─', '│'),
            BorderStyle::Double => ('╔', '╗', '╚', '╝', '═', '║'),
            BorderStyle::Rounded => ('╭', '╮', '╰', '╯', '─', '│'),
            BorderStyle::None => return,
        };
        let fg = CellColor::Rgb(win.theme.resolve_color_token("accent"));
        let right = win.x + win.width - 1;
        let bottom = win.y + win.height - 1;
        for xx in win.x + 1..right {
            self.put(xx, win.y, Cell { ch: horiz, fg });
            self.put(xx, bottom, Cell { ch: horiz, fg });
        }
        for yy in win.y + 1..bottom {
            self.put(win.x, yy, Cell { ch: vert, fg });
            self.put(right, yy, Cell { ch: vert, fg });
        }
        self.put(win.x, win.y, Cell { ch: tl, fg });
        self.put(right, win.y, Cell { ch: tr, fg });
        self.put(win.x, bottom, Cell { ch: bl, fg });
        self.put(right, bottom, Cell { ch: br, fg });
    }
}

/// Handle to a window in the stack. Invalidated when the stack is cleared.
pub type WindowId = usize;

/// Placement request for a new window.
#[derive(Debug, Clone, Copy)]
pub struct WindowOptions {
    /// Outer width including border.
    pub width: u16,
    /// Outer height including border.
    pub height: u16,
    /// Fixed top row; centered vertically when absent.
    pub row: Option<u16>,
}

/// A bordered content region on the screen.
pub struct Window {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    content: String,
    theme: Theme,
}

impl Window {
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Windows in creation order; cleared wholesale between slides.
#[derive(Default)]
pub struct WindowStack {
    windows: Vec<Window>,
}

impl WindowStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Allocate a bordered region, offset by the current stack depth so
    /// successive windows cascade like stacked cards.
    pub fn create_window(
        &mut self,
        screen: &Screen,
        theme: &Theme,
        options: WindowOptions,
    ) -> WindowId {
        let depth = self.windows.len() as u16;
        let width = options.width.min(screen.width());
        let height = options.height.min(screen.height());
        let base_x = (screen.width() - width) / 2;
        let base_y = options
            .row
            .unwrap_or((screen.height() - height) / 2);
        let x = (base_x + depth * 2).min(screen.width().saturating_sub(width));
        let y = (base_y + depth).min(screen.height().saturating_sub(height));
        self.windows.push(Window {
            x,
            y,
            width,
            height,
            content: String::new(),
            theme: theme.clone(),
        });
        self.windows.len() - 1
    }

    /// Replace a window's content. Fails if the stack was cleared under the
    /// caller.
    pub fn set_content(&mut self, id: WindowId, content: String) -> Result<(), ScreenError> {
        match self.windows.get_mut(id) {
            Some(win) => {
                win.content = content;
                Ok(())
            }
            None => Err(ScreenError::NoSuchWindow(id)),
        }
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(id)
    }

    /// Destroy every window. Must run exactly once between slides so no
    /// stale window survives into the next slide's render.
    pub fn clear(&mut self) {
        self.windows.clear();
    }
}

/// The screen and its window stack, shared across the renderer, the
/// transition engine, and the rain ticker.
pub struct Stage {
    pub screen: Screen,
    pub stack: WindowStack,
    live: bool,
}

pub type SharedStage = Rc<RefCell<Stage>>;

impl Stage {
    pub fn new(width: u16, height: u16, live: bool) -> Self {
        Self {
            screen: Screen::new(width, height),
            stack: WindowStack::new(),
            live,
        }
    }

    pub fn shared(width: u16, height: u16, live: bool) -> SharedStage {
        Rc::new(RefCell::new(Stage::new(width, height, live)))
    }

    /// Recomposite, and repaint the live terminal when presenting.
    pub fn redraw(&mut self) -> Result<(), ScreenError> {
        self.screen.composite(&self.stack)?;
        if self.live {
            let text = crate::capture::capture_to_ansi(&self.screen, self.screen.height());
            let mut out = io::stdout().lock();
            out.write_all(b"\x1b[?25l")?;
            out.write_all(text.as_bytes())?;
            out.flush()?;
        }
        Ok(())
    }
}

/// One lexed unit of window content.
enum Token {
    Char(char),
    Marker(String),
}

/// Lex inline markup. `^[…]` delimits a color marker, `^^` escapes a caret;
/// anything malformed (no closing bracket before a newline or the end of
/// input) is passed through literally.
fn tokenize(text: &str) -> Vec<Token> {
    let mut out = Vec::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch != '^' {
            out.push(Token::Char(ch));
            i += 1;
            continue;
        }
        match chars.get(i + 1) {
            Some('^') => {
                out.push(Token::Char('^'));
                i += 2;
            }
            Some('[') => {
                let mut j = i + 2;
                while j < chars.len() && chars[j] != ']' && chars[j] != '\n' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    out.push(Token::Marker(chars[i + 2..j].iter().collect()));
                    i = j + 1;
                } else {
                    out.push(Token::Char('^'));
                    i += 1;
                }
            }
            _ => {
                out.push(Token::Char('^'));
                i += 1;
            }
        }
    }
    out
}

/// Resolve markup into styled characters. An unresolvable marker drops the
/// style back to the default (unstyled text) rather than failing.
pub fn parse_markup(text: &str, theme: &Theme) -> Vec<(char, CellColor)> {
    let mut out = Vec::new();
    let mut current = CellColor::Default;
    for token in tokenize(text) {
        match token {
            Token::Char(ch) => out.push((ch, current)),
            Token::Marker(marker) => current = resolve_marker(&marker, theme),
        }
    }
    out
}

fn resolve_marker(marker: &str, theme: &Theme) -> CellColor {
    let marker = marker.trim();
    if marker.is_empty() || marker == "/" {
        return CellColor::Default;
    }
    if marker.starts_with('#') {
        return match Rgb::from_hex(marker) {
            Some(rgb) => CellColor::Rgb(rgb),
            None => CellColor::Default,
        };
    }
    if marker.chars().all(|c| c.is_ascii_digit()) {
        return match marker.parse::<u8>() {
            Ok(n) => CellColor::Indexed(n),
            Err(_) => CellColor::Default,
        };
    }
    if marker.chars().all(|c| c.is_ascii_alphabetic()) {
        return CellColor::Rgb(theme.resolve_color_token(marker));
    }
    CellColor::Default
}

/// Strip markup, leaving only the characters that occupy cells.
pub fn strip_markup(text: &str) -> String {
    tokenize(text)
        .into_iter()
        .filter_map(|t| match t {
            Token::Char(ch) => Some(ch),
            Token::Marker(_) => None,
        })
        .collect()
}

/// Widest visible line of a markup string.
pub fn visible_width(text: &str) -> usize {
    strip_markup(text)
        .split('\n')
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme() -> Theme {
        Theme::matrix()
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("^[primary]hi^[/] there"), "hi there");
        assert_eq!(strip_markup("no markup"), "no markup");
    }

    #[test]
    fn test_markup_escape_caret() {
        assert_eq!(strip_markup("a^^b"), "a^b");
    }

    #[test]
    fn test_markup_malformed_is_literal() {
        assert_eq!(strip_markup("x^[abc"), "x^[abc");
        assert_eq!(strip_markup("x^!"), "x^!");
    }

    #[test]
    fn test_parse_markup_colors() {
        let t = theme();
        let styled = parse_markup("^[#ff0000]a^[/]b", &t);
        assert_eq!(styled[0], ('a', CellColor::Rgb(Rgb::new(255, 0, 0))));
        assert_eq!(styled[1], ('b', CellColor::Default));
    }

    #[test]
    fn test_parse_markup_indexed() {
        let styled = parse_markup("^[196]x", &theme());
        assert_eq!(styled[0], ('x', CellColor::Indexed(196)));
    }

    #[test]
    fn test_parse_markup_unresolvable_is_unstyled() {
        let styled = parse_markup("^[#zz]a", &theme());
        assert_eq!(styled[0], ('a', CellColor::Default));
        let styled = parse_markup("^[999]a", &theme());
        assert_eq!(styled[0], ('a', CellColor::Default));
    }

    #[test]
    fn test_visible_width_multiline() {
        assert_eq!(visible_width("ab\n^[primary]cdef^[/]\ng"), 4);
    }

    #[test]
    fn test_window_cascade_offset() {
        let screen = Screen::new(80, 24);
        let t = theme();
        let mut stack = WindowStack::new();
        let opts = WindowOptions {
            width: 20,
            height: 6,
            row: Some(2),
        };
        let first = stack.create_window(&screen, &t, opts);
        let second = stack.create_window(&screen, &t, opts);
        let (w1, w2) = (stack.window(first).unwrap(), stack.window(second).unwrap());
        assert_eq!(w2.x, w1.x + 2);
        assert_eq!(w2.y, w1.y + 1);
    }

    #[test]
    fn test_stack_clear_invalidates_windows() {
        let screen = Screen::new(40, 12);
        let mut stack = WindowStack::new();
        let id = stack.create_window(
            &screen,
            &theme(),
            WindowOptions {
                width: 10,
                height: 4,
                row: None,
            },
        );
        stack.clear();
        assert!(stack.is_empty());
        assert!(matches!(
            stack.set_content(id, "late".to_string()),
            Err(ScreenError::NoSuchWindow(_))
        ));
    }

    #[test]
    fn test_window_is_opaque_over_rain() {
        let mut stage = Stage::new(40, 12, false);
        for y in 0..12 {
            for x in 0..40 {
                stage.screen.set_rain_cell(
                    x,
                    y,
                    Cell {
                        ch: 'ｱ',
                        fg: CellColor::Rgb(Rgb::new(0, 255, 0)),
                    },
                );
            }
        }
        let id = stage.stack.create_window(
            &stage.screen,
            &theme(),
            WindowOptions {
                width: 10,
                height: 5,
                row: Some(2),
            },
        );
        stage.stack.set_content(id, "hi".to_string()).unwrap();
        stage.redraw().unwrap();
        let win_x = stage.stack.window(id).unwrap().x;
        // Interior cell of the window: rain replaced by window fill/content.
        let cell = stage.screen.cell(win_x + 1, 3).unwrap();
        assert_ne!(cell.ch, 'ｱ');
        // Outside the window the rain is visible.
        let outside = stage.screen.cell(0, 0).unwrap();
        assert_eq!(outside.ch, 'ｱ');
    }

    #[test]
    fn test_composite_renders_content_and_border() {
        let mut stage = Stage::new(40, 12, false);
        let id = stage.stack.create_window(
            &stage.screen,
            &theme(),
            WindowOptions {
                width: 12,
                height: 6,
                row: Some(1),
            },
        );
        stage.stack.set_content(id, "ok".to_string()).unwrap();
        stage.redraw().unwrap();
        let win = stage.stack.window(id).unwrap();
        let (x, y) = (win.x, win.y);
        assert_eq!(stage.screen.cell(x, y).unwrap().ch, '┌');
        // Content starts after border + padding.
        assert_eq!(stage.screen.cell(x + 2, y + 2).unwrap().ch, 'o');
        assert_eq!(stage.screen.cell(x + 3, y + 2).unwrap().ch, 'k');
    }

    #[test]
    fn test_destroyed_screen_refuses_draws() {
        let mut stage = Stage::new(20, 8, false);
        stage.screen.destroy();
        assert!(matches!(stage.redraw(), Err(ScreenError::Destroyed)));
    }

    #[test]
    fn test_repaint_counter_increments() {
        let mut stage = Stage::new(20, 8, false);
        assert_eq!(stage.screen.repaints(), 0);
        stage.redraw().unwrap();
        stage.redraw().unwrap();
        assert_eq!(stage.screen.repaints(), 2);
    }
}
