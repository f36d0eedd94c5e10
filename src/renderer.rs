//! The renderer owns the shared stage, the theme, the randomness source,
//! and the rain ticker for one presentation session.
//!
//! Multiple renderers can coexist: every piece of ambient state (timers,
//! rng, screen) is owned here rather than global.

use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::bigtext;
use crate::deck::Slide;
use crate::rain::{self, MatrixRain, RainHandle};
use crate::screen::{visible_width, ScreenError, SharedStage, Stage, WindowOptions};
use crate::theme::{Theme, ThemeValidationError};
use crate::transition::{self, Transition};

/// Errors from rendering one slide.
#[derive(Debug)]
pub enum RenderError {
    Screen(ScreenError),
    Theme(ThemeValidationError),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Screen(e) => write!(f, "draw failed: {}", e),
            RenderError::Theme(e) => write!(f, "slide theme override rejected: {}", e),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Screen(e) => Some(e),
            RenderError::Theme(e) => Some(e),
        }
    }
}

impl From<ScreenError> for RenderError {
    fn from(e: ScreenError) -> Self {
        RenderError::Screen(e)
    }
}

impl From<ThemeValidationError> for RenderError {
    fn from(e: ThemeValidationError) -> Self {
        RenderError::Theme(e)
    }
}

pub struct Renderer {
    stage: SharedStage,
    theme: Theme,
    rng: SmallRng,
    rain: Option<RainHandle>,
}

impl Renderer {
    /// Create a renderer over a fresh screen. `live` repaints the real
    /// terminal on every redraw; a seed makes the animations reproducible.
    pub fn new(width: u16, height: u16, theme: Theme, live: bool, seed: Option<u64>) -> Renderer {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Renderer {
            stage: Stage::shared(width, height, live),
            theme,
            rng,
            rain: None,
        }
    }

    pub fn stage(&self) -> &SharedStage {
        &self.stage
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn dimensions(&self) -> (u16, u16) {
        let stage = self.stage.borrow();
        (stage.screen.width(), stage.screen.height())
    }

    /// Start the background rain ticker. Must run inside a `LocalSet`.
    /// A second call is a no-op.
    pub fn start_rain(&mut self) {
        if self.rain.is_some() {
            return;
        }
        let (width, height) = self.dimensions();
        let state = MatrixRain::init(width, height, &self.theme, &mut self.rng);
        let ticker_rng = SmallRng::seed_from_u64(self.rng.random());
        self.rain = Some(rain::spawn_ticker(
            Rc::clone(&self.stage),
            state,
            self.theme.clone(),
            ticker_rng,
        ));
    }

    /// Render one slide: clear the previous slide's windows, apply the
    /// slide's theme override, create its windows, and run the reveal.
    pub async fn render_slide(&mut self, slide: &Slide) -> Result<(), RenderError> {
        let theme = match &slide.frontmatter.theme_override {
            Some(overrides) => self.theme.extend(overrides)?,
            None => self.theme.clone(),
        };

        {
            let mut stage = self.stage.borrow_mut();
            stage.stack.clear();
            stage.redraw()?;
        }

        let (screen_w, screen_h) = self.dimensions();
        let chrome = 2 * (1 + theme.window.padding);
        let mut body_row = None;

        if let Some(big) = &slide.frontmatter.big_text {
            let lines = bigtext::render(big, slide.frontmatter.gradient.as_deref(), &theme);
            let content = lines.join("\n");
            let opts = WindowOptions {
                width: (visible_width(&content) as u16 + chrome).min(screen_w),
                height: (lines.len() as u16 + chrome).min(screen_h),
                row: Some(1),
            };
            let header = {
                let mut stage = self.stage.borrow_mut();
                let stage = &mut *stage;
                stage.stack.create_window(&stage.screen, &theme, opts)
            };
            transition::reveal(
                &self.stage,
                &theme,
                &mut self.rng,
                header,
                &content,
                Transition::Instant,
            )
            .await?;
            body_row = Some((1 + opts.height + 1).min(screen_h.saturating_sub(1)));
        }

        let content = compose_body(slide);
        let opts = WindowOptions {
            width: (visible_width(&content) as u16 + chrome).min(screen_w),
            height: (content.split('\n').count() as u16 + chrome).min(screen_h),
            row: body_row,
        };
        let body = {
            let mut stage = self.stage.borrow_mut();
            let stage = &mut *stage;
            stage.stack.create_window(&stage.screen, &theme, opts)
        };
        let mode = Transition::from_name(&slide.frontmatter.transition);
        transition::reveal(&self.stage, &theme, &mut self.rng, body, &content, mode).await?;
        Ok(())
    }

    /// Recomposite and repaint without touching window content. Keeps the
    /// rain animating on held frames during export.
    pub fn force_redraw(&self) -> Result<(), ScreenError> {
        self.stage.borrow_mut().redraw()
    }

    /// Stop the rain ticker and destroy the screen. A transition still
    /// suspended at teardown resumes, fails its next draw, and the slide
    /// loop swallows that error.
    pub fn teardown(&mut self) {
        if let Some(rain) = self.rain.take() {
            rain.stop();
        }
        self.stage.borrow_mut().screen.destroy();
    }
}

/// Title, body, and optional meta line, with semantic color markup.
fn compose_body(slide: &Slide) -> String {
    let mut lines = Vec::new();
    lines.push(format!("^[accent]{}^[/]", slide.frontmatter.title));
    lines.push(String::new());
    lines.extend(slide.body.split('\n').map(str::to_string));
    if let Some(meta) = &slide.frontmatter.meta {
        lines.push(String::new());
        lines.push(format!("^[muted]{}^[/]", meta));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{Deck, Frontmatter};

    fn slide(transition: &str) -> Slide {
        Slide {
            frontmatter: Frontmatter {
                title: "Test".to_string(),
                big_text: None,
                gradient: None,
                theme_override: None,
                transition: transition.to_string(),
                meta: None,
            },
            body: "hello\nworld".to_string(),
            notes: None,
            index: 0,
        }
    }

    fn fast_theme() -> Theme {
        Theme::matrix()
            .extend(&serde_json::json!({
                "animations": { "line_delay_ms": 0, "glitch_iterations": 1 }
            }))
            .unwrap()
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_stack_alternates_between_slides() {
        let mut renderer = Renderer::new(60, 20, fast_theme(), false, Some(1));
        renderer.render_slide(&slide("instant")).await.unwrap();
        assert_eq!(renderer.stage().borrow().stack.len(), 1);
        renderer.render_slide(&slide("instant")).await.unwrap();
        // Still exactly one slide's windows, never an accumulation.
        assert_eq!(renderer.stage().borrow().stack.len(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_big_text_slide_creates_two_windows() {
        let mut renderer = Renderer::new(80, 24, fast_theme(), false, Some(1));
        let mut s = slide("instant");
        s.frontmatter.big_text = Some("HI".to_string());
        s.frontmatter.gradient = Some("matrix".to_string());
        renderer.render_slide(&s).await.unwrap();
        assert_eq!(renderer.stage().borrow().stack.len(), 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_slide_theme_override_applies() {
        let mut renderer = Renderer::new(60, 20, fast_theme(), false, Some(1));
        let mut s = slide("instant");
        s.frontmatter.theme_override =
            Some(serde_json::json!({ "colors": { "primary": "not-a-color" } }));
        assert!(matches!(
            renderer.render_slide(&s).await,
            Err(RenderError::Theme(_))
        ));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_render_after_teardown_fails() {
        let mut renderer = Renderer::new(60, 20, fast_theme(), false, Some(1));
        renderer.teardown();
        assert!(matches!(
            renderer.render_slide(&slide("instant")).await,
            Err(RenderError::Screen(ScreenError::Destroyed))
        ));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_final_content_matches_for_all_transitions() {
        for mode in ["instant", "glitch", "fade", "typewriter"] {
            let mut renderer = Renderer::new(60, 20, fast_theme(), false, Some(9));
            renderer.render_slide(&slide(mode)).await.unwrap();
            let stage = renderer.stage().borrow();
            let window = stage.stack.window(0).unwrap();
            assert!(
                window.content().contains("hello\nworld"),
                "{mode} should leave the final content in place"
            );
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_renderers_do_not_interfere() {
        let mut a = Renderer::new(60, 20, fast_theme(), false, Some(1));
        let mut b = Renderer::new(40, 12, fast_theme(), false, Some(2));
        a.render_slide(&slide("glitch")).await.unwrap();
        b.render_slide(&slide("fade")).await.unwrap();
        a.teardown();
        // Tearing one down leaves the other fully usable.
        b.render_slide(&slide("instant")).await.unwrap();
        assert_eq!(b.stage().borrow().stack.len(), 1);
    }

    #[test]
    fn test_deck_loads_for_renderer() {
        let deck = Deck::from_json(
            r#"{ "slides": [{ "title": "a", "body": "b", "transition": "fade" }] }"#,
        )
        .unwrap();
        assert_eq!(deck.slides.len(), 1);
    }
}
