//! Export orchestrator integration tests.
//!
//! These exercise the frame pipeline and the asciicast assembly without
//! invoking the external encoder.

use glitchdeck::deck::Deck;
use glitchdeck::export::{
    export_deck, record_deck, render_frames, ExportError, ExportOptions, ExportSession,
    RecordOptions,
};

fn deck(slides: usize) -> Deck {
    let slides: Vec<String> = (0..slides)
        .map(|i| {
            format!(
                r#"{{ "title": "Slide {i}", "transition": "instant", "body": "body {i}" }}"#
            )
        })
        .collect();
    let json = format!(
        r##"{{
            "theme": {{
                "name": "fast",
                "colors": {{
                    "primary": "#00ff66", "accent": "#00e5ff", "background": "#000000",
                    "text": "#c8facc", "muted": "#2e7d4f"
                }},
                "animations": {{ "line_delay_ms": 0, "glitch_iterations": 0, "matrix_density": 4 }}
            }},
            "slides": [{}]
        }}"##,
        slides.join(",")
    );
    Deck::from_json(&json).unwrap()
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn asciicast_has_one_line_per_slide_plus_header() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let deck = deck(3);
            let opts = RecordOptions {
                width: 40,
                height: 12,
                slide_time_secs: 2.0,
            };
            let cast = record_deck(&deck, &opts, Some(11)).await.unwrap();
            let text = cast.to_text();
            let lines: Vec<&str> = text.lines().collect();
            assert_eq!(lines.len(), 4, "header plus one frame per slide");

            let times: Vec<f64> = lines[1..]
                .iter()
                .map(|line| {
                    let event: serde_json::Value = serde_json::from_str(line).unwrap();
                    event[0].as_f64().unwrap()
                })
                .collect();
            assert_eq!(times, vec![0.0, 2.0, 4.0]);

            for line in &lines[1..] {
                let event: serde_json::Value = serde_json::from_str(line).unwrap();
                assert_eq!(event[1], "o");
                // Every frame opens with the clear/home escape.
                assert!(event[2].as_str().unwrap().starts_with("\u{1b}[2J\u{1b}[H"));
            }
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn frame_files_are_gapless_and_count_slides_times_fps_times_hold() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let deck = deck(2);
            let opts = ExportOptions {
                width: 20,
                height: 6,
                fps: 5,
                slide_time_secs: 1.0,
                quality: 80,
            };
            let mut session = ExportSession::new(opts.width, opts.height, opts.fps).unwrap();
            render_frames(&deck, &mut session, &opts, Some(3)).await.unwrap();

            // N * F * T frames, zero-padded and sequential with no gaps.
            assert_eq!(session.frame_count(), 2 * 5);
            for i in 0..session.frame_count() {
                let path = session.dir().join(format!("frame_{:06}.png", i));
                assert!(path.exists(), "missing frame {}", i);
            }
            assert!(!session
                .dir()
                .join(format!("frame_{:06}.png", session.frame_count()))
                .exists());
            session.close();
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn unsupported_extension_fails_before_any_work() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let deck = deck(1);
            let opts = ExportOptions {
                width: 20,
                height: 6,
                fps: 5,
                slide_time_secs: 1.0,
                quality: 80,
            };
            let result =
                export_deck(&deck, &opts, std::path::Path::new("out.webm"), Some(1)).await;
            assert!(matches!(
                result,
                Err(ExportError::UnsupportedOutputFormat(ext)) if ext == "webm"
            ));
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn frames_keep_rendering_while_slides_differ() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            // Frames from different slides should not be byte-identical:
            // slide content changes between holds.
            let deck = deck(2);
            let opts = ExportOptions {
                width: 24,
                height: 8,
                fps: 2,
                slide_time_secs: 1.0,
                quality: 80,
            };
            let mut session = ExportSession::new(opts.width, opts.height, opts.fps).unwrap();
            render_frames(&deck, &mut session, &opts, Some(5)).await.unwrap();
            let first = std::fs::read(session.dir().join("frame_000000.png")).unwrap();
            let last = std::fs::read(session.dir().join("frame_000003.png")).unwrap();
            assert_ne!(first, last);
            session.close();
        })
        .await;
}

#[test]
fn record_options_roundtrip_through_cast_dimensions() {
    let cast = glitchdeck::export::Asciicast::new(123, 45);
    let header: serde_json::Value =
        serde_json::from_str(cast.to_text().lines().next().unwrap()).unwrap();
    assert_eq!(header["width"], 123);
    assert_eq!(header["height"], 45);
}
