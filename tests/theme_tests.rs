//! Theme resolver integration tests.

use glitchdeck::theme::{Rgb, Theme};
use serde_json::json;

#[test]
fn extend_replaces_gradient_arrays_wholesale() {
    let base = Theme::matrix()
        .extend(&json!({ "gradients": { "fire": ["#110000", "#ff3300"] } }))
        .unwrap();
    // Overriding with a different list must replace, never concatenate.
    let extended = base
        .extend(&json!({ "gradients": { "fire": ["#ffffff", "#000000"] } }))
        .unwrap();
    assert_eq!(
        extended.gradients["fire"],
        vec!["#ffffff".to_string(), "#000000".to_string()]
    );
    // Other gradients survive untouched.
    assert!(extended.gradients.contains_key("matrix"));
}

#[test]
fn extend_merges_scalars_and_objects() {
    let theme = Theme::matrix()
        .extend(&json!({
            "name": "custom",
            "colors": { "accent": "#ff00aa" },
            "animations": { "glitch_iterations": 2 }
        }))
        .unwrap();
    assert_eq!(theme.name, "custom");
    assert_eq!(theme.colors.accent, "#ff00aa");
    assert_eq!(theme.animations.glitch_iterations, 2);
    // Untouched fields keep their base values.
    assert_eq!(theme.colors.primary, Theme::matrix().colors.primary);
    assert_eq!(
        theme.animations.matrix_interval_ms,
        Theme::matrix().animations.matrix_interval_ms
    );
}

#[test]
fn extend_revalidates_the_merged_result() {
    let err = Theme::matrix()
        .extend(&json!({ "colors": { "muted": "#nothex" } }))
        .unwrap_err();
    assert_eq!(err.field, "colors.muted");
}

#[test]
fn validation_names_the_gradient_entry() {
    let err = Theme::matrix()
        .extend(&json!({ "gradients": { "bad": ["#ffffff", "oops"] } }))
        .unwrap_err();
    assert_eq!(err.field, "gradients.bad[1]");
}

#[test]
fn create_from_full_document() {
    let theme = Theme::create(&json!({
        "name": "neon",
        "colors": {
            "primary": "#ff0090",
            "accent": "#00e5ff",
            "background": "#10001a",
            "text": "#f0e0ff",
            "muted": "#5a4070",
            "secondary": "#ffe14d"
        },
        "gradients": { "sunset": ["#501478", "#ff3278", "#ff9632"] },
        "glyphs": "01",
        "animations": {
            "reveal_speed": 2.0,
            "matrix_density": 12,
            "glitch_iterations": 4,
            "line_delay_ms": 40,
            "matrix_interval_ms": 90
        },
        "window": { "border_style": "double", "shadow": false, "padding": 2 }
    }))
    .unwrap();
    assert_eq!(theme.animations.matrix_density, 12);
    assert_eq!(theme.window.padding, 2);
    assert_eq!(
        theme.resolve_color_token("secondary"),
        Rgb::from_hex("#ffe14d").unwrap()
    );
    assert_eq!(
        theme.sample_gradient("sunset", 0.0).unwrap(),
        Rgb::from_hex("#501478").unwrap()
    );
}

#[test]
fn builtin_palette_does_not_track_the_theme() {
    let a = Theme::matrix();
    let b = a
        .extend(&json!({ "colors": {
            "primary": "#111111", "accent": "#222222", "text": "#333333"
        } }))
        .unwrap();
    for token in ["green", "orange", "cyan", "pink", "white", "gray"] {
        assert_eq!(a.resolve_color_token(token), b.resolve_color_token(token));
    }
}
