//! Theme configuration: validation, merging, and color/timing lookups.
//!
//! A `Theme` is immutable once validated. `extend` produces a new merged
//! theme: objects merge recursively, arrays are replaced wholesale by the
//! override, scalars are overridden. The merged result is re-validated, so a
//! bad override fails the same way a bad base theme would.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 24-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#rrggbb` or `#rgb` hex string.
    pub fn from_hex(s: &str) -> Option<Rgb> {
        let hex = s.strip_prefix('#')?;
        match hex.len() {
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Rgb::new(r, g, b))
            }
            3 => {
                let d = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
                let (r, g, b) = (d(0)?, d(1)?, d(2)?);
                Some(Rgb::new(r * 17, g * 17, b * 17))
            }
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Scale brightness by `f` (clamped to 0..=1).
    pub fn scale(self, f: f32) -> Rgb {
        let f = f.clamp(0.0, 1.0);
        Rgb::new(
            (self.r as f32 * f) as u8,
            (self.g as f32 * f) as u8,
            (self.b as f32 * f) as u8,
        )
    }

    /// Linear interpolation between two colors.
    pub fn lerp(a: Rgb, b: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
        Rgb::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
    }
}

/// Fatal validation error naming the offending field.
#[derive(Debug, thiserror::Error)]
#[error("invalid theme: {field}: {message}")]
pub struct ThemeValidationError {
    pub field: String,
    pub message: String,
}

impl ThemeValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Non-fatal lookup error; callers recover by rendering unstyled.
#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error("unknown gradient '{0}'")]
    UnknownGradient(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThemeColors {
    pub primary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
    pub muted: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    #[default]
    Single,
    Double,
    Rounded,
    None,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct WindowStyle {
    #[serde(default)]
    pub border_style: BorderStyle,
    #[serde(default = "default_true")]
    pub shadow: bool,
    #[serde(default = "default_padding")]
    pub padding: u16,
}

impl Default for WindowStyle {
    fn default() -> Self {
        Self {
            border_style: BorderStyle::Single,
            shadow: true,
            padding: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Animations {
    /// Global speed factor for reveal animations; suspensions divide by it.
    #[serde(default = "default_reveal_speed")]
    pub reveal_speed: f32,
    /// Number of rain drops seeded on the screen.
    #[serde(default = "default_matrix_density")]
    pub matrix_density: u32,
    /// Scramble passes for the glitch reveal.
    #[serde(default = "default_glitch_iterations")]
    pub glitch_iterations: u32,
    /// Base delay between revealed lines, in milliseconds.
    #[serde(default = "default_line_delay")]
    pub line_delay_ms: u64,
    /// Rain tick period, in milliseconds.
    #[serde(default = "default_matrix_interval")]
    pub matrix_interval_ms: u64,
}

impl Default for Animations {
    fn default() -> Self {
        Self {
            reveal_speed: default_reveal_speed(),
            matrix_density: default_matrix_density(),
            glitch_iterations: default_glitch_iterations(),
            line_delay_ms: default_line_delay(),
            matrix_interval_ms: default_matrix_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_padding() -> u16 {
    1
}
fn default_reveal_speed() -> f32 {
    1.0
}
fn default_matrix_density() -> u32 {
    24
}
fn default_glitch_iterations() -> u32 {
    6
}
fn default_line_delay() -> u64 {
    80
}
fn default_matrix_interval() -> u64 {
    120
}
fn default_glyphs() -> String {
    "ｱｲｳｴｵｶｷｸｹｺｻｼｽｾｿﾀﾁﾂﾃﾄ0123456789".to_string()
}

/// A validated, immutable theme.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Theme {
    pub name: String,
    pub colors: ThemeColors,
    #[serde(default)]
    pub gradients: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_glyphs")]
    pub glyphs: String,
    #[serde(default)]
    pub animations: Animations,
    #[serde(default)]
    pub window: WindowStyle,
}

impl Theme {
    /// Parse and validate a theme from a JSON value.
    pub fn create(source: &Value) -> Result<Theme, ThemeValidationError> {
        let theme: Theme = serde_json::from_value(source.clone())
            .map_err(|e| ThemeValidationError::new("theme", e.to_string()))?;
        theme.validate()?;
        Ok(theme)
    }

    /// The built-in matrix-green theme.
    pub fn matrix() -> Theme {
        Theme {
            name: "matrix".to_string(),
            colors: ThemeColors {
                primary: "#00ff66".to_string(),
                accent: "#00e5ff".to_string(),
                background: "#000000".to_string(),
                text: "#c8facc".to_string(),
                muted: "#2e7d4f".to_string(),
                secondary: None,
            },
            gradients: BTreeMap::from([(
                "matrix".to_string(),
                vec!["#003b00".to_string(), "#00ff66".to_string(), "#ccffcc".to_string()],
            )]),
            glyphs: default_glyphs(),
            animations: Animations::default(),
            window: WindowStyle::default(),
        }
    }

    /// Deep-merge `overrides` onto this theme and re-validate.
    ///
    /// Objects merge recursively; arrays are replaced wholesale by the
    /// override; scalars are overridden. Chainable.
    pub fn extend(&self, overrides: &Value) -> Result<Theme, ThemeValidationError> {
        let mut base = serde_json::to_value(self)
            .map_err(|e| ThemeValidationError::new("theme", e.to_string()))?;
        deep_merge(&mut base, overrides);
        Theme::create(&base)
    }

    fn validate(&self) -> Result<(), ThemeValidationError> {
        check_hex("colors.primary", &self.colors.primary)?;
        check_hex("colors.accent", &self.colors.accent)?;
        check_hex("colors.background", &self.colors.background)?;
        check_hex("colors.text", &self.colors.text)?;
        check_hex("colors.muted", &self.colors.muted)?;
        if let Some(secondary) = &self.colors.secondary {
            check_hex("colors.secondary", secondary)?;
        }
        for (name, stops) in &self.gradients {
            if stops.len() < 2 {
                return Err(ThemeValidationError::new(
                    format!("gradients.{name}"),
                    format!("needs at least 2 colors, got {}", stops.len()),
                ));
            }
            for (i, stop) in stops.iter().enumerate() {
                check_hex(&format!("gradients.{name}[{i}]"), stop)?;
            }
        }
        if self.glyphs.is_empty() {
            return Err(ThemeValidationError::new("glyphs", "must not be empty"));
        }
        let a = &self.animations;
        if !(a.reveal_speed.is_finite() && a.reveal_speed > 0.0) {
            return Err(ThemeValidationError::new(
                "animations.reveal_speed",
                format!("must be > 0, got {}", a.reveal_speed),
            ));
        }
        if a.matrix_density < 1 {
            return Err(ThemeValidationError::new(
                "animations.matrix_density",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Map a semantic or built-in color token to a concrete color.
    ///
    /// Unknown tokens fall back to the theme text color; a missing
    /// `secondary` falls back the same way.
    pub fn resolve_color_token(&self, token: &str) -> Rgb {
        let text = Rgb::from_hex(&self.colors.text).unwrap_or(Rgb::WHITE);
        let hex = match token.to_ascii_lowercase().as_str() {
            "primary" => &self.colors.primary,
            "accent" => &self.colors.accent,
            "muted" => &self.colors.muted,
            "text" => &self.colors.text,
            "background" => &self.colors.background,
            "secondary" => match &self.colors.secondary {
                Some(s) => s,
                None => return text,
            },
            // Fixed built-in palette, independent of the theme.
            "green" => return Rgb::new(0x00, 0xff, 0x66),
            "orange" => return Rgb::new(0xff, 0x9f, 0x1c),
            "cyan" => return Rgb::new(0x00, 0xe5, 0xff),
            "pink" => return Rgb::new(0xff, 0x4e, 0xcd),
            "white" => return Rgb::WHITE,
            "gray" => return Rgb::new(0x80, 0x80, 0x80),
            _ => return text,
        };
        Rgb::from_hex(hex).unwrap_or(text)
    }

    /// Look up a gradient's stop list by name.
    pub fn gradient(&self, name: &str) -> Result<&[String], ThemeError> {
        self.gradients
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ThemeError::UnknownGradient(name.to_string()))
    }

    /// Sample a gradient at position `t` in 0..=1 with linear interpolation
    /// between evenly spaced stops.
    pub fn sample_gradient(&self, name: &str, t: f32) -> Result<Rgb, ThemeError> {
        let stops = self.gradient(name)?;
        let colors: Vec<Rgb> = stops
            .iter()
            .map(|s| Rgb::from_hex(s).unwrap_or(Rgb::WHITE))
            .collect();
        if colors.len() < 2 {
            return Ok(colors.first().copied().unwrap_or(Rgb::WHITE));
        }
        let t = t.clamp(0.0, 1.0);
        let span = (colors.len() - 1) as f32;
        let pos = t * span;
        let i = (pos.floor() as usize).min(colors.len() - 2);
        Ok(Rgb::lerp(colors[i], colors[i + 1], pos - i as f32))
    }

    /// A reveal suspension of `ms` milliseconds, scaled by `reveal_speed`.
    pub fn scale_delay(&self, ms: u64) -> Duration {
        Duration::from_millis(ms).div_f32(self.animations.reveal_speed)
    }

    pub fn line_delay_ms(&self) -> u64 {
        self.animations.line_delay_ms
    }

    pub fn matrix_interval(&self) -> Duration {
        Duration::from_millis(self.animations.matrix_interval_ms)
    }
}

fn check_hex(field: &str, value: &str) -> Result<(), ThemeValidationError> {
    if Rgb::from_hex(value).is_none() {
        return Err(ThemeValidationError::new(
            field,
            format!("'{value}' is not a valid hex color"),
        ));
    }
    Ok(())
}

/// Structural merge: objects recurse, everything else (arrays included) is
/// replaced by the override.
fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}
