// ============================================================================
// CONFIG — painter setup and brush control state (JSON via serde)
// ============================================================================

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PainterError, PainterResult};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::stroke::StrokeSettings;

/// Blur taps per side are capped by the blur program's weight table.
pub const MAX_BLUR_RADIUS: u32 = 32;

/// Process-level painter configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PainterConfig {
    pub history_limit: usize,
    pub max_blur_radius: u32,
    /// "high performance" / "discrete" or "low power" / "integrated".
    pub power_preference: String,
    pub force_fallback_adapter: bool,
    /// Format of the visible surface the present pass writes to.
    pub present_format: String,
    pub frame_interval_ms: u64,
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_blur_radius: MAX_BLUR_RADIUS,
            power_preference: "high performance".to_string(),
            force_fallback_adapter: false,
            present_format: "rgba8unorm".to_string(),
            frame_interval_ms: 16,
        }
    }
}

impl PainterConfig {
    pub fn load(path: &Path) -> PainterResult<Self> {
        load_json(path)
    }

    pub fn power_preference(&self) -> wgpu::PowerPreference {
        match self.power_preference.to_lowercase().as_str() {
            "low power" | "integrated" => wgpu::PowerPreference::LowPower,
            _ => wgpu::PowerPreference::HighPerformance,
        }
    }

    /// Unknown names fall back to `Rgba8Unorm`.
    pub fn present_format(&self) -> wgpu::TextureFormat {
        match self.present_format.to_lowercase().as_str() {
            "bgra8unorm" => wgpu::TextureFormat::Bgra8Unorm,
            "bgra8unorm-srgb" => wgpu::TextureFormat::Bgra8UnormSrgb,
            "rgba8unorm-srgb" => wgpu::TextureFormat::Rgba8UnormSrgb,
            _ => wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    pub fn blur_radius_cap(&self) -> u32 {
        self.max_blur_radius.clamp(1, MAX_BLUR_RADIUS)
    }
}

/// Control-panel state in CSS pixels.  `to_stroke_settings` converts to
/// device pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushControls {
    pub blur: f32,
    pub saturation: f32,
    pub hue_offset: f32,
    pub strokes_number: u32,
    pub line_width: f32,
    pub line_decay: f32,
    pub offset_weight: f32,
    pub previous_offset_multiplier: f32,
    /// `#rrggbb`
    pub color: String,
    pub hue_randomize: f32,
    pub blur_jitter: f32,
}

impl Default for BrushControls {
    fn default() -> Self {
        Self {
            blur: 6.0,
            saturation: 1.0,
            hue_offset: 0.0,
            strokes_number: 10,
            line_width: 8.0,
            line_decay: 0.5,
            offset_weight: 50.0,
            previous_offset_multiplier: 0.8,
            color: "#d7e7ff".to_string(),
            hue_randomize: 40.0,
            blur_jitter: 0.2,
        }
    }
}

impl BrushControls {
    pub fn load(path: &Path) -> PainterResult<Self> {
        load_json(path)
    }

    /// Pixel-valued fields are multiplied by `scale` (device pixel ratio).
    pub fn to_stroke_settings(&self, scale: f32) -> PainterResult<StrokeSettings> {
        let color = parse_hex_color(&self.color).ok_or_else(|| PainterError::Config {
            path: "<brush>".into(),
            message: format!("bad color {:?}", self.color),
        })?;
        Ok(StrokeSettings {
            segment_count: self.strokes_number.max(1),
            base_line_width: self.line_width * scale,
            line_decay: self.line_decay.max(0.0),
            offset_weight: self.offset_weight * scale,
            previous_offset_multiplier: self.previous_offset_multiplier,
            color,
            hue_randomize: self.hue_randomize,
            blur_sigma_px: self.blur * scale,
            blur_jitter: self.blur_jitter.clamp(0.0, 1.0),
        })
    }
}

/// `#rrggbb` (leading `#` optional) to straight RGBA with alpha 1.
pub fn parse_hex_color(hex: &str) -> Option<[f32; 4]> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some([
        channel(0)? as f32 / 255.0,
        channel(2)? as f32 / 255.0,
        channel(4)? as f32 / 255.0,
        1.0,
    ])
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> PainterResult<T> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| PainterError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("#ff0000"), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(parse_hex_color("00FF00"), Some([0.0, 1.0, 0.0, 1.0]));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn controls_scale_pixel_fields_only() {
        let controls = BrushControls::default();
        let s = controls.to_stroke_settings(2.0).unwrap();
        assert_eq!(s.base_line_width, 16.0);
        assert_eq!(s.offset_weight, 100.0);
        assert_eq!(s.blur_sigma_px, 12.0);
        assert_eq!(s.line_decay, 0.5);
        assert_eq!(s.previous_offset_multiplier, 0.8);
        assert_eq!(s.segment_count, 10);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let cfg: PainterConfig = serde_json::from_str(r#"{ "history_limit": 3 }"#).unwrap();
        assert_eq!(cfg.history_limit, 3);
        assert_eq!(cfg.max_blur_radius, MAX_BLUR_RADIUS);

        let brush: BrushControls = serde_json::from_str(r##"{ "color": "#102030" }"##).unwrap();
        assert_eq!(brush.strokes_number, 10);
        assert_eq!(brush.color, "#102030");
    }

    #[test]
    fn config_maps_gpu_enums() {
        let cfg = PainterConfig {
            power_preference: "Low Power".into(),
            present_format: "bgra8unorm".into(),
            max_blur_radius: 500,
            ..Default::default()
        };
        assert_eq!(cfg.power_preference(), wgpu::PowerPreference::LowPower);
        assert_eq!(cfg.present_format(), wgpu::TextureFormat::Bgra8Unorm);
        assert_eq!(cfg.blur_radius_cap(), MAX_BLUR_RADIUS);
    }

    #[test]
    fn bad_color_is_config_error() {
        let controls = BrushControls {
            color: "blue".into(),
            ..Default::default()
        };
        assert!(matches!(
            controls.to_stroke_settings(1.0),
            Err(PainterError::Config { .. })
        ));
    }
}
