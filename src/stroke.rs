// ============================================================================
// STROKE GENERATOR — procedural random-walk geometry for ink-stroke stamps
// ============================================================================
//
// One drag sample becomes `segment_count` capsule stamps.  Each segment walks
// from the previous point by a random offset plus a decaying "momentum" that
// carries earlier offsets forward, which is what bends the strokes into arcs.
// Widths taper stochastically.  The random source is always supplied by the
// caller so tests can seed it.
// ============================================================================

use bytemuck::{Pod, Zeroable};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Segments shorter than this are skipped (their angle would be NaN).
pub const DEGENERATE_SEGMENT_PX: f32 = 1e-4;

/// Stamps are never emitted thinner than this, whatever the decay did.
pub const MIN_STAMP_WIDTH_PX: f32 = 0.5;

/// Strength of the red/blue vs. green push used as a cheap hue jitter.
const HUE_TINT_STRENGTH: f32 = 0.06;

/// Brush parameters for a single paint call.  Built fresh by the caller from
/// live control state; pixel-valued fields are already device-pixel scaled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeSettings {
    pub segment_count: u32,
    pub base_line_width: f32,
    /// Fraction of width lost per segment (scaled by a random roll / 3).
    pub line_decay: f32,
    /// Magnitude of the random per-segment wobble, in pixels.
    pub offset_weight: f32,
    /// Momentum carry-over factor, typically 0..1.2.
    pub previous_offset_multiplier: f32,
    /// Straight RGBA, 0..1.  Alpha is stroke opacity.
    pub color: [f32; 4],
    /// ± hue jitter range in degrees.
    pub hue_randomize: f32,
    pub blur_sigma_px: f32,
    /// 0..1 per-stamp sigma randomization.
    pub blur_jitter: f32,
}

impl Default for StrokeSettings {
    fn default() -> Self {
        Self {
            segment_count: 10,
            base_line_width: 8.0,
            line_decay: 0.5,
            offset_weight: 50.0,
            previous_offset_multiplier: 0.8,
            color: [0.843, 0.906, 1.0, 1.0],
            hue_randomize: 40.0,
            blur_sigma_px: 6.0,
            blur_jitter: 0.2,
        }
    }
}

impl StrokeSettings {
    /// Sigma used for the shared two-pass blur of the whole stroke.
    pub fn representative_sigma(&self) -> f32 {
        self.blur_sigma_px.max(0.0)
    }
}

/// One instanced capsule.  Layout matches the brush program's instance
/// buffer (10 floats, 40 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Stamp {
    pub center: [f32; 2],
    /// (length along the segment, width across it) in pixels.
    pub size: [f32; 2],
    pub angle: f32,
    pub color_premultiplied: [f32; 4],
    pub sigma_px: f32,
}

impl Stamp {
    pub const FLOATS: usize = 10;
}

/// Geometry of one walked segment, before color and blur are attached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub center: [f32; 2],
    pub length: f32,
    pub width: f32,
    pub angle: f32,
}

/// The walk state threaded through the segment loop.
///
/// Random draws happen outside; `advance` is deterministic so the momentum
/// and taper rules can be checked in isolation.
#[derive(Clone, Debug)]
pub struct RandomWalk {
    position: [f32; 2],
    momentum: [f32; 2],
    width: f32,
    multiplier: f32,
    line_decay: f32,
}

impl RandomWalk {
    pub fn new(from_x: f32, from_y: f32, settings: &StrokeSettings) -> Self {
        Self {
            position: [from_x, from_y],
            momentum: [0.0, 0.0],
            width: settings.base_line_width,
            multiplier: settings.previous_offset_multiplier,
            line_decay: settings.line_decay,
        }
    }

    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    pub fn momentum(&self) -> [f32; 2] {
        self.momentum
    }

    /// Unfloored width carried to the next segment.  May reach zero or go
    /// negative with large decay; emission applies the floor.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Take one step with the given random `offset` and taper roll in
    /// `[0, 1)`.  Returns `None` for a degenerate segment; the state still
    /// advances in that case.
    pub fn advance(&mut self, offset: [f32; 2], decay_roll: f32) -> Option<Segment> {
        let prev = self.position;
        let next = [
            prev[0] + self.momentum[0] + offset[0],
            prev[1] + self.momentum[1] + offset[1],
        ];
        let dx = next[0] - prev[0];
        let dy = next[1] - prev[1];
        let len = dx.hypot(dy);

        let segment = if len < DEGENERATE_SEGMENT_PX {
            None
        } else {
            Some(Segment {
                center: [prev[0] + dx * 0.5, prev[1] + dy * 0.5],
                length: len,
                width: self.width.max(MIN_STAMP_WIDTH_PX),
                angle: dy.atan2(dx),
            })
        };

        self.position = next;
        self.momentum = [
            (self.momentum[0] + offset[0]) * self.multiplier,
            (self.momentum[1] + offset[1]) * self.multiplier,
        ];
        self.width -= self.width * decay_roll / 3.0 * self.line_decay;

        segment
    }
}

/// Stroke color after the per-stroke hue jitter, premultiplied by alpha.
pub fn jittered_color(color: [f32; 4], hue_jitter: f32) -> [f32; 4] {
    let tint = HUE_TINT_STRENGTH * hue_jitter;
    let [r, g, b, a] = color;
    [
        (r + tint).clamp(0.0, 1.0) * a,
        (g - tint).clamp(0.0, 1.0) * a,
        (b + tint).clamp(0.0, 1.0) * a,
        a,
    ]
}

/// Generate the stamps for one stroke starting at `(from_x, from_y)`.
pub fn generate<R: Rng + ?Sized>(
    from_x: f32,
    from_y: f32,
    settings: &StrokeSettings,
    rng: &mut R,
) -> Vec<Stamp> {
    let hue_range = settings.hue_randomize;
    let hue_jitter = (rng.r#gen::<f32>() * hue_range - hue_range / 2.0) / 360.0;
    let color = jittered_color(settings.color, hue_jitter);

    let half = settings.offset_weight / 2.0;
    let mut walk = RandomWalk::new(from_x, from_y, settings);
    let mut stamps = Vec::with_capacity(settings.segment_count as usize);

    for i in 0..settings.segment_count {
        let offset = [
            rng.r#gen::<f32>() * settings.offset_weight - half,
            rng.r#gen::<f32>() * settings.offset_weight - half,
        ];
        let decay_roll = rng.r#gen::<f32>();

        let Some(seg) = walk.advance(offset, decay_roll) else {
            tracing::trace!(segment = i, "skipping degenerate segment");
            continue;
        };
        let jitter = rng.r#gen::<f32>() * 2.0 - 1.0;
        let sigma_px = (settings.blur_sigma_px * (1.0 + jitter * settings.blur_jitter)).max(0.0);

        stamps.push(Stamp {
            center: seg.center,
            size: [seg.length, seg.width],
            angle: seg.angle,
            color_premultiplied: color,
            sigma_px,
        });
    }

    stamps
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn settings() -> StrokeSettings {
        StrokeSettings::default()
    }

    #[test]
    fn emits_one_stamp_per_segment() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in [1, 2, 10, 20] {
            let s = StrokeSettings {
                segment_count: n,
                ..settings()
            };
            let stamps = generate(100.0, 100.0, &s, &mut rng);
            assert_eq!(stamps.len(), n as usize);
        }
    }

    #[test]
    fn width_never_drops_below_floor() {
        let mut rng = StdRng::seed_from_u64(11);
        let s = StrokeSettings {
            segment_count: 60,
            base_line_width: 3.0,
            line_decay: 50.0,
            ..settings()
        };
        for _ in 0..20 {
            for stamp in generate(0.0, 0.0, &s, &mut rng) {
                assert!(stamp.size[1] >= MIN_STAMP_WIDTH_PX, "width {}", stamp.size[1]);
            }
        }
    }

    #[test]
    fn zero_multiplier_does_not_carry_momentum() {
        let s = StrokeSettings {
            previous_offset_multiplier: 0.0,
            ..settings()
        };
        let mut walk = RandomWalk::new(10.0, 10.0, &s);
        let offsets = [[3.0, -2.0], [-7.5, 4.0], [1.0, 1.0]];
        for offset in offsets {
            let before = walk.position();
            let seg = walk.advance(offset, 0.5).unwrap();
            // Segment is exactly the raw offset: nothing compounded in.
            assert_eq!(walk.position(), [before[0] + offset[0], before[1] + offset[1]]);
            assert!((seg.length - offset[0].hypot(offset[1])).abs() < 1e-5);
            assert_eq!(walk.momentum(), [0.0, 0.0]);
        }
    }

    #[test]
    fn unit_multiplier_accumulates_offsets() {
        let s = StrokeSettings {
            previous_offset_multiplier: 1.0,
            ..settings()
        };
        let mut walk = RandomWalk::new(0.0, 0.0, &s);
        walk.advance([2.0, 0.0], 0.0);
        assert_eq!(walk.momentum(), [2.0, 0.0]);
        walk.advance([1.0, 1.0], 0.0);
        assert_eq!(walk.momentum(), [3.0, 1.0]);
        // Third step moves by momentum (3,1) plus the new offset.
        walk.advance([0.0, 0.0], 0.0);
        assert_eq!(walk.position(), [2.0 + 3.0 + 3.0, 0.0 + 1.0 + 1.0]);
    }

    #[test]
    fn degenerate_segment_is_skipped_but_state_advances() {
        let s = StrokeSettings {
            line_decay: 1.0,
            previous_offset_multiplier: 0.5,
            ..settings()
        };
        let mut walk = RandomWalk::new(5.0, 5.0, &s);
        let width_before = walk.width();
        assert!(walk.advance([0.0, 0.0], 0.9).is_none());
        assert!(walk.width() < width_before);
        assert_eq!(walk.position(), [5.0, 5.0]);
    }

    #[test]
    fn zero_offset_weight_yields_no_stamps() {
        let mut rng = StdRng::seed_from_u64(3);
        let s = StrokeSettings {
            offset_weight: 0.0,
            ..settings()
        };
        assert!(generate(1.0, 1.0, &s, &mut rng).is_empty());
    }

    #[test]
    fn stamp_centered_on_segment_midpoint_and_oriented() {
        let s = settings();
        let mut walk = RandomWalk::new(0.0, 0.0, &s);
        let seg = walk.advance([0.0, 4.0], 0.0).unwrap();
        assert_eq!(seg.center, [0.0, 2.0]);
        assert!((seg.angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(seg.length, 4.0);
    }

    #[test]
    fn taper_never_increases_width() {
        let s = StrokeSettings {
            line_decay: 0.7,
            ..settings()
        };
        let mut walk = RandomWalk::new(0.0, 0.0, &s);
        let mut last = walk.width();
        for roll in [0.0, 0.3, 0.99, 0.5] {
            walk.advance([1.0, 0.0], roll);
            assert!(walk.width() <= last);
            last = walk.width();
        }
    }

    #[test]
    fn sigma_respects_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(99);
        let s = StrokeSettings {
            segment_count: 40,
            blur_sigma_px: 4.0,
            blur_jitter: 0.25,
            ..settings()
        };
        for stamp in generate(0.0, 0.0, &s, &mut rng) {
            assert!(stamp.sigma_px >= 3.0 - 1e-4 && stamp.sigma_px <= 5.0 + 1e-4);
        }
    }

    #[test]
    fn hue_jitter_pushes_red_blue_against_green() {
        let c = jittered_color([0.5, 0.5, 0.5, 0.5], 1.0);
        assert!((c[0] - 0.56 * 0.5).abs() < 1e-6);
        assert!((c[1] - 0.44 * 0.5).abs() < 1e-6);
        assert!((c[2] - 0.56 * 0.5).abs() < 1e-6);
        assert_eq!(c[3], 0.5);

        let clamped = jittered_color([1.0, 0.0, 1.0, 1.0], 1.0);
        assert_eq!(clamped, [1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn stroke_shares_one_color() {
        let mut rng = StdRng::seed_from_u64(5);
        let stamps = generate(0.0, 0.0, &settings(), &mut rng);
        let first = stamps[0].color_premultiplied;
        assert!(stamps.iter().all(|s| s.color_premultiplied == first));
    }

    #[test]
    fn stamp_layout_is_ten_floats() {
        assert_eq!(std::mem::size_of::<Stamp>(), Stamp::FLOATS * 4);
    }
}
