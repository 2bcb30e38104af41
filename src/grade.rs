//! Present-time color grading: saturation toward Rec.709 luma, then a
//! luminance-preserving hue rotation.  The matrix is built here and uploaded
//! to the present program; the same math doubles as a CPU reference.

/// Rec.709 luma weights.
pub const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Row-major 3x3 hue rotation; row `i` produces output channel `i`.
pub fn hue_rotation_matrix(hue_deg: f32) -> [[f32; 3]; 3] {
    let a = hue_deg.to_radians();
    let (s, c) = a.sin_cos();
    [
        [
            0.213 + 0.787 * c - 0.213 * s,
            0.715 - 0.715 * c - 0.715 * s,
            0.072 - 0.072 * c + 0.928 * s,
        ],
        [
            0.213 - 0.213 * c + 0.143 * s,
            0.715 + 0.285 * c + 0.140 * s,
            0.072 - 0.072 * c - 0.283 * s,
        ],
        [
            0.213 - 0.213 * c - 0.787 * s,
            0.715 - 0.715 * c + 0.715 * s,
            0.072 + 0.928 * c + 0.072 * s,
        ],
    ]
}

pub fn luma(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA[0] + rgb[1] * LUMA[1] + rgb[2] * LUMA[2]
}

/// `mix(luma, rgb, saturation)`: 0 is grey, 1 is unchanged, >1 boosts.
pub fn saturate(rgb: [f32; 3], saturation: f32) -> [f32; 3] {
    let l = luma(rgb);
    rgb.map(|ch| l + (ch - l) * saturation)
}

pub fn grade(rgb: [f32; 3], saturation: f32, hue_deg: f32) -> [f32; 3] {
    let c = saturate(rgb, saturation);
    let m = hue_rotation_matrix(hue_deg);
    m.map(|row| row[0] * c[0] + row[1] * c[1] + row[2] * c[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-3)
    }

    #[test]
    fn zero_hue_is_identity() {
        let m = hue_rotation_matrix(0.0);
        for (i, row) in m.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((v - expected).abs() < 1e-3, "m[{i}][{j}] = {v}");
            }
        }
    }

    #[test]
    fn full_turn_is_identity() {
        let rgb = [0.8, 0.3, 0.1];
        assert!(close(grade(rgb, 1.0, 360.0), rgb));
    }

    #[test]
    fn grey_is_fixed_under_rotation() {
        let grey = [0.4, 0.4, 0.4];
        for hue in [-180.0, -45.0, 90.0, 133.0] {
            assert!(close(grade(grey, 1.0, hue), grey));
        }
    }

    #[test]
    fn zero_saturation_collapses_to_luma() {
        let out = saturate([1.0, 0.0, 0.0], 0.0);
        assert!(close(out, [LUMA[0]; 3]));
    }

    #[test]
    fn rotation_moves_pure_red() {
        let out = grade([1.0, 0.0, 0.0], 1.0, 120.0);
        assert!(out[0] < 0.5);
    }
}
