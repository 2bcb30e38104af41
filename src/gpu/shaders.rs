// ============================================================================
// GPU SHADERS — all WGSL code kept inline for containment
// ============================================================================

// ============================================================================
// BRUSH SHADER — instanced capsule stamps
// ============================================================================
//
// Slot 0 is a unit quad (-0.5..0.5); slot 1 is one `Stamp` per instance.
// The quad is stretched to (length + width, width) so the semicircular caps
// fit, rotated, and placed in pixel space.  The fragment stage evaluates the
// capsule's signed distance in pixels and antialiases with `fwidth`.
pub const BRUSH_SHADER: &str = r#"
struct BrushUniforms {
    resolution: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> u: BrushUniforms;

struct StampIn {
    @location(0) corner: vec2<f32>,
    @location(1) center: vec2<f32>,
    @location(2) size: vec2<f32>,     // (length, width) in px
    @location(3) angle: f32,
    @location(4) color: vec4<f32>,    // premultiplied
    @location(5) sigma_px: f32,       // carried per stamp; blur is a separate pass
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) local: vec2<f32>,    // px, capsule-aligned
    @location(1) color: vec4<f32>,
    @location(2) half_len: f32,
    @location(3) radius: f32,
};

@vertex
fn vs_brush(s: StampIn) -> VertexOutput {
    let extent = vec2<f32>(s.size.x + s.size.y, s.size.y);
    let local = s.corner * extent;
    let c = cos(s.angle);
    let sn = sin(s.angle);
    let rotated = vec2<f32>(local.x * c - local.y * sn, local.x * sn + local.y * c);
    let pos = s.center + rotated;

    var ndc = (pos / u.resolution) * 2.0 - 1.0;
    ndc.y = -ndc.y; // y-down pixel space

    var out: VertexOutput;
    out.position = vec4<f32>(ndc, 0.0, 1.0);
    out.local = local;
    out.color = s.color;
    out.half_len = 0.5 * s.size.x;
    out.radius = 0.5 * s.size.y;
    return out;
}

@fragment
fn fs_brush(in: VertexOutput) -> @location(0) vec4<f32> {
    // Distance to the capsule's core segment minus its radius.
    let q = vec2<f32>(max(abs(in.local.x) - in.half_len, 0.0), in.local.y);
    let d = length(q) - in.radius;
    let aa = fwidth(d) + 1e-4;
    let coverage = 1.0 - smoothstep(0.0, aa, d);
    return in.color * coverage;
}
"#;

// ============================================================================
// SEPARABLE GAUSSIAN BLUR — one axis per pass
// ============================================================================
//
// Weights are built on the CPU (already normalized over centre + both sides)
// and packed four to a vec4.  Taps outside the image clamp to the edge.
pub const BLUR_SHADER: &str = r#"
struct BlurUniforms {
    direction: vec2<i32>,   // (1,0) horizontal or (0,1) vertical
    radius: i32,
    _pad: i32,
    weights: array<vec4<f32>, 9>,
};

@group(0) @binding(0) var<uniform> u: BlurUniforms;
@group(1) @binding(0) var src_tex: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) vi: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((vi << 1u) & 2u), f32(vi & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    return out;
}

fn weight(i: i32) -> f32 {
    return u.weights[i / 4][i % 4];
}

@fragment
fn fs_blur(in: VertexOutput) -> @location(0) vec4<f32> {
    let dims = vec2<i32>(textureDimensions(src_tex));
    let max_coord = dims - vec2<i32>(1, 1);
    let p = vec2<i32>(in.position.xy);

    var sum = textureLoad(src_tex, p, 0) * weight(0);
    for (var i: i32 = 1; i <= u.radius; i = i + 1) {
        let off = u.direction * i;
        let a = clamp(p + off, vec2<i32>(0, 0), max_coord);
        let b = clamp(p - off, vec2<i32>(0, 0), max_coord);
        sum = sum + (textureLoad(src_tex, a, 0) + textureLoad(src_tex, b, 0)) * weight(i);
    }
    return sum;
}
"#;

// ============================================================================
// COMPOSITE SHADER — scratch over canvas (premultiplied, hardware blend)
// ============================================================================
pub const COMPOSITE_SHADER: &str = r#"
@group(0) @binding(0) var src_tex: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) vi: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((vi << 1u) & 2u), f32(vi & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    return out;
}

@fragment
fn fs_composite(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureLoad(src_tex, vec2<i32>(in.position.xy), 0);
}
"#;

// ============================================================================
// PRESENT SHADER — saturation + hue grading onto the visible surface
// ============================================================================
//
// Both operations are linear in rgb, so grading the premultiplied canvas
// directly equals premultiplying the graded straight color.
pub const PRESENT_SHADER: &str = r#"
struct PresentUniforms {
    hue_row0: vec4<f32>,
    hue_row1: vec4<f32>,
    hue_row2: vec4<f32>,
    saturation: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0) var<uniform> u: PresentUniforms;
@group(1) @binding(0) var canvas_tex: texture_2d<f32>;
@group(1) @binding(1) var canvas_samp: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) vi: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((vi << 1u) & 2u), f32(vi & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_present(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = textureSample(canvas_tex, canvas_samp, in.uv);
    let l = dot(c.rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
    let s = mix(vec3<f32>(l), c.rgb, u.saturation);
    let graded = vec3<f32>(
        dot(u.hue_row0.xyz, s),
        dot(u.hue_row1.xyz, s),
        dot(u.hue_row2.xyz, s),
    );
    return vec4<f32>(graded, c.a);
}
"#;
