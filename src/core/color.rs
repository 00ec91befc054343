use nalgebra::Vector3;

/// Converts linear RGB to sRGB (gamma 2.2 approximation).
pub fn linear_to_srgb(color: Vector3<f32>) -> Vector3<f32> {
    let gamma = 1.0 / 2.2;
    Vector3::new(
        color.x.max(0.0).powf(gamma),
        color.y.max(0.0).powf(gamma),
        color.z.max(0.0).powf(gamma),
    )
}

/// Inverse of [`linear_to_srgb`], applied to texels before shading.
pub fn srgb_to_linear(color: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(color.x.powf(2.2), color.y.powf(2.2), color.z.powf(2.2))
}

/// Gamma-encodes a linear colour into an opaque 8-bit RGBA pixel.
pub fn to_rgba8(linear: Vector3<f32>) -> [u8; 4] {
    let srgb = linear_to_srgb(linear);
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    [channel(srgb.x), channel(srgb.y), channel(srgb.z), 255]
}
