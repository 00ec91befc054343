use crate::core::color::srgb_to_linear;
use crate::error::Result;
use image::RgbaImage;
use log::info;
use nalgebra::{Vector2, Vector3};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    Linear,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

/// Filtering and wrapping applied when a texture is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SamplerState {
    pub filter: FilterMode,
    pub wrap: WrapMode,
}

/// A decoded RGBA image, shared cheaply between threads.
///
/// This is the texture supplier's side of the boundary: the render context
/// only ever turns it into a backend texture name.
#[derive(Debug, Clone)]
pub struct Texture {
    pub image: Arc<RgbaImage>,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let image = image::open(path_ref)?.to_rgba8();
        info!(
            "Loaded texture: {:?} ({}x{})",
            path_ref,
            image.width(),
            image.height()
        );
        Ok(Self::from_image(image))
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            image: Arc::new(image),
        }
    }

    /// 2x2 mid-grey checker used when no texture is supplied.
    pub fn checker() -> Self {
        Self::from_image(RgbaImage::from_fn(2, 2, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([200, 200, 200, 255])
            } else {
                image::Rgba([120, 120, 120, 255])
            }
        }))
    }

    /// Samples at `uv` (origin bottom-left) and returns linear RGB.
    pub fn sample(&self, uv: Vector2<f32>, sampler: SamplerState) -> Vector3<f32> {
        if self.width == 0 || self.height == 0 {
            return Vector3::zeros();
        }
        let x = uv.x * self.width as f32 - 0.5;
        let y = (1.0 - uv.y) * self.height as f32 - 0.5;

        let color = match sampler.filter {
            FilterMode::Nearest => self.texel(x.round() as i32, y.round() as i32, sampler.wrap),
            FilterMode::Linear => {
                let (x0, y0) = (x.floor() as i32, y.floor() as i32);
                let (wx, wy) = (x - x.floor(), y - y.floor());
                let top = self.texel(x0, y0, sampler.wrap) * (1.0 - wx)
                    + self.texel(x0 + 1, y0, sampler.wrap) * wx;
                let bottom = self.texel(x0, y0 + 1, sampler.wrap) * (1.0 - wx)
                    + self.texel(x0 + 1, y0 + 1, sampler.wrap) * wx;
                top * (1.0 - wy) + bottom * wy
            }
        };
        srgb_to_linear(color)
    }

    /// Raw [0, 1] texel after applying the wrap mode.
    fn texel(&self, x: i32, y: i32, wrap: WrapMode) -> Vector3<f32> {
        let x = wrap_coord(x, self.width as i32, wrap);
        let y = wrap_coord(y, self.height as i32, wrap);
        let pixel = self.image.get_pixel(x as u32, y as u32);
        Vector3::new(
            pixel[0] as f32 / 255.0,
            pixel[1] as f32 / 255.0,
            pixel[2] as f32 / 255.0,
        )
    }
}

fn wrap_coord(c: i32, size: i32, wrap: WrapMode) -> i32 {
    match wrap {
        WrapMode::Repeat => c.rem_euclid(size),
        WrapMode::ClampToEdge => c.clamp(0, size - 1),
        WrapMode::MirroredRepeat => {
            let period = c.rem_euclid(2 * size);
            if period < size { period } else { 2 * size - 1 - period }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_modes_fold_coordinates_differently() {
        assert_eq!(wrap_coord(-1, 4, WrapMode::Repeat), 3);
        assert_eq!(wrap_coord(5, 4, WrapMode::Repeat), 1);
        assert_eq!(wrap_coord(-1, 4, WrapMode::ClampToEdge), 0);
        assert_eq!(wrap_coord(9, 4, WrapMode::ClampToEdge), 3);
        assert_eq!(wrap_coord(4, 4, WrapMode::MirroredRepeat), 3);
        assert_eq!(wrap_coord(-1, 4, WrapMode::MirroredRepeat), 0);
    }

    #[test]
    fn nearest_sampling_returns_exact_texels() {
        let tex = Texture::from_image(RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        }));
        let sampler = SamplerState {
            filter: FilterMode::Nearest,
            wrap: WrapMode::ClampToEdge,
        };
        assert_eq!(tex.sample(Vector2::new(0.25, 0.5), sampler), Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(tex.sample(Vector2::new(0.75, 0.5), sampler), Vector3::zeros());
    }

    #[test]
    fn linear_sampling_blends_neighbours() {
        let tex = Texture::checker();
        let c = tex.sample(Vector2::new(0.5, 0.5), SamplerState::default());
        let lo = srgb_to_linear(Vector3::repeat(120.0 / 255.0)).x;
        let hi = srgb_to_linear(Vector3::repeat(200.0 / 255.0)).x;
        assert!(c.x > lo && c.x < hi);
    }
}
