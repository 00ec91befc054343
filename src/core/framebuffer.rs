use crate::core::color::to_rgba8;
use image::RgbaImage;
use nalgebra::Vector3;
use std::cell::UnsafeCell;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

const LOCK_STRIPES: usize = 1024;

/// Colour and depth storage written concurrently by the rasterizer.
///
/// Depth is an atomic `f32` bit pattern updated by compare-and-swap; colour
/// writes are serialised per stripe of pixels.
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,

    /// Guarded by `locks`; only written after a successful depth test.
    color_buffer: UnsafeCell<Vec<Vector3<f32>>>,
    depth_buffer: Vec<AtomicU32>,
    locks: Vec<Mutex<()>>,
}

// Colour writes go through the stripe locks, depth through atomics.
unsafe impl Sync for FrameBuffer {}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        let inf_bits = f32::INFINITY.to_bits();
        Self {
            width,
            height,
            color_buffer: UnsafeCell::new(vec![Vector3::zeros(); size]),
            depth_buffer: (0..size).map(|_| AtomicU32::new(inf_bits)).collect(),
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Resets every pixel to `color` and every depth sample to `depth`.
    pub fn clear(&mut self, color: Vector3<f32>, depth: f32) {
        self.color_buffer.get_mut().fill(color);
        let bits = depth.to_bits();
        for d in &self.depth_buffer {
            d.store(bits, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    #[inline(always)]
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Less-or-equal depth test; stores `new_depth` and returns true when it passes.
    #[inline]
    pub fn depth_test_and_update(&self, x: usize, y: usize, new_depth: f32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let depth_atomic = &self.depth_buffer[self.index(x, y)];
        let new_bits = new_depth.to_bits();

        let mut current_bits = depth_atomic.load(Ordering::Relaxed);
        loop {
            if new_depth > f32::from_bits(current_bits) {
                return false;
            }
            match depth_atomic.compare_exchange_weak(
                current_bits,
                new_bits,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(updated_bits) => current_bits = updated_bits,
            }
        }
    }

    /// Writes a pixel; only call after `depth_test_and_update` returned true.
    #[inline]
    pub fn set_pixel_safe(&self, x: usize, y: usize, color: Vector3<f32>) {
        if !self.in_bounds(x, y) {
            return;
        }
        let idx = self.index(x, y);
        let _guard = self.locks[idx % self.locks.len()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // The stripe lock is held for this index.
        unsafe {
            let buffer = &mut *self.color_buffer.get();
            buffer[idx] = color;
        }
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Vector3<f32>> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let buffer = unsafe { &*self.color_buffer.get() };
        Some(buffer[self.index(x, y)])
    }

    pub fn get_depth(&self, x: usize, y: usize) -> Option<f32> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(f32::from_bits(
            self.depth_buffer[self.index(x, y)].load(Ordering::Relaxed),
        ))
    }

    /// Gamma-encodes the colour buffer into an 8-bit image, top row first.
    pub fn to_rgba_image(&mut self) -> RgbaImage {
        let buffer = self.color_buffer.get_mut();
        let width = self.width;
        RgbaImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            image::Rgba(to_rgba8(buffer[y as usize * width + x as usize]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_resets_color_and_depth() {
        let mut fb = FrameBuffer::new(4, 2);
        fb.clear(Vector3::new(0.5, 0.25, 1.0), 1.0);
        assert_eq!(fb.get_pixel(3, 1), Some(Vector3::new(0.5, 0.25, 1.0)));
        assert_eq!(fb.get_depth(0, 0), Some(1.0));
        assert_eq!(fb.get_pixel(4, 0), None);
    }

    #[test]
    fn closer_fragments_win_the_depth_test() {
        let fb = FrameBuffer::new(1, 1);
        assert!(fb.depth_test_and_update(0, 0, 0.5));
        assert!(!fb.depth_test_and_update(0, 0, 0.75));
        assert!(fb.depth_test_and_update(0, 0, 0.5));
        assert!(fb.depth_test_and_update(0, 0, 0.25));
        assert_eq!(fb.get_depth(0, 0), Some(0.25));
    }

    #[test]
    fn image_has_framebuffer_dimensions() {
        let mut fb = FrameBuffer::new(3, 2);
        fb.clear(Vector3::new(1.0, 0.0, 0.0), 1.0);
        let img = fb.to_rgba_image();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [255, 0, 0, 255]);
    }
}
