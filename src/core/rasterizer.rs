use crate::core::framebuffer::FrameBuffer;
use crate::core::math::transform::{apply_perspective_division, ndc_to_screen};
use crate::core::pipeline::{Interpolatable, Shader};
use nalgebra::{Point2, Vector3, Vector4};
use rayon::prelude::*;

const EPSILON: f32 = 1e-5;

/// Which winding is discarded. Front faces wind counter-clockwise in NDC.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum CullMode {
    Back,
    Front,
    None,
}

/// Draws triangles onto a [`FrameBuffer`].
pub struct Rasterizer {
    pub cull_mode: CullMode,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

type ClipVertex<V> = (Vector4<f32>, V);

impl Rasterizer {
    pub fn new() -> Self {
        Self {
            cull_mode: CullMode::Back,
        }
    }

    /// Runs the vertex stage over a non-indexed triangle list and rasterizes every triangle.
    pub fn draw_triangles<S: Shader>(&self, framebuffer: &FrameBuffer, shader: &S, inputs: &[S::Input]) {
        for triangle in inputs.chunks_exact(3) {
            let (p0, v0) = shader.vertex(&triangle[0]);
            let (p1, v1) = shader.vertex(&triangle[1]);
            let (p2, v2) = shader.vertex(&triangle[2]);
            self.rasterize_triangle(framebuffer, shader, &[p0, p1, p2], &[v0, v1, v2]);
        }
    }

    /// Clips a clip-space triangle against the view frustum (Sutherland-Hodgman)
    /// and fans the surviving polygon into screen-space triangles.
    pub fn rasterize_triangle<S: Shader>(
        &self,
        framebuffer: &FrameBuffer,
        shader: &S,
        clip_coords: &[Vector4<f32>; 3],
        varyings: &[S::Varying; 3],
    ) {
        let mut current: Vec<ClipVertex<S::Varying>> = Vec::with_capacity(16);
        let mut scratch: Vec<ClipVertex<S::Varying>> = Vec::with_capacity(16);
        current.extend((0..3).map(|i| (clip_coords[i], varyings[i])));

        // (axis, sign): sign * p[axis] <= p.w
        let planes = [(0, 1.0), (0, -1.0), (1, 1.0), (1, -1.0), (2, 1.0), (2, -1.0)];
        for &(axis, sign) in &planes {
            if current.is_empty() {
                return;
            }
            clip_against_plane(&current, &mut scratch, axis, sign);
            std::mem::swap(&mut current, &mut scratch);
        }

        if current.len() < 3 {
            return;
        }
        let v0 = current[0];
        for pair in current[1..].windows(2) {
            let (v1, v2) = (pair[0], pair[1]);
            self.rasterize_clipped(framebuffer, shader, [v0, v1, v2]);
        }
    }

    fn rasterize_clipped<S: Shader>(
        &self,
        framebuffer: &FrameBuffer,
        shader: &S,
        vertices: [ClipVertex<S::Varying>; 3],
    ) {
        let width = framebuffer.width as f32;
        let height = framebuffer.height as f32;

        let mut screen = [Point2::origin(); 3];
        let mut w = [0.0; 3];
        for (i, (clip, _)) in vertices.iter().enumerate() {
            if clip.w.abs() < 1e-6 {
                return;
            }
            let ndc = apply_perspective_division(clip);
            screen[i] = ndc_to_screen(ndc.x, ndc.y, width, height);
            w[i] = clip.w;
        }

        // Screen space flips Y, so counter-clockwise NDC triangles have negative area here.
        let signed_area = edge(screen[0], screen[1], screen[2]);
        match self.cull_mode {
            CullMode::Back if signed_area >= 0.0 => return,
            CullMode::Front if signed_area <= 0.0 => return,
            _ => {}
        }
        if signed_area.abs() < EPSILON {
            return;
        }

        let min_x = screen.iter().map(|p| p.x).fold(f32::MAX, f32::min).floor().max(0.0) as usize;
        let min_y = screen.iter().map(|p| p.y).fold(f32::MAX, f32::min).floor().max(0.0) as usize;
        let max_x = screen.iter().map(|p| p.x).fold(f32::MIN, f32::max).ceil();
        let max_y = screen.iter().map(|p| p.y).fold(f32::MIN, f32::max).ceil();
        if max_x < 0.0 || max_y < 0.0 || min_x >= framebuffer.width || min_y >= framebuffer.height {
            return;
        }
        let max_x = (max_x as usize).min(framebuffer.width - 1);
        let max_y = (max_y as usize).min(framebuffer.height - 1);

        (min_y..=max_y).into_par_iter().for_each(|y| {
            for x in min_x..=max_x {
                let p = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
                let bary = Vector3::new(
                    edge(screen[1], screen[2], p),
                    edge(screen[2], screen[0], p),
                    edge(screen[0], screen[1], p),
                ) / signed_area;
                if bary.iter().any(|b| *b < -EPSILON) {
                    continue;
                }

                // Perspective-correct weights.
                let weighted = Vector3::new(bary.x / w[0], bary.y / w[1], bary.z / w[2]);
                let sum = weighted.sum();
                if sum.abs() < EPSILON {
                    continue;
                }
                let corrected = weighted / sum;

                let z_ndc = corrected.x * vertices[0].0.z
                    + corrected.y * vertices[1].0.z
                    + corrected.z * vertices[2].0.z;
                let depth = z_ndc * 0.5 + 0.5;

                if framebuffer.depth_test_and_update(x, y, depth) {
                    let varying = vertices[0].1 * corrected.x
                        + vertices[1].1 * corrected.y
                        + vertices[2].1 * corrected.z;
                    framebuffer.set_pixel_safe(x, y, shader.fragment(varying));
                }
            }
        });
    }
}

/// Twice the signed area of triangle (a, b, c).
#[inline(always)]
fn edge(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn clip_against_plane<V: Interpolatable>(
    input: &[ClipVertex<V>],
    output: &mut Vec<ClipVertex<V>>,
    axis: usize,
    sign: f32,
) {
    output.clear();
    let Some(&last) = input.last() else {
        return;
    };
    let inside = |p: &Vector4<f32>| sign * p[axis] <= p.w + 1e-6;

    let mut prev = last;
    let mut prev_inside = inside(&prev.0);
    for &curr in input {
        let curr_inside = inside(&curr.0);
        if curr_inside != prev_inside
            && let Some(hit) = intersect(prev, curr, axis, sign)
        {
            output.push(hit);
        }
        if curr_inside {
            output.push(curr);
        }
        prev = curr;
        prev_inside = curr_inside;
    }
}

fn intersect<V: Interpolatable>(
    a: ClipVertex<V>,
    b: ClipVertex<V>,
    axis: usize,
    sign: f32,
) -> Option<ClipVertex<V>> {
    let denom = sign * (b.0[axis] - a.0[axis]) - (b.0.w - a.0.w);
    if denom.abs() < 1e-9 {
        return None;
    }
    let t = (a.0.w - sign * a.0[axis]) / denom;
    if !t.is_finite() {
        return None;
    }
    Some((a.0 + (b.0 - a.0) * t, a.1 * (1.0 - t) + b.1 * t))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat;

    impl Shader for Flat {
        type Varying = Vector3<f32>;
        type Input = (Vector4<f32>, Vector3<f32>);

        fn vertex(&self, input: &Self::Input) -> (Vector4<f32>, Self::Varying) {
            *input
        }

        fn fragment(&self, varying: Self::Varying) -> Vector3<f32> {
            varying
        }
    }

    fn ccw_triangle(z: f32, color: Vector3<f32>) -> Vec<(Vector4<f32>, Vector3<f32>)> {
        vec![
            (Vector4::new(-1.0, -1.0, z, 1.0), color),
            (Vector4::new(1.0, -1.0, z, 1.0), color),
            (Vector4::new(0.0, 1.0, z, 1.0), color),
        ]
    }

    #[test]
    fn counter_clockwise_triangle_covers_the_center() {
        let mut fb = FrameBuffer::new(8, 8);
        fb.clear(Vector3::zeros(), f32::INFINITY);
        let red = Vector3::new(1.0, 0.0, 0.0);
        Rasterizer::new().draw_triangles(&fb, &Flat, &ccw_triangle(0.0, red));
        assert_eq!(fb.get_pixel(4, 4), Some(red));
        assert_eq!(fb.get_pixel(0, 0), Some(Vector3::zeros()));
    }

    #[test]
    fn back_faces_are_culled() {
        let mut fb = FrameBuffer::new(8, 8);
        fb.clear(Vector3::zeros(), f32::INFINITY);
        let mut tri = ccw_triangle(0.0, Vector3::new(1.0, 1.0, 1.0));
        tri.swap(1, 2);
        Rasterizer::new().draw_triangles(&fb, &Flat, &tri);
        assert_eq!(fb.get_pixel(4, 4), Some(Vector3::zeros()));
    }

    #[test]
    fn nearer_triangle_wins_regardless_of_order() {
        let mut fb = FrameBuffer::new(8, 8);
        fb.clear(Vector3::zeros(), f32::INFINITY);
        let near = Vector3::new(0.0, 1.0, 0.0);
        let far = Vector3::new(0.0, 0.0, 1.0);
        let rasterizer = Rasterizer::new();
        rasterizer.draw_triangles(&fb, &Flat, &ccw_triangle(-0.5, near));
        rasterizer.draw_triangles(&fb, &Flat, &ccw_triangle(0.5, far));
        assert_eq!(fb.get_pixel(4, 4), Some(near));
    }

    #[test]
    fn triangles_behind_the_eye_are_clipped_away() {
        let mut fb = FrameBuffer::new(8, 8);
        fb.clear(Vector3::zeros(), f32::INFINITY);
        let tri = ccw_triangle(2.0, Vector3::new(1.0, 1.0, 1.0));
        Rasterizer::new().draw_triangles(&fb, &Flat, &tri);
        assert_eq!(fb.get_pixel(4, 4), Some(Vector3::zeros()));
    }
}
