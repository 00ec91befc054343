use crate::core::math::vector::VectorExt;
use nalgebra::{Matrix4, Point2, Point3, Vector3, Vector4};

//=================================
// Transform Matrix Factory
//=================================

/// Factory for the transformation matrices consumed by the shader program.
///
/// Matrices are written out row by row and composed right-to-left:
/// `rotation_x(a) * rotation_y(b)` applies the Y rotation first.
pub struct TransformFactory;

#[rustfmt::skip]
impl TransformFactory {
    pub fn identity() -> Matrix4<f32> {
        Matrix4::identity()
    }

    /// Creates a rotation matrix around the X-axis (right-handed, radians).
    pub fn rotation_x(angle_rad: f32) -> Matrix4<f32> {
        let c = angle_rad.cos();
        let s = angle_rad.sin();
        Matrix4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, c,  -s,   0.0,
            0.0, s,   c,   0.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Creates a rotation matrix around the Y-axis.
    pub fn rotation_y(angle_rad: f32) -> Matrix4<f32> {
        let c = angle_rad.cos();
        let s = angle_rad.sin();
        Matrix4::new(
            c,   0.0, s,   0.0,
            0.0, 1.0, 0.0, 0.0,
           -s,   0.0, c,   0.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Creates a rotation matrix around the Z-axis.
    pub fn rotation_z(angle_rad: f32) -> Matrix4<f32> {
        let c = angle_rad.cos();
        let s = angle_rad.sin();
        Matrix4::new(
            c,  -s,   0.0, 0.0,
            s,   c,   0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    pub fn translation(translation: &Vector3<f32>) -> Matrix4<f32> {
        Matrix4::new(
            1.0, 0.0, 0.0, translation.x,
            0.0, 1.0, 0.0, translation.y,
            0.0, 0.0, 1.0, translation.z,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Creates a non-uniform scaling matrix.
    pub fn scaling(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new(
            sx,  0.0, 0.0, 0.0,
            0.0, sy,  0.0, 0.0,
            0.0, 0.0, sz,  0.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Scales all three axes by `scale`.
    pub fn uniform_scaling(scale: f32) -> Matrix4<f32> {
        Self::scaling(scale, scale, scale)
    }

    /// Creates a perspective projection (right-handed, view-space Z mapped into [-1, 1]).
    ///
    /// An `aspect_ratio` of zero yields infinities; callers clamp the viewport height.
    pub fn perspective(fov_y_rad: f32, aspect_ratio: f32, near: f32, far: f32) -> Matrix4<f32> {
        // cot(fov / 2)
        let f = 1.0 / (fov_y_rad * 0.5).tan();
        let nf = 1.0 / (near - far);

        Matrix4::new(
            f / aspect_ratio, 0.0, 0.0,               0.0,
            0.0,              f,   0.0,               0.0,
            0.0,              0.0, (far + near) * nf, 2.0 * far * near * nf,
            0.0,              0.0, -1.0,              0.0,
        )
    }

    /// Creates a look-at view matrix.
    ///
    /// The orientation rows are `tangent = direction x up`, `bitangent` and
    /// `-direction`, then the frame is moved to the eye. Only `direction` and
    /// `up` are normalised, so the tangent is unit length only when `up` is
    /// perpendicular to the view direction. When `target - eye` is parallel to
    /// `up` the tangent collapses to zero.
    pub fn look_at(eye: &Point3<f32>, target: &Point3<f32>, up: &Vector3<f32>) -> Matrix4<f32> {
        let direction = (target - eye).normalized_or_self();
        let tangent = direction.cross(&up.normalized_or_self());
        let bitangent = tangent.cross(&direction);

        let orientation = Matrix4::new(
             tangent.x,    tangent.y,    tangent.z,   0.0,
             bitangent.x,  bitangent.y,  bitangent.z, 0.0,
            -direction.x, -direction.y, -direction.z, 0.0,
             0.0,          0.0,          0.0,         1.0,
        );

        orientation * Self::translation(&-eye.coords)
    }
}

/// Flattens a matrix column by column, the layout GL-style `mat4` uniforms expect.
pub fn to_column_major(matrix: &Matrix4<f32>) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}

/// Inverse of [`to_column_major`].
pub fn from_column_major(data: &[f32; 16]) -> Matrix4<f32> {
    Matrix4::from_column_slice(data)
}

//=================================
// Core Transformation Functions
//=================================

/// Performs perspective division: Clip Space -> NDC.
#[inline]
pub fn apply_perspective_division(clip: &Vector4<f32>) -> Point3<f32> {
    let w = clip.w;
    if w.abs() > 1e-6 {
        Point3::new(clip.x / w, clip.y / w, clip.z / w)
    } else {
        Point3::origin()
    }
}

/// Converts NDC coordinates to Screen coordinates (Viewport Transform).
/// Note: Y-axis is flipped (NDC +Y is up, Screen +Y is down).
#[inline]
pub fn ndc_to_screen(ndc_x: f32, ndc_y: f32, width: f32, height: f32) -> Point2<f32> {
    Point2::new(
        (ndc_x + 1.0) * 0.5 * width,
        (1.0 - (ndc_y + 1.0) * 0.5) * height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn sample_matrix() -> Matrix4<f32> {
        Matrix4::new(
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0,
        )
    }

    #[test]
    fn identity_is_neutral_on_both_sides() {
        let m = sample_matrix();
        assert_eq!(m * TransformFactory::identity(), m);
        assert_eq!(TransformFactory::identity() * m, m);
    }

    #[test]
    fn multiplication_is_not_commutative() {
        let rx = TransformFactory::rotation_x(0.3);
        let ry = TransformFactory::rotation_y(0.7);
        assert!((rx * ry - ry * rx).norm() > 1e-3);
    }

    #[test]
    fn composed_rotation_applies_rightmost_first() {
        let composed = TransformFactory::rotation_x(FRAC_PI_2) * TransformFactory::rotation_y(FRAC_PI_2);
        // Y first: +X -> -Z, then X: -Z -> +Y
        let p = composed * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p, Vector4::new(0.0, 1.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn translation_moves_points_not_directions() {
        let t = TransformFactory::translation(&Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(t * Vector4::new(0.0, 0.0, 0.0, 1.0), Vector4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(t * Vector4::new(1.0, 0.0, 0.0, 0.0), Vector4::new(1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn scaling_is_per_axis() {
        let s = TransformFactory::scaling(2.0, 3.0, 4.0);
        assert_eq!(s * Vector4::new(1.0, 1.0, 1.0, 1.0), Vector4::new(2.0, 3.0, 4.0, 1.0));
    }

    #[test]
    fn uniform_scaling_matches_per_axis_scaling() {
        assert_eq!(
            TransformFactory::uniform_scaling(2.5),
            TransformFactory::scaling(2.5, 2.5, 2.5)
        );
        let p = TransformFactory::uniform_scaling(0.5) * Vector4::new(2.0, -4.0, 6.0, 1.0);
        assert_eq!(p, Vector4::new(1.0, -2.0, 3.0, 1.0));
    }

    #[test]
    fn perspective_maps_near_and_far_to_ndc_bounds() {
        let p = TransformFactory::perspective(FRAC_PI_2, 1.0, 0.1, 100.0);
        let near = p * Vector4::new(0.0, 0.0, -0.1, 1.0);
        let far = p * Vector4::new(0.0, 0.0, -100.0, 1.0);
        assert_relative_eq!(near.z / near.w, -1.0, epsilon = 1e-4);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-4);
        assert_eq!(p[(3, 2)], -1.0);
        assert_eq!(p[(3, 3)], 0.0);
    }

    #[test]
    fn perspective_uses_cotangent_of_half_fov() {
        let p = TransformFactory::perspective(FRAC_PI_2, 2.0, 0.1, 10.0);
        assert_relative_eq!(p[(1, 1)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(p[(0, 0)], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn zero_aspect_produces_infinity() {
        let p = TransformFactory::perspective(1.0, 0.0, 0.1, 10.0);
        assert!(p[(0, 0)].is_infinite());
    }

    #[test]
    fn look_at_direction_row_is_negated_direction() {
        let eye = Point3::new(1.0, 2.0, 3.0);
        let d = Vector3::new(-2.0, 0.5, -4.0);
        let view = TransformFactory::look_at(&eye, &(eye + d), &Vector3::y());
        let expected = -d.normalize();
        assert_relative_eq!(view[(2, 0)], expected.x, epsilon = 1e-6);
        assert_relative_eq!(view[(2, 1)], expected.y, epsilon = 1e-6);
        assert_relative_eq!(view[(2, 2)], expected.z, epsilon = 1e-6);
    }

    #[test]
    fn look_at_moves_eye_to_origin() {
        let eye = Point3::new(0.0, 0.0, 1.5);
        let view = TransformFactory::look_at(&eye, &Point3::origin(), &Vector3::y());
        let eye_in_view = view * eye.to_homogeneous();
        assert_relative_eq!(eye_in_view, Vector4::new(0.0, 0.0, 0.0, 1.0), epsilon = 1e-6);
        let target_in_view = view * Point3::<f32>::origin().to_homogeneous();
        assert_relative_eq!(target_in_view.z, -1.5, epsilon = 1e-6);
    }

    #[test]
    fn look_at_tangent_is_the_raw_cross_product() {
        let eye = Point3::new(0.0, 1.0, 1.5);
        let view = TransformFactory::look_at(&eye, &Point3::origin(), &Vector3::y());
        let d = (Point3::origin() - eye).normalize();
        let tangent = d.cross(&Vector3::y());
        assert_relative_eq!(view[(0, 0)], tangent.x, epsilon = 1e-6);
        assert_relative_eq!(view[(0, 1)], tangent.y, epsilon = 1e-6);
        assert_relative_eq!(view[(0, 2)], tangent.z, epsilon = 1e-6);
        // Elevated eye: up is not perpendicular to d, so the row is shorter than 1.
        assert_relative_eq!(tangent.norm(), 0.83205, epsilon = 1e-4);

        let bitangent = tangent.cross(&d);
        assert_relative_eq!(view[(1, 0)], bitangent.x, epsilon = 1e-6);
        assert_relative_eq!(view[(1, 1)], bitangent.y, epsilon = 1e-6);
        assert_relative_eq!(view[(1, 2)], bitangent.z, epsilon = 1e-6);
    }

    #[test]
    fn look_at_along_up_is_degenerate_but_finite() {
        let view = TransformFactory::look_at(&Point3::origin(), &Point3::new(0.0, 5.0, 0.0), &Vector3::y());
        assert_eq!(view[(0, 0)], 0.0);
        assert_eq!(view[(0, 1)], 0.0);
        assert_eq!(view[(0, 2)], 0.0);
    }

    #[test]
    fn column_major_round_trip_transposes_rows() {
        let m = sample_matrix();
        let flat = to_column_major(&m);
        assert_eq!(&flat[0..4], &[1.0, 5.0, 9.0, 13.0]);
        assert_eq!(from_column_major(&flat), m);
    }
}
