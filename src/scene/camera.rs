use crate::core::math::transform::TransformFactory;
use crate::core::math::vector::VectorExt;
use log::warn;
use nalgebra::{Matrix4, Point3, Vector3};

/// Manages the View and Projection matrices.
///
/// Both matrices are cached: the view is rebuilt when position, target or up
/// change, the projection when the viewport or field of view change.
#[derive(Debug, Clone)]
pub struct Camera {
    // --- View Parameters ---
    position: Point3<f32>,
    target: Point3<f32>,
    up: Vector3<f32>,
    direction: Vector3<f32>,

    // --- Projection Parameters ---
    fov_y_rad: f32,
    near: f32,
    far: f32,
    viewport_width: u32,
    viewport_height: u32,

    // --- Cached Matrices ---
    view_matrix: Matrix4<f32>,
    projection_matrix: Matrix4<f32>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Point3::new(0.0, 0.0, 1.5),
            Point3::origin(),
            Vector3::y(),
            60.0_f32.to_radians(),
            0.1,
            100.0,
        )
    }
}

impl Camera {
    /// Creates a perspective camera with a 1x1 viewport; call
    /// [`set_viewport`](Self::set_viewport) once the surface size is known.
    pub fn new(
        position: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
        fov_y_rad: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let mut cam = Self {
            position,
            target,
            up,
            direction: Vector3::zeros(),
            fov_y_rad,
            near,
            far,
            viewport_width: 1,
            viewport_height: 1,
            view_matrix: Matrix4::identity(),
            projection_matrix: Matrix4::identity(),
        };
        cam.rebuild_view();
        cam.rebuild_projection();
        cam
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
        self.rebuild_view();
    }

    pub fn set_target(&mut self, target: Point3<f32>) {
        self.target = target;
        self.rebuild_view();
    }

    pub fn set_up(&mut self, up: Vector3<f32>) {
        self.up = up;
        self.rebuild_view();
    }

    /// Zero dimensions are clamped to 1 so the aspect ratio stays finite.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            warn!("Clamping degenerate viewport {width}x{height}");
        }
        self.viewport_width = width.max(1);
        self.viewport_height = height.max(1);
        self.rebuild_projection();
    }

    pub fn set_field_of_view(&mut self, fov_y_rad: f32) {
        self.fov_y_rad = fov_y_rad;
        self.rebuild_projection();
    }

    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
        self.rebuild_projection();
    }

    pub fn rebuild_view(&mut self) {
        self.direction = (self.target - self.position).normalized_or_self();
        self.view_matrix = TransformFactory::look_at(&self.position, &self.target, &self.up);
    }

    pub fn rebuild_projection(&mut self) {
        self.projection_matrix =
            TransformFactory::perspective(self.fov_y_rad, self.aspect_ratio(), self.near, self.far);
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.viewport_width as f32 / self.viewport_height as f32
    }

    pub fn view(&self) -> Matrix4<f32> {
        self.view_matrix
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection_matrix
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn target(&self) -> Point3<f32> {
        self.target
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    /// Unit vector from position towards target.
    pub fn direction(&self) -> Vector3<f32> {
        self.direction
    }

    pub fn field_of_view(&self) -> f32 {
        self.fov_y_rad
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }
}
