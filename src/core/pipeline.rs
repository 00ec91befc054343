use nalgebra::{Vector3, Vector4};
use std::ops::{Add, Mul};

/// Per-vertex outputs that can be blended across a triangle.
pub trait Interpolatable:
    Copy + Clone + Add<Output = Self> + Mul<f32, Output = Self> + Send + Sync
{
}

impl<T> Interpolatable for T where
    T: Copy + Clone + Add<Output = T> + Mul<f32, Output = T> + Send + Sync
{
}

/// The programmable stages the software rasterizer runs.
///
/// Fragment shading is invoked from several threads at once.
pub trait Shader: Send + Sync {
    /// Per-vertex data interpolated for each fragment.
    type Varying: Interpolatable;
    /// Whatever the vertex stage consumes.
    type Input;

    /// Returns the clip-space position and the varying for one vertex.
    fn vertex(&self, input: &Self::Input) -> (Vector4<f32>, Self::Varying);

    /// Returns the linear RGB colour of a fragment.
    fn fragment(&self, varying: Self::Varying) -> Vector3<f32>;
}
