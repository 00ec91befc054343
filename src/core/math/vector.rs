use nalgebra::{Vector2, Vector3};

/// Normalisation and in-place assignment with the mesh pipeline's conventions.
///
/// `normalized_or_self` returns the receiver unchanged when its magnitude is
/// exactly `0.0` or `1.0`. Near-zero inputs are still divided by their
/// magnitude; only the exact zero vector is left alone.
pub trait VectorExt: Sized + Copy {
    fn normalized_or_self(&self) -> Self;

    /// Overwrites every component with the matching one from `other`.
    fn set(&mut self, other: &Self);
}

impl VectorExt for Vector3<f32> {
    fn normalized_or_self(&self) -> Self {
        let magnitude = self.magnitude();
        if magnitude == 0.0 || magnitude == 1.0 {
            return *self;
        }
        self.scale(1.0 / magnitude)
    }

    fn set(&mut self, other: &Self) {
        self.copy_from(other);
    }
}

impl VectorExt for Vector2<f32> {
    fn normalized_or_self(&self) -> Self {
        let magnitude = self.magnitude();
        if magnitude == 0.0 || magnitude == 1.0 {
            return *self;
        }
        self.scale(1.0 / magnitude)
    }

    fn set(&mut self, other: &Self) {
        self.copy_from(other);
    }
}
