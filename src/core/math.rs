pub mod transform;
pub mod vector;
