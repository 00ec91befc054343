pub mod camera;
pub mod model;
pub mod presets;
pub mod texture;
