//! Mesh ingestion and live shading.
//!
//! OBJ text is parsed and flattened into an interleaved, non-indexed vertex
//! stream; a [`pipeline::renderer::Renderer`] owns the render context and
//! hot-swaps fragment shaders submitted from other threads through its
//! frame task queue.

pub mod core;
pub mod error;
pub mod gpu;
pub mod io;
pub mod pipeline;
pub mod scene;

pub use error::{Error, Result};
