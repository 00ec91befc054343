pub mod assembler;
pub mod config;
pub mod image;
pub mod loader;
pub mod obj_loader;
