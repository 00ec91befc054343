pub mod compile_log;
pub mod frame_tasks;
pub mod renderer;
pub mod shader_program;
