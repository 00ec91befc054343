use crate::gpu::ShaderStage;
use crate::pipeline::compile_log::CompileLog;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by mesh loading, the render context and configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A numeric token could not be parsed, or a face did not have exactly three vertices.
    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// A face referenced an entry that does not exist in its table.
    #[error("line {line}: {table} index {index} out of range (table holds {len} entries)")]
    IndexOutOfRange {
        line: usize,
        table: &'static str,
        index: usize,
        len: usize,
    },

    #[error("{stage} shader failed to compile ({} error(s))", log.error_count())]
    ShaderCompile { stage: ShaderStage, log: CompileLog },

    /// The render context refused to hand out a new object name.
    #[error("render context could not allocate {0}")]
    ResourceAllocation(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("the render context is no longer running")]
    LoaderDisconnected,
}
