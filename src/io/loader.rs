use crate::core::geometry::Vertex;
use crate::error::Result;
use crate::gpu::RenderBackend;
use crate::io::assembler::assemble;
use crate::io::obj_loader::ObjDocument;
use crate::pipeline::renderer::RenderHandle;
use crate::scene::texture::Texture;
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Where mesh text comes from.
#[derive(Debug, Clone)]
pub enum MeshSource {
    File(PathBuf),
    Text(String),
}

impl MeshSource {
    fn reader(&self) -> Result<Box<dyn BufRead + Send>> {
        Ok(match self {
            MeshSource::File(path) => Box::new(BufReader::new(File::open(path)?)),
            MeshSource::Text(text) => Box::new(Cursor::new(text.clone().into_bytes())),
        })
    }

    /// Counts lines up front so progress can be reported as a fraction.
    pub fn count_lines(&self) -> Result<usize> {
        match self {
            MeshSource::File(_) => {
                let mut count = 0;
                for line in self.reader()?.lines() {
                    line?;
                    count += 1;
                }
                Ok(count)
            }
            MeshSource::Text(text) => Ok(text.lines().count()),
        }
    }

    fn describe(&self) -> String {
        match self {
            MeshSource::File(path) => path.display().to_string(),
            MeshSource::Text(text) => format!("<{} bytes of text>", text.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub lines_processed: usize,
    pub total_lines: usize,
}

impl LoadProgress {
    pub fn fraction(&self) -> f32 {
        if self.total_lines == 0 {
            1.0
        } else {
            self.lines_processed as f32 / self.total_lines as f32
        }
    }

    pub fn is_complete(&self) -> bool {
        self.lines_processed >= self.total_lines
    }
}

/// A mesh handed to the render thread, waiting for a frame to install it.
#[derive(Debug)]
pub struct QueuedMesh {
    pub vertex_count: usize,
    /// Yields the install outcome after the next frame.
    pub installed: Receiver<Result<()>>,
}

/// Parses and assembles a mesh off the render thread.
pub struct MeshLoader;

impl MeshLoader {
    /// Parses `source` into a vertex list, calling `progress` once per line.
    pub fn load(source: &MeshSource, mut progress: impl FnMut(LoadProgress)) -> Result<Vec<Vertex>> {
        let start = Instant::now();
        let total_lines = source.count_lines()?;
        let document = ObjDocument::parse_reader(source.reader()?, |lines_processed| {
            progress(LoadProgress {
                lines_processed,
                total_lines,
            })
        })?;
        let vertices = assemble(&document)?;
        info!(
            "Loaded {} ({} faces, {} vertices) in {:?}",
            source.describe(),
            document.faces.len(),
            vertices.len(),
            start.elapsed()
        );
        Ok(vertices)
    }

    /// Loads on a new thread and queues the finished model on `handle`.
    ///
    /// Progress ticks are dropped rather than blocking when `progress` is
    /// full, except the final one, which waits for room; drain the receiver
    /// before joining. A failed load queues nothing; the error is
    /// returned through the join handle. On success the handle yields the
    /// queued mesh, whose receiver reports whether the render thread could
    /// install it.
    pub fn spawn<B: RenderBackend + 'static>(
        source: MeshSource,
        texture: Option<PathBuf>,
        handle: RenderHandle<B>,
        progress: Option<Sender<LoadProgress>>,
    ) -> JoinHandle<Result<QueuedMesh>> {
        thread::spawn(move || {
            let mut undelivered = None;
            let vertices = Self::load(&source, |tick| {
                if let Some(tx) = &progress {
                    undelivered = tx.try_send(tick).is_err().then_some(tick);
                }
            })?;
            if let (Some(tx), Some(tick)) = (&progress, undelivered) {
                // Blocks until there is room; a gone receiver is fine.
                let _ = tx.send(tick);
            }

            let texture = match texture {
                Some(path) => Some(Texture::load(&path)?),
                None => None,
            };

            let vertex_count = vertices.len();
            let installed = handle.install_model(vertices, texture).inspect_err(|_| {
                warn!("Render context went away before the mesh could be installed")
            })?;
            Ok(QueuedMesh {
                vertex_count,
                installed,
            })
        })
    }
}
