use crate::core::geometry::Vertex;
use crate::error::{Error, Result};
use crate::io::obj_loader::{Face, ObjDocument};
use nalgebra::{Vector2, Vector3};

fn lookup<T: Copy>(table: &[T], index: usize, name: &'static str, face: &Face) -> Result<T> {
    table.get(index).copied().ok_or(Error::IndexOutOfRange {
        line: face.line,
        table: name,
        index,
        len: table.len(),
    })
}

/// Flattens parsed faces into a non-indexed vertex list.
///
/// Every face contributes three fresh vertices in face order; shared positions
/// are not de-duplicated. Any index outside its table aborts the whole
/// assembly. Texcoord or normal slots a face does not reference are zero.
pub fn assemble(document: &ObjDocument) -> Result<Vec<Vertex>> {
    let mut vertices = Vec::with_capacity(document.faces.len() * 3);

    for face in &document.faces {
        for corner in &face.vertices {
            let position = lookup(&document.positions, corner.position, "position", face)?;
            let normal = match corner.normal {
                Some(i) => lookup(&document.normals, i, "normal", face)?,
                None => Vector3::zeros(),
            };
            let texcoord = match corner.texcoord {
                Some(i) => lookup(&document.texcoords, i, "texcoord", face)?.xy(),
                None => Vector2::zeros(),
            };
            vertices.push(Vertex::new(position, normal, texcoord));
        }
    }

    Ok(vertices)
}
