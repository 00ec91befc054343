use nalgebra::{Vector2, Vector3};
use std::mem::size_of;

/// Number of `f32`s one assembled vertex occupies in the vertex stream.
pub const FLOATS_PER_VERTEX: usize = 14;

/// A flattened, non-indexed vertex ready for upload.
///
/// Every mesh uses this one layout; fields the source mesh does not provide
/// are zero-filled. Tangent and bitangent are reserved in the stride but no
/// tangent-space computation fills them yet.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub texcoord: Vector2<f32>,
    pub tangent: Vector3<f32>,
    pub bitangent: Vector3<f32>,
}

impl Vertex {
    pub fn new(position: Vector3<f32>, normal: Vector3<f32>, texcoord: Vector2<f32>) -> Self {
        Self {
            position,
            normal,
            texcoord,
            tangent: Vector3::zeros(),
            bitangent: Vector3::zeros(),
        }
    }

    /// Interleaved order: `position.xyz, normal.xyz, texcoord.xy, tangent.xyz, bitangent.xyz`.
    pub fn to_floats(&self) -> [f32; FLOATS_PER_VERTEX] {
        let (p, n, t, tg, bt) = (
            self.position,
            self.normal,
            self.texcoord,
            self.tangent,
            self.bitangent,
        );
        [
            p.x, p.y, p.z, n.x, n.y, n.z, t.x, t.y, tg.x, tg.y, tg.z, bt.x, bt.y, bt.z,
        ]
    }
}

/// One vertex attribute bound from the interleaved stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute name the vertex shader declares.
    pub name: &'static str,
    pub components: usize,
    /// Byte offset from the start of a vertex.
    pub offset: usize,
}

/// Byte layout of [`Vertex`] in the vertex stream.
pub struct VertexLayout;

impl VertexLayout {
    pub const STRIDE: usize = FLOATS_PER_VERTEX * size_of::<f32>();

    /// Attributes bound to the program, in declaration order.
    /// Tangent (offset 32) and bitangent (offset 44) are never bound.
    pub const ATTRIBUTES: [VertexAttribute; 3] = [
        VertexAttribute {
            name: "vPosition",
            components: 3,
            offset: 0,
        },
        VertexAttribute {
            name: "vNormal",
            components: 3,
            offset: 12,
        },
        VertexAttribute {
            name: "vTexture",
            components: 2,
            offset: 24,
        },
    ];
}

/// Packs vertices into the byte stream handed to the render backend.
pub fn vertex_bytes(vertices: &[Vertex]) -> Vec<u8> {
    let floats: Vec<[f32; FLOATS_PER_VERTEX]> = vertices.iter().map(Vertex::to_floats).collect();
    bytemuck::cast_slice(&floats).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_is_fifty_six_bytes() {
        assert_eq!(VertexLayout::STRIDE, 56);
    }

    #[test]
    fn attributes_follow_declaration_order() {
        let offsets: Vec<usize> = VertexLayout::ATTRIBUTES.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        let last = VertexLayout::ATTRIBUTES[2];
        assert!(last.offset + last.components * size_of::<f32>() <= VertexLayout::STRIDE);
    }

    #[test]
    fn floats_are_interleaved_in_layout_order() {
        let v = Vertex::new(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(4.0, 5.0, 6.0),
            Vector2::new(7.0, 8.0),
        );
        let floats = v.to_floats();
        assert_eq!(&floats[..8], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert!(floats[8..].iter().all(|f| *f == 0.0));
    }

    #[test]
    fn byte_stream_length_matches_stride() {
        let bytes = vertex_bytes(&[Vertex::default(); 3]);
        assert_eq!(bytes.len(), 3 * VertexLayout::STRIDE);
    }
}
