use crate::error::{Error, Result};
use log::{debug, info};
use nalgebra::Vector3;
use std::io::BufRead;
use std::str::FromStr;

/// Vertices per face record; larger polygons are rejected, never triangulated.
pub const VERTS_PER_FACE: usize = 3;

/// One corner of a face, with 0-based indices into the parsed tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceVertex {
    pub position: usize,
    pub texcoord: Option<usize>,
    pub normal: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub vertices: [FaceVertex; VERTS_PER_FACE],
    /// 1-based source line, kept for diagnostics during assembly.
    pub line: usize,
}

/// A recognised line of mesh text.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjRecord {
    Comment(String),
    Vertex(Vector3<f32>),
    Normal(Vector3<f32>),
    /// The third component defaults to 0 when the line only has `u v`.
    TexCoord(Vector3<f32>),
    Group(String),
    Face(Face),
}

/// Splits a line into its type tag and the remaining payload.
fn split_tag(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.find(char::is_whitespace) {
        Some(end) => Some((&trimmed[..end], trimmed[end..].trim())),
        None => Some((trimmed, "")),
    }
}

fn parse_number<T: FromStr>(token: &str, line: usize) -> Result<T> {
    token.parse().map_err(|_| Error::MalformedRecord {
        line,
        reason: format!("'{token}' is not a number"),
    })
}

/// Parses `min..=max` floats; components past the third (a `v` weight) are dropped.
fn parse_coordinate(payload: &str, line: usize, min: usize, max: usize) -> Result<Vector3<f32>> {
    let values = payload
        .split_whitespace()
        .map(|token| parse_number::<f32>(token, line))
        .collect::<Result<Vec<f32>>>()?;
    if values.len() < min || values.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        return Err(Error::MalformedRecord {
            line,
            reason: format!("expected {expected} components, found {}", values.len()),
        });
    }
    Ok(Vector3::new(
        values[0],
        values[1],
        values.get(2).copied().unwrap_or(0.0),
    ))
}

/// Converts a 1-based OBJ index into a 0-based one.
fn parse_index(token: &str, line: usize) -> Result<usize> {
    let index: i64 = parse_number(token, line)?;
    if index < 1 {
        return Err(Error::MalformedRecord {
            line,
            reason: format!("index {index} is not a positive 1-based index"),
        });
    }
    Ok((index - 1) as usize)
}

fn parse_face_vertex(token: &str, line: usize) -> Result<FaceVertex> {
    let mut parts = token.split('/');
    let position = parse_index(parts.next().unwrap_or_default(), line)?;
    let optional = |part: Option<&str>| match part {
        None | Some("") => Ok(None),
        Some(p) => parse_index(p, line).map(Some),
    };
    let texcoord = optional(parts.next())?;
    let normal = optional(parts.next())?;
    if parts.next().is_some() {
        return Err(Error::MalformedRecord {
            line,
            reason: format!("'{token}' has more than three index components"),
        });
    }
    Ok(FaceVertex {
        position,
        texcoord,
        normal,
    })
}

fn parse_face(payload: &str, line: usize) -> Result<Face> {
    let corners = payload
        .split_whitespace()
        .map(|token| parse_face_vertex(token, line))
        .collect::<Result<Vec<_>>>()?;
    let vertices: [FaceVertex; VERTS_PER_FACE] =
        corners
            .try_into()
            .map_err(|corners: Vec<FaceVertex>| Error::MalformedRecord {
                line,
                reason: format!(
                    "face has {} vertices, only triangles are supported",
                    corners.len()
                ),
            })?;
    Ok(Face { vertices, line })
}

/// Parses one line. `line` is the 1-based line number used in errors.
///
/// Returns `Ok(None)` for blank lines and for tags this loader does not know.
pub fn parse_line(text: &str, line: usize) -> Result<Option<ObjRecord>> {
    let Some((tag, payload)) = split_tag(text) else {
        return Ok(None);
    };
    let record = match tag {
        "#" => ObjRecord::Comment(payload.to_string()),
        "v" => ObjRecord::Vertex(parse_coordinate(payload, line, 3, 4)?),
        "vn" => ObjRecord::Normal(parse_coordinate(payload, line, 3, 3)?),
        "vt" => ObjRecord::TexCoord(parse_coordinate(payload, line, 2, 3)?),
        "g" => ObjRecord::Group(payload.to_string()),
        "f" => ObjRecord::Face(parse_face(payload, line)?),
        _ => {
            // Unsupported directives (o, s, usemtl, mtllib, ...) are skipped.
            return Ok(None);
        }
    };
    Ok(Some(record))
}

/// The typed tables of one parse pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ObjDocument {
    pub positions: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub texcoords: Vec<Vector3<f32>>,
    pub faces: Vec<Face>,
    pub comments: Vec<String>,
    pub groups: Vec<String>,
    /// Lines whose tag was not recognised.
    pub skipped_lines: usize,
}

impl ObjDocument {
    pub fn push(&mut self, record: ObjRecord) {
        match record {
            ObjRecord::Comment(text) => self.comments.push(text),
            ObjRecord::Vertex(v) => self.positions.push(v),
            ObjRecord::Normal(n) => self.normals.push(n),
            ObjRecord::TexCoord(t) => self.texcoords.push(t),
            ObjRecord::Group(name) => self.groups.push(name),
            ObjRecord::Face(face) => self.faces.push(face),
        }
    }

    /// Parses mesh text held in memory.
    pub fn parse_str(text: &str) -> Result<Self> {
        Self::parse_lines(text.lines())
    }

    pub fn parse_lines<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut document = Self::default();
        for (i, line) in lines.into_iter().enumerate() {
            document.consume(line.as_ref(), i + 1)?;
        }
        Ok(document)
    }

    /// Streams lines from `reader`, calling `progress` with the number of lines read so far.
    pub fn parse_reader<R: BufRead>(reader: R, mut progress: impl FnMut(usize)) -> Result<Self> {
        let mut document = Self::default();
        let mut count = 0;
        for line in reader.lines() {
            let line = line?;
            count += 1;
            document.consume(&line, count)?;
            progress(count);
        }
        info!(
            "Parsed {} lines: {} positions, {} normals, {} texcoords, {} faces",
            count,
            document.positions.len(),
            document.normals.len(),
            document.texcoords.len(),
            document.faces.len()
        );
        Ok(document)
    }

    fn consume(&mut self, text: &str, line: usize) -> Result<()> {
        match parse_line(text, line)? {
            Some(record) => self.push(record),
            None if !text.trim().is_empty() => {
                self.skipped_lines += 1;
                debug!("Skipping unsupported line {line}: {text}");
            }
            None => {}
        }
        Ok(())
    }
}
