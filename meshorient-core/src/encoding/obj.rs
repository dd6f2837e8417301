/// Wavefront OBJ reader and writer
///
/// OBJ files are Y-up. Positions and normals are rotated into the Z-up scene frame on
/// import and back on export. Each `o` statement starts a new mesh object.
use std::collections::HashMap;
use std::io::Write;
use std::ops::Range;

use nalgebra::{Point3, Vector3};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, space0, space1},
    combinator::{all_consuming, map_res, opt, recognize},
    multi::separated_list1,
    number::complete::double,
    sequence::{pair, preceded, terminated, tuple},
    IResult, Parser,
};

use super::{ExportFrame, MeshEncoding};
use crate::coords::AxisConvention;
use crate::geometry::{Corner, Face, MeshData};
use crate::scene::{ObjectKind, Scene, SceneObject};

/// Name given to geometry that appears before any `o` statement
const DEFAULT_OBJECT: &str = "mesh";

pub struct ObjEncoding;

impl MeshEncoding for ObjEncoding {
    fn name(&self) -> &'static str {
        "obj"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["obj"]
    }

    fn axis_convention(&self) -> AxisConvention {
        AxisConvention::YUp
    }

    fn decode(&self, data: &[u8]) -> Result<Scene, String> {
        let text = std::str::from_utf8(data).map_err(|e| format!("OBJ is not UTF-8: {e}"))?;
        parse_obj(text, self.axis_convention())
    }

    fn encode(&self, scene: &Scene, out: &mut dyn Write) -> std::io::Result<()> {
        write_obj(scene, self.axis_convention(), out)
    }
}

/// A face corner with indices already resolved to 0-based global positions
#[derive(Debug, Clone, Copy)]
struct RawCorner {
    position: usize,
    tex_coord: Option<usize>,
    normal: Option<usize>,
}

/// One `o` block while parsing
#[derive(Debug)]
struct RawObject {
    name: String,
    positions: Range<usize>,
    tex_coords: Range<usize>,
    normals: Range<usize>,
    faces: Vec<Vec<RawCorner>>,
}

impl RawObject {
    fn new(name: &str, positions: usize, tex_coords: usize, normals: usize) -> Self {
        Self {
            name: name.to_string(),
            positions: positions..positions,
            tex_coords: tex_coords..tex_coords,
            normals: normals..normals,
            faces: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.faces.is_empty()
    }
}

/// Maps global indices to an object's local indices in order of first use
#[derive(Default)]
struct LocalIndex {
    map: HashMap<usize, usize>,
    order: Vec<usize>,
}

impl LocalIndex {
    fn intern(&mut self, global: usize) -> usize {
        let next = self.order.len();
        *self.map.entry(global).or_insert_with(|| {
            self.order.push(global);
            next
        })
    }
}

fn parse_obj(text: &str, convention: AxisConvention) -> Result<Scene, String> {
    let mut positions: Vec<Point3<f64>> = Vec::new();
    let mut tex_coords: Vec<[f64; 2]> = Vec::new();
    let mut normals: Vec<Vector3<f64>> = Vec::new();
    let mut objects = vec![RawObject::new(DEFAULT_OBJECT, 0, 0, 0)];

    for (number, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        let keyword = match line.split_whitespace().next() {
            Some(keyword) => keyword,
            None => continue,
        };
        let invalid = || format!("line {}: invalid `{keyword}` statement", number + 1);

        let current = objects.len() - 1;
        match keyword {
            "v" => {
                let (_, [x, y, z]) = position(line).map_err(|_| invalid())?;
                positions.push(convention.to_scene(&Point3::new(x, y, z)));
                objects[current].positions.end = positions.len();
            }
            "vt" => {
                let (_, uv) = tex_coord(line).map_err(|_| invalid())?;
                tex_coords.push(uv);
                objects[current].tex_coords.end = tex_coords.len();
            }
            "vn" => {
                let (_, [x, y, z]) = normal(line).map_err(|_| invalid())?;
                normals.push(convention.vector_to_scene(&Vector3::new(x, y, z)));
                objects[current].normals.end = normals.len();
            }
            "f" => {
                let (_, corners) = face(line).map_err(|_| invalid())?;
                let resolved = corners
                    .into_iter()
                    .map(|(p, t, n)| {
                        Ok(RawCorner {
                            position: resolve_index(p, positions.len(), "vertex")?,
                            tex_coord: t
                                .map(|t| resolve_index(t, tex_coords.len(), "texture coordinate"))
                                .transpose()?,
                            normal: n
                                .map(|n| resolve_index(n, normals.len(), "normal"))
                                .transpose()?,
                        })
                    })
                    .collect::<Result<Vec<_>, String>>()
                    .map_err(|e| format!("line {}: {e}", number + 1))?;
                if resolved.len() < 3 {
                    return Err(format!("line {}: face needs at least 3 corners", number + 1));
                }
                objects[current].faces.push(resolved);
            }
            "o" => {
                let name = line[1..].trim();
                let name = if name.is_empty() { DEFAULT_OBJECT } else { name };
                if objects[current].is_empty() && current == 0 {
                    objects.pop();
                }
                objects.push(RawObject::new(
                    name,
                    positions.len(),
                    tex_coords.len(),
                    normals.len(),
                ));
            }
            // Groups, materials, smoothing, lines: not geometry we move
            _ => {}
        }
    }

    let mut scene = Scene::new(convention);
    for object in objects.into_iter().filter(|o| !o.is_empty()) {
        let mesh = build_mesh(&object, &positions, &tex_coords, &normals);
        scene.add(SceneObject::mesh(object.name, mesh));
    }
    Ok(scene)
}

/// Gather the attributes an object declared or references into its own mesh
fn build_mesh(
    object: &RawObject,
    positions: &[Point3<f64>],
    tex_coords: &[[f64; 2]],
    normals: &[Vector3<f64>],
) -> MeshData {
    let mut position_index = LocalIndex::default();
    let mut tex_coord_index = LocalIndex::default();
    let mut normal_index = LocalIndex::default();

    object.positions.clone().for_each(|i| {
        position_index.intern(i);
    });
    object.tex_coords.clone().for_each(|i| {
        tex_coord_index.intern(i);
    });
    object.normals.clone().for_each(|i| {
        normal_index.intern(i);
    });

    let faces: Vec<Face> = object
        .faces
        .iter()
        .map(|corners| {
            Face::new(
                corners
                    .iter()
                    .map(|c| Corner {
                        position: position_index.intern(c.position),
                        tex_coord: c.tex_coord.map(|t| tex_coord_index.intern(t)),
                        normal: c.normal.map(|n| normal_index.intern(n)),
                    })
                    .collect(),
            )
        })
        .collect();

    MeshData {
        positions: position_index.order.iter().map(|&i| positions[i]).collect(),
        normals: normal_index.order.iter().map(|&i| normals[i]).collect(),
        tex_coords: tex_coord_index.order.iter().map(|&i| tex_coords[i]).collect(),
        faces,
    }
}

/// 1-based or negative (relative) OBJ index to a 0-based one
fn resolve_index(index: i64, count: usize, what: &str) -> Result<usize, String> {
    let resolved = match index {
        i if i > 0 => (i - 1) as usize,
        i if i < 0 => {
            let back = i.unsigned_abs() as usize;
            count
                .checked_sub(back)
                .ok_or_else(|| format!("{what} index {index} is out of range"))?
        }
        _ => return Err(format!("{what} index 0 is not valid")),
    };
    if resolved >= count {
        return Err(format!(
            "{what} index {index} is out of range ({count} defined)"
        ));
    }
    Ok(resolved)
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| s.parse::<i64>())(input)
}

fn triple(input: &str) -> IResult<&str, [f64; 3]> {
    let (input, (x, _, y, _, z)) = tuple((double, space1, double, space1, double))(input)?;
    Ok((input, [x, y, z]))
}

/// `v x y z`, ignoring an optional `w` or trailing vertex colors
fn position(line: &str) -> IResult<&str, [f64; 3]> {
    preceded(pair(tag("v"), space1), triple)(line)
}

fn normal(line: &str) -> IResult<&str, [f64; 3]> {
    all_consuming(terminated(preceded(pair(tag("vn"), space1), triple), space0))(line)
}

/// `vt u [v [w]]`
fn tex_coord(line: &str) -> IResult<&str, [f64; 2]> {
    let (rest, (u, v)) = preceded(
        pair(tag("vt"), space1),
        pair(double, opt(preceded(space1, double))),
    )(line)?;
    Ok((rest, [u, v.unwrap_or(0.0)]))
}

type FaceCorner = (i64, Option<i64>, Option<i64>);

/// `p`, `p/t`, `p//n` or `p/t/n`
fn corner(input: &str) -> IResult<&str, FaceCorner> {
    let (input, p) = integer(input)?;
    let (input, rest) = opt(preceded(
        char('/'),
        alt((
            preceded(char('/'), integer).map(|n| (None, Some(n))),
            pair(integer, opt(preceded(char('/'), integer))).map(|(t, n)| (Some(t), n)),
        )),
    ))(input)?;
    let (t, n) = rest.unwrap_or((None, None));
    Ok((input, (p, t, n)))
}

fn face(line: &str) -> IResult<&str, Vec<FaceCorner>> {
    all_consuming(terminated(
        preceded(pair(tag("f"), space1), separated_list1(space1, corner)),
        space0,
    ))(line)
}

fn write_obj(scene: &Scene, convention: AxisConvention, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "# meshorient")?;

    let (mut position_base, mut tex_coord_base, mut normal_base) = (1, 1, 1);
    for object in &scene.objects {
        let mesh = match &object.kind {
            ObjectKind::Mesh(mesh) => mesh,
            _ => continue,
        };
        let export = ExportFrame::new(&object.frame, convention);

        writeln!(out, "o {}", object.name)?;
        for p in &mesh.positions {
            let p = export.point(p);
            writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
        }
        for [u, v] in &mesh.tex_coords {
            writeln!(out, "vt {u} {v}")?;
        }
        for n in &mesh.normals {
            let n = export.normal(n);
            writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
        }
        for face in &mesh.faces {
            write!(out, "f")?;
            for c in &face.corners {
                let p = c.position + position_base;
                match (c.tex_coord, c.normal) {
                    (None, None) => write!(out, " {p}")?,
                    (Some(t), None) => write!(out, " {p}/{}", t + tex_coord_base)?,
                    (None, Some(n)) => write!(out, " {p}//{}", n + normal_base)?,
                    (Some(t), Some(n)) => {
                        write!(out, " {p}/{}/{}", t + tex_coord_base, n + normal_base)?
                    }
                }
            }
            writeln!(out)?;
        }

        position_base += mesh.positions.len();
        tex_coord_base += mesh.tex_coords.len();
        normal_base += mesh.normals.len();
    }

    Ok(())
}
