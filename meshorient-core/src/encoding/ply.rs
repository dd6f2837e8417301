/// PLY (Polygon File Format) reader and writer
///
/// Reads `ascii`, `binary_little_endian` and `binary_big_endian` files through `ply-rs`.
/// Vertex positions (`x`, `y`, `z`), optional normals (`nx`, `ny`, `nz`) and `face` index
/// lists are kept; other properties and elements are dropped. Writes ASCII with double
/// precision coordinates.
use std::io::Write;

use nalgebra::{Point3, Vector3};
use ply_rs::parser::Parser;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Header, Ply, Property, PropertyDef,
    PropertyType, ScalarType,
};
use ply_rs::writer::Writer;

use super::{ExportFrame, MeshEncoding};
use crate::coords::AxisConvention;
use crate::geometry::{Corner, Face, MeshData};
use crate::scene::{ObjectKind, Scene, SceneObject};

const OBJECT_NAME: &str = "mesh";
const INDEX_LISTS: [&str; 2] = ["vertex_indices", "vertex_index"];

pub struct PlyEncoding;

impl MeshEncoding for PlyEncoding {
    fn name(&self) -> &'static str {
        "ply"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ply"]
    }

    fn axis_convention(&self) -> AxisConvention {
        AxisConvention::ZUp
    }

    fn decode(&self, data: &[u8]) -> Result<Scene, String> {
        let mesh = read_ply(data)?;
        let mut scene = Scene::new(self.axis_convention());
        scene.add(SceneObject::mesh(OBJECT_NAME, mesh));
        Ok(scene)
    }

    fn encode(&self, scene: &Scene, out: &mut dyn Write) -> std::io::Result<()> {
        write_ply(scene, self.axis_convention(), out)
    }
}

fn read_ply(data: &[u8]) -> Result<MeshData, String> {
    let mut reader = data;
    let parser = Parser::<DefaultElement>::new();

    let header = parser
        .read_header(&mut reader)
        .map_err(|e| format!("failed to parse PLY header: {e}"))?;
    check_counts(&header, reader.len())?;

    let payload = parser
        .read_payload(&mut reader, &header)
        .map_err(|e| format!("failed to read PLY payload: {e}"))?;

    let vertices = payload.get("vertex").map(Vec::as_slice).unwrap_or_default();
    let faces = payload.get("face").map(Vec::as_slice).unwrap_or_default();
    let has_normals = !vertices.is_empty()
        && vertices.iter().all(|v| {
            ["nx", "ny", "nz"]
                .iter()
                .all(|key| v.get(*key).and_then(scalar).is_some())
        });

    let mut mesh = MeshData::with_capacity(vertices.len(), faces.len());
    for (i, element) in vertices.iter().enumerate() {
        let coord = |key: &str| element.get(key).and_then(scalar);
        let (Some(x), Some(y), Some(z)) = (coord("x"), coord("y"), coord("z")) else {
            return Err(format!("vertex {i} lacks numeric x, y, z properties"));
        };
        mesh.add_position(Point3::new(x, y, z));
        if let (true, Some(nx), Some(ny), Some(nz)) = (has_normals, coord("nx"), coord("ny"), coord("nz")) {
            mesh.add_normal(Vector3::new(nx, ny, nz));
        }
    }

    let vertex_count = mesh.positions.len();
    for (i, element) in faces.iter().enumerate() {
        let indices = INDEX_LISTS
            .iter()
            .find_map(|key| element.get(*key))
            .and_then(index_list)
            .ok_or_else(|| format!("face {i} lacks a vertex_indices list"))?;
        if indices.len() < 3 {
            return Err(format!("face {i} has fewer than 3 corners"));
        }
        let corners = indices
            .iter()
            .map(|&index| {
                let position = usize::try_from(index)
                    .ok()
                    .filter(|&p| p < vertex_count)
                    .ok_or_else(|| {
                        format!("face index {index} is out of range ({vertex_count} vertices)")
                    })?;
                Ok(Corner {
                    position,
                    tex_coord: None,
                    normal: has_normals.then_some(position),
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        mesh.add_face(Face::new(corners));
    }

    Ok(mesh)
}

/// Reject headers whose element counts cannot fit in the body that follows
fn check_counts(header: &Header, body_len: usize) -> Result<(), String> {
    let ascii = matches!(header.encoding, Encoding::Ascii);
    let mut needed: usize = 0;
    for element in header.elements.values() {
        // Smallest encoding of one row: a digit and a separator per ASCII value
        let row: usize = element
            .properties
            .values()
            .map(|p| match (&p.data_type, ascii) {
                (_, true) => 2,
                (PropertyType::Scalar(ty), false) | (PropertyType::List(ty, _), false) => {
                    scalar_size(ty)
                }
            })
            .sum();
        needed = element
            .count
            .checked_mul(row.max(1))
            .and_then(|bytes| needed.checked_add(bytes))
            .ok_or_else(|| {
                format!("element {:?} count {} is implausible", element.name, element.count)
            })?;
    }
    // The last ASCII line may lack its line break
    let available = if ascii { body_len + 1 } else { body_len };
    if needed > available {
        return Err(format!(
            "header declares at least {needed} body bytes, found {body_len}"
        ));
    }
    Ok(())
}

fn scalar_size(ty: &ScalarType) -> usize {
    match ty {
        ScalarType::Char | ScalarType::UChar => 1,
        ScalarType::Short | ScalarType::UShort => 2,
        ScalarType::Int | ScalarType::UInt | ScalarType::Float => 4,
        ScalarType::Double => 8,
    }
}

fn scalar(property: &Property) -> Option<f64> {
    Some(match *property {
        Property::Char(v) => f64::from(v),
        Property::UChar(v) => f64::from(v),
        Property::Short(v) => f64::from(v),
        Property::UShort(v) => f64::from(v),
        Property::Int(v) => f64::from(v),
        Property::UInt(v) => f64::from(v),
        Property::Float(v) => f64::from(v),
        Property::Double(v) => v,
        _ => return None,
    })
}

fn index_list(property: &Property) -> Option<Vec<i64>> {
    Some(match property {
        Property::ListChar(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListUChar(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListShort(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListUShort(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListInt(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListUInt(v) => v.iter().map(|&i| i64::from(i)).collect(),
        _ => return None,
    })
}

fn write_ply(scene: &Scene, convention: AxisConvention, out: &mut dyn Write) -> std::io::Result<()> {
    let meshes: Vec<_> = scene
        .objects
        .iter()
        .filter_map(|object| match &object.kind {
            ObjectKind::Mesh(mesh) => Some((ExportFrame::new(&object.frame, convention), mesh)),
            _ => None,
        })
        .collect();

    let with_normals = !meshes.is_empty()
        && meshes
            .iter()
            .all(|(_, mesh)| mesh.normals.len() == mesh.positions.len());

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;
    ply.header.comments.push("meshorient".to_string());

    let mut vertex_def = ElementDef::new("vertex".to_string());
    let mut columns = vec!["x", "y", "z"];
    if with_normals {
        columns.extend(["nx", "ny", "nz"]);
    }
    for name in &columns {
        vertex_def.properties.add(PropertyDef::new(
            name.to_string(),
            PropertyType::Scalar(ScalarType::Double),
        ));
    }

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::UInt),
    ));

    let mut vertex_elements = Vec::new();
    let mut face_elements = Vec::new();
    let mut base = 0;
    for (export, mesh) in &meshes {
        for (i, p) in mesh.positions.iter().enumerate() {
            let p = export.point(p);
            let mut values = vec![p.x, p.y, p.z];
            if with_normals {
                let n = export.normal(&mesh.normals[i]);
                values.extend([n.x, n.y, n.z]);
            }
            let mut element = DefaultElement::new();
            for (name, value) in columns.iter().zip(values) {
                element.insert(name.to_string(), Property::Double(value));
            }
            vertex_elements.push(element);
        }

        // A uchar count holds at most 255 corners; larger faces are fanned
        for face in &mesh.faces {
            let lists: Vec<Vec<u32>> = if face.corners.len() <= usize::from(u8::MAX) {
                vec![face.corners.iter().map(|c| (c.position + base) as u32).collect()]
            } else {
                face.triangles()
                    .map(|t| t.iter().map(|&i| (i + base) as u32).collect())
                    .collect()
            };
            for indices in lists {
                let mut element = DefaultElement::new();
                element.insert("vertex_indices".to_string(), Property::ListUInt(indices));
                face_elements.push(element);
            }
        }
        base += mesh.positions.len();
    }

    vertex_def.count = vertex_elements.len();
    face_def.count = face_elements.len();
    ply.header.elements.add(vertex_def);
    ply.header.elements.add(face_def);
    ply.payload.insert("vertex".to_string(), vertex_elements);
    ply.payload.insert("face".to_string(), face_elements);

    let mut out = out;
    Writer::new().write_ply(&mut out, &mut ply)?;
    Ok(())
}
