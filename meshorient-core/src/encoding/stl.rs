/// STL reader (binary and ASCII) and binary writer
use std::io::Write;

use nalgebra::{Point3, Vector3};
use nom::{
    bytes::complete::{tag, take},
    character::complete::{multispace0, multispace1, not_line_ending},
    multi::{count, many0},
    number::complete::{float, le_f32, le_u16, le_u32},
    sequence::{preceded, tuple},
    IResult,
};

use super::{ExportFrame, MeshEncoding};
use crate::coords::AxisConvention;
use crate::geometry::{Corner, Face, MeshData};
use crate::scene::{ObjectKind, Scene, SceneObject};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

pub struct StlEncoding;

impl MeshEncoding for StlEncoding {
    fn name(&self) -> &'static str {
        "stl"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["stl"]
    }

    fn axis_convention(&self) -> AxisConvention {
        AxisConvention::ZUp
    }

    fn decode(&self, data: &[u8]) -> Result<Scene, String> {
        let (name, mesh) = parse_stl(data)?;
        let mut scene = Scene::new(self.axis_convention());
        scene.add(SceneObject::mesh(name, mesh));
        Ok(scene)
    }

    fn encode(&self, scene: &Scene, out: &mut dyn Write) -> std::io::Result<()> {
        write_binary_stl(scene, self.axis_convention(), out)
    }
}

/// Facets become unshared triangles, each corner carrying the facet normal
#[derive(Default)]
struct FacetBuilder {
    mesh: MeshData,
}

impl FacetBuilder {
    fn add(&mut self, normal: [f32; 3], vertices: [[f32; 3]; 3]) {
        let normal = Vector3::new(normal[0], normal[1], normal[2]).cast::<f64>();
        let normal = normal
            .try_normalize(f64::EPSILON)
            .map(|unit| self.mesh.add_normal(unit));
        let corners = vertices
            .iter()
            .map(|[x, y, z]| Corner {
                position: self
                    .mesh
                    .add_position(Point3::new(f64::from(*x), f64::from(*y), f64::from(*z))),
                tex_coord: None,
                normal,
            })
            .collect();
        self.mesh.add_face(Face::new(corners));
    }
}

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<MeshData, String> {
    if data.len() < HEADER_LEN + 4 {
        return Err("File too small to be a valid STL".to_string());
    }

    let (_, triangle_count) = preceded(take(HEADER_LEN), le_u32::<_, nom::error::Error<&[u8]>>)(data)
        .map_err(|_| "Unexpected end of file".to_string())?;
    let triangle_count = triangle_count as usize;

    let body = &data[HEADER_LEN + 4..];
    if body.len() < triangle_count * FACET_LEN {
        return Err(format!(
            "Unexpected end of file: {triangle_count} facets need {} bytes, found {}",
            triangle_count * FACET_LEN,
            body.len()
        ));
    }

    let (_, facets) = count(binary_facet, triangle_count)(body)
        .map_err(|_| "Unexpected end of file".to_string())?;

    let mut builder = FacetBuilder::default();
    for (normal, vertices) in facets {
        builder.add(normal, vertices);
    }
    Ok(builder.mesh)
}

fn le_vector3(input: &[u8]) -> IResult<&[u8], [f32; 3]> {
    let (input, (x, y, z)) = tuple((le_f32, le_f32, le_f32))(input)?;
    Ok((input, [x, y, z]))
}

fn binary_facet(input: &[u8]) -> IResult<&[u8], ([f32; 3], [[f32; 3]; 3])> {
    let (input, normal) = le_vector3(input)?;
    let (input, (a, b, c)) = tuple((le_vector3, le_vector3, le_vector3))(input)?;
    // Attribute byte count
    let (input, _) = le_u16(input)?;
    Ok((input, (normal, [a, b, c])))
}

/// Parse an ASCII STL file, returning the solid's name
pub fn parse_ascii_stl(input: &str) -> Result<(String, MeshData), String> {
    match parse_ascii_stl_impl(input) {
        Ok((_, parsed)) => Ok(parsed),
        Err(e) => Err(format!("Failed to parse ASCII STL: {:?}", e)),
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, (String, MeshData)> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, name) = not_line_ending(input)?; // Optional name
    let (input, facets) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;

    let mut builder = FacetBuilder::default();
    for (normal, vertices) in facets {
        builder.add(normal, vertices);
    }

    Ok((input, (name.trim().to_string(), builder.mesh)))
}

fn parse_facet(input: &str) -> IResult<&str, ([f32; 3], [[f32; 3]; 3])> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input)?;
    let (input, v2) = parse_vertex(input)?;
    let (input, v3) = parse_vertex(input)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, (normal, [v1, v2, v3])))
}

fn parse_vertex(input: &str) -> IResult<&str, [f32; 3]> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    parse_vector3(input)
}

fn parse_vector3(input: &str) -> IResult<&str, [f32; 3]> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, [x, y, z]))
}

/// Detect and parse STL file (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<(String, MeshData), String> {
    // Binary files may also start with "solid", so ASCII is only a first guess
    if data.starts_with(b"solid") {
        if let Ok(text) = std::str::from_utf8(data) {
            if let Ok(parsed) = parse_ascii_stl(text) {
                return Ok(parsed);
            }
        }
    }

    parse_binary_stl(data).map(|mesh| ("mesh".to_string(), mesh))
}

fn write_binary_stl(scene: &Scene, convention: AxisConvention, out: &mut dyn Write) -> std::io::Result<()> {
    let mut facets: Vec<[Vector3<f64>; 4]> = Vec::new();
    for object in &scene.objects {
        let mesh = match &object.kind {
            ObjectKind::Mesh(mesh) => mesh,
            _ => continue,
        };
        let export = ExportFrame::new(&object.frame, convention);
        for face in &mesh.faces {
            for [a, b, c] in face.triangles() {
                let normal = Face::triangle(a, b, c)
                    .calculate_normal(mesh)
                    .map(|n| export.normal(&n))
                    .unwrap_or_else(Vector3::zeros);
                facets.push([
                    normal,
                    export.point(&mesh.positions[a]).coords,
                    export.point(&mesh.positions[b]).coords,
                    export.point(&mesh.positions[c]).coords,
                ]);
            }
        }
    }

    let mut header = [0u8; HEADER_LEN];
    let label = b"meshorient";
    header[..label.len()].copy_from_slice(label);
    out.write_all(&header)?;
    out.write_all(&(facets.len() as u32).to_le_bytes())?;

    for facet in &facets {
        for v in facet {
            for component in [v.x, v.y, v.z] {
                out.write_all(&(component as f32).to_le_bytes())?;
            }
        }
        out.write_all(&0u16.to_le_bytes())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{AffineTransform, Space};
    use approx::assert_relative_eq;
    use nalgebra::Matrix4;

    #[test]
    fn test_parse_binary_header() {
        let mut data = vec![0u8; 84];
        // Set triangle count to 0
        data[80..84].copy_from_slice(&0u32.to_le_bytes());

        let result = parse_binary_stl(&data);
        assert!(result.is_ok());
        let mesh = result.unwrap();
        assert_eq!(mesh.faces.len(), 0);
    }

    #[test]
    fn test_truncated_binary_is_rejected() {
        let mut data = vec![0u8; 84 + 49];
        data[80..84].copy_from_slice(&1u32.to_le_bytes());
        assert!(parse_binary_stl(&data).is_err());
        assert!(parse_binary_stl(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_parse_named_ascii_solid() {
        let text = "solid bracket
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid bracket
";
        let (name, mesh) = parse_stl(text.as_bytes()).unwrap();
        assert_eq!(name, "bracket");
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.normals, vec![Vector3::z()]);
        assert_eq!(mesh.faces[0].corners[2].normal, Some(0));
    }

    #[test]
    fn test_binary_round_trip() {
        let mut scene = Scene::new(AxisConvention::ZUp);
        scene.add(SceneObject::mesh("cube", MeshData::cube(2.0)));

        let mut out = Vec::new();
        StlEncoding.encode(&scene, &mut out).unwrap();
        assert_eq!(out.len(), 84 + 12 * 50);

        let decoded = StlEncoding.decode(&out).unwrap();
        let mesh = decoded.objects[0].as_mesh().unwrap();
        assert_eq!(mesh.faces.len(), 12);
        assert_eq!(mesh.positions.len(), 36);

        // Written normals are the outward face normals
        let front = mesh.faces[2].corners[0].normal.unwrap();
        assert_relative_eq!(mesh.normals[front], Vector3::z(), epsilon = 1e-6);
    }

    #[test]
    fn test_written_normals_follow_object_frame() {
        let frame = Matrix4::new_translation(&Vector3::new(5.0, 0.0, 0.0))
            * AffineTransform::quarter_turn_x(1, Space::Local).matrix();
        let mut scene = Scene::new(AxisConvention::ZUp);
        scene.add(SceneObject::mesh("cube", MeshData::cube(2.0)).with_frame(frame));

        let mut out = Vec::new();
        StlEncoding.encode(&scene, &mut out).unwrap();
        let decoded = StlEncoding.decode(&out).unwrap();
        let mesh = decoded.objects[0].as_mesh().unwrap();

        let front = &mesh.faces[2];
        assert_relative_eq!(
            mesh.normals[front.corners[0].normal.unwrap()],
            -Vector3::y(),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            mesh.positions[front.corners[0].position],
            Point3::new(4.0, -1.0, -1.0),
            epsilon = 1e-6
        );
    }
}
