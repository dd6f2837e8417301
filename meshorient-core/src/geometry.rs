/// Mesh vertex data owned by a scene object
use nalgebra::{Point3, Vector3};

/// One corner of a face: indices into the mesh's attribute lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corner {
    pub position: usize,
    pub tex_coord: Option<usize>,
    pub normal: Option<usize>,
}

impl Corner {
    pub fn new(position: usize) -> Self {
        Self {
            position,
            tex_coord: None,
            normal: None,
        }
    }
}

/// A polygon face
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Face {
    pub corners: Vec<Corner>,
}

impl Face {
    pub fn new(corners: Vec<Corner>) -> Self {
        Self { corners }
    }

    pub fn triangle(a: usize, b: usize, c: usize) -> Self {
        Self::new(vec![Corner::new(a), Corner::new(b), Corner::new(c)])
    }

    /// Calculate the face normal from its first three corners
    pub fn calculate_normal(&self, mesh: &MeshData) -> Option<Vector3<f64>> {
        let [a, b, c] = match self.corners.as_slice() {
            [a, b, c, ..] => [a, b, c],
            _ => return None,
        };
        let v0 = mesh.positions.get(a.position)?;
        let v1 = mesh.positions.get(b.position)?;
        let v2 = mesh.positions.get(c.position)?;

        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        edge1.cross(&edge2).try_normalize(f64::EPSILON)
    }

    /// Fan-triangulate into position index triples
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        let first = self.corners.first().map(|c| c.position);
        self.corners.windows(2).skip(1).filter_map(move |pair| {
            first.map(|first| [first, pair[0].position, pair[1].position])
        })
    }
}

/// Mutable vertex set of one mesh object, in the object's local coordinates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Point3<f64>>,
    pub normals: Vec<Vector3<f64>>,
    pub tex_coords: Vec<[f64; 2]>,
    pub faces: Vec<Face>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize, faces: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices),
            normals: Vec::new(),
            tex_coords: Vec::new(),
            faces: Vec::with_capacity(faces),
        }
    }

    /// Push a position and return its index
    pub fn add_position(&mut self, position: Point3<f64>) -> usize {
        self.positions.push(position);
        self.positions.len() - 1
    }

    pub fn add_normal(&mut self, normal: Vector3<f64>) -> usize {
        self.normals.push(normal);
        self.normals.len() - 1
    }

    pub fn add_face(&mut self, face: Face) {
        self.faces.push(face);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Create a simple cube mesh for testing
    pub fn cube(size: f64) -> Self {
        let half = size / 2.0;
        let mut mesh = Self::with_capacity(8, 12);

        for &z in &[-half, half] {
            mesh.add_position(Point3::new(-half, -half, z));
            mesh.add_position(Point3::new(half, -half, z));
            mesh.add_position(Point3::new(half, half, z));
            mesh.add_position(Point3::new(-half, half, z));
        }

        // Back, front, bottom, top, left, right
        let quads = [
            [0, 3, 2, 1],
            [4, 5, 6, 7],
            [0, 1, 5, 4],
            [3, 7, 6, 2],
            [0, 4, 7, 3],
            [1, 2, 6, 5],
        ];
        for [a, b, c, d] in quads {
            mesh.add_face(Face::triangle(a, b, c));
            mesh.add_face(Face::triangle(a, c, d));
        }

        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_counts() {
        let cube = MeshData::cube(2.0);
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.faces.len(), 12);
        assert!(cube.positions.iter().all(|p| p.x.abs() == 1.0));
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let cube = MeshData::cube(2.0);
        for face in &cube.faces {
            let normal = face.calculate_normal(&cube).unwrap();
            let center = face
                .corners
                .iter()
                .fold(Vector3::zeros(), |acc, c| acc + cube.positions[c.position].coords)
                / 3.0;
            assert!(normal.dot(&center) > 0.0);
        }
    }

    #[test]
    fn test_front_face_normal() {
        let cube = MeshData::cube(2.0);
        let normal = cube.faces[2].calculate_normal(&cube).unwrap();
        assert_relative_eq!(normal, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_fan_triangulation() {
        let quad = Face::new((0..4).map(Corner::new).collect());
        let triangles: Vec<_> = quad.triangles().collect();
        assert_eq!(triangles, vec![[0, 1, 2], [0, 2, 3]]);

        let degenerate = Face::new(vec![Corner::new(0), Corner::new(1)]);
        assert_eq!(degenerate.triangles().count(), 0);
        assert!(degenerate.calculate_normal(&MeshData::cube(1.0)).is_none());
    }
}
