/// Explicit scene passed through the pipeline in place of host-owned state
use nalgebra::Matrix4;

use crate::coords::AxisConvention;
use crate::geometry::MeshData;

/// What a scene object holds
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Mesh(MeshData),
    Camera,
    Light,
    Empty,
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mesh(_) => "mesh",
            Self::Camera => "camera",
            Self::Light => "light",
            Self::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    /// Object-to-world placement matrix
    pub frame: Matrix4<f64>,
    pub kind: ObjectKind,
}

impl SceneObject {
    pub fn mesh(name: impl Into<String>, mesh: MeshData) -> Self {
        Self {
            name: name.into(),
            frame: Matrix4::identity(),
            kind: ObjectKind::Mesh(mesh),
        }
    }

    pub fn with_frame(mut self, frame: Matrix4<f64>) -> Self {
        self.frame = frame;
        self
    }

    pub fn as_mesh(&self) -> Option<&MeshData> {
        match &self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// Objects loaded from one mesh file, in file order.
///
/// Vertex data is held in the Z-up working frame regardless of the file's own
/// convention, which is remembered so export can restore it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub source_convention: AxisConvention,
}

impl Scene {
    pub fn new(source_convention: AxisConvention) -> Self {
        Self {
            objects: Vec::new(),
            source_convention,
        }
    }

    pub fn add(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn get(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|object| object.name == name)
    }

    pub fn meshes(&self) -> impl Iterator<Item = (&SceneObject, &MeshData)> {
        self.objects
            .iter()
            .filter_map(|object| object.as_mesh().map(|mesh| (object, mesh)))
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes().count()
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes().map(|(_, mesh)| mesh.vertex_count()).sum()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(AxisConvention::ZUp)
    }
}
