/// Mesh file encodings and the registry that picks one by file extension
///
/// Every encoding decodes into a [`Scene`] held in the Z-up working frame and encodes
/// back into its own native axis convention.
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::{Matrix4, Point3, Vector3};
use tracing::debug;

use crate::coords::AxisConvention;
use crate::error::{NormalizeError, Result};
use crate::scene::Scene;
use crate::transform::normal_matrix;

pub mod obj;
pub mod ply;
pub mod stl;

pub use obj::ObjEncoding;
pub use ply::PlyEncoding;
pub use stl::StlEncoding;

/// Load/save contract for one mesh container format
pub trait MeshEncoding {
    fn name(&self) -> &'static str;

    /// Lowercase file extensions this encoding handles
    fn extensions(&self) -> &'static [&'static str];

    fn axis_convention(&self) -> AxisConvention;

    fn decode(&self, data: &[u8]) -> std::result::Result<Scene, String>;

    fn encode(&self, scene: &Scene, out: &mut dyn Write) -> std::io::Result<()>;

    fn load(&self, path: &Path) -> Result<Scene> {
        let data = fs::read(path)?;
        let scene = self
            .decode(&data)
            .map_err(|message| NormalizeError::parse(path, message))?;
        debug!(
            path = %path.display(),
            encoding = self.name(),
            objects = scene.objects.len(),
            vertices = scene.vertex_count(),
            "loaded scene"
        );
        Ok(scene)
    }

    fn save(&self, scene: &Scene, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.encode(scene, &mut out)?;
        out.flush()?;
        debug!(path = %path.display(), encoding = self.name(), "saved scene");
        Ok(())
    }
}

/// Fixed set of encodings keyed by file extension
pub struct EncodingRegistry {
    encodings: Vec<Box<dyn MeshEncoding>>,
}

impl EncodingRegistry {
    pub fn new() -> Self {
        Self {
            encodings: Vec::new(),
        }
    }

    /// OBJ, PLY and STL
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ObjEncoding));
        registry.register(Box::new(PlyEncoding));
        registry.register(Box::new(StlEncoding));
        registry
    }

    pub fn register(&mut self, encoding: Box<dyn MeshEncoding>) {
        self.encodings.push(encoding);
    }

    pub fn for_extension(&self, extension: &str) -> Option<&dyn MeshEncoding> {
        let extension = extension.to_lowercase();
        self.encodings
            .iter()
            .find(|encoding| encoding.extensions().contains(&extension.as_str()))
            .map(|encoding| encoding.as_ref())
    }

    pub fn for_path(&self, path: &Path) -> Result<&dyn MeshEncoding> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.for_extension(extension)
            .ok_or_else(|| NormalizeError::UnsupportedEncoding {
                extension: extension.to_string(),
            })
    }
}

impl Default for EncodingRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Bakes an object's frame and the export axis conversion into written coordinates
pub(crate) struct ExportFrame {
    frame: Matrix4<f64>,
    normals: Option<nalgebra::Matrix3<f64>>,
    convention: AxisConvention,
}

impl ExportFrame {
    pub(crate) fn new(frame: &Matrix4<f64>, convention: AxisConvention) -> Self {
        Self {
            frame: *frame,
            normals: normal_matrix(frame),
            convention,
        }
    }

    pub(crate) fn point(&self, local: &Point3<f64>) -> Point3<f64> {
        let native = self
            .convention
            .from_scene(&self.frame.transform_point(local));
        // No "-0" in written files
        native.map(|c| c + 0.0)
    }

    pub(crate) fn normal(&self, local: &Vector3<f64>) -> Vector3<f64> {
        let world = match &self.normals {
            Some(m) => (m * local).try_normalize(f64::EPSILON).unwrap_or(*local),
            None => *local,
        };
        self.convention.vector_from_scene(&world).map(|c| c + 0.0)
    }
}
