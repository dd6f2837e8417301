/// meshorient Core Library - Mesh placement and unit normalization
///
/// This library brings a mesh asset into a canonical frame and meter scale described
/// by a metadata document: unit resolution, transform plans, axis brackets, the
/// transform executor, and the OBJ/PLY/STL encodings around them.

pub mod coords;
pub mod descriptor;
pub mod encoding;
pub mod error;
pub mod executor;
pub mod geometry;
pub mod pipeline;
pub mod plan;
pub mod scene;
pub mod transform;
pub mod units;

// Re-export commonly used types
pub use coords::{AxisConvention, Bracket, CoordinateSystemAdapter};
pub use descriptor::{ReferenceDescriptor, StoredQuaternion};
pub use encoding::{EncodingRegistry, MeshEncoding};
pub use error::{NormalizeError, Result};
pub use executor::{ExecutionSummary, MeshTransformExecutor};
pub use geometry::{Corner, Face, MeshData};
pub use pipeline::{normalize_file, output_path, NormalizeOptions, NormalizeReport};
pub use plan::{StepKind, TransformPlan, TransformPlanBuilder};
pub use scene::{ObjectKind, Scene, SceneObject};
pub use transform::{AffineTransform, Space};
pub use units::UnitLabel;
