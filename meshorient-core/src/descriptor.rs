/// Reference descriptor parsed from the metadata document
use std::fs;
use std::path::Path;

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{NormalizeError, Result};

/// How far a stored quaternion's norm may drift from 1 before it is rejected
pub const QUATERNION_NORM_TOLERANCE: f64 = 1e-3;

/// A rotation as stored in the metadata document: `[x, y, z, w]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredQuaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl StoredQuaternion {
    pub fn from_xyzw(xyzw: [f64; 4]) -> Self {
        let [x, y, z, w] = xyzw;
        Self { x, y, z, w }
    }

    pub fn identity() -> Self {
        Self::from_xyzw([0.0, 0.0, 0.0, 1.0])
    }

    /// Build the rotation, reordering storage `(x, y, z, w)` into nalgebra's `(w, i, j, k)`.
    ///
    /// Within [`QUATERNION_NORM_TOLERANCE`] of unit length the quaternion is renormalized;
    /// anything further off (or non-finite) is rejected.
    pub fn to_unit_quaternion(&self) -> Result<UnitQuaternion<f64>> {
        let q = Quaternion::new(self.w, self.x, self.y, self.z);
        if !q.coords.iter().all(|c| c.is_finite()) {
            return Err(NormalizeError::malformed(format!(
                "rotation quaternion has non-finite components: {:?}",
                self
            )));
        }

        let norm = q.norm();
        if (norm - 1.0).abs() > QUATERNION_NORM_TOLERANCE {
            return Err(NormalizeError::malformed(format!(
                "rotation quaternion is not unit length (norm {norm})"
            )));
        }
        if norm != 1.0 {
            warn!(norm, "renormalizing rotation quaternion");
        }

        Ok(UnitQuaternion::from_quaternion(q))
    }
}

/// Placement and unit information for one asset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceDescriptor {
    pub rotation: Option<StoredQuaternion>,
    pub translation: Option<Vector3<f64>>,
    pub units: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataDocument {
    models: Option<Vec<ModelEntry>>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    rotation: Option<Vec<f64>>,
    translation: Option<Vec<f64>>,
    units: Option<String>,
}

impl ReferenceDescriptor {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the first model entry of a metadata document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: MetadataDocument = serde_json::from_str(json)
            .map_err(|e| NormalizeError::malformed(format!("invalid metadata JSON: {e}")))?;

        let models = document
            .models
            .ok_or_else(|| NormalizeError::malformed("metadata has no \"models\" list"))?;
        let model = models
            .into_iter()
            .next()
            .ok_or_else(|| NormalizeError::malformed("metadata \"models\" list is empty"))?;

        let rotation = model
            .rotation
            .map(|values| fixed::<4>("rotation", values))
            .transpose()?
            .map(StoredQuaternion::from_xyzw);
        let translation = model
            .translation
            .map(|values| fixed::<3>("translation", values))
            .transpose()?
            .map(Vector3::from);

        let descriptor = Self {
            rotation,
            translation,
            units: model.units,
        };
        debug!(?descriptor, "parsed reference descriptor");
        Ok(descriptor)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.is_none() && self.translation.is_none()
    }
}

fn fixed<const N: usize>(field: &str, values: Vec<f64>) -> Result<[f64; N]> {
    let len = values.len();
    values.try_into().map_err(|_| {
        NormalizeError::malformed(format!("\"{field}\" must have {N} components, got {len}"))
    })
}
