/// Affine transforms and the space they are applied in
use nalgebra::{Matrix3, Matrix4, Point3, UnitQuaternion, Vector3};

use crate::error::{NormalizeError, Result};

/// Determinant relative to the product of the column lengths. Below this the
/// mesh is treated as collapsed, whatever its overall scale.
pub const DEGENERATE_EPSILON: f64 = 1e-12;

/// Where a transform is defined relative to the vertices it moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    /// Conjugated by the object's object-to-world frame: vertices are taken into the
    /// frame, transformed, and brought back into local coordinates.
    ObjectFrame,
    /// Applied directly to the stored local coordinates
    Local,
}

/// A 4x4 homogeneous transform tagged with its space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    matrix: Matrix4<f64>,
    space: Space,
}

impl AffineTransform {
    pub fn new(matrix: Matrix4<f64>, space: Space) -> Self {
        Self { matrix, space }
    }

    pub fn identity(space: Space) -> Self {
        Self::new(Matrix4::identity(), space)
    }

    /// Create a rotation matrix from a unit quaternion
    pub fn rotation(rotation: &UnitQuaternion<f64>, space: Space) -> Self {
        Self::new(rotation.to_homogeneous(), space)
    }

    /// Rotation about the X axis by a whole number of quarter turns (positive is
    /// counter-clockwise looking down +X). Entries are exactly 0 or ±1.
    pub fn quarter_turn_x(quarters: i32, space: Space) -> Self {
        let (cos, sin) = match quarters.rem_euclid(4) {
            0 => (1.0, 0.0),
            1 => (0.0, 1.0),
            2 => (-1.0, 0.0),
            _ => (0.0, -1.0),
        };
        #[rustfmt::skip]
        let matrix = Matrix4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, cos, -sin, 0.0,
            0.0, sin, cos, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        Self::new(matrix, space)
    }

    /// Create a translation matrix
    pub fn translation(offset: &Vector3<f64>, space: Space) -> Self {
        Self::new(Matrix4::new_translation(offset), space)
    }

    /// Same factor on all three axes
    pub fn uniform_scale(factor: f64, space: Space) -> Self {
        Self::new(Matrix4::new_scaling(factor), space)
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn space(&self) -> Space {
        self.space
    }

    /// Compose: the result applies `self` first, then `other`
    pub fn then(&self, other: &Self) -> Self {
        Self::new(other.matrix * self.matrix, self.space)
    }

    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(point)
    }

    /// Reject transforms that are non-finite or would flatten the mesh
    pub fn validate(&self) -> Result<()> {
        check_invertible(&self.matrix, "transform step")
    }

    /// The matrix to apply to an object's local vertex coordinates, given its
    /// object-to-world `frame` and that frame's inverse.
    pub fn effective_matrix(
        &self,
        frame: &Matrix4<f64>,
        frame_inverse: &Matrix4<f64>,
    ) -> Matrix4<f64> {
        match self.space {
            Space::ObjectFrame => frame_inverse * self.matrix * frame,
            Space::Local => self.matrix,
        }
    }
}

/// Inverse of `frame`, or a DegenerateTransform error naming `what`
pub fn invert_frame(frame: &Matrix4<f64>, what: &str) -> Result<Matrix4<f64>> {
    check_invertible(frame, what)?;
    frame
        .try_inverse()
        .ok_or_else(|| NormalizeError::degenerate(format!("{what} is singular")))
}

/// Matrix used to carry normals through `matrix`: inverse-transpose of its linear part
pub fn normal_matrix(matrix: &Matrix4<f64>) -> Option<Matrix3<f64>> {
    let linear: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
    linear.try_inverse().map(|inv| inv.transpose())
}

fn check_invertible(matrix: &Matrix4<f64>, what: &str) -> Result<()> {
    if !matrix.iter().all(|v| v.is_finite()) {
        return Err(NormalizeError::degenerate(format!(
            "{what} has non-finite entries"
        )));
    }
    let linear = matrix.fixed_view::<3, 3>(0, 0);
    let det = linear.determinant();
    let volume: f64 = linear.column_iter().map(|c| c.norm()).product();
    if volume == 0.0 || (det / volume).abs() < DEGENERATE_EPSILON {
        return Err(NormalizeError::degenerate(format!(
            "{what} is singular (determinant {det:e})"
        )));
    }
    Ok(())
}
