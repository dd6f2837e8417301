/// Axis conventions and the bracketing rotations that reconcile them
use nalgebra::{Point3, Vector3};

use crate::transform::{AffineTransform, Space};

/// Which axis points up in a mesh encoding's native coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisConvention {
    /// Same as the scene's working frame
    ZUp,
    /// Y-up, -Z forward; differs from the scene frame by 90 degrees about X
    YUp,
}

impl AxisConvention {
    pub fn to_scene(&self, point: &Point3<f64>) -> Point3<f64> {
        match self {
            Self::ZUp => *point,
            // Exact swap so that files round trip bit for bit
            Self::YUp => Point3::new(point.x, -point.z, point.y),
        }
    }

    pub fn from_scene(&self, point: &Point3<f64>) -> Point3<f64> {
        match self {
            Self::ZUp => *point,
            Self::YUp => Point3::new(point.x, point.z, -point.y),
        }
    }

    pub fn vector_to_scene(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.to_scene(&Point3::from(*v)).coords
    }

    pub fn vector_from_scene(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.from_scene(&Point3::from(*v)).coords
    }
}

/// Pre- and post-steps bracketing a plan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub pre: AffineTransform,
    pub post: AffineTransform,
}

/// Turns an encoding's axis convention into plan brackets
#[derive(Debug, Clone, Copy)]
pub struct CoordinateSystemAdapter {
    convention: AxisConvention,
}

impl CoordinateSystemAdapter {
    pub fn new(convention: AxisConvention) -> Self {
        Self { convention }
    }

    pub fn convention(&self) -> AxisConvention {
        self.convention
    }

    /// For a Y-up encoding: -90 degrees about X first, +90 degrees last, so the steps in
    /// between see the canonical orientation. Nothing for Z-up encodings.
    pub fn bracket(&self) -> Option<Bracket> {
        match self.convention {
            AxisConvention::ZUp => None,
            AxisConvention::YUp => Some(Bracket {
                pre: AffineTransform::quarter_turn_x(-1, Space::ObjectFrame),
                post: AffineTransform::quarter_turn_x(1, Space::ObjectFrame),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_z_up_has_no_bracket() {
        assert!(CoordinateSystemAdapter::new(AxisConvention::ZUp)
            .bracket()
            .is_none());
    }

    #[test]
    fn test_bracket_is_self_inverse() {
        let bracket = CoordinateSystemAdapter::new(AxisConvention::YUp)
            .bracket()
            .unwrap();
        let round_trip = bracket.pre.then(&bracket.post);
        for p in [
            Point3::new(1.0, 2.0, 3.0),
            Point3::new(-4.5, 0.25, 7.0),
            Point3::origin(),
        ] {
            assert_eq!(round_trip.transform_point(&p), p);
        }
    }

    #[test]
    fn test_bracket_entries_are_exact() {
        let bracket = CoordinateSystemAdapter::new(AxisConvention::YUp)
            .bracket()
            .unwrap();
        for step in [bracket.pre, bracket.post] {
            assert!(step
                .matrix()
                .iter()
                .all(|v| [-1.0, 0.0, 1.0].contains(v)));
        }
        let p = Point3::new(0.1, 0.2, 0.3);
        assert_eq!(bracket.post.transform_point(&p), AxisConvention::YUp.to_scene(&p));
    }

    #[test]
    fn test_bracket_pre_undoes_import() {
        let convention = AxisConvention::YUp;
        let bracket = CoordinateSystemAdapter::new(convention).bracket().unwrap();
        let native = Point3::new(1.0, 2.0, 3.0);
        let scene = convention.to_scene(&native);
        assert_relative_eq!(bracket.pre.transform_point(&scene), native, epsilon = 1e-12);
    }

    #[test]
    fn test_swaps_match_rotation_matrices() {
        let convention = AxisConvention::YUp;
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(
            AffineTransform::quarter_turn_x(1, Space::Local).transform_point(&p),
            convention.to_scene(&p)
        );
        assert_eq!(
            AffineTransform::quarter_turn_x(-1, Space::Local).transform_point(&p),
            convention.from_scene(&p)
        );
        assert_eq!(convention.from_scene(&convention.to_scene(&p)), p);
    }
}
