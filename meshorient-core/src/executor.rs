/// Applies transform plans to mesh vertex data
use nalgebra::{Matrix4, Point3, Vector3};
use tracing::{debug, info};

use crate::error::{NormalizeError, Result};
use crate::geometry::MeshData;
use crate::plan::TransformPlan;
use crate::scene::{ObjectKind, Scene};
use crate::transform::{invert_frame, normal_matrix};

/// Staged copy of a mesh's vertex data.
///
/// Steps mutate the staged copy; nothing reaches the mesh until [`commit`](Self::commit).
/// Dropping the buffer without committing leaves the mesh untouched.
pub struct TransformBuffer<'a> {
    target: &'a mut MeshData,
    positions: Vec<Point3<f64>>,
    normals: Vec<Vector3<f64>>,
}

impl<'a> TransformBuffer<'a> {
    pub fn acquire(target: &'a mut MeshData) -> Self {
        let positions = target.positions.clone();
        let normals = target.normals.clone();
        Self {
            target,
            positions,
            normals,
        }
    }

    /// Transform every staged position, and every normal by the inverse-transpose
    pub fn apply(&mut self, matrix: &Matrix4<f64>) -> Result<()> {
        for position in &mut self.positions {
            *position = matrix.transform_point(position);
        }

        if !self.normals.is_empty() {
            let normal_matrix = normal_matrix(matrix)
                .ok_or_else(|| NormalizeError::degenerate("step has no normal transform"))?;
            for normal in &mut self.normals {
                let transformed = normal_matrix * *normal;
                if let Some(unit) = transformed.try_normalize(f64::EPSILON) {
                    *normal = unit;
                }
            }
        }

        Ok(())
    }

    pub fn commit(self) {
        self.target.positions = self.positions;
        self.target.normals = self.normals;
    }
}

/// What a scene run touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub meshes: usize,
    pub vertices: usize,
    pub skipped: usize,
}

/// Stateless executor: the same plan can be applied to any number of meshes
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshTransformExecutor;

impl MeshTransformExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Apply `plan` to one mesh whose object-to-world matrix is `frame`.
    ///
    /// Steps run in plan order. On error the mesh is left as it was.
    pub fn apply(&self, plan: &TransformPlan, mesh: &mut MeshData, frame: &Matrix4<f64>) -> Result<()> {
        plan.validate()?;
        let frame_inverse = invert_frame(frame, "object frame")?;
        self.apply_validated(plan, mesh, frame, &frame_inverse)
    }

    /// Apply `plan` to every mesh object of `scene` exactly once.
    ///
    /// The plan and every mesh frame are checked before any mesh is modified.
    /// Cameras, lights and empties are skipped.
    pub fn apply_scene(&self, plan: &TransformPlan, scene: &mut Scene) -> Result<ExecutionSummary> {
        plan.validate()?;

        let mut inverses = Vec::with_capacity(scene.objects.len());
        for object in &scene.objects {
            let inverse = match object.kind {
                ObjectKind::Mesh(_) => Some(invert_frame(
                    &object.frame,
                    &format!("frame of object {:?}", object.name),
                )?),
                _ => None,
            };
            inverses.push(inverse);
        }

        let mut summary = ExecutionSummary::default();
        for (object, inverse) in scene.objects.iter_mut().zip(inverses) {
            match (&mut object.kind, inverse) {
                (ObjectKind::Mesh(mesh), Some(frame_inverse)) => {
                    self.apply_validated(plan, mesh, &object.frame, &frame_inverse)?;
                    debug!(object = %object.name, vertices = mesh.vertex_count(), "transformed mesh");
                    summary.meshes += 1;
                    summary.vertices += mesh.vertex_count();
                }
                (kind, _) => {
                    debug!(object = %object.name, kind = kind.name(), "skipping non-mesh object");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            meshes = summary.meshes,
            vertices = summary.vertices,
            skipped = summary.skipped,
            "applied transform plan"
        );
        Ok(summary)
    }

    fn apply_validated(
        &self,
        plan: &TransformPlan,
        mesh: &mut MeshData,
        frame: &Matrix4<f64>,
        frame_inverse: &Matrix4<f64>,
    ) -> Result<()> {
        let mut buffer = TransformBuffer::acquire(mesh);
        for step in plan.steps() {
            let matrix = step.transform.effective_matrix(frame, frame_inverse);
            buffer.apply(&matrix)?;
        }
        buffer.commit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{AxisConvention, CoordinateSystemAdapter};
    use crate::descriptor::{ReferenceDescriptor, StoredQuaternion};
    use crate::plan::TransformPlanBuilder;
    use crate::scene::SceneObject;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn single_vertex(x: f64, y: f64, z: f64) -> MeshData {
        let mut mesh = MeshData::new();
        mesh.add_position(Point3::new(x, y, z));
        mesh
    }

    fn quarter_turn_about_z() -> StoredQuaternion {
        StoredQuaternion::from_xyzw([0.0, 0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2])
    }

    #[test]
    fn test_end_to_end_centimeters() {
        let descriptor = ReferenceDescriptor {
            rotation: Some(StoredQuaternion::identity()),
            translation: Some(Vector3::new(1.0, 0.0, 0.0)),
            units: Some("cm".to_string()),
        };

        for convention in [AxisConvention::ZUp, AxisConvention::YUp] {
            let plan = TransformPlanBuilder::new()
                .apply_scale(true)
                .bracket(CoordinateSystemAdapter::new(convention).bracket())
                .build(&descriptor)
                .unwrap();

            let mut mesh = single_vertex(0.0, 0.0, 0.0);
            MeshTransformExecutor::new()
                .apply(&plan, &mut mesh, &Matrix4::identity())
                .unwrap();

            // bracket, identity rotation, +1 on x, then 0.01 scale, unbracket
            assert_relative_eq!(mesh.positions[0], Point3::new(0.01, 0.0, 0.0), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rotation_runs_before_translation() {
        let descriptor = ReferenceDescriptor {
            rotation: Some(quarter_turn_about_z()),
            translation: Some(Vector3::new(1.0, 0.0, 0.0)),
            units: None,
        };
        let plan = TransformPlanBuilder::new().build(&descriptor).unwrap();

        let mut mesh = single_vertex(1.0, 0.0, 0.0);
        MeshTransformExecutor::new()
            .apply(&plan, &mut mesh, &Matrix4::identity())
            .unwrap();

        // rotate (1,0,0) -> (0,1,0), then translate -> (1,1,0)
        assert_relative_eq!(mesh.positions[0], Point3::new(1.0, 1.0, 0.0), epsilon = 1e-12);

        // The opposite order lands elsewhere: translate -> (2,0,0), rotate -> (0,2,0)
        let steps = plan.steps();
        let reversed = steps[1].transform.then(&steps[0].transform);
        let other = reversed.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(other, Point3::new(0.0, 2.0, 0.0), epsilon = 1e-12);
        assert!((other - mesh.positions[0]).norm() > 1.0);
    }

    #[test]
    fn test_translation_runs_before_scale() {
        let descriptor = ReferenceDescriptor {
            rotation: None,
            translation: Some(Vector3::new(100.0, 0.0, 0.0)),
            units: Some("mm".to_string()),
        };
        let plan = TransformPlanBuilder::new()
            .apply_scale(true)
            .build(&descriptor)
            .unwrap();

        let mut mesh = single_vertex(0.0, 0.0, 0.0);
        MeshTransformExecutor::new()
            .apply(&plan, &mut mesh, &Matrix4::identity())
            .unwrap();
        assert_relative_eq!(mesh.positions[0], Point3::new(0.1, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_bracket_alone_is_identity() {
        let plan = TransformPlanBuilder::new()
            .bracket(CoordinateSystemAdapter::new(AxisConvention::YUp).bracket())
            .build(&ReferenceDescriptor::empty())
            .unwrap();

        let original = MeshData::cube(3.0);
        let mut mesh = original.clone();
        let frame = Matrix4::new_translation(&Vector3::new(2.0, -1.0, 4.0));
        MeshTransformExecutor::new().apply(&plan, &mut mesh, &frame).unwrap();

        for (got, want) in mesh.positions.iter().zip(&original.positions) {
            assert_relative_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_empty_plan_leaves_vertices_unchanged() {
        let plan = TransformPlanBuilder::new()
            .build(&ReferenceDescriptor::empty())
            .unwrap();
        let original = MeshData::cube(1.5);
        let mut mesh = original.clone();
        MeshTransformExecutor::new()
            .apply(&plan, &mut mesh, &Matrix4::new_scaling(3.0))
            .unwrap();
        assert_eq!(mesh, original);
    }

    #[test]
    fn test_steps_are_applied_relative_to_object_frame() {
        // Object placed at x = 10 with a 90 degree turn about z
        let frame = Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0))
            * Matrix4::new_rotation(Vector3::z() * std::f64::consts::FRAC_PI_2);
        let descriptor = ReferenceDescriptor {
            translation: Some(Vector3::new(1.0, 0.0, 0.0)),
            ..ReferenceDescriptor::empty()
        };
        let plan = TransformPlanBuilder::new().build(&descriptor).unwrap();

        let mut mesh = single_vertex(0.0, 0.0, 0.0);
        MeshTransformExecutor::new().apply(&plan, &mut mesh, &frame).unwrap();

        // +x in the frame is -y in local coordinates
        assert_relative_eq!(mesh.positions[0], Point3::new(0.0, -1.0, 0.0), epsilon = 1e-12);
        let world = frame.transform_point(&mesh.positions[0]);
        assert_relative_eq!(world, Point3::new(11.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_normals_follow_rotation() {
        let descriptor = ReferenceDescriptor {
            rotation: Some(quarter_turn_about_z()),
            ..ReferenceDescriptor::empty()
        };
        let plan = TransformPlanBuilder::new().build(&descriptor).unwrap();

        let mut mesh = single_vertex(1.0, 0.0, 0.0);
        mesh.add_normal(Vector3::x());
        MeshTransformExecutor::new()
            .apply(&plan, &mut mesh, &Matrix4::identity())
            .unwrap();
        assert_relative_eq!(mesh.normals[0], Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_singular_frame_is_rejected_without_mutation() {
        let descriptor = ReferenceDescriptor {
            translation: Some(Vector3::new(1.0, 0.0, 0.0)),
            ..ReferenceDescriptor::empty()
        };
        let plan = TransformPlanBuilder::new().build(&descriptor).unwrap();

        let original = MeshData::cube(1.0);
        let mut mesh = original.clone();
        let frame = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, 0.0));
        let err = MeshTransformExecutor::new()
            .apply(&plan, &mut mesh, &frame)
            .unwrap_err();
        assert!(matches!(err, NormalizeError::DegenerateTransform { .. }));
        assert_eq!(mesh, original);
    }

    #[test]
    fn test_uncommitted_buffer_discards_changes() {
        let original = MeshData::cube(1.0);
        let mut mesh = original.clone();
        {
            let mut buffer = TransformBuffer::acquire(&mut mesh);
            buffer.apply(&Matrix4::new_scaling(2.0)).unwrap();
        }
        assert_eq!(mesh, original);

        let mut buffer = TransformBuffer::acquire(&mut mesh);
        buffer.apply(&Matrix4::new_scaling(2.0)).unwrap();
        buffer.commit();
        assert_relative_eq!(mesh.positions[0], original.positions[0] * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scene_skips_non_mesh_objects() {
        let descriptor = ReferenceDescriptor {
            translation: Some(Vector3::new(0.0, 0.0, 5.0)),
            ..ReferenceDescriptor::empty()
        };
        let plan = TransformPlanBuilder::new().build(&descriptor).unwrap();

        let light_frame = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        let mut scene = Scene::default();
        scene.add(SceneObject::mesh("a", single_vertex(0.0, 0.0, 0.0)));
        scene.add(SceneObject {
            name: "sun".to_string(),
            frame: light_frame,
            kind: ObjectKind::Light,
        });
        scene.add(
            SceneObject::mesh("b", single_vertex(1.0, 1.0, 1.0))
                .with_frame(Matrix4::new_translation(&Vector3::new(-3.0, 0.0, 0.0))),
        );
        scene.add(SceneObject {
            name: "rig".to_string(),
            frame: Matrix4::zeros(),
            kind: ObjectKind::Empty,
        });

        let summary = MeshTransformExecutor::new()
            .apply_scene(&plan, &mut scene)
            .unwrap();
        assert_eq!(
            summary,
            ExecutionSummary {
                meshes: 2,
                vertices: 2,
                skipped: 2,
            }
        );

        let a = scene.get("a").unwrap().as_mesh().unwrap();
        assert_relative_eq!(a.positions[0], Point3::new(0.0, 0.0, 5.0), epsilon = 1e-12);
        let b = scene.get("b").unwrap().as_mesh().unwrap();
        assert_relative_eq!(b.positions[0], Point3::new(1.0, 1.0, 6.0), epsilon = 1e-12);

        let sun = scene.get("sun").unwrap();
        assert_eq!(sun.kind, ObjectKind::Light);
        assert_eq!(sun.frame, light_frame);
    }

    #[test]
    fn test_scene_with_singular_frame_changes_nothing() {
        let descriptor = ReferenceDescriptor {
            translation: Some(Vector3::new(1.0, 0.0, 0.0)),
            ..ReferenceDescriptor::empty()
        };
        let plan = TransformPlanBuilder::new().build(&descriptor).unwrap();

        let mut scene = Scene::default();
        scene.add(SceneObject::mesh("ok", MeshData::cube(1.0)));
        scene.add(SceneObject::mesh("flat", MeshData::cube(1.0)).with_frame(Matrix4::zeros()));
        let before = scene.clone();

        let err = MeshTransformExecutor::new()
            .apply_scene(&plan, &mut scene)
            .unwrap_err();
        assert!(err.to_string().contains("\"flat\""));
        assert_eq!(scene, before);
    }

    #[test]
    fn test_tiny_but_regular_frame_is_accepted() {
        let descriptor = ReferenceDescriptor {
            translation: Some(Vector3::new(1.0, 0.0, 0.0)),
            ..ReferenceDescriptor::empty()
        };
        let plan = TransformPlanBuilder::new().build(&descriptor).unwrap();

        // Determinant 1e-15, still a plain uniform scale
        let mut scene = Scene::default();
        scene.add(
            SceneObject::mesh("speck", single_vertex(0.0, 0.0, 0.0))
                .with_frame(Matrix4::new_scaling(1e-5)),
        );
        let summary = MeshTransformExecutor::new()
            .apply_scene(&plan, &mut scene)
            .unwrap();
        assert_eq!(summary.meshes, 1);

        // One world unit is 1e5 local units
        let mesh = scene.get("speck").and_then(|o| o.as_mesh()).unwrap();
        assert_relative_eq!(mesh.positions[0], Point3::new(1e5, 0.0, 0.0), max_relative = 1e-9);
    }
}
