/// One normalization run: load a mesh file, apply the plan built from its metadata, save
use std::path::{Path, PathBuf};

use tracing::info;

use crate::coords::{AxisConvention, CoordinateSystemAdapter};
use crate::descriptor::ReferenceDescriptor;
use crate::encoding::EncodingRegistry;
use crate::error::Result;
use crate::executor::{ExecutionSummary, MeshTransformExecutor};
use crate::plan::{StepKind, TransformPlan, TransformPlanBuilder};
use crate::scene::Scene;

/// Per-run settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Convert the descriptor's units to meters
    pub apply_scale: bool,
    /// Output file; relative paths are taken from the input's directory
    pub output: Option<PathBuf>,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeReport {
    pub output: PathBuf,
    pub encoding: &'static str,
    pub steps: Vec<StepKind>,
    pub summary: ExecutionSummary,
}

/// Build the plan for a scene imported from `convention`
pub fn plan_for(
    convention: AxisConvention,
    descriptor: &ReferenceDescriptor,
    apply_scale: bool,
) -> Result<TransformPlan> {
    let adapter = CoordinateSystemAdapter::new(convention);
    TransformPlanBuilder::new()
        .apply_scale(apply_scale)
        .bracket(adapter.bracket())
        .build(descriptor)
}

/// Normalize an in-memory scene, using its source convention for the bracket
pub fn normalize_scene(
    scene: &mut Scene,
    descriptor: &ReferenceDescriptor,
    apply_scale: bool,
) -> Result<(TransformPlan, ExecutionSummary)> {
    let plan = plan_for(scene.source_convention, descriptor, apply_scale)?;
    let summary = MeshTransformExecutor::new().apply_scene(&plan, scene)?;
    Ok((plan, summary))
}

/// Run the whole pipeline on `input` with the placement stored in `metadata`.
///
/// Nothing is written unless every step succeeds.
pub fn normalize_file(input: &Path, metadata: &Path, options: &NormalizeOptions) -> Result<NormalizeReport> {
    let registry = EncodingRegistry::builtin();
    let encoding = registry.for_path(input)?;

    let descriptor = ReferenceDescriptor::from_path(metadata)?;
    if descriptor.is_empty() {
        info!(metadata = %metadata.display(), "descriptor has no rotation or translation");
    }
    let plan = plan_for(encoding.axis_convention(), &descriptor, options.apply_scale)?;

    let mut scene = encoding.load(input)?;
    info!(
        input = %input.display(),
        encoding = encoding.name(),
        meshes = scene.mesh_count(),
        "loaded mesh file"
    );

    let summary = MeshTransformExecutor::new().apply_scene(&plan, &mut scene)?;

    let output = output_path(input, options.output.as_deref(), plan.output_suffix());
    encoding.save(&scene, &output)?;
    info!(output = %output.display(), "wrote normalized mesh");

    Ok(NormalizeReport {
        output,
        encoding: encoding.name(),
        steps: plan.kinds(),
        summary,
    })
}

/// Where the normalized mesh goes.
///
/// Without an explicit (non-empty) name this is `<stem><suffix>.<ext>` next to the input.
pub fn output_path(input: &Path, explicit: Option<&Path>, suffix: &str) -> PathBuf {
    let directory = input.parent().unwrap_or_else(|| Path::new(""));

    match explicit {
        Some(path) if !path.as_os_str().is_empty() => directory.join(path),
        _ => {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let name = match input.extension() {
                Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
                None => format!("{stem}{suffix}"),
            };
            directory.join(name)
        }
    }
}
