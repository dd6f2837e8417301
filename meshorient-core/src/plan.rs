/// Ordered transform plans built from a reference descriptor
use std::fmt;

use tracing::debug;

use crate::coords::Bracket;
use crate::descriptor::ReferenceDescriptor;
use crate::error::{NormalizeError, Result};
use crate::transform::{AffineTransform, Space};
use crate::units;

/// Output name suffix when scale normalization ran
pub const SCALED_SUFFIX: &str = "_std";
/// Output name suffix when only orientation changed
pub const ORIENTED_SUFFIX: &str = "_oriented";

/// What a plan step does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    BracketPre,
    Rotation,
    Translation,
    Scale,
    BracketPost,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BracketPre => "bracket-pre",
            Self::Rotation => "rotation",
            Self::Translation => "translation",
            Self::Scale => "scale",
            Self::BracketPost => "bracket-post",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanStep {
    pub kind: StepKind,
    pub transform: AffineTransform,
}

/// Immutable, ordered sequence of steps shared by every mesh object of a run
#[derive(Debug, Clone, PartialEq)]
pub struct TransformPlan {
    steps: Vec<PlanStep>,
    scaled: bool,
}

impl TransformPlan {
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(|step| step.kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `_std` when scale was applied, `_oriented` otherwise
    pub fn output_suffix(&self) -> &'static str {
        if self.scaled {
            SCALED_SUFFIX
        } else {
            ORIENTED_SUFFIX
        }
    }

    /// Every step must be finite and invertible
    pub fn validate(&self) -> Result<()> {
        for step in &self.steps {
            step.transform.validate().map_err(|e| match e {
                NormalizeError::DegenerateTransform { reason } => {
                    NormalizeError::degenerate(format!("{} step: {reason}", step.kind))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

/// Builds a [`TransformPlan`]:
/// bracket-pre, rotation, translation, scale, bracket-post, each only when it applies.
#[derive(Debug, Clone, Default)]
pub struct TransformPlanBuilder {
    apply_scale: bool,
    bracket: Option<Bracket>,
}

impl TransformPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_scale(mut self, apply_scale: bool) -> Self {
        self.apply_scale = apply_scale;
        self
    }

    pub fn bracket(mut self, bracket: Option<Bracket>) -> Self {
        self.bracket = bracket;
        self
    }

    pub fn build(&self, descriptor: &ReferenceDescriptor) -> Result<TransformPlan> {
        let mut steps = Vec::with_capacity(5);

        if let Some(bracket) = &self.bracket {
            steps.push(PlanStep {
                kind: StepKind::BracketPre,
                transform: bracket.pre,
            });
        }

        if let Some(rotation) = &descriptor.rotation {
            let rotation = rotation.to_unit_quaternion()?;
            steps.push(PlanStep {
                kind: StepKind::Rotation,
                transform: AffineTransform::rotation(&rotation, Space::ObjectFrame),
            });
        }

        if let Some(translation) = &descriptor.translation {
            steps.push(PlanStep {
                kind: StepKind::Translation,
                transform: AffineTransform::translation(translation, Space::ObjectFrame),
            });
        }

        if self.apply_scale {
            let label = descriptor.units.as_deref().unwrap_or_default();
            let factor = units::resolve(label)?;
            debug!(label, factor, "resolved unit scale");
            steps.push(PlanStep {
                kind: StepKind::Scale,
                transform: AffineTransform::uniform_scale(factor, Space::ObjectFrame),
            });
        }

        if let Some(bracket) = &self.bracket {
            steps.push(PlanStep {
                kind: StepKind::BracketPost,
                transform: bracket.post,
            });
        }

        let plan = TransformPlan {
            steps,
            scaled: self.apply_scale,
        };
        debug!(steps = ?plan.kinds(), "built transform plan");
        Ok(plan)
    }
}
