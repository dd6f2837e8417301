/// Linear unit labels and their meters-per-unit factors
use std::fmt;
use std::str::FromStr;

use crate::error::{NormalizeError, Result};

/// Units a reference descriptor may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitLabel {
    Millimeter,
    Centimeter,
    Inch,
    Foot,
    Meter,
}

impl UnitLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Millimeter => "mm",
            Self::Centimeter => "cm",
            Self::Inch => "in",
            Self::Foot => "ft",
            Self::Meter => "m",
        }
    }

    /// Meters per one of this unit
    pub fn meters_per_unit(&self) -> f64 {
        match self {
            Self::Millimeter => 0.001,
            Self::Centimeter => 0.01,
            Self::Inch => 0.0254,
            Self::Foot => 0.3048,
            Self::Meter => 1.0,
        }
    }
}

impl FromStr for UnitLabel {
    type Err = NormalizeError;

    fn from_str(label: &str) -> Result<Self> {
        match label {
            "mm" => Ok(Self::Millimeter),
            "cm" => Ok(Self::Centimeter),
            "in" => Ok(Self::Inch),
            "ft" => Ok(Self::Foot),
            "m" => Ok(Self::Meter),
            other => Err(NormalizeError::UnrecognizedUnit {
                label: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for UnitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a symbolic unit label to its meters-per-unit scale factor.
///
/// There is no fallback: an unknown label is an error, never a scale of 1.0.
pub fn resolve(label: &str) -> Result<f64> {
    label.parse::<UnitLabel>().map(|unit| unit.meters_per_unit())
}
