//! Tagged dimension values for image annotations
//!
//! Image width and height arrive as suffix-tagged strings (`"25%"`, `"120px"`,
//! `"36pt"`, `"2em"`, or a bare number meaning points). They are classified once,
//! at the deserialize/edit boundary, into a [`DimensionValue`] and resolved to an
//! absolute length only when a reference extent is known.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unit attached to a dimension magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Fraction of the reference extent, 0-100
    Percent,
    /// Absolute pixels, treated 1:1 with the target unit
    Px,
    /// Absolute points, treated 1:1 with the target unit
    Pt,
    /// Multiple of a fixed em reference
    Em,
}

impl Unit {
    fn suffix(self) -> &'static str {
        match self {
            Unit::Percent => "%",
            Unit::Px => "px",
            Unit::Pt => "pt",
            Unit::Em => "em",
        }
    }
}

/// Which extent a dimension is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Width,
    Height,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DimensionError {
    #[error("empty dimension")]
    Empty,
    #[error("invalid dimension magnitude: {0:?}")]
    InvalidMagnitude(String),
}

/// A parsed magnitude with its unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimension {
    pub value: f32,
    pub unit: Unit,
}

impl Dimension {
    pub fn new(value: f32, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Percentage dimension rounded to two decimal places
    pub fn percent(value: f32) -> Self {
        Self {
            value: (value * 100.0).round() / 100.0,
            unit: Unit::Percent,
        }
    }

    /// Resolve to an absolute length.
    ///
    /// `reference` is the extent percentages are taken against; `em_size` is the
    /// length of one em.
    pub fn resolve(&self, reference: f32, em_size: f32) -> f32 {
        match self.unit {
            Unit::Percent => self.value / 100.0 * reference,
            Unit::Px | Unit::Pt => self.value,
            Unit::Em => self.value * em_size,
        }
    }
}

impl FromStr for Dimension {
    type Err = DimensionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DimensionError::Empty);
        }

        let lower = trimmed.to_ascii_lowercase();
        let (magnitude, unit) = [Unit::Percent, Unit::Px, Unit::Pt, Unit::Em]
            .into_iter()
            .find_map(|unit| {
                lower
                    .strip_suffix(unit.suffix())
                    .map(|magnitude| (magnitude.trim_end(), unit))
            })
            .unwrap_or((lower.as_str(), Unit::Pt));

        let value: f32 = magnitude
            .parse()
            .map_err(|_| DimensionError::InvalidMagnitude(trimmed.to_string()))?;

        if !value.is_finite() || value < 0.0 {
            return Err(DimensionError::InvalidMagnitude(trimmed.to_string()));
        }

        Ok(Self { value, unit })
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            Unit::Percent => write!(f, "{:.2}%", self.value),
            unit => write!(f, "{}{}", self.value, unit.suffix()),
        }
    }
}

/// Dimension as stored on an image annotation.
///
/// Strings that fail to classify are kept verbatim so the record round-trips and
/// the export can report the fallback it applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DimensionValue {
    Parsed(Dimension),
    Unparsed(String),
}

impl DimensionValue {
    /// Classify a raw edit-site string
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<Dimension>() {
            Ok(dimension) => Self::Parsed(dimension),
            Err(_) => Self::Unparsed(raw.to_string()),
        }
    }

    pub fn as_dimension(&self) -> Option<Dimension> {
        match self {
            Self::Parsed(dimension) => Some(*dimension),
            Self::Unparsed(_) => None,
        }
    }
}

impl From<Dimension> for DimensionValue {
    fn from(dimension: Dimension) -> Self {
        Self::Parsed(dimension)
    }
}

impl From<String> for DimensionValue {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<DimensionValue> for String {
    fn from(value: DimensionValue) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed(dimension) => dimension.fmt(f),
            Self::Unparsed(raw) => f.write_str(raw),
        }
    }
}

/// Result of resolving a dimension against a reference extent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    pub value: f32,
    /// The stored value could not be classified and the default was used
    pub fell_back: bool,
}

/// Resolve a stored dimension, substituting the axis default when unparseable.
///
/// Defaults are `fallback_width_percent` / `fallback_height_percent` of `reference`.
pub fn resolve_or_fallback(
    value: &DimensionValue,
    reference: f32,
    axis: Axis,
    em_size: f32,
    fallback_width_percent: f32,
    fallback_height_percent: f32,
) -> Resolved {
    match value {
        DimensionValue::Parsed(dimension) => Resolved {
            value: dimension.resolve(reference, em_size),
            fell_back: false,
        },
        DimensionValue::Unparsed(_) => {
            let percent = match axis {
                Axis::Width => fallback_width_percent,
                Axis::Height => fallback_height_percent,
            };
            Resolved {
                value: percent / 100.0 * reference,
                fell_back: true,
            }
        }
    }
}
