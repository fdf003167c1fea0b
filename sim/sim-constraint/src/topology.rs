//! Data derived once when a constraint's topology is realized.

use nalgebra::{UnitVector3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ConstraintError, Result};
use crate::state::Subtree;

/// Two unit axes completing a line direction `z` to a right-handed frame.
///
/// `x` is perpendicular to `z` and `y = z × x`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineFrame {
    /// First perpendicular axis.
    pub x: Vector3<f64>,
    /// Second perpendicular axis.
    pub y: Vector3<f64>,
}

impl LineFrame {
    /// Build the perpendicular pair for a line direction.
    #[must_use]
    pub fn perpendicular_to(z: &UnitVector3<f64>) -> Self {
        let z = z.into_inner();
        // Cross with the coordinate axis least aligned with z.
        let abs = z.abs();
        let seed = if abs.x <= abs.y && abs.x <= abs.z {
            Vector3::x()
        } else if abs.y <= abs.z {
            Vector3::y()
        } else {
            Vector3::z()
        };
        let x = seed.cross(&z).normalize();
        let y = z.cross(&x);
        Self { x, y }
    }
}

/// Per-kind derived constants, written once at topology realization and
/// read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TopologyCache {
    /// The kind needs no derived constants.
    #[default]
    None,
    /// Axes perpendicular to a line direction.
    LineFrame(LineFrame),
    /// Cosine of a target angle.
    CosAngle(f64),
}

impl TopologyCache {
    /// The cached line frame.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::TopologyNotRealized`] if no line frame was cached.
    pub fn line_frame(&self) -> Result<&LineFrame> {
        match self {
            Self::LineFrame(frame) => Ok(frame),
            _ => Err(ConstraintError::TopologyNotRealized),
        }
    }

    /// The cached angle cosine.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::TopologyNotRealized`] if no cosine was cached.
    pub fn cos_angle(&self) -> Result<f64> {
        match self {
            Self::CosAngle(c) => Ok(*c),
            _ => Err(ConstraintError::TopologyNotRealized),
        }
    }
}

/// Everything a constraint computes at topology realization.
#[derive(Debug, Clone, PartialEq)]
pub struct RealizedTopology {
    /// Bodies kinematically involved, and their common ancestor.
    pub subtree: Subtree,
    /// Kind-specific derived constants.
    pub cache: TopologyCache,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_line_frame_is_orthonormal() {
        for z in [
            Vector3::x(),
            Vector3::z(),
            Vector3::new(1.0, 2.0, -3.0),
            Vector3::new(0.0, 1e-9, 1.0),
        ] {
            let frame = LineFrame::perpendicular_to(&UnitVector3::new_normalize(z));
            let z = z.normalize();
            assert_relative_eq!(frame.x.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(frame.y.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(frame.x.dot(&z), 0.0, epsilon = 1e-12);
            assert_relative_eq!(frame.y.dot(&z), 0.0, epsilon = 1e-12);
            assert_relative_eq!(frame.x.cross(&frame.y), z, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cache_accessors() {
        assert_relative_eq!(TopologyCache::CosAngle(0.5).cos_angle().unwrap_or(0.0), 0.5);
        assert!(TopologyCache::None.line_frame().is_err());
        assert!(TopologyCache::None.cos_angle().is_err());
    }
}
