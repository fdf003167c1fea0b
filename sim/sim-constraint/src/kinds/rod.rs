//! Fixed distance between two stations.

use nalgebra::Point3;
use sim_types::BodyId;
use smallvec::{smallvec, SmallVec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::equations::{expect_count, ConstraintEquations};
use crate::error::Result;
use crate::index::{ConstrainedBodyIndex, EquationCategory, EquationCounts};
use crate::kinematics::{ConstraintForces, ConstraintKinematics};

const B1: ConstrainedBodyIndex = ConstrainedBodyIndex(0);
const B2: ConstrainedBodyIndex = ConstrainedBodyIndex(1);

/// Holds a station on one body at a fixed distance from a station on another.
///
/// One holonomic equation, with `p = p₂ − p₁` measured in the ancestor frame:
///
/// ```text
/// perr  = (p·p − d²) / 2
/// pverr = v·p
/// paerr = a·p + v·v
/// ```
///
/// The multiplier produces `λp` at station 2 and `−λp` at station 1. Both
/// forces lie on the line between the stations, so the pair does no work
/// even when the constraint is violated.
///
/// # Example
///
/// ```
/// use sim_constraint::Rod;
/// use sim_types::BodyId;
/// use nalgebra::Point3;
///
/// let rod = Rod::new(BodyId::new(1), BodyId::new(2), 0.5)
///     .with_points(Point3::new(0.1, 0.0, 0.0), Point3::origin());
/// assert_eq!(rod.length(), 0.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rod {
    body1: BodyId,
    body2: BodyId,
    point1: Point3<f64>,
    point2: Point3<f64>,
    length: f64,
}

impl Rod {
    /// Connect the origins of two bodies with a rod of the given length.
    #[must_use]
    pub fn new(body1: BodyId, body2: BodyId, length: f64) -> Self {
        Self {
            body1,
            body2,
            point1: Point3::origin(),
            point2: Point3::origin(),
            length,
        }
    }

    /// Attach the rod ends to stations on each body.
    #[must_use]
    pub fn with_points(mut self, point1: Point3<f64>, point2: Point3<f64>) -> Self {
        self.point1 = point1;
        self.point2 = point2;
        self
    }

    /// First body.
    #[must_use]
    pub fn body1(&self) -> BodyId {
        self.body1
    }

    /// Second body.
    #[must_use]
    pub fn body2(&self) -> BodyId {
        self.body2
    }

    /// Station on the first body, in its frame.
    #[must_use]
    pub fn point1(&self) -> Point3<f64> {
        self.point1
    }

    /// Station on the second body, in its frame.
    #[must_use]
    pub fn point2(&self) -> Point3<f64> {
        self.point2
    }

    /// Rod length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Move the station on the first body.
    pub fn set_point1(&mut self, point: Point3<f64>) {
        self.point1 = point;
    }

    /// Move the station on the second body.
    pub fn set_point2(&mut self, point: Point3<f64>) {
        self.point2 = point;
    }

    /// Change the rod length.
    pub fn set_length(&mut self, length: f64) {
        self.length = length;
    }
}

impl ConstraintEquations for Rod {
    fn kind_name(&self) -> &'static str {
        "Rod"
    }

    fn default_counts(&self) -> EquationCounts {
        EquationCounts::holonomic(1)
    }

    fn constrained_bodies(&self) -> SmallVec<[BodyId; 4]> {
        smallvec![self.body1, self.body2]
    }

    fn position_errors(&self, k: &ConstraintKinematics<'_>, perr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, perr.len())?;
        let p1 = k.station_location(B1, &self.point1)?;
        let p2 = k.station_location(B2, &self.point2)?;
        let p = p2 - p1;
        perr[0] = (p.dot(&p) - self.length * self.length) / 2.0;
        Ok(())
    }

    fn position_dot_errors(&self, k: &ConstraintKinematics<'_>, pverr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, pverr.len())?;
        let p = k.station_location(B2, &self.point2)? - k.station_location(B1, &self.point1)?;
        let v = k.station_velocity(B2, &self.point2)? - k.station_velocity(B1, &self.point1)?;
        pverr[0] = v.dot(&p);
        Ok(())
    }

    fn position_dot_dot_errors(
        &self,
        k: &ConstraintKinematics<'_>,
        paerr: &mut [f64],
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, paerr.len())?;
        let p = k.station_location(B2, &self.point2)? - k.station_location(B1, &self.point1)?;
        let v = k.station_velocity(B2, &self.point2)? - k.station_velocity(B1, &self.point1)?;
        let a = k.station_acceleration(B2, &self.point2)?
            - k.station_acceleration(B1, &self.point1)?;
        paerr[0] = a.dot(&p) + v.dot(&v);
        Ok(())
    }

    fn apply_position_forces(
        &self,
        k: &ConstraintKinematics<'_>,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, lambda.len())?;
        let p = k.station_location(B2, &self.point2)? - k.station_location(B1, &self.point1)?;
        let f2 = lambda[0] * p;
        k.add_in_station_force(B2, &self.point2, &f2, &mut forces.body_forces)?;
        k.add_in_station_force(B1, &self.point1, &-f2, &mut forces.body_forces)?;
        Ok(())
    }
}
