//! Station confined to a line.

use nalgebra::{Point3, UnitVector3, Vector3};
use sim_types::BodyId;
use smallvec::{smallvec, SmallVec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::ball::{BASE, FOLLOWER};
use crate::equations::{expect_count, ConstraintEquations};
use crate::error::Result;
use crate::index::{EquationCategory, EquationCounts};
use crate::kinematics::{ConstraintForces, ConstraintKinematics};
use crate::topology::{LineFrame, TopologyCache};

/// Keeps a follower station `S` on body F on a line fixed on base body B.
///
/// The line passes through `P` with direction `z`. At topology realization
/// two unit axes `x`, `y` perpendicular to `z` are cached; the two holonomic
/// equations require the offset of `S` from the line to vanish along each:
///
/// ```text
/// perr  = [p_PC·x, p_PC·y]
/// pverr = R_BA (v_AS − v_AC) · [x, y]
/// paerr = R_BA ((a_AS − a_AC) − 2 w_AB × (v_AS − v_AC)) · [x, y]
/// ```
///
/// where `C` is the material point of B coincident with `S`. The
/// multipliers give a force `λ₀x + λ₁y` (re-expressed in A) at `S` on F,
/// and its negative at `C` on B.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointOnLine {
    line_body: BodyId,
    follower_body: BodyId,
    direction: UnitVector3<f64>,
    point_on_line: Point3<f64>,
    follower_point: Point3<f64>,
}

impl PointOnLine {
    /// Confine the follower's origin to the line through the line body's
    /// origin along `direction`.
    #[must_use]
    pub fn new(line_body: BodyId, direction: UnitVector3<f64>, follower_body: BodyId) -> Self {
        Self {
            line_body,
            follower_body,
            direction,
            point_on_line: Point3::origin(),
            follower_point: Point3::origin(),
        }
    }

    /// Pass the line through a station of the line body.
    #[must_use]
    pub fn with_point_on_line(mut self, point: Point3<f64>) -> Self {
        self.point_on_line = point;
        self
    }

    /// Use a station on the follower other than its origin.
    #[must_use]
    pub fn with_follower_point(mut self, point: Point3<f64>) -> Self {
        self.follower_point = point;
        self
    }

    /// Body the line is fixed to.
    #[must_use]
    pub fn line_body(&self) -> BodyId {
        self.line_body
    }

    /// Body carrying the follower station.
    #[must_use]
    pub fn follower_body(&self) -> BodyId {
        self.follower_body
    }

    /// Line direction in the line body's frame.
    #[must_use]
    pub fn direction(&self) -> UnitVector3<f64> {
        self.direction
    }

    /// A point the line passes through.
    #[must_use]
    pub fn point_on_line(&self) -> Point3<f64> {
        self.point_on_line
    }

    /// Follower station in F.
    #[must_use]
    pub fn follower_point(&self) -> Point3<f64> {
        self.follower_point
    }

    /// Change the line direction.
    pub fn set_direction(&mut self, direction: UnitVector3<f64>) {
        self.direction = direction;
    }

    /// Move the line's reference point.
    pub fn set_point_on_line(&mut self, point: Point3<f64>) {
        self.point_on_line = point;
    }

    /// Move the follower station.
    pub fn set_follower_point(&mut self, point: Point3<f64>) {
        self.follower_point = point;
    }

    fn project(frame: &LineFrame, v: &Vector3<f64>, out: &mut [f64]) {
        out[0] = v.dot(&frame.x);
        out[1] = v.dot(&frame.y);
    }
}

impl ConstraintEquations for PointOnLine {
    fn kind_name(&self) -> &'static str {
        "PointOnLine"
    }

    fn default_counts(&self) -> EquationCounts {
        EquationCounts::holonomic(2)
    }

    fn constrained_bodies(&self) -> SmallVec<[BodyId; 4]> {
        smallvec![self.line_body, self.follower_body]
    }

    fn topology_cache(&self) -> TopologyCache {
        TopologyCache::LineFrame(LineFrame::perpendicular_to(&self.direction))
    }

    fn position_errors(&self, k: &ConstraintKinematics<'_>, perr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 2, perr.len())?;
        let frame = k.topology_cache().line_frame()?;
        let p_as = k.station_location(FOLLOWER, &self.follower_point)?;
        let p_bc = k.body_transform(BASE)?.inverse_transform_point(&p_as);
        Self::project(frame, &(p_bc - self.point_on_line), perr);
        Ok(())
    }

    fn position_dot_errors(&self, k: &ConstraintKinematics<'_>, pverr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 2, pverr.len())?;
        let frame = k.topology_cache().line_frame()?;
        let x_ab = k.body_transform(BASE)?;
        let p_as = k.station_location(FOLLOWER, &self.follower_point)?;
        let p_bc = x_ab.inverse_transform_point(&p_as);
        let v_as = k.station_velocity(FOLLOWER, &self.follower_point)?;
        let v_ac = k.station_velocity(BASE, &p_bc)?;
        let v_cs_b = x_ab.inverse_transform_vector(&(v_as - v_ac));
        Self::project(frame, &v_cs_b, pverr);
        Ok(())
    }

    fn position_dot_dot_errors(
        &self,
        k: &ConstraintKinematics<'_>,
        paerr: &mut [f64],
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 2, paerr.len())?;
        let frame = k.topology_cache().line_frame()?;
        let x_ab = k.body_transform(BASE)?;
        let w_ab = k.body_angular_velocity(BASE)?;
        let p_as = k.station_location(FOLLOWER, &self.follower_point)?;
        let p_bc = x_ab.inverse_transform_point(&p_as);
        let v = k.station_velocity(FOLLOWER, &self.follower_point)?
            - k.station_velocity(BASE, &p_bc)?;
        let a = k.station_acceleration(FOLLOWER, &self.follower_point)?
            - k.station_acceleration(BASE, &p_bc)?;
        let a_cs_b = x_ab.inverse_transform_vector(&(a - 2.0 * w_ab.cross(&v)));
        Self::project(frame, &a_cs_b, paerr);
        Ok(())
    }

    fn apply_position_forces(
        &self,
        k: &ConstraintKinematics<'_>,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 2, lambda.len())?;
        let frame = k.topology_cache().line_frame()?;
        let x_ab = k.body_transform(BASE)?;
        let p_as = k.station_location(FOLLOWER, &self.follower_point)?;
        let p_bc = x_ab.inverse_transform_point(&p_as);
        let force = x_ab.transform_vector(&(lambda[0] * frame.x + lambda[1] * frame.y));
        k.add_in_station_force(FOLLOWER, &self.follower_point, &force, &mut forces.body_forces)?;
        k.add_in_station_force(BASE, &p_bc, &-force, &mut forces.body_forces)
    }
}
