//! Station confined to a plane.

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

/// Keeps a follower station `S` on body F in a plane fixed on base body B.
///
/// The plane has unit normal `n` and lies at height `h` along `n` from B's
/// origin. `C` is the material point of B coincident with `S`. Derivatives
/// are taken in B and expressed in A:
///
/// ```text
/// perr  = p_BC·n − h
/// pverr = (v_AS − v_AC)·n_A
/// paerr = ((a_AS − a_AC) − 2 w_AB × (v_AS − v_AC))·n_A
/// ```
///
/// The multiplier is a force `λn` applied at `S` on F and its negative at
/// `C` on B.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointInPlane {
    plane_body: BodyId,
    follower_body: BodyId,
    normal: UnitVector3<f64>,
    height: f64,
    follower_point: Point3<f64>,
}

impl PointInPlane {
    /// Confine the follower's origin to the plane `p·normal = height` of the plane body.
    #[must_use]
    pub fn new(
        plane_body: BodyId,
        normal: UnitVector3<f64>,
        height: f64,
        follower_body: BodyId,
    ) -> Self {
        Self {
            plane_body,
            follower_body,
            normal,
            height,
            follower_point: Point3::origin(),
        }
    }

    /// Use a station on the follower other than its origin.
    #[must_use]
    pub fn with_follower_point(mut self, point: Point3<f64>) -> Self {
        self.follower_point = point;
        self
    }

    /// Body the plane is fixed to.
    #[must_use]
    pub fn plane_body(&self) -> BodyId {
        self.plane_body
    }

    /// Body carrying the follower station.
    #[must_use]
    pub fn follower_body(&self) -> BodyId {
        self.follower_body
    }

    /// Plane normal in the plane body's frame.
    #[must_use]
    pub fn normal(&self) -> UnitVector3<f64> {
        self.normal
    }

    /// Plane height along the normal.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Follower station in F.
    #[must_use]
    pub fn follower_point(&self) -> Point3<f64> {
        self.follower_point
    }

    /// Change the plane normal.
    pub fn set_normal(&mut self, normal: UnitVector3<f64>) {
        self.normal = normal;
    }

    /// Change the plane height.
    pub fn set_height(&mut self, height: f64) {
        self.height = height;
    }

    /// Move the follower station.
    pub fn set_follower_point(&mut self, point: Point3<f64>) {
        self.follower_point = point;
    }

    /// Station on B coincident with S, and S's velocity relative to it.
    fn relative_velocity(
        &self,
        k: &ConstraintKinematics<'_>,
    ) -> Result<(Point3<f64>, Vector3<f64>)> {
        let p_as = k.station_location(FOLLOWER, &self.follower_point)?;
        let p_bc = k.body_transform(BASE)?.inverse_transform_point(&p_as);
        let v = k.station_velocity(FOLLOWER, &self.follower_point)?
            - k.station_velocity(BASE, &p_bc)?;
        Ok((p_bc, v))
    }
}

impl ConstraintEquations for PointInPlane {
    fn kind_name(&self) -> &'static str {
        "PointInPlane"
    }

    fn default_counts(&self) -> EquationCounts {
        EquationCounts::holonomic(1)
    }

    fn constrained_bodies(&self) -> SmallVec<[BodyId; 4]> {
        smallvec![self.plane_body, self.follower_body]
    }

    fn position_errors(&self, k: &ConstraintKinematics<'_>, perr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, perr.len())?;
        let p_as = k.station_location(FOLLOWER, &self.follower_point)?;
        let p_bc = k.body_transform(BASE)?.inverse_transform_point(&p_as);
        perr[0] = p_bc.coords.dot(&self.normal.into_inner()) - self.height;
        Ok(())
    }

    fn position_dot_errors(&self, k: &ConstraintKinematics<'_>, pverr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, pverr.len())?;
        let (_, v) = self.relative_velocity(k)?;
        let n_a = k.body_rotation(BASE)? * self.normal.into_inner();
        pverr[0] = v.dot(&n_a);
        Ok(())
    }

    fn position_dot_dot_errors(
        &self,
        k: &ConstraintKinematics<'_>,
        paerr: &mut [f64],
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, paerr.len())?;
        let (p_bc, v) = self.relative_velocity(k)?;
        let a = k.station_acceleration(FOLLOWER, &self.follower_point)?
            - k.station_acceleration(BASE, &p_bc)?;
        let w_ab = k.body_angular_velocity(BASE)?;
        let n_a = k.body_rotation(BASE)? * self.normal.into_inner();
        paerr[0] = (a - 2.0 * w_ab.cross(&v)).dot(&n_a);
        Ok(())
    }

    fn apply_position_forces(
        &self,
        k: &ConstraintKinematics<'_>,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, lambda.len())?;
        let p_as = k.station_location(FOLLOWER, &self.follower_point)?;
        let x_ab = k.body_transform(BASE)?;
        let p_bc = x_ab.inverse_transform_point(&p_as);
        let force = x_ab.rotation * (lambda[0] * self.normal.into_inner());
        k.add_in_station_force(FOLLOWER, &self.follower_point, &force, &mut forces.body_forces)?;
        k.add_in_station_force(BASE, &p_bc, &-force, &mut forces.body_forces)
    }
}
