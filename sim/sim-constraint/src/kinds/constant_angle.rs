//! Fixed angle between two body-fixed axes.

use std::f64::consts::FRAC_PI_2;

use nalgebra::{UnitVector3, Vector3};
use sim_types::BodyId;
use smallvec::{smallvec, SmallVec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::ball::{BASE, FOLLOWER};
use crate::equations::{expect_count, ConstraintEquations};
use crate::error::Result;
use crate::index::{EquationCategory, EquationCounts};
use crate::kinematics::{ConstraintForces, ConstraintKinematics};
use crate::topology::TopologyCache;

/// Holds an axis `f` fixed on follower body F at a constant angle from an
/// axis `b` fixed on base body B.
///
/// The cosine of the angle is cached at topology realization. One holonomic
/// equation, with both axes expressed in A:
///
/// ```text
/// perr  = b·f − cos θ
/// pverr = (w_AF − w_AB)·(f × b)
/// paerr = (b_AF − b_AB)·(f × b) + (w_AF − w_AB)·((w_AF × f) × b − (w_AB × b) × f)
/// ```
///
/// The multiplier is a torque `λ(f × b)` on F and its negative on B.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstantAngle {
    base_body: BodyId,
    base_axis: UnitVector3<f64>,
    follower_body: BodyId,
    follower_axis: UnitVector3<f64>,
    angle: f64,
}

impl ConstantAngle {
    /// Keep the two axes perpendicular.
    #[must_use]
    pub fn new(
        base_body: BodyId,
        base_axis: UnitVector3<f64>,
        follower_body: BodyId,
        follower_axis: UnitVector3<f64>,
    ) -> Self {
        Self {
            base_body,
            base_axis,
            follower_body,
            follower_axis,
            angle: FRAC_PI_2,
        }
    }

    /// Hold the axes at `angle` radians instead of a right angle.
    #[must_use]
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    /// Base body B.
    #[must_use]
    pub fn base_body(&self) -> BodyId {
        self.base_body
    }

    /// Follower body F.
    #[must_use]
    pub fn follower_body(&self) -> BodyId {
        self.follower_body
    }

    /// Axis fixed in B.
    #[must_use]
    pub fn base_axis(&self) -> UnitVector3<f64> {
        self.base_axis
    }

    /// Axis fixed in F.
    #[must_use]
    pub fn follower_axis(&self) -> UnitVector3<f64> {
        self.follower_axis
    }

    /// Target angle in radians.
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Change the axis fixed in B.
    pub fn set_base_axis(&mut self, axis: UnitVector3<f64>) {
        self.base_axis = axis;
    }

    /// Change the axis fixed in F.
    pub fn set_follower_axis(&mut self, axis: UnitVector3<f64>) {
        self.follower_axis = axis;
    }

    /// Change the target angle.
    pub fn set_angle(&mut self, angle: f64) {
        self.angle = angle;
    }

    fn axes(&self, k: &ConstraintKinematics<'_>) -> Result<(Vector3<f64>, Vector3<f64>)> {
        let b = k.body_rotation(BASE)? * self.base_axis.into_inner();
        let f = k.body_rotation(FOLLOWER)? * self.follower_axis.into_inner();
        Ok((b, f))
    }
}

impl ConstraintEquations for ConstantAngle {
    fn kind_name(&self) -> &'static str {
        "ConstantAngle"
    }

    fn default_counts(&self) -> EquationCounts {
        EquationCounts::holonomic(1)
    }

    fn constrained_bodies(&self) -> SmallVec<[BodyId; 4]> {
        smallvec![self.base_body, self.follower_body]
    }

    fn topology_cache(&self) -> TopologyCache {
        TopologyCache::CosAngle(self.angle.cos())
    }

    fn position_errors(&self, k: &ConstraintKinematics<'_>, perr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, perr.len())?;
        let cos_angle = k.topology_cache().cos_angle()?;
        let (b, f) = self.axes(k)?;
        perr[0] = b.dot(&f) - cos_angle;
        Ok(())
    }

    fn position_dot_errors(&self, k: &ConstraintKinematics<'_>, pverr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, pverr.len())?;
        let (b, f) = self.axes(k)?;
        let w_bf = k.body_angular_velocity(FOLLOWER)? - k.body_angular_velocity(BASE)?;
        pverr[0] = w_bf.dot(&f.cross(&b));
        Ok(())
    }

    fn position_dot_dot_errors(
        &self,
        k: &ConstraintKinematics<'_>,
        paerr: &mut [f64],
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, paerr.len())?;
        let (b, f) = self.axes(k)?;
        let w_ab = k.body_angular_velocity(BASE)?;
        let w_af = k.body_angular_velocity(FOLLOWER)?;
        let b_bf = k.body_angular_acceleration(FOLLOWER)? - k.body_angular_acceleration(BASE)?;
        let w_bf = w_af - w_ab;
        paerr[0] = b_bf.dot(&f.cross(&b))
            + w_bf.dot(&(w_af.cross(&f).cross(&b) - w_ab.cross(&b).cross(&f)));
        Ok(())
    }

    fn apply_position_forces(
        &self,
        k: &ConstraintKinematics<'_>,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 1, lambda.len())?;
        let (b, f) = self.axes(k)?;
        let torque = lambda[0] * f.cross(&b);
        k.add_in_body_torque(FOLLOWER, &torque, &mut forces.body_forces)?;
        k.add_in_body_torque(BASE, &-torque, &mut forces.body_forces)
    }
}
