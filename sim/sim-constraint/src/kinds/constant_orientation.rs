//! Locked relative orientation.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use sim_types::BodyId;
use smallvec::{smallvec, SmallVec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::ball::{BASE, FOLLOWER};
use crate::equations::{expect_count, ConstraintEquations};
use crate::error::Result;
use crate::index::{EquationCategory, EquationCounts};
use crate::kinematics::{ConstraintForces, ConstraintKinematics};

/// Keeps a frame fixed on follower body F at the same orientation as a
/// frame fixed on base body B.
///
/// Three holonomic equations requiring each axis of F's frame to stay
/// perpendicular to the next axis of B's frame (`x⊥y`, `y⊥z`, `z⊥x`):
///
/// ```text
/// perr_i  = RF_i · RB_j
/// pverr_i = w_BF · (RF_i × RB_j)
/// paerr_i = b_BF · (RF_i × RB_j) + w_BF · ((w_AF × RF_i) × RB_j − (w_AB × RB_j) × RF_i)
/// ```
///
/// with `(i, j)` running over `(x, y)`, `(y, z)`, `(z, x)`. The multipliers
/// are torque magnitudes about `RF_i × RB_j`, applied positively to F and
/// negatively to B.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstantOrientation {
    base_body: BodyId,
    follower_body: BodyId,
    base_frame: UnitQuaternion<f64>,
    follower_frame: UnitQuaternion<f64>,
}

impl ConstantOrientation {
    /// Lock the body frames of B and F together.
    #[must_use]
    pub fn new(base_body: BodyId, follower_body: BodyId) -> Self {
        Self {
            base_body,
            follower_body,
            base_frame: UnitQuaternion::identity(),
            follower_frame: UnitQuaternion::identity(),
        }
    }

    /// Lock frames fixed on each body instead of the body frames.
    #[must_use]
    pub fn with_frames(
        mut self,
        base_frame: UnitQuaternion<f64>,
        follower_frame: UnitQuaternion<f64>,
    ) -> Self {
        self.base_frame = base_frame;
        self.follower_frame = follower_frame;
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

    /// Orientation of the frame on B.
    #[must_use]
    pub fn base_frame(&self) -> UnitQuaternion<f64> {
        self.base_frame
    }

    /// Orientation of the frame on F.
    #[must_use]
    pub fn follower_frame(&self) -> UnitQuaternion<f64> {
        self.follower_frame
    }

    /// Change the frame on B.
    pub fn set_base_frame(&mut self, frame: UnitQuaternion<f64>) {
        self.base_frame = frame;
    }

    /// Change the frame on F.
    pub fn set_follower_frame(&mut self, frame: UnitQuaternion<f64>) {
        self.follower_frame = frame;
    }
}

/// Axis pairs `(F axis, B axis)` of the three perpendicularity conditions.
const AXIS_PAIRS: [(usize, usize); 3] = [(0, 1), (1, 2), (2, 0)];

/// Frame axes of B and F expressed in the ancestor frame, as matrix columns.
fn frame_axes(
    k: &ConstraintKinematics<'_>,
    base_frame: &UnitQuaternion<f64>,
    follower_frame: &UnitQuaternion<f64>,
) -> Result<(Matrix3<f64>, Matrix3<f64>)> {
    let rb = (k.body_rotation(BASE)? * base_frame).to_rotation_matrix().into_inner();
    let rf = (k.body_rotation(FOLLOWER)? * follower_frame)
        .to_rotation_matrix()
        .into_inner();
    Ok((rb, rf))
}

pub(crate) fn orientation_error(
    k: &ConstraintKinematics<'_>,
    base_frame: &UnitQuaternion<f64>,
    follower_frame: &UnitQuaternion<f64>,
) -> Result<Vector3<f64>> {
    let (rb, rf) = frame_axes(k, base_frame, follower_frame)?;
    Ok(Vector3::from_fn(|i, _| {
        let (f, b) = AXIS_PAIRS[i];
        rf.column(f).dot(&rb.column(b))
    }))
}

pub(crate) fn orientation_dot_error(
    k: &ConstraintKinematics<'_>,
    base_frame: &UnitQuaternion<f64>,
    follower_frame: &UnitQuaternion<f64>,
) -> Result<Vector3<f64>> {
    let (rb, rf) = frame_axes(k, base_frame, follower_frame)?;
    let w_bf = k.body_angular_velocity(FOLLOWER)? - k.body_angular_velocity(BASE)?;
    Ok(Vector3::from_fn(|i, _| {
        let (f, b) = AXIS_PAIRS[i];
        w_bf.dot(&rf.column(f).cross(&rb.column(b)))
    }))
}

pub(crate) fn orientation_dot_dot_error(
    k: &ConstraintKinematics<'_>,
    base_frame: &UnitQuaternion<f64>,
    follower_frame: &UnitQuaternion<f64>,
) -> Result<Vector3<f64>> {
    let (rb, rf) = frame_axes(k, base_frame, follower_frame)?;
    let w_ab = k.body_angular_velocity(BASE)?;
    let w_af = k.body_angular_velocity(FOLLOWER)?;
    let b_bf = k.body_angular_acceleration(FOLLOWER)? - k.body_angular_acceleration(BASE)?;
    let w_bf = w_af - w_ab;
    Ok(Vector3::from_fn(|i, _| {
        let (f, b) = AXIS_PAIRS[i];
        let rf_i: Vector3<f64> = rf.column(f).into_owned();
        let rb_j: Vector3<f64> = rb.column(b).into_owned();
        b_bf.dot(&rf_i.cross(&rb_j))
            + w_bf.dot(&(w_af.cross(&rf_i).cross(&rb_j) - w_ab.cross(&rb_j).cross(&rf_i)))
    }))
}

pub(crate) fn apply_orientation_torque(
    k: &ConstraintKinematics<'_>,
    base_frame: &UnitQuaternion<f64>,
    follower_frame: &UnitQuaternion<f64>,
    lambda: &[f64],
    forces: &mut ConstraintForces,
) -> Result<()> {
    let (rb, rf) = frame_axes(k, base_frame, follower_frame)?;
    let torque = AXIS_PAIRS
        .iter()
        .zip(lambda)
        .fold(Vector3::zeros(), |acc, (&(f, b), &l)| {
            acc + l * rf.column(f).cross(&rb.column(b))
        });
    k.add_in_body_torque(FOLLOWER, &torque, &mut forces.body_forces)?;
    k.add_in_body_torque(BASE, &-torque, &mut forces.body_forces)
}

impl ConstraintEquations for ConstantOrientation {
    fn kind_name(&self) -> &'static str {
        "ConstantOrientation"
    }

    fn default_counts(&self) -> EquationCounts {
        EquationCounts::holonomic(3)
    }

    fn constrained_bodies(&self) -> SmallVec<[BodyId; 4]> {
        smallvec![self.base_body, self.follower_body]
    }

    fn position_errors(&self, k: &ConstraintKinematics<'_>, perr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 3, perr.len())?;
        let e = orientation_error(k, &self.base_frame, &self.follower_frame)?;
        perr.copy_from_slice(e.as_slice());
        Ok(())
    }

    fn position_dot_errors(&self, k: &ConstraintKinematics<'_>, pverr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 3, pverr.len())?;
        let e = orientation_dot_error(k, &self.base_frame, &self.follower_frame)?;
        pverr.copy_from_slice(e.as_slice());
        Ok(())
    }

    fn position_dot_dot_errors(
        &self,
        k: &ConstraintKinematics<'_>,
        paerr: &mut [f64],
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 3, paerr.len())?;
        let e = orientation_dot_dot_error(k, &self.base_frame, &self.follower_frame)?;
        paerr.copy_from_slice(e.as_slice());
        Ok(())
    }

    fn apply_position_forces(
        &self,
        k: &ConstraintKinematics<'_>,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 3, lambda.len())?;
        apply_orientation_torque(k, &self.base_frame, &self.follower_frame, lambda, forces)
    }
}
