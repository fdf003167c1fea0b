//! Rigid attachment of two frames.

use nalgebra::Vector3;
use sim_types::{BodyId, Pose};
use smallvec::{smallvec, SmallVec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::ball::{
    apply_coincidence_force, coincidence_dot_dot_error, coincidence_dot_error, coincidence_error,
};
use super::constant_orientation::{
    apply_orientation_torque, orientation_dot_dot_error, orientation_dot_error, orientation_error,
};
use crate::equations::{expect_count, ConstraintEquations};
use crate::error::Result;
use crate::index::{EquationCategory, EquationCounts};
use crate::kinematics::{ConstraintForces, ConstraintKinematics};

/// Welds a frame fixed on follower body F to a frame fixed on base body B.
///
/// Six holonomic equations: the three [`ConstantOrientation`](super::ConstantOrientation)
/// equations on the frames' rotations followed by the three
/// [`Ball`](super::Ball) equations on the frames' origins. The first three
/// multipliers are torques, the last three are forces.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Weld {
    base_body: BodyId,
    follower_body: BodyId,
    base_frame: Pose,
    follower_frame: Pose,
}

impl Weld {
    /// Weld the body frames of B and F together.
    #[must_use]
    pub fn new(base_body: BodyId, follower_body: BodyId) -> Self {
        Self {
            base_body,
            follower_body,
            base_frame: Pose::identity(),
            follower_frame: Pose::identity(),
        }
    }

    /// Weld frames fixed on each body instead of the body frames.
    #[must_use]
    pub fn with_frames(mut self, base_frame: Pose, follower_frame: Pose) -> Self {
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

    /// Frame on B.
    #[must_use]
    pub fn base_frame(&self) -> Pose {
        self.base_frame
    }

    /// Frame on F.
    #[must_use]
    pub fn follower_frame(&self) -> Pose {
        self.follower_frame
    }

    /// Change the frame on B.
    pub fn set_base_frame(&mut self, frame: Pose) {
        self.base_frame = frame;
    }

    /// Change the frame on F.
    pub fn set_follower_frame(&mut self, frame: Pose) {
        self.follower_frame = frame;
    }
}

fn write_blocks(out: &mut [f64], rotational: &Vector3<f64>, translational: &Vector3<f64>) {
    out[..3].copy_from_slice(rotational.as_slice());
    out[3..].copy_from_slice(translational.as_slice());
}

impl ConstraintEquations for Weld {
    fn kind_name(&self) -> &'static str {
        "Weld"
    }

    fn default_counts(&self) -> EquationCounts {
        EquationCounts::holonomic(6)
    }

    fn constrained_bodies(&self) -> SmallVec<[BodyId; 4]> {
        smallvec![self.base_body, self.follower_body]
    }

    fn position_errors(&self, k: &ConstraintKinematics<'_>, perr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 6, perr.len())?;
        let (fb, ff) = (&self.base_frame, &self.follower_frame);
        let rot = orientation_error(k, &fb.rotation, &ff.rotation)?;
        let trans = coincidence_error(k, &fb.position, &ff.position)?;
        write_blocks(perr, &rot, &trans);
        Ok(())
    }

    fn position_dot_errors(&self, k: &ConstraintKinematics<'_>, pverr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 6, pverr.len())?;
        let (fb, ff) = (&self.base_frame, &self.follower_frame);
        let rot = orientation_dot_error(k, &fb.rotation, &ff.rotation)?;
        let trans = coincidence_dot_error(k, &ff.position)?;
        write_blocks(pverr, &rot, &trans);
        Ok(())
    }

    fn position_dot_dot_errors(
        &self,
        k: &ConstraintKinematics<'_>,
        paerr: &mut [f64],
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 6, paerr.len())?;
        let (fb, ff) = (&self.base_frame, &self.follower_frame);
        let rot = orientation_dot_dot_error(k, &fb.rotation, &ff.rotation)?;
        let trans = coincidence_dot_dot_error(k, &ff.position)?;
        write_blocks(paerr, &rot, &trans);
        Ok(())
    }

    fn apply_position_forces(
        &self,
        k: &ConstraintKinematics<'_>,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 6, lambda.len())?;
        let (fb, ff) = (&self.base_frame, &self.follower_frame);
        apply_orientation_torque(k, &fb.rotation, &ff.rotation, &lambda[..3], forces)?;
        let force = Vector3::from_column_slice(&lambda[3..]);
        apply_coincidence_force(k, &ff.position, &force, forces)
    }
}
