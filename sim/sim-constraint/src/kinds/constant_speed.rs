//! Prescribed speed of one mobility.

use sim_types::BodyId;
use smallvec::{smallvec, SmallVec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::equations::{expect_count, ConstraintEquations};
use crate::error::Result;
use crate::index::{ConstrainedMobilizerIndex, EquationCategory, EquationCounts};
use crate::kinematics::{ConstraintForces, ConstraintKinematics};

const MOBILIZER: ConstrainedMobilizerIndex = ConstrainedMobilizerIndex(0);

/// Holds one generalized speed `u` of a mobilizer at a prescribed value `s`.
///
/// ```text
/// verr  = u − s
/// vaerr = u̇
/// ```
///
/// The multiplier acts directly as a generalized force on that mobility.
///
/// # Example
///
/// ```
/// use sim_constraint::ConstantSpeed;
/// use sim_types::BodyId;
///
/// // Spin the first mobility of body 3's mobilizer at 2 rad/s.
/// let motor = ConstantSpeed::new(BodyId::new(3), 2.0).with_mobility(0);
/// assert_eq!(motor.speed(), 2.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstantSpeed {
    mobilizer: BodyId,
    mobility: usize,
    speed: f64,
}

impl ConstantSpeed {
    /// Prescribe the first mobility of `mobilizer` (named by its body).
    #[must_use]
    pub fn new(mobilizer: BodyId, speed: f64) -> Self {
        Self {
            mobilizer,
            mobility: 0,
            speed,
        }
    }

    /// Prescribe a different mobility of the same mobilizer.
    #[must_use]
    pub fn with_mobility(mut self, mobility: usize) -> Self {
        self.mobility = mobility;
        self
    }

    /// Body whose mobilizer is driven.
    #[must_use]
    pub fn mobilizer(&self) -> BodyId {
        self.mobilizer
    }

    /// Which of the mobilizer's mobilities is driven.
    #[must_use]
    pub fn mobility(&self) -> usize {
        self.mobility
    }

    /// Prescribed speed.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Change the prescribed speed.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }
}

impl ConstraintEquations for ConstantSpeed {
    fn kind_name(&self) -> &'static str {
        "ConstantSpeed"
    }

    fn default_counts(&self) -> EquationCounts {
        EquationCounts::nonholonomic(1)
    }

    fn constrained_mobilizers(&self) -> SmallVec<[BodyId; 2]> {
        smallvec![self.mobilizer]
    }

    fn velocity_errors(&self, k: &ConstraintKinematics<'_>, verr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Nonholonomic, 1, verr.len())?;
        verr[0] = k.one_u(MOBILIZER, self.mobility)? - self.speed;
        Ok(())
    }

    fn velocity_dot_errors(&self, k: &ConstraintKinematics<'_>, vaerr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Nonholonomic, 1, vaerr.len())?;
        vaerr[0] = k.one_udot(MOBILIZER, self.mobility)?;
        Ok(())
    }

    fn apply_velocity_forces(
        &self,
        k: &ConstraintKinematics<'_>,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        expect_count(EquationCategory::Nonholonomic, 1, lambda.len())?;
        k.add_in_one_mobility_force(MOBILIZER, self.mobility, lambda[0], &mut forces.mobility_forces)
    }
}
