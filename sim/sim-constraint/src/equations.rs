//! The operation set every constraint kind implements.

use std::fmt;

use sim_types::BodyId;
use smallvec::SmallVec;

use crate::error::{ConstraintError, Result};
use crate::index::{EquationCategory, EquationCounts};
use crate::kinematics::{ConstraintForces, ConstraintKinematics};
use crate::state::MatterState;
use crate::topology::TopologyCache;

/// Equations of one constraint kind at the position, velocity and
/// acceleration levels, and the mapping from multipliers to forces.
///
/// Error routines receive an output slice whose length is the equation
/// count for their family. Force routines receive the multipliers for that
/// family only and must *add* into `forces`, never overwrite it.
///
/// Forces are derived by inspection of the velocity-level error: the force
/// on each body is the partial derivative of the error with respect to that
/// body's velocity, so the forces do no work on motions that satisfy the
/// constraint.
///
/// Every routine has a default that reports
/// [`ConstraintError::Unimplemented`]; a kind only overrides the families it
/// generates equations for. Implement this trait and wrap it in
/// [`ConstraintKind::Custom`](crate::ConstraintKind::Custom) to add a new
/// kind.
pub trait ConstraintEquations: fmt::Debug + Send + Sync {
    /// Short name of the kind.
    fn kind_name(&self) -> &'static str {
        "Custom"
    }

    /// Equation counts used when no modeling choice overrides them.
    fn default_counts(&self) -> EquationCounts;

    /// Bodies this kind constrains, in local index order.
    fn constrained_bodies(&self) -> SmallVec<[BodyId; 4]> {
        SmallVec::new()
    }

    /// Mobilizers (named by their body) this kind constrains, in local index order.
    fn constrained_mobilizers(&self) -> SmallVec<[BodyId; 2]> {
        SmallVec::new()
    }

    /// Equation counts in force for `state`, decided at model stage.
    fn num_equations(&self, _state: &dyn MatterState, defaults: EquationCounts) -> EquationCounts {
        defaults
    }

    /// Derived constants computed once at topology realization.
    fn topology_cache(&self) -> TopologyCache {
        TopologyCache::None
    }

    /// Holonomic errors `perr`.
    fn position_errors(&self, _k: &ConstraintKinematics<'_>, _perr: &mut [f64]) -> Result<()> {
        Err(ConstraintError::unimplemented("position errors"))
    }

    /// First time derivative of the holonomic errors, `pverr`.
    fn position_dot_errors(&self, _k: &ConstraintKinematics<'_>, _pverr: &mut [f64]) -> Result<()> {
        Err(ConstraintError::unimplemented("position dot errors"))
    }

    /// Second time derivative of the holonomic errors, `paerr`.
    fn position_dot_dot_errors(
        &self,
        _k: &ConstraintKinematics<'_>,
        _paerr: &mut [f64],
    ) -> Result<()> {
        Err(ConstraintError::unimplemented("position dot-dot errors"))
    }

    /// Add the forces produced by holonomic multipliers.
    fn apply_position_forces(
        &self,
        _k: &ConstraintKinematics<'_>,
        _lambda: &[f64],
        _forces: &mut ConstraintForces,
    ) -> Result<()> {
        Err(ConstraintError::unimplemented("position constraint forces"))
    }

    /// Nonholonomic errors `verr`.
    fn velocity_errors(&self, _k: &ConstraintKinematics<'_>, _verr: &mut [f64]) -> Result<()> {
        Err(ConstraintError::unimplemented("velocity errors"))
    }

    /// First time derivative of the nonholonomic errors, `vaerr`.
    fn velocity_dot_errors(&self, _k: &ConstraintKinematics<'_>, _vaerr: &mut [f64]) -> Result<()> {
        Err(ConstraintError::unimplemented("velocity dot errors"))
    }

    /// Add the forces produced by nonholonomic multipliers.
    fn apply_velocity_forces(
        &self,
        _k: &ConstraintKinematics<'_>,
        _lambda: &[f64],
        _forces: &mut ConstraintForces,
    ) -> Result<()> {
        Err(ConstraintError::unimplemented("velocity constraint forces"))
    }

    /// Acceleration-only errors `aerr`.
    fn acceleration_errors(&self, _k: &ConstraintKinematics<'_>, _aerr: &mut [f64]) -> Result<()> {
        Err(ConstraintError::unimplemented("acceleration errors"))
    }

    /// Add the forces produced by acceleration-only multipliers.
    fn apply_acceleration_forces(
        &self,
        _k: &ConstraintKinematics<'_>,
        _lambda: &[f64],
        _forces: &mut ConstraintForces,
    ) -> Result<()> {
        Err(ConstraintError::unimplemented("acceleration constraint forces"))
    }
}

/// Fail unless a kind's fixed equation count matches the slice it was given.
pub(crate) fn expect_count(category: EquationCategory, fixed: usize, given: usize) -> Result<()> {
    if fixed != given {
        return Err(ConstraintError::count_mismatch(category, given, fixed));
    }
    Ok(())
}
