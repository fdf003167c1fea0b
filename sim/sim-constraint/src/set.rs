//! The aggregate that owns every constraint of a mechanism.
//!
//! [`ConstraintSet`] is the only way to create or change a [`Constraint`].
//! It drives the stage protocol for all of them at once and lays the
//! equations out in the mechanism-wide arrays:
//!
//! ```text
//! qerr        [ holonomic ]
//! uerr        [ holonomic | nonholonomic ]
//! udoterr     [ holonomic | nonholonomic | acceleration-only ]
//! multipliers [ holonomic | nonholonomic | acceleration-only ]
//! ```
//!
//! Within each block constraints occupy consecutive slots in the order they
//! were added.

use sim_types::{BodyId, Stage};

use crate::constraint::Constraint;
use crate::error::{require_stage, ConstraintError, Result};
use crate::index::{
    ConstrainedBodyIndex, ConstrainedMobilizerIndex, ConstraintEquationSet, ConstraintId,
    EquationCounts, EquationSlots,
};
use crate::kinds::{ConstraintKind, KindVariant};
use crate::state::{KinematicTree, MatterState};

/// Borrow `count` entries of a mechanism-wide array starting at `at`.
fn block_mut<'a>(
    array: &'a mut [f64],
    name: &'static str,
    at: usize,
    count: usize,
) -> Result<&'a mut [f64]> {
    let len = array.len();
    array
        .get_mut(at..at + count)
        .ok_or(ConstraintError::buffer_size(name, at + count, len))
}

fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ConstraintError::buffer_size(name, expected, actual));
    }
    Ok(())
}

/// Every constraint of a mechanism.
///
/// # Example
///
/// ```
/// use sim_constraint::{ConstraintSet, KinematicSnapshot, Rod};
/// use sim_types::{BodyId, Pose, Stage};
/// use nalgebra::Point3;
///
/// let mut snapshot = KinematicSnapshot::new();
/// let a = snapshot.add_body(BodyId::GROUND, 0, 0).unwrap();
/// let b = snapshot.add_body(BodyId::GROUND, 0, 0).unwrap();
/// snapshot
///     .set_pose(b, Pose::from_position(Point3::new(2.0, 0.0, 0.0)))
///     .unwrap();
///
/// let mut set = ConstraintSet::new();
/// set.add(Rod::new(a, b, 1.0)).unwrap();
/// set.realize_topology(&snapshot).unwrap();
///
/// snapshot.set_stage(Stage::Model);
/// let totals = set.realize_model(&snapshot).unwrap();
/// assert_eq!(totals.mp, 1);
///
/// snapshot.set_stage(Stage::Position);
/// let mut qerr = vec![0.0; totals.mp];
/// set.realize_position(&snapshot, &mut qerr).unwrap();
/// assert_eq!(qerr, vec![1.5]);
/// ```
#[derive(Debug, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
    totals: Option<EquationCounts>,
}

impl ConstraintSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Whether the set has no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Whether `id` names a constraint of this set.
    #[must_use]
    pub fn contains(&self, id: ConstraintId) -> bool {
        id.0 < self.constraints.len()
    }

    /// Iterate over the constraints in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    /// Look up a constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::UnknownConstraint`] for an id not in this set.
    pub fn get(&self, id: ConstraintId) -> Result<&Constraint> {
        self.constraints
            .get(id.0)
            .ok_or(ConstraintError::UnknownConstraint(id))
    }

    fn get_mut(&mut self, id: ConstraintId) -> Result<&mut Constraint> {
        self.constraints
            .get_mut(id.0)
            .ok_or(ConstraintError::UnknownConstraint(id))
    }

    /// Slot layout changes whenever any constraint changes.
    fn invalidate_model(&mut self) {
        self.totals = None;
        for constraint in &mut self.constraints {
            constraint.invalidate_model();
        }
    }

    // ========================================================================
    // Assembly
    // ========================================================================

    /// Add a constraint, registering the bodies and mobilizers of its kind.
    ///
    /// # Errors
    ///
    /// Fails if the kind lists the same body or mobilizer twice.
    pub fn add(&mut self, kind: impl Into<ConstraintKind>) -> Result<ConstraintId> {
        let id = ConstraintId(self.constraints.len());
        let constraint = Constraint::new(id, kind.into())?;
        self.invalidate_model();
        self.constraints.push(constraint);
        Ok(id)
    }

    /// Add one more constrained body to a constraint.
    ///
    /// # Errors
    ///
    /// Fails for an unknown constraint, after topology realization, or for a
    /// body already constrained.
    pub fn add_constrained_body(
        &mut self,
        id: ConstraintId,
        body: BodyId,
    ) -> Result<ConstrainedBodyIndex> {
        let local = self.get_mut(id)?.add_constrained_body(body)?;
        self.invalidate_model();
        Ok(local)
    }

    /// Add one more constrained mobilizer to a constraint.
    ///
    /// # Errors
    ///
    /// Fails for an unknown constraint, after topology realization, or for a
    /// mobilizer already constrained.
    pub fn add_constrained_mobilizer(
        &mut self,
        id: ConstraintId,
        body: BodyId,
    ) -> Result<ConstrainedMobilizerIndex> {
        let local = self.get_mut(id)?.add_constrained_mobilizer(body)?;
        self.invalidate_model();
        Ok(local)
    }

    /// Change a constraint's default equation counts. Invalidates its topology.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::UnknownConstraint`] for an unknown id.
    pub fn set_default_num_constraints(
        &mut self,
        id: ConstraintId,
        counts: EquationCounts,
    ) -> Result<()> {
        self.get_mut(id)?.set_default_num_constraints(counts);
        self.invalidate_model();
        Ok(())
    }

    /// Change the geometric constants of a built-in constraint in place.
    /// Invalidates its topology.
    ///
    /// ```
    /// use sim_constraint::{ConstraintSet, Rod};
    /// use sim_types::BodyId;
    ///
    /// let mut set = ConstraintSet::new();
    /// let id = set.add(Rod::new(BodyId::new(1), BodyId::new(2), 1.0)).unwrap();
    /// set.update(id, |rod: &mut Rod| rod.set_length(2.0)).unwrap();
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::KindMismatch`] if the constraint is not a
    /// `K`, or [`ConstraintError::UnknownConstraint`] for an unknown id.
    pub fn update<K: KindVariant>(
        &mut self,
        id: ConstraintId,
        f: impl FnOnce(&mut K),
    ) -> Result<()> {
        let constraint = self.get_mut(id)?;
        if K::from_kind(constraint.kind()).is_none() {
            return Err(ConstraintError::KindMismatch {
                expected: K::NAME,
                actual: constraint.kind().name(),
            });
        }
        if let Some(kind) = K::from_kind_mut(constraint.kind_mut()) {
            f(kind);
        }
        self.invalidate_model();
        Ok(())
    }

    /// Discard a constraint's realized topology.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::UnknownConstraint`] for an unknown id.
    pub fn invalidate_topology(&mut self, id: ConstraintId) -> Result<()> {
        self.get_mut(id)?.invalidate_topology();
        self.invalidate_model();
        Ok(())
    }

    // ========================================================================
    // Stage realization
    // ========================================================================

    /// Realize the topology of every constraint not yet realized.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::BodyNotInTree`] if a constraint refers to
    /// a body the tree does not have.
    pub fn realize_topology(&mut self, tree: &dyn KinematicTree) -> Result<()> {
        for constraint in &mut self.constraints {
            constraint.realize_topology(tree)?;
        }
        Ok(())
    }

    /// Fix every constraint's equation counts and assign their slots,
    /// returning the mechanism-wide totals.
    ///
    /// # Errors
    ///
    /// Fails below [`Stage::Model`], if any topology is unrealized, or if a
    /// constrained mobilizer has no layout in `state`.
    pub fn realize_model(&mut self, state: &dyn MatterState) -> Result<EquationCounts> {
        require_stage(state.stage(), Stage::Model)?;
        let counts = self
            .constraints
            .iter()
            .map(|c| c.calc_num_constraint_equations(state))
            .collect::<Result<Vec<_>>>()?;
        let totals = counts
            .iter()
            .fold(EquationCounts::default(), |acc, &c| acc + c);

        let mut next = EquationCounts::default();
        for (constraint, &count) in self.constraints.iter_mut().zip(&counts) {
            let slots = EquationSlots::assign(count, next);
            constraint.realize_model(state, count, slots, totals)?;
            next += count;
        }
        tracing::debug!(
            constraints = self.constraints.len(),
            mp = totals.mp,
            mv = totals.mv,
            ma = totals.ma,
            "constraint model realized"
        );
        self.totals = Some(totals);
        Ok(totals)
    }

    /// Mechanism-wide equation totals.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::ModelNotRealized`] before [`Self::realize_model`].
    pub fn total_counts(&self) -> Result<EquationCounts> {
        self.totals.ok_or(ConstraintError::ModelNotRealized)
    }

    /// Instance stage. Constraints contribute nothing here beyond checking
    /// that the model is in place.
    ///
    /// # Errors
    ///
    /// Fails below [`Stage::Instance`] or before model realization.
    pub fn realize_instance(&self, state: &dyn MatterState) -> Result<()> {
        require_stage(state.stage(), Stage::Instance)?;
        self.total_counts().map(|_| ())
    }

    /// Time stage. Constraints contribute nothing here beyond checking that
    /// the model is in place.
    ///
    /// # Errors
    ///
    /// Fails below [`Stage::Time`] or before model realization.
    pub fn realize_time(&self, state: &dyn MatterState) -> Result<()> {
        require_stage(state.stage(), Stage::Time)?;
        self.total_counts().map(|_| ())
    }

    fn models(&self) -> impl Iterator<Item = Result<(&Constraint, &ConstraintEquationSet)>> {
        self.constraints
            .iter()
            .map(|c| c.equation_set().map(|model| (c, model)))
    }

    /// Write every constraint's position errors into `qerr`.
    ///
    /// # Errors
    ///
    /// Fails below [`Stage::Position`], before model realization, or if
    /// `qerr` is not `total mp` long.
    pub fn realize_position(&self, state: &dyn MatterState, qerr: &mut [f64]) -> Result<()> {
        require_stage(state.stage(), Stage::Position)?;
        let totals = self.total_counts()?;
        check_len("qerr", totals.mp, qerr.len())?;
        for entry in self.models() {
            let (constraint, model) = entry?;
            let mp = model.counts().mp;
            if let Some(at) = model.holonomic_offset() {
                constraint.calc_position_errors(state, mp, block_mut(qerr, "qerr", at, mp)?)?;
            }
        }
        Ok(())
    }

    /// Write every constraint's `pverr` and `verr` into `uerr`.
    ///
    /// # Errors
    ///
    /// Fails below [`Stage::Velocity`], before model realization, or if
    /// `uerr` is not `total mp + mv` long.
    pub fn realize_velocity(&self, state: &dyn MatterState, uerr: &mut [f64]) -> Result<()> {
        require_stage(state.stage(), Stage::Velocity)?;
        let totals = self.total_counts()?;
        check_len("uerr", totals.velocity_level(), uerr.len())?;
        for entry in self.models() {
            let (constraint, model) = entry?;
            let counts = model.counts();
            if let Some(at) = model.holonomic_offset() {
                let out = block_mut(uerr, "uerr", at, counts.mp)?;
                constraint.calc_position_dot_errors(state, counts.mp, out)?;
            }
            if let Some(at) = model.nonholonomic_offset() {
                let out = block_mut(uerr, "uerr", at, counts.mv)?;
                constraint.calc_velocity_errors(state, counts.mv, out)?;
            }
        }
        Ok(())
    }

    /// Write every constraint's `paerr`, `vaerr` and `aerr` into `udoterr`.
    ///
    /// # Errors
    ///
    /// Fails below [`Stage::Acceleration`], before model realization, or if
    /// `udoterr` is not `total mp + mv + ma` long.
    pub fn realize_acceleration(&self, state: &dyn MatterState, udoterr: &mut [f64]) -> Result<()> {
        require_stage(state.stage(), Stage::Acceleration)?;
        let totals = self.total_counts()?;
        check_len("udoterr", totals.total(), udoterr.len())?;
        for entry in self.models() {
            let (constraint, model) = entry?;
            let counts = model.counts();
            if let Some(at) = model.holonomic_offset() {
                let out = block_mut(udoterr, "udoterr", at, counts.mp)?;
                constraint.calc_position_dot_dot_errors(state, counts.mp, out)?;
            }
            if let Some(at) = model.nonholonomic_offset() {
                let out = block_mut(udoterr, "udoterr", at, counts.mv)?;
                constraint.calc_velocity_dot_errors(state, counts.mv, out)?;
            }
            if let Some(at) = model.acceleration_only_offset() {
                let out = block_mut(udoterr, "udoterr", at, counts.ma)?;
                constraint.calc_acceleration_errors(state, counts.ma, out)?;
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ConstraintSet {
    type Item = &'a Constraint;
    type IntoIter = std::slice::Iter<'a, Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.constraints.iter()
    }
}
