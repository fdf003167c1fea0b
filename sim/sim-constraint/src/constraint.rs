//! A single constraint and the operators derived from its kind's equations.
//!
//! A [`Constraint`] is built in two phases. While it is being assembled its
//! constrained bodies, mobilizers and default equation counts may change.
//! Realizing the topology freezes that structure and computes the subtree
//! and the kind's derived constants; realizing the model fixes the equation
//! counts and the slots they occupy in the mechanism-wide arrays. Every
//! evaluation after that is a pure function of the state passed in.
//!
//! Constraints are created and mutated only through
//! [`ConstraintSet`](crate::ConstraintSet); this type exposes read-only
//! queries and evaluation.

use sim_types::{BodyId, Stage};

use crate::error::{require_stage, ConstraintError, Result};
use crate::index::{
    ConstrainedBodyIndex, ConstrainedMobilizerIndex, ConstrainedQIndex, ConstrainedUIndex,
    ConstraintEquationSet, ConstraintId, EquationCategory, EquationCounts, EquationSlots,
    TopologicalIndexMap,
};
use crate::kinds::ConstraintKind;
use crate::kinematics::{ConstraintForces, ConstraintKinematics};
use crate::state::{KinematicTree, MatterState, Subtree};
use crate::topology::{RealizedTopology, TopologyCache};

/// The error routines of [`ConstraintEquations`](crate::ConstraintEquations).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorLevel {
    Position,
    PositionDot,
    PositionDotDot,
    Velocity,
    VelocityDot,
    Acceleration,
}

impl ErrorLevel {
    const fn category(self) -> EquationCategory {
        match self {
            Self::Position | Self::PositionDot | Self::PositionDotDot => {
                EquationCategory::Holonomic
            }
            Self::Velocity | Self::VelocityDot => EquationCategory::Nonholonomic,
            Self::Acceleration => EquationCategory::AccelerationOnly,
        }
    }

    const fn stage(self) -> Stage {
        match self {
            Self::Position => Stage::Position,
            Self::PositionDot | Self::Velocity => Stage::Velocity,
            Self::PositionDotDot | Self::VelocityDot | Self::Acceleration => Stage::Acceleration,
        }
    }

    const fn buffer(self) -> &'static str {
        match self {
            Self::Position => "perr",
            Self::PositionDot => "pverr",
            Self::PositionDotDot => "paerr",
            Self::Velocity => "verr",
            Self::VelocityDot => "vaerr",
            Self::Acceleration => "aerr",
        }
    }
}

/// One constraint of a mechanism.
#[derive(Debug)]
pub struct Constraint {
    id: ConstraintId,
    kind: ConstraintKind,
    index_map: TopologicalIndexMap,
    default_counts: EquationCounts,
    topology: Option<RealizedTopology>,
    model: Option<ConstraintEquationSet>,
}

impl Constraint {
    /// Register the kind's bodies and mobilizers in local index order.
    pub(crate) fn new(id: ConstraintId, kind: ConstraintKind) -> Result<Self> {
        let mut index_map = TopologicalIndexMap::new();
        let equations = kind.equations();
        for body in equations.constrained_bodies() {
            index_map.add_constrained_body(body)?;
        }
        for body in equations.constrained_mobilizers() {
            index_map.add_constrained_mobilizer(body)?;
        }
        let default_counts = equations.default_counts();
        Ok(Self {
            id,
            kind,
            index_map,
            default_counts,
            topology: None,
            model: None,
        })
    }

    // ========================================================================
    // Assembly (crate-private)
    // ========================================================================

    pub(crate) fn add_constrained_body(&mut self, body: BodyId) -> Result<ConstrainedBodyIndex> {
        if self.topology.is_some() {
            return Err(ConstraintError::topology_frozen("add constrained body"));
        }
        self.index_map.add_constrained_body(body)
    }

    pub(crate) fn add_constrained_mobilizer(
        &mut self,
        body: BodyId,
    ) -> Result<ConstrainedMobilizerIndex> {
        if self.topology.is_some() {
            return Err(ConstraintError::topology_frozen("add constrained mobilizer"));
        }
        self.index_map.add_constrained_mobilizer(body)
    }

    pub(crate) fn set_default_num_constraints(&mut self, counts: EquationCounts) {
        self.invalidate_topology();
        self.default_counts = counts;
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ConstraintKind {
        self.invalidate_topology();
        &mut self.kind
    }

    /// Drop the realized topology and everything derived from it.
    pub(crate) fn invalidate_topology(&mut self) {
        if self.topology.take().is_some() {
            tracing::warn!(
                constraint = %self.id,
                kind = self.kind.name(),
                "constraint topology invalidated"
            );
        }
        self.model = None;
    }

    pub(crate) fn invalidate_model(&mut self) {
        self.model = None;
    }

    /// Compute the subtree and the kind's derived constants. A no-op when
    /// the topology is already realized.
    pub(crate) fn realize_topology(&mut self, tree: &dyn KinematicTree) -> Result<()> {
        if self.topology.is_some() {
            return Ok(());
        }
        if let Some(&body) = self
            .index_map
            .constrained_mobilizers()
            .iter()
            .find(|&&b| !tree.contains(b))
        {
            return Err(ConstraintError::BodyNotInTree(body));
        }
        let subtree = tree.calc_subtree(self.index_map.constrained_bodies())?;
        let cache = self.kind.equations().topology_cache();
        tracing::debug!(
            constraint = %self.id,
            kind = self.kind.name(),
            ancestor = %subtree.ancestor(),
            bodies = self.index_map.num_constrained_bodies(),
            mobilizers = self.index_map.num_constrained_mobilizers(),
            "constraint topology realized"
        );
        self.topology = Some(RealizedTopology { subtree, cache });
        Ok(())
    }

    pub(crate) fn realize_model(
        &mut self,
        state: &dyn MatterState,
        counts: EquationCounts,
        slots: EquationSlots,
        totals: EquationCounts,
    ) -> Result<()> {
        self.realized_topology()?;
        let layouts = self
            .index_map
            .constrained_mobilizers()
            .iter()
            .map(|&body| {
                state
                    .mobilizer_layout(body)
                    .ok_or(ConstraintError::BodyNotInTree(body))
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(
            constraint = %self.id,
            kind = self.kind.name(),
            mp = counts.mp,
            mv = counts.mv,
            ma = counts.ma,
            holo0 = ?slots.holo0,
            nonholo0 = ?slots.nonholo0,
            acc_only0 = ?slots.acc_only0,
            "constraint model realized"
        );
        self.model = Some(ConstraintEquationSet::new(counts, slots, totals, &layouts));
        Ok(())
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Identifier within the owning set.
    #[must_use]
    pub fn id(&self) -> ConstraintId {
        self.id
    }

    /// The constraint's kind.
    #[must_use]
    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// Equation counts used unless the kind overrides them at model stage.
    #[must_use]
    pub fn default_counts(&self) -> EquationCounts {
        self.default_counts
    }

    /// Local/global numbering of the constrained bodies and mobilizers.
    #[must_use]
    pub fn index_map(&self) -> &TopologicalIndexMap {
        &self.index_map
    }

    /// Whether the topology has been realized since the last invalidation.
    #[must_use]
    pub fn is_topology_realized(&self) -> bool {
        self.topology.is_some()
    }

    /// Whether the model stage has been realized since the last invalidation.
    #[must_use]
    pub fn is_model_realized(&self) -> bool {
        self.model.is_some()
    }

    fn realized_topology(&self) -> Result<&RealizedTopology> {
        self.topology
            .as_ref()
            .ok_or(ConstraintError::TopologyNotRealized)
    }

    /// Number of constrained bodies.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::TopologyNotRealized`] before topology realization.
    pub fn num_constrained_bodies(&self) -> Result<usize> {
        self.realized_topology()?;
        Ok(self.index_map.num_constrained_bodies())
    }

    /// Number of constrained mobilizers.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::TopologyNotRealized`] before topology realization.
    pub fn num_constrained_mobilizers(&self) -> Result<usize> {
        self.realized_topology()?;
        Ok(self.index_map.num_constrained_mobilizers())
    }

    /// Outermost common ancestor of the constrained bodies.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::TopologyNotRealized`] before topology realization.
    pub fn ancestor_body(&self) -> Result<BodyId> {
        Ok(self.realized_topology()?.subtree.ancestor())
    }

    /// Bodies kinematically involved in the constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::TopologyNotRealized`] before topology realization.
    pub fn subtree(&self) -> Result<&Subtree> {
        Ok(&self.realized_topology()?.subtree)
    }

    /// The kind's derived constants.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::TopologyNotRealized`] before topology realization.
    pub fn topology_cache(&self) -> Result<&TopologyCache> {
        Ok(&self.realized_topology()?.cache)
    }

    // ========================================================================
    // Model stage
    // ========================================================================

    /// Equation counts this constraint will generate for `state`.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::TopologyNotRealized`] before topology realization.
    pub fn calc_num_constraint_equations(&self, state: &dyn MatterState) -> Result<EquationCounts> {
        self.realized_topology()?;
        Ok(self.kind.equations().num_equations(state, self.default_counts))
    }

    /// Counts, slots and mobilizer coordinates fixed at model stage.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::ModelNotRealized`] before model realization.
    pub fn equation_set(&self) -> Result<&ConstraintEquationSet> {
        self.model.as_ref().ok_or(ConstraintError::ModelNotRealized)
    }

    /// Equation counts in force.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::ModelNotRealized`] before model realization.
    pub fn num_constraint_equations(&self) -> Result<EquationCounts> {
        Ok(self.equation_set()?.counts())
    }

    /// First slot of each equation family.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::ModelNotRealized`] before model realization.
    pub fn constraint_equation_slots(&self) -> Result<EquationSlots> {
        Ok(self.equation_set()?.slots())
    }

    /// Total generalized coordinates of the constrained mobilizers.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::ModelNotRealized`] before model realization.
    pub fn num_constrained_q(&self) -> Result<usize> {
        Ok(self.equation_set()?.num_constrained_q())
    }

    /// Total mobilities of the constrained mobilizers.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::ModelNotRealized`] before model realization.
    pub fn num_constrained_u(&self) -> Result<usize> {
        Ok(self.equation_set()?.num_constrained_u())
    }

    /// Generalized coordinates of one constrained mobilizer.
    ///
    /// # Errors
    ///
    /// Fails before model realization or for an unknown mobilizer.
    pub fn num_constrained_q_of(&self, m: ConstrainedMobilizerIndex) -> Result<usize> {
        Ok(self.equation_set()?.mobilizer(m)?.layout.nq)
    }

    /// Mobilities of one constrained mobilizer.
    ///
    /// # Errors
    ///
    /// Fails before model realization or for an unknown mobilizer.
    pub fn num_constrained_u_of(&self, m: ConstrainedMobilizerIndex) -> Result<usize> {
        Ok(self.equation_set()?.mobilizer(m)?.layout.nu)
    }

    /// Constraint-local index of coordinate `which` of mobilizer `m`.
    ///
    /// # Errors
    ///
    /// Fails before model realization or for out-of-range indices.
    pub fn constrained_q_index(
        &self,
        m: ConstrainedMobilizerIndex,
        which: usize,
    ) -> Result<ConstrainedQIndex> {
        self.equation_set()?.constrained_q_index(m, which)
    }

    /// Constraint-local index of mobility `which` of mobilizer `m`.
    ///
    /// # Errors
    ///
    /// Fails before model realization or for out-of-range indices.
    pub fn constrained_u_index(
        &self,
        m: ConstrainedMobilizerIndex,
        which: usize,
    ) -> Result<ConstrainedUIndex> {
        self.equation_set()?.constrained_u_index(m, which)
    }

    /// Mechanism-wide q index of a constrained coordinate.
    ///
    /// # Errors
    ///
    /// Fails before model realization or for an unknown coordinate.
    pub fn q_index_of_constrained_q(&self, cq: ConstrainedQIndex) -> Result<usize> {
        self.equation_set()?.q_index_of_constrained_q(cq)
    }

    /// Mechanism-wide u index of a constrained mobility.
    ///
    /// # Errors
    ///
    /// Fails before model realization or for an unknown mobility.
    pub fn u_index_of_constrained_u(&self, cu: ConstrainedUIndex) -> Result<usize> {
        self.equation_set()?.u_index_of_constrained_u(cu)
    }

    /// This constraint's view of `state`.
    ///
    /// # Errors
    ///
    /// Fails unless both topology and model are realized.
    pub fn kinematics<'a>(&'a self, state: &'a dyn MatterState) -> Result<ConstraintKinematics<'a>> {
        let topology = self.realized_topology()?;
        let model = self.equation_set()?;
        Ok(ConstraintKinematics::new(
            state,
            self.index_map.constrained_bodies(),
            topology.subtree.ancestor(),
            model,
            &topology.cache,
        ))
    }

    // ========================================================================
    // Error evaluation
    // ========================================================================

    fn evaluate(
        &self,
        level: ErrorLevel,
        state: &dyn MatterState,
        count: usize,
        out: &mut [f64],
    ) -> Result<()> {
        let category = level.category();
        let actual = self.equation_set()?.counts().get(category);
        if count != actual {
            return Err(ConstraintError::count_mismatch(category, count, actual));
        }
        if out.len() != count {
            return Err(ConstraintError::buffer_size(level.buffer(), count, out.len()));
        }
        if count == 0 {
            return Ok(());
        }
        require_stage(state.stage(), level.stage())?;
        tracing::trace!(
            constraint = %self.id,
            kind = self.kind.name(),
            errors = level.buffer(),
            count,
            "evaluating constraint errors"
        );
        let k = self.kinematics(state)?;
        let equations = self.kind.equations();
        match level {
            ErrorLevel::Position => equations.position_errors(&k, out),
            ErrorLevel::PositionDot => equations.position_dot_errors(&k, out),
            ErrorLevel::PositionDotDot => equations.position_dot_dot_errors(&k, out),
            ErrorLevel::Velocity => equations.velocity_errors(&k, out),
            ErrorLevel::VelocityDot => equations.velocity_dot_errors(&k, out),
            ErrorLevel::Acceleration => equations.acceleration_errors(&k, out),
        }
    }

    /// Holonomic errors `perr` into `out`.
    ///
    /// # Errors
    ///
    /// Fails if `mp` disagrees with the constraint, `out` is not `mp` long,
    /// or `state` is below [`Stage::Position`].
    pub fn calc_position_errors(
        &self,
        state: &dyn MatterState,
        mp: usize,
        out: &mut [f64],
    ) -> Result<()> {
        self.evaluate(ErrorLevel::Position, state, mp, out)
    }

    /// First derivative of the holonomic errors, `pverr`.
    ///
    /// # Errors
    ///
    /// As [`Self::calc_position_errors`], at [`Stage::Velocity`].
    pub fn calc_position_dot_errors(
        &self,
        state: &dyn MatterState,
        mp: usize,
        out: &mut [f64],
    ) -> Result<()> {
        self.evaluate(ErrorLevel::PositionDot, state, mp, out)
    }

    /// Second derivative of the holonomic errors, `paerr`.
    ///
    /// # Errors
    ///
    /// As [`Self::calc_position_errors`], at [`Stage::Acceleration`].
    pub fn calc_position_dot_dot_errors(
        &self,
        state: &dyn MatterState,
        mp: usize,
        out: &mut [f64],
    ) -> Result<()> {
        self.evaluate(ErrorLevel::PositionDotDot, state, mp, out)
    }

    /// Nonholonomic errors `verr`.
    ///
    /// # Errors
    ///
    /// Fails if `mv` disagrees with the constraint, `out` is not `mv` long,
    /// or `state` is below [`Stage::Velocity`].
    pub fn calc_velocity_errors(
        &self,
        state: &dyn MatterState,
        mv: usize,
        out: &mut [f64],
    ) -> Result<()> {
        self.evaluate(ErrorLevel::Velocity, state, mv, out)
    }

    /// First derivative of the nonholonomic errors, `vaerr`.
    ///
    /// # Errors
    ///
    /// As [`Self::calc_velocity_errors`], at [`Stage::Acceleration`].
    pub fn calc_velocity_dot_errors(
        &self,
        state: &dyn MatterState,
        mv: usize,
        out: &mut [f64],
    ) -> Result<()> {
        self.evaluate(ErrorLevel::VelocityDot, state, mv, out)
    }

    /// Acceleration-only errors `aerr`.
    ///
    /// # Errors
    ///
    /// Fails if `ma` disagrees with the constraint, `out` is not `ma` long,
    /// or `state` is below [`Stage::Acceleration`].
    pub fn calc_acceleration_errors(
        &self,
        state: &dyn MatterState,
        ma: usize,
        out: &mut [f64],
    ) -> Result<()> {
        self.evaluate(ErrorLevel::Acceleration, state, ma, out)
    }

    // ========================================================================
    // Reading the solver-owned arrays
    // ========================================================================

    /// Copy this constraint's entries of `source` (laid out
    /// `[holonomic | nonholonomic | acceleration-only]`) for the first
    /// `families` families into `out`.
    fn gather(
        &self,
        source: &[f64],
        name: &'static str,
        families: usize,
        expected: usize,
        out: &mut [f64],
    ) -> Result<()> {
        let model = self.equation_set()?;
        let counts = model.counts();
        let blocks = [
            (EquationCategory::Holonomic, counts.mp, model.holonomic_offset()),
            (EquationCategory::Nonholonomic, counts.mv, model.nonholonomic_offset()),
            (
                EquationCategory::AccelerationOnly,
                counts.ma,
                model.acceleration_only_offset(),
            ),
        ];
        let blocks = &blocks[..families];
        let actual: usize = blocks.iter().map(|&(_, count, _)| count).sum();
        if expected != actual {
            // Reported against the outermost family the count covers.
            let category = blocks
                .last()
                .map_or(EquationCategory::Holonomic, |&(category, _, _)| category);
            return Err(ConstraintError::count_mismatch(category, expected, actual));
        }
        if out.len() != expected {
            return Err(ConstraintError::buffer_size(name, expected, out.len()));
        }
        let mut at = 0;
        for &(_, count, offset) in blocks {
            let Some(start) = offset else { continue };
            let src = source
                .get(start..start + count)
                .ok_or_else(|| ConstraintError::buffer_size(name, start + count, source.len()))?;
            out[at..at + count].copy_from_slice(src);
            at += count;
        }
        Ok(())
    }

    /// Copy this constraint's `mp` position errors out of the state's `qerr`.
    ///
    /// # Errors
    ///
    /// Fails if `mp` disagrees with the constraint, before
    /// [`Stage::Position`], or if the array is too short.
    pub fn position_errors(&self, state: &dyn MatterState, mp: usize, out: &mut [f64]) -> Result<()> {
        require_stage(state.stage(), Stage::Position)?;
        self.gather(state.qerr(), "qerr", 1, mp, out)
    }

    /// Copy this constraint's `mp + mv` velocity errors out of `uerr`.
    ///
    /// # Errors
    ///
    /// Fails if the count disagrees with the constraint, before
    /// [`Stage::Velocity`], or if the array is too short.
    pub fn velocity_errors(
        &self,
        state: &dyn MatterState,
        mpv: usize,
        out: &mut [f64],
    ) -> Result<()> {
        require_stage(state.stage(), Stage::Velocity)?;
        self.gather(state.uerr(), "uerr", 2, mpv, out)
    }

    /// Copy this constraint's `mp + mv + ma` acceleration errors out of `udoterr`.
    ///
    /// # Errors
    ///
    /// Fails if the count disagrees with the constraint, before
    /// [`Stage::Acceleration`], or if the array is too short.
    pub fn acceleration_errors(
        &self,
        state: &dyn MatterState,
        mpva: usize,
        out: &mut [f64],
    ) -> Result<()> {
        require_stage(state.stage(), Stage::Acceleration)?;
        self.gather(state.udoterr(), "udoterr", 3, mpva, out)
    }

    /// Copy this constraint's `mp + mv + ma` multipliers out of the state.
    ///
    /// # Errors
    ///
    /// Fails if the count disagrees with the constraint, before
    /// [`Stage::Acceleration`], or if the array is too short.
    pub fn multipliers(&self, state: &dyn MatterState, mpva: usize, out: &mut [f64]) -> Result<()> {
        require_stage(state.stage(), Stage::Acceleration)?;
        self.gather(state.multipliers(), "multipliers", 3, mpva, out)
    }

    // ========================================================================
    // Forces
    // ========================================================================

    fn apply(
        &self,
        category: EquationCategory,
        state: &dyn MatterState,
        count: usize,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        let model = self.equation_set()?;
        let actual = model.counts().get(category);
        if count != actual {
            return Err(ConstraintError::count_mismatch(category, count, actual));
        }
        if lambda.len() != count {
            return Err(ConstraintError::buffer_size("multipliers", count, lambda.len()));
        }
        let num_bodies = self.index_map.num_constrained_bodies();
        if forces.body_forces.len() != num_bodies {
            return Err(ConstraintError::buffer_size(
                "body forces",
                num_bodies,
                forces.body_forces.len(),
            ));
        }
        if forces.mobility_forces.len() != model.num_constrained_u() {
            return Err(ConstraintError::buffer_size(
                "mobility forces",
                model.num_constrained_u(),
                forces.mobility_forces.len(),
            ));
        }
        if count == 0 {
            return Ok(());
        }
        require_stage(state.stage(), Stage::Position)?;
        let k = self.kinematics(state)?;
        let equations = self.kind.equations();
        match category {
            EquationCategory::Holonomic => equations.apply_position_forces(&k, lambda, forces),
            EquationCategory::Nonholonomic => equations.apply_velocity_forces(&k, lambda, forces),
            EquationCategory::AccelerationOnly => {
                equations.apply_acceleration_forces(&k, lambda, forces)
            }
        }
    }

    /// Add the forces of `mp` holonomic multipliers into `forces`.
    ///
    /// # Errors
    ///
    /// Fails on a count or buffer mismatch, or before [`Stage::Position`].
    pub fn apply_position_constraint_forces(
        &self,
        state: &dyn MatterState,
        mp: usize,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        self.apply(EquationCategory::Holonomic, state, mp, lambda, forces)
    }

    /// Add the forces of `mv` nonholonomic multipliers into `forces`.
    ///
    /// # Errors
    ///
    /// Fails on a count or buffer mismatch, or before [`Stage::Position`].
    pub fn apply_velocity_constraint_forces(
        &self,
        state: &dyn MatterState,
        mv: usize,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        self.apply(EquationCategory::Nonholonomic, state, mv, lambda, forces)
    }

    /// Add the forces of `ma` acceleration-only multipliers into `forces`.
    ///
    /// # Errors
    ///
    /// Fails on a count or buffer mismatch, or before [`Stage::Position`].
    pub fn apply_acceleration_constraint_forces(
        &self,
        state: &dyn MatterState,
        ma: usize,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        self.apply(EquationCategory::AccelerationOnly, state, ma, lambda, forces)
    }

    /// Body and mobility forces produced by a full multiplier vector laid
    /// out `[holonomic | nonholonomic | acceleration-only]`.
    ///
    /// # Errors
    ///
    /// Fails if any count disagrees with the constraint or `lambda` is not
    /// `mp + mv + ma` long.
    pub fn calc_constraint_forces_from_multipliers(
        &self,
        state: &dyn MatterState,
        mp: usize,
        mv: usize,
        ma: usize,
        lambda: &[f64],
    ) -> Result<ConstraintForces> {
        let model = self.equation_set()?;
        let counts = model.counts();
        for (category, given) in [
            (EquationCategory::Holonomic, mp),
            (EquationCategory::Nonholonomic, mv),
            (EquationCategory::AccelerationOnly, ma),
        ] {
            if given != counts.get(category) {
                return Err(ConstraintError::count_mismatch(
                    category,
                    given,
                    counts.get(category),
                ));
            }
        }
        if lambda.len() != mp + mv + ma {
            return Err(ConstraintError::buffer_size(
                "multipliers",
                mp + mv + ma,
                lambda.len(),
            ));
        }

        let mut forces = ConstraintForces::zeros(
            self.index_map.num_constrained_bodies(),
            model.num_constrained_u(),
        );
        let (holonomic, rest) = lambda.split_at(mp);
        let (nonholonomic, acceleration_only) = rest.split_at(mv);
        self.apply_position_constraint_forces(state, mp, holonomic, &mut forces)?;
        self.apply_velocity_constraint_forces(state, mv, nonholonomic, &mut forces)?;
        self.apply_acceleration_constraint_forces(state, ma, acceleration_only, &mut forces)?;
        Ok(forces)
    }

    /// Project body and mobility forces onto the mechanism's generalized
    /// forces.
    ///
    /// # Errors
    ///
    /// Always returns [`ConstraintError::Unimplemented`]: the projection
    /// needs the mechanism's mobility Jacobian, which is not exposed here.
    pub fn convert_constraint_forces_to_generalized_forces(
        &self,
        _state: &dyn MatterState,
        _forces: &ConstraintForces,
    ) -> Result<Vec<f64>> {
        Err(ConstraintError::unimplemented(
            "conversion of constraint forces to generalized forces",
        ))
    }

    /// `Gᵀλ`: generalized forces produced by a multiplier vector.
    ///
    /// # Errors
    ///
    /// Fails as [`Self::calc_constraint_forces_from_multipliers`], then as
    /// [`Self::convert_constraint_forces_to_generalized_forces`].
    pub fn calc_g_transpose_lambda(
        &self,
        state: &dyn MatterState,
        mp: usize,
        mv: usize,
        ma: usize,
        lambda: &[f64],
    ) -> Result<Vec<f64>> {
        let forces = self.calc_constraint_forces_from_multipliers(state, mp, mv, ma, lambda)?;
        self.convert_constraint_forces_to_generalized_forces(state, &forces)
    }
}
