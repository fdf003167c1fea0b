//! Local numbering of a constraint's bodies and mobilizers, and the global
//! equation slots it occupies.
//!
//! A constraint refers to the bodies it touches through dense local indices
//! assigned in the order the bodies were added. [`TopologicalIndexMap`]
//! keeps both directions of that mapping: an ordered map for the
//! `O(log k)` global-to-local lookup and a dense sequence for the `O(1)`
//! local-to-global lookup. [`ConstraintEquationSet`] records, once the
//! model stage is realized, how many equations of each family the
//! constraint generates and where they live in the mechanism-wide arrays.

use std::collections::BTreeMap;

use sim_types::BodyId;
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ConstraintError, Result};
use crate::state::MobilizerLayout;

macro_rules! local_index {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name(pub usize);

        impl $name {
            /// Create a new index.
            #[must_use]
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            /// Get the raw index value.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                Self(index)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

local_index!(
    /// Identifier of a constraint within a [`ConstraintSet`](crate::ConstraintSet).
    ConstraintId,
    "Constraint"
);
local_index!(
    /// Constraint-local index of a constrained body.
    ConstrainedBodyIndex,
    "ConstrainedBody"
);
local_index!(
    /// Constraint-local index of a constrained mobilizer.
    ConstrainedMobilizerIndex,
    "ConstrainedMobilizer"
);
local_index!(
    /// Constraint-local index of a generalized coordinate belonging to one
    /// of the constrained mobilizers.
    ConstrainedQIndex,
    "ConstrainedQ"
);
local_index!(
    /// Constraint-local index of a generalized speed belonging to one of the
    /// constrained mobilizers.
    ConstrainedUIndex,
    "ConstrainedU"
);

/// Family of constraint equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EquationCategory {
    /// Position-level equations (`mp`).
    Holonomic,
    /// Velocity-level equations with no position counterpart (`mv`).
    Nonholonomic,
    /// Equations introduced only at the acceleration level (`ma`).
    AccelerationOnly,
}

impl std::fmt::Display for EquationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Holonomic => "holonomic",
            Self::Nonholonomic => "nonholonomic",
            Self::AccelerationOnly => "acceleration-only",
        })
    }
}

/// Number of holonomic, nonholonomic and acceleration-only equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EquationCounts {
    /// Holonomic (position-level) equations.
    pub mp: usize,
    /// Nonholonomic (velocity-level) equations.
    pub mv: usize,
    /// Acceleration-only equations.
    pub ma: usize,
}

impl EquationCounts {
    /// Create a new count triple.
    #[must_use]
    pub const fn new(mp: usize, mv: usize, ma: usize) -> Self {
        Self { mp, mv, ma }
    }

    /// Only holonomic equations.
    #[must_use]
    pub const fn holonomic(mp: usize) -> Self {
        Self::new(mp, 0, 0)
    }

    /// Only nonholonomic equations.
    #[must_use]
    pub const fn nonholonomic(mv: usize) -> Self {
        Self::new(0, mv, 0)
    }

    /// Count for one category.
    #[must_use]
    pub const fn get(&self, category: EquationCategory) -> usize {
        match category {
            EquationCategory::Holonomic => self.mp,
            EquationCategory::Nonholonomic => self.mv,
            EquationCategory::AccelerationOnly => self.ma,
        }
    }

    /// `mp + mv`, the number of velocity-level equations.
    #[must_use]
    pub const fn velocity_level(&self) -> usize {
        self.mp + self.mv
    }

    /// `mp + mv + ma`, the number of acceleration-level equations and multipliers.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.mp + self.mv + self.ma
    }
}

impl std::ops::Add for EquationCounts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.mp + rhs.mp, self.mv + rhs.mv, self.ma + rhs.ma)
    }
}

impl std::ops::AddAssign for EquationCounts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// First slot of each equation family within that family's block of the
/// mechanism-wide arrays. `None` when the constraint has no equations of
/// that family.
///
/// The blocks are laid out as `[holonomic | nonholonomic | acceleration-only]`,
/// so the absolute offsets are `holo0`, `total_mp + nonholo0` and
/// `total_mp + total_mv + acc_only0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EquationSlots {
    /// First holonomic slot.
    pub holo0: Option<usize>,
    /// First nonholonomic slot, relative to the start of the nonholonomic block.
    pub nonholo0: Option<usize>,
    /// First acceleration-only slot, relative to the start of its block.
    pub acc_only0: Option<usize>,
}

impl EquationSlots {
    /// Slots for a constraint with `counts` equations starting at the
    /// running per-family offsets `next`.
    #[must_use]
    pub fn assign(counts: EquationCounts, next: EquationCounts) -> Self {
        let slot = |count: usize, at: usize| (count > 0).then_some(at);
        Self {
            holo0: slot(counts.mp, next.mp),
            nonholo0: slot(counts.mv, next.mv),
            acc_only0: slot(counts.ma, next.ma),
        }
    }
}

/// Bidirectional map between a constraint's local body/mobilizer numbering
/// and simulation-wide body ids.
#[derive(Debug, Clone, Default)]
pub struct TopologicalIndexMap {
    body_to_constrained_body: BTreeMap<BodyId, ConstrainedBodyIndex>,
    constrained_bodies: SmallVec<[BodyId; 4]>,
    mobilizer_to_constrained_mobilizer: BTreeMap<BodyId, ConstrainedMobilizerIndex>,
    constrained_mobilizers: SmallVec<[BodyId; 2]>,
}

impl TopologicalIndexMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a constrained body, returning its local index.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::DuplicateConstrainedBody`] if the body is
    /// already present.
    pub fn add_constrained_body(&mut self, body: BodyId) -> Result<ConstrainedBodyIndex> {
        if self.body_to_constrained_body.contains_key(&body) {
            return Err(ConstraintError::DuplicateConstrainedBody(body));
        }
        let local = ConstrainedBodyIndex(self.constrained_bodies.len());
        self.constrained_bodies.push(body);
        self.body_to_constrained_body.insert(body, local);
        Ok(local)
    }

    /// Append a constrained mobilizer (named by its body), returning its local index.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::DuplicateConstrainedMobilizer`] if the
    /// mobilizer is already present.
    pub fn add_constrained_mobilizer(&mut self, body: BodyId) -> Result<ConstrainedMobilizerIndex> {
        if self.mobilizer_to_constrained_mobilizer.contains_key(&body) {
            return Err(ConstraintError::DuplicateConstrainedMobilizer(body));
        }
        let local = ConstrainedMobilizerIndex(self.constrained_mobilizers.len());
        self.constrained_mobilizers.push(body);
        self.mobilizer_to_constrained_mobilizer.insert(body, local);
        Ok(local)
    }

    /// Number of constrained bodies.
    #[must_use]
    pub fn num_constrained_bodies(&self) -> usize {
        self.constrained_bodies.len()
    }

    /// Number of constrained mobilizers.
    #[must_use]
    pub fn num_constrained_mobilizers(&self) -> usize {
        self.constrained_mobilizers.len()
    }

    /// Global ids of the constrained bodies, in local order.
    #[must_use]
    pub fn constrained_bodies(&self) -> &[BodyId] {
        &self.constrained_bodies
    }

    /// Global ids of the constrained mobilizers, in local order.
    #[must_use]
    pub fn constrained_mobilizers(&self) -> &[BodyId] {
        &self.constrained_mobilizers
    }

    /// Global body of a constrained body.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::ConstrainedBodyOutOfRange`] for an unknown index.
    pub fn body_of(&self, local: ConstrainedBodyIndex) -> Result<BodyId> {
        self.constrained_bodies.get(local.0).copied().ok_or(
            ConstraintError::ConstrainedBodyOutOfRange {
                index: local.0,
                count: self.constrained_bodies.len(),
            },
        )
    }

    /// Local index of a global body.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::BodyNotConstrained`] if the body is not part
    /// of this constraint.
    pub fn constrained_body_of(&self, body: BodyId) -> Result<ConstrainedBodyIndex> {
        self.body_to_constrained_body
            .get(&body)
            .copied()
            .ok_or(ConstraintError::BodyNotConstrained(body))
    }

    /// Global body whose mobilizer is the given constrained mobilizer.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::ConstrainedMobilizerOutOfRange`] for an unknown index.
    pub fn mobilizer_of(&self, local: ConstrainedMobilizerIndex) -> Result<BodyId> {
        self.constrained_mobilizers.get(local.0).copied().ok_or(
            ConstraintError::ConstrainedMobilizerOutOfRange {
                index: local.0,
                count: self.constrained_mobilizers.len(),
            },
        )
    }

    /// Local index of a global body's mobilizer.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::MobilizerNotConstrained`] if the mobilizer
    /// is not part of this constraint.
    pub fn constrained_mobilizer_of(&self, body: BodyId) -> Result<ConstrainedMobilizerIndex> {
        self.mobilizer_to_constrained_mobilizer
            .get(&body)
            .copied()
            .ok_or(ConstraintError::MobilizerNotConstrained(body))
    }
}

/// Generalized coordinates and speeds of one constrained mobilizer, in both
/// the mechanism-wide and the constraint-local numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MobilizerCoordinates {
    /// Mechanism-wide layout of the mobilizer's q and u.
    pub layout: MobilizerLayout,
    /// First constrained q belonging to this mobilizer.
    pub first_q: ConstrainedQIndex,
    /// First constrained u belonging to this mobilizer.
    pub first_u: ConstrainedUIndex,
}

/// Model-stage data of one constraint: equation counts in force, the slots
/// assigned to them, and the coordinates of its constrained mobilizers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintEquationSet {
    counts: EquationCounts,
    slots: EquationSlots,
    totals: EquationCounts,
    mobilizers: SmallVec<[MobilizerCoordinates; 2]>,
    num_q: usize,
    num_u: usize,
}

impl ConstraintEquationSet {
    /// Build the equation set from the counts and slots assigned at model
    /// stage, the mechanism-wide totals, and the layouts of the constrained
    /// mobilizers in local order.
    #[must_use]
    pub fn new(
        counts: EquationCounts,
        slots: EquationSlots,
        totals: EquationCounts,
        layouts: &[MobilizerLayout],
    ) -> Self {
        let mut mobilizers = SmallVec::with_capacity(layouts.len());
        let (mut num_q, mut num_u) = (0, 0);
        for layout in layouts {
            mobilizers.push(MobilizerCoordinates {
                layout: *layout,
                first_q: ConstrainedQIndex(num_q),
                first_u: ConstrainedUIndex(num_u),
            });
            num_q += layout.nq;
            num_u += layout.nu;
        }
        Self {
            counts,
            slots,
            totals,
            mobilizers,
            num_q,
            num_u,
        }
    }

    /// Equation counts in force.
    #[must_use]
    pub fn counts(&self) -> EquationCounts {
        self.counts
    }

    /// Slots assigned to this constraint's equations.
    #[must_use]
    pub fn slots(&self) -> EquationSlots {
        self.slots
    }

    /// Mechanism-wide equation totals the slots were assigned against.
    #[must_use]
    pub fn totals(&self) -> EquationCounts {
        self.totals
    }

    /// Absolute offset of the holonomic block in an array laid out
    /// `[holonomic | nonholonomic | acceleration-only]`.
    #[must_use]
    pub fn holonomic_offset(&self) -> Option<usize> {
        self.slots.holo0
    }

    /// Absolute offset of the nonholonomic block.
    #[must_use]
    pub fn nonholonomic_offset(&self) -> Option<usize> {
        self.slots.nonholo0.map(|s| self.totals.mp + s)
    }

    /// Absolute offset of the acceleration-only block.
    #[must_use]
    pub fn acceleration_only_offset(&self) -> Option<usize> {
        self.slots
            .acc_only0
            .map(|s| self.totals.mp + self.totals.mv + s)
    }

    /// Coordinates of every constrained mobilizer, in local order.
    #[must_use]
    pub fn mobilizers(&self) -> &[MobilizerCoordinates] {
        &self.mobilizers
    }

    /// Coordinates of one constrained mobilizer.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::ConstrainedMobilizerOutOfRange`] for an unknown index.
    pub fn mobilizer(&self, m: ConstrainedMobilizerIndex) -> Result<&MobilizerCoordinates> {
        self.mobilizers
            .get(m.0)
            .ok_or(ConstraintError::ConstrainedMobilizerOutOfRange {
                index: m.0,
                count: self.mobilizers.len(),
            })
    }

    /// Total constrained generalized coordinates.
    #[must_use]
    pub fn num_constrained_q(&self) -> usize {
        self.num_q
    }

    /// Total constrained generalized speeds (mobilities).
    #[must_use]
    pub fn num_constrained_u(&self) -> usize {
        self.num_u
    }

    /// Constraint-local index of coordinate `which` of mobilizer `m`.
    ///
    /// # Errors
    ///
    /// Fails if `m` or `which` is out of range.
    pub fn constrained_q_index(
        &self,
        m: ConstrainedMobilizerIndex,
        which: usize,
    ) -> Result<ConstrainedQIndex> {
        let mob = self.mobilizer(m)?;
        if which >= mob.layout.nq {
            return Err(ConstraintError::CoordinateOutOfRange {
                index: which,
                count: mob.layout.nq,
            });
        }
        Ok(ConstrainedQIndex(mob.first_q.0 + which))
    }

    /// Constraint-local index of mobility `which` of mobilizer `m`.
    ///
    /// # Errors
    ///
    /// Fails if `m` or `which` is out of range.
    pub fn constrained_u_index(
        &self,
        m: ConstrainedMobilizerIndex,
        which: usize,
    ) -> Result<ConstrainedUIndex> {
        let mob = self.mobilizer(m)?;
        if which >= mob.layout.nu {
            return Err(ConstraintError::MobilityOutOfRange {
                index: which,
                count: mob.layout.nu,
            });
        }
        Ok(ConstrainedUIndex(mob.first_u.0 + which))
    }

    /// Mechanism-wide q index of a constrained q.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::CoordinateOutOfRange`] if `cq` is not a
    /// constrained coordinate of this constraint.
    pub fn q_index_of_constrained_q(&self, cq: ConstrainedQIndex) -> Result<usize> {
        self.mobilizers
            .iter()
            .find(|m| cq.0 >= m.first_q.0 && cq.0 < m.first_q.0 + m.layout.nq)
            .map(|m| m.layout.q_start + (cq.0 - m.first_q.0))
            .ok_or(ConstraintError::CoordinateOutOfRange {
                index: cq.0,
                count: self.num_q,
            })
    }

    /// Mechanism-wide u index of a constrained u.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::MobilityOutOfRange`] if `cu` is not a
    /// constrained mobility of this constraint.
    pub fn u_index_of_constrained_u(&self, cu: ConstrainedUIndex) -> Result<usize> {
        self.mobilizers
            .iter()
            .find(|m| cu.0 >= m.first_u.0 && cu.0 < m.first_u.0 + m.layout.nu)
            .map(|m| m.layout.u_start + (cu.0 - m.first_u.0))
            .ok_or(ConstraintError::MobilityOutOfRange {
                index: cu.0,
                count: self.num_u,
            })
    }
}
