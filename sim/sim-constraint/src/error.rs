//! Error types for constraint evaluation.
//!
//! Errors fall into three families:
//!
//! - **Configuration** errors reflect a defect in how a constraint or
//!   mechanism was assembled (mutating a frozen topology, an equation count
//!   that disagrees with the constraint, an index that does not belong to
//!   the constraint).
//! - **Precondition** errors mean a quantity was requested before the stage
//!   that produces it was realized.
//! - **Unimplemented** marks an operation that is deliberately not provided.
//!
//! None of them are recoverable at the call site; they are returned so the
//! caller can report them instead of computing wrong numbers.

use sim_types::{BodyId, Stage};

use crate::index::{ConstraintId, EquationCategory};

/// Errors that can occur while configuring or evaluating constraints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConstraintError {
    /// A structural mutation was attempted after topology realization.
    #[error("cannot {operation}: constraint topology has already been realized")]
    TopologyFrozen {
        /// The rejected operation.
        operation: &'static str,
    },

    /// A caller-declared equation count disagrees with the constraint.
    #[error("{category} equation count mismatch: expected {expected}, constraint has {actual}")]
    EquationCountMismatch {
        /// Which family of equations was miscounted.
        category: EquationCategory,
        /// Count passed by the caller.
        expected: usize,
        /// Count actually generated by the constraint.
        actual: usize,
    },

    /// The body is not one of this constraint's constrained bodies.
    #[error("{0} is not a constrained body of this constraint")]
    BodyNotConstrained(BodyId),

    /// The body's mobilizer is not one of this constraint's constrained mobilizers.
    #[error("mobilizer of {0} is not a constrained mobilizer of this constraint")]
    MobilizerNotConstrained(BodyId),

    /// The body does not exist in the kinematic tree or state.
    #[error("{0} is not part of the mechanism")]
    BodyNotInTree(BodyId),

    /// A constrained body index is past the end of the constrained-body list.
    #[error("constrained body index {index} out of range ({count} constrained bodies)")]
    ConstrainedBodyOutOfRange {
        /// Offending local index.
        index: usize,
        /// Number of constrained bodies.
        count: usize,
    },

    /// A constrained mobilizer index is past the end of the constrained-mobilizer list.
    #[error("constrained mobilizer index {index} out of range ({count} constrained mobilizers)")]
    ConstrainedMobilizerOutOfRange {
        /// Offending local index.
        index: usize,
        /// Number of constrained mobilizers.
        count: usize,
    },

    /// A mobility (generalized speed) index is out of range.
    #[error("mobility index {index} out of range ({count} mobilities)")]
    MobilityOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of mobilities available.
        count: usize,
    },

    /// A generalized coordinate index is out of range.
    #[error("coordinate index {index} out of range ({count} coordinates)")]
    CoordinateOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of coordinates available.
        count: usize,
    },

    /// A caller-supplied buffer has the wrong length.
    #[error("{buffer} buffer has length {actual}, expected {expected}")]
    BufferSizeMismatch {
        /// Name of the buffer.
        buffer: &'static str,
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// The body was already added to this constraint.
    #[error("{0} is already a constrained body of this constraint")]
    DuplicateConstrainedBody(BodyId),

    /// The mobilizer was already added to this constraint.
    #[error("mobilizer of {0} is already a constrained mobilizer of this constraint")]
    DuplicateConstrainedMobilizer(BodyId),

    /// A constraint was accessed as the wrong kind.
    #[error("constraint is a {actual}, not a {expected}")]
    KindMismatch {
        /// Requested kind.
        expected: &'static str,
        /// Actual kind.
        actual: &'static str,
    },

    /// No constraint with this id exists in the set.
    #[error("unknown {0}")]
    UnknownConstraint(ConstraintId),

    /// The state has not been realized far enough for the request.
    #[error("state must be realized to {required} stage, but is only at {realized}")]
    StageNotRealized {
        /// Stage the operation needs.
        required: Stage,
        /// Stage the state has reached.
        realized: Stage,
    },

    /// The constraint's topology has not been realized.
    #[error("constraint topology has not been realized")]
    TopologyNotRealized,

    /// The constraint's model stage (equation counts and slots) has not been realized.
    #[error("constraint model has not been realized")]
    ModelNotRealized,

    /// The operation is intentionally not provided.
    #[error("{operation} is not implemented")]
    Unimplemented {
        /// The unsupported operation.
        operation: &'static str,
    },
}

impl ConstraintError {
    /// Create a topology-frozen error.
    #[must_use]
    pub fn topology_frozen(operation: &'static str) -> Self {
        Self::TopologyFrozen { operation }
    }

    /// Create an equation count mismatch error.
    #[must_use]
    pub fn count_mismatch(category: EquationCategory, expected: usize, actual: usize) -> Self {
        Self::EquationCountMismatch {
            category,
            expected,
            actual,
        }
    }

    /// Create a buffer size mismatch error.
    #[must_use]
    pub fn buffer_size(buffer: &'static str, expected: usize, actual: usize) -> Self {
        Self::BufferSizeMismatch {
            buffer,
            expected,
            actual,
        }
    }

    /// Create a stage-not-realized error.
    #[must_use]
    pub fn stage_not_realized(required: Stage, realized: Stage) -> Self {
        Self::StageNotRealized { required, realized }
    }

    /// Create an unimplemented-operation error.
    #[must_use]
    pub fn unimplemented(operation: &'static str) -> Self {
        Self::Unimplemented { operation }
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::TopologyFrozen { .. }
                | Self::EquationCountMismatch { .. }
                | Self::BodyNotConstrained(_)
                | Self::MobilizerNotConstrained(_)
                | Self::BodyNotInTree(_)
                | Self::ConstrainedBodyOutOfRange { .. }
                | Self::ConstrainedMobilizerOutOfRange { .. }
                | Self::MobilityOutOfRange { .. }
                | Self::CoordinateOutOfRange { .. }
                | Self::BufferSizeMismatch { .. }
                | Self::DuplicateConstrainedBody(_)
                | Self::DuplicateConstrainedMobilizer(_)
                | Self::KindMismatch { .. }
                | Self::UnknownConstraint(_)
        )
    }

    /// Check if this is a precondition (stage ordering) error.
    #[must_use]
    pub fn is_precondition_error(&self) -> bool {
        matches!(
            self,
            Self::StageNotRealized { .. } | Self::TopologyNotRealized | Self::ModelNotRealized
        )
    }

    /// Check if this marks an unimplemented operation.
    #[must_use]
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented { .. })
    }
}

/// Fail with [`ConstraintError::StageNotRealized`] unless `realized >= required`.
pub(crate) fn require_stage(realized: Stage, required: Stage) -> Result<()> {
    if realized < required {
        return Err(ConstraintError::stage_not_realized(required, realized));
    }
    Ok(())
}

/// Result type for constraint operations.
pub type Result<T> = std::result::Result<T, ConstraintError>;
