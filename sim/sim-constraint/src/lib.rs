//! Constraint evaluation for multibody simulation.
//!
//! This crate turns geometric restrictions between the bodies of a
//! mechanism into constraint equations, evaluates their errors at the
//! position, velocity and acceleration levels, and maps Lagrange
//! multipliers back to the forces they produce. It does not solve for the
//! multipliers; a solver reads the errors this crate writes and hands the
//! multipliers back.
//!
//! # Constraint Kinds
//!
//! | Kind | Equations | Restriction |
//! |------|-----------|-------------|
//! | [`Rod`] | 1 holonomic | Fixed distance between two stations |
//! | [`PointInPlane`] | 1 holonomic | Station stays in a body-fixed plane |
//! | [`PointOnLine`] | 2 holonomic | Station stays on a body-fixed line |
//! | [`ConstantAngle`] | 1 holonomic | Fixed angle between two axes |
//! | [`Ball`] | 3 holonomic | Two stations coincide |
//! | [`ConstantOrientation`] | 3 holonomic | Relative orientation locked |
//! | [`Weld`] | 6 holonomic | Rigid attachment |
//! | [`NoSlip1D`] | 1 nonholonomic | Rolling without slip along a direction |
//! | [`ConstantSpeed`] | 1 nonholonomic | One mobility held at a speed |
//!
//! Anything else is added by implementing [`ConstraintEquations`] and
//! wrapping it in [`ConstraintKind::Custom`].
//!
//! # Stages
//!
//! Constraints follow the mechanism's realization ladder ([`Stage`]):
//!
//! 1. **Topology**: the constrained bodies are frozen, the subtree and
//!    common ancestor are found, and each kind caches its derived
//!    constants.
//! 2. **Model**: equation counts are fixed and every equation gets a slot
//!    in the mechanism-wide error and multiplier arrays.
//! 3. **Position / Velocity / Acceleration**: errors are evaluated against
//!    a state realized at least that far.
//!
//! Changing a constraint through [`ConstraintSet`] drops its realized
//! topology; it must be realized again before evaluation.
//!
//! # Frames
//!
//! Every constraint measures its bodies from its *ancestor*: the deepest
//! body on all of its constrained bodies' paths to Ground. The mechanism
//! supplies ground-frame kinematics through [`MatterState`];
//! [`ConstraintKinematics`] re-measures them.
//!
//! # Example
//!
//! ```
//! use sim_constraint::{ConstantSpeed, ConstraintSet, KinematicSnapshot};
//! use sim_types::{BodyId, Stage};
//!
//! // One body on a one-dof mobilizer, driven at 2 rad/s.
//! let mut snapshot = KinematicSnapshot::new();
//! let wheel = snapshot.add_body(BodyId::GROUND, 1, 1).unwrap();
//!
//! let mut set = ConstraintSet::new();
//! set.add(ConstantSpeed::new(wheel, 2.0)).unwrap();
//! set.realize_topology(&snapshot).unwrap();
//! snapshot.set_stage(Stage::Model);
//! let totals = set.realize_model(&snapshot).unwrap();
//!
//! snapshot.u_mut()[0] = 2.5;
//! snapshot.set_stage(Stage::Velocity);
//! let mut uerr = vec![0.0; totals.velocity_level()];
//! set.realize_velocity(&snapshot, &mut uerr).unwrap();
//! assert!((uerr[0] - 0.5).abs() < 1e-12);
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//!
//! - Headless training loops
//! - Hardware control code
//! - Analysis tools
//! - Other physics engines

#![doc(html_root_url = "https://docs.rs/sim-constraint/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod constraint;
mod equations;
mod error;
mod index;
mod kinematics;
mod kinds;
mod set;
mod snapshot;
mod state;
mod topology;

pub use constraint::Constraint;
pub use equations::ConstraintEquations;
pub use error::{ConstraintError, Result};
pub use index::{
    ConstrainedBodyIndex, ConstrainedMobilizerIndex, ConstrainedQIndex, ConstrainedUIndex,
    ConstraintEquationSet, ConstraintId, EquationCategory, EquationCounts, EquationSlots,
    MobilizerCoordinates, TopologicalIndexMap,
};
pub use kinematics::{ConstraintForces, ConstraintKinematics};
pub use kinds::{
    Ball, ConstantAngle, ConstantOrientation, ConstantSpeed, ConstraintKind, KindVariant,
    NoSlip1D, PointInPlane, PointOnLine, Rod, Weld,
};
pub use set::ConstraintSet;
pub use snapshot::KinematicSnapshot;
pub use state::{KinematicTree, MatterState, MobilizerLayout, Subtree};
pub use topology::{LineFrame, TopologyCache};

// Re-export types needed for constraint evaluation
pub use sim_types::{BodyId, Pose, SpatialAcceleration, Stage, Twist, Wrench};
