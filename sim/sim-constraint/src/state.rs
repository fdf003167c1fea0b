//! Contracts consumed from the surrounding mechanism.
//!
//! The constraint core never owns body kinematics or the solver's
//! error/multiplier arrays. It reads them through two traits:
//!
//! - [`KinematicTree`]: parent links of the mobilized bodies, and the
//!   subtree service that finds a constraint's outermost common ancestor.
//! - [`MatterState`]: a realized state exposing ground-frame body
//!   kinematics, mobilizer coordinates, and the solver-owned arrays.

use sim_types::{BodyId, Pose, SpatialAcceleration, Stage, Twist};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ConstraintError, Result};

/// Where a mobilizer's generalized coordinates and speeds live in the
/// mechanism-wide `q` and `u` arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MobilizerLayout {
    /// First q of this mobilizer.
    pub q_start: usize,
    /// Number of generalized coordinates.
    pub nq: usize,
    /// First u of this mobilizer.
    pub u_start: usize,
    /// Number of generalized speeds (mobilities).
    pub nu: usize,
}

impl MobilizerLayout {
    /// Create a new layout.
    #[must_use]
    pub const fn new(q_start: usize, nq: usize, u_start: usize, nu: usize) -> Self {
        Self {
            q_start,
            nq,
            u_start,
            nu,
        }
    }
}

/// Minimal set of bodies kinematically involved in a constraint.
///
/// The ancestor is treated as ground: its own mobility is excluded. Nothing
/// outboard of a terminal (constrained) body is included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree {
    ancestor: BodyId,
    terminal_bodies: Vec<BodyId>,
    bodies: Vec<BodyId>,
}

impl Subtree {
    /// Create a subtree from its parts.
    #[must_use]
    pub fn new(ancestor: BodyId, terminal_bodies: Vec<BodyId>, bodies: Vec<BodyId>) -> Self {
        Self {
            ancestor,
            terminal_bodies,
            bodies,
        }
    }

    /// Outermost common ancestor of the terminal bodies.
    #[must_use]
    pub fn ancestor(&self) -> BodyId {
        self.ancestor
    }

    /// The constrained bodies this subtree was computed from.
    #[must_use]
    pub fn terminal_bodies(&self) -> &[BodyId] {
        &self.terminal_bodies
    }

    /// Bodies on the paths from the terminal bodies inward to (but not
    /// including) the ancestor, sorted by id.
    #[must_use]
    pub fn bodies(&self) -> &[BodyId] {
        &self.bodies
    }
}

/// Topology of the mechanism's tree of mobilized bodies.
pub trait KinematicTree {
    /// Number of bodies including Ground.
    fn num_bodies(&self) -> usize;

    /// Inboard body of `body`; `None` for Ground and for unknown bodies.
    fn parent(&self, body: BodyId) -> Option<BodyId>;

    /// Whether `body` belongs to this tree.
    fn contains(&self, body: BodyId) -> bool {
        usize::try_from(body.raw()).is_ok_and(|b| b < self.num_bodies())
    }

    /// Path from `body` inward to Ground, starting with `body` itself.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::BodyNotInTree`] if the body is unknown or
    /// its parent chain does not reach Ground.
    fn path_to_ground(&self, body: BodyId) -> Result<Vec<BodyId>> {
        if !self.contains(body) {
            return Err(ConstraintError::BodyNotInTree(body));
        }
        let mut path = vec![body];
        let mut current = body;
        while !current.is_ground() {
            current = self
                .parent(current)
                .ok_or(ConstraintError::BodyNotInTree(current))?;
            path.push(current);
            if path.len() > self.num_bodies() {
                return Err(ConstraintError::BodyNotInTree(body));
            }
        }
        Ok(path)
    }

    /// Compute the minimal subtree connecting `terminal_bodies` to their
    /// outermost common ancestor.
    ///
    /// The ancestor is the deepest body lying on every terminal body's path
    /// to Ground. It may be one of the terminal bodies when another terminal
    /// body descends from it. A lone body (or one body repeated) is never its
    /// own ancestor: its parent is used and the body joins the subtree.
    /// With no terminal bodies the ancestor is Ground.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::BodyNotInTree`] for an unknown body.
    fn calc_subtree(&self, terminal_bodies: &[BodyId]) -> Result<Subtree> {
        let paths = terminal_bodies
            .iter()
            .map(|&b| self.path_to_ground(b))
            .collect::<Result<Vec<_>>>()?;

        // Walk all paths outward from Ground while they agree. A single
        // distinct body stops one short of itself.
        let single = terminal_bodies
            .split_first()
            .is_some_and(|(first, rest)| rest.iter().all(|b| b == first));
        let mut ancestor = BodyId::GROUND;
        let shortest = paths.iter().map(Vec::len).min().unwrap_or(0);
        let limit = shortest.saturating_sub(usize::from(single));
        for depth in 1..limit {
            let mut at_depth = paths.iter().map(|p| p[p.len() - 1 - depth]);
            let first = at_depth.next();
            match first {
                Some(candidate) if at_depth.all(|b| b == candidate) => ancestor = candidate,
                _ => break,
            }
        }

        let mut bodies: Vec<BodyId> = paths
            .iter()
            .flat_map(|p| p.iter().copied().take_while(move |&b| b != ancestor))
            .collect();
        bodies.sort_unstable();
        bodies.dedup();

        Ok(Subtree::new(ancestor, terminal_bodies.to_vec(), bodies))
    }
}

/// A state of the mechanism realized through some [`Stage`].
///
/// Body kinematics are measured from and expressed in Ground. Ground itself
/// reports the identity pose and zero motion. The error and multiplier
/// arrays are owned by the solver and laid out per equation family as
/// `[holonomic | nonholonomic | acceleration-only]`:
///
/// - `qerr` has length `total_mp`
/// - `uerr` has length `total_mp + total_mv`
/// - `udoterr` and `multipliers` have length `total_mp + total_mv + total_ma`
pub trait MatterState {
    /// Highest stage realized for this state.
    fn stage(&self) -> Stage;

    /// Ground-frame pose `X_GB` of a body, or `None` for an unknown body.
    fn body_pose(&self, body: BodyId) -> Option<Pose>;

    /// Ground-frame spatial velocity `V_GB` of a body.
    fn body_velocity(&self, body: BodyId) -> Option<Twist>;

    /// Ground-frame spatial acceleration `A_GB` of a body.
    fn body_acceleration(&self, body: BodyId) -> Option<SpatialAcceleration>;

    /// Location of a mobilizer's q and u in the mechanism-wide arrays.
    fn mobilizer_layout(&self, body: BodyId) -> Option<MobilizerLayout>;

    /// Generalized coordinates.
    fn q(&self) -> &[f64];
    /// Generalized speeds.
    fn u(&self) -> &[f64];
    /// Time derivatives of the generalized coordinates.
    fn qdot(&self) -> &[f64];
    /// Second time derivatives of the generalized coordinates.
    fn qdotdot(&self) -> &[f64];
    /// Time derivatives of the generalized speeds.
    fn udot(&self) -> &[f64];

    /// Position-level constraint errors.
    fn qerr(&self) -> &[f64];
    /// Velocity-level constraint errors.
    fn uerr(&self) -> &[f64];
    /// Acceleration-level constraint errors.
    fn udoterr(&self) -> &[f64];
    /// Constraint multipliers.
    fn multipliers(&self) -> &[f64];
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Parent table: index is body id, value is parent id.
    struct Parents(Vec<u64>);

    impl KinematicTree for Parents {
        fn num_bodies(&self) -> usize {
            self.0.len()
        }

        fn parent(&self, body: BodyId) -> Option<BodyId> {
            if body.is_ground() {
                return None;
            }
            let i = usize::try_from(body.raw()).ok()?;
            self.0.get(i).map(|&p| BodyId::new(p))
        }
    }

    // Ground(0) -> 1 -> 2 -> 3
    //                \-> 4 -> 5
    // Ground(0) -> 6
    fn tree() -> Parents {
        Parents(vec![0, 0, 1, 2, 1, 4, 0])
    }

    #[test]
    fn test_subtree_common_ancestor() {
        let subtree = tree()
            .calc_subtree(&[BodyId::new(3), BodyId::new(5)])
            .unwrap();
        assert_eq!(subtree.ancestor(), BodyId::new(1));
        let ids: Vec<u64> = subtree.bodies().iter().map(|b| b.raw()).collect();
        assert_eq!(ids, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_subtree_separate_branches_meet_at_ground() {
        let subtree = tree()
            .calc_subtree(&[BodyId::new(3), BodyId::new(6)])
            .unwrap();
        assert_eq!(subtree.ancestor(), BodyId::GROUND);
        let ids: Vec<u64> = subtree.bodies().iter().map(|b| b.raw()).collect();
        assert_eq!(ids, vec![1, 2, 3, 6]);
    }

    #[test]
    fn test_subtree_descendant_pair_uses_inner_body() {
        let subtree = tree()
            .calc_subtree(&[BodyId::new(2), BodyId::new(3)])
            .unwrap();
        assert_eq!(subtree.ancestor(), BodyId::new(2));
        assert_eq!(subtree.bodies(), &[BodyId::new(3)]);
    }

    #[test]
    fn test_subtree_single_body_uses_parent() {
        let subtree = tree().calc_subtree(&[BodyId::new(3)]).unwrap();
        assert_eq!(subtree.ancestor(), BodyId::new(2));
        assert_eq!(subtree.bodies(), &[BodyId::new(3)]);

        let top = tree().calc_subtree(&[BodyId::new(6)]).unwrap();
        assert_eq!(top.ancestor(), BodyId::GROUND);
        assert_eq!(top.bodies(), &[BodyId::new(6)]);
    }

    #[test]
    fn test_subtree_repeated_body_uses_parent() {
        let subtree = tree()
            .calc_subtree(&[BodyId::new(5), BodyId::new(5)])
            .unwrap();
        assert_eq!(subtree.ancestor(), BodyId::new(4));
        assert_eq!(subtree.bodies(), &[BodyId::new(5)]);
        assert_eq!(subtree.terminal_bodies().len(), 2);
    }

    #[test]
    fn test_subtree_lone_ground() {
        let subtree = tree().calc_subtree(&[BodyId::GROUND]).unwrap();
        assert_eq!(subtree.ancestor(), BodyId::GROUND);
        assert!(subtree.bodies().is_empty());
    }

    #[test]
    fn test_subtree_with_ground_and_empty() {
        let subtree = tree()
            .calc_subtree(&[BodyId::GROUND, BodyId::new(5)])
            .unwrap();
        assert_eq!(subtree.ancestor(), BodyId::GROUND);

        let empty = tree().calc_subtree(&[]).unwrap();
        assert_eq!(empty.ancestor(), BodyId::GROUND);
        assert!(empty.bodies().is_empty());
    }

    #[test]
    fn test_subtree_unknown_body() {
        assert_eq!(
            tree().calc_subtree(&[BodyId::new(99)]),
            Err(ConstraintError::BodyNotInTree(BodyId::new(99)))
        );
    }
}
