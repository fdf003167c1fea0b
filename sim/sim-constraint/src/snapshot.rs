//! In-memory mechanism state.

use sim_types::{BodyId, Pose, SpatialAcceleration, Stage, Twist};

use crate::error::{ConstraintError, Result};
use crate::state::{KinematicTree, MatterState, MobilizerLayout};

#[derive(Debug, Clone)]
struct BodyRecord {
    parent: Option<BodyId>,
    layout: MobilizerLayout,
    pose: Pose,
    velocity: Twist,
    acceleration: SpatialAcceleration,
}

/// A recorded mechanism state with explicit ground-frame body kinematics.
///
/// Implements both [`KinematicTree`] and [`MatterState`], so constraints can
/// be realized and evaluated against recorded or synthetic data without a
/// full multibody system.
///
/// # Example
///
/// ```
/// use sim_constraint::{KinematicSnapshot, KinematicTree, MatterState};
/// use sim_types::{BodyId, Pose, Stage};
/// use nalgebra::Point3;
///
/// let mut snapshot = KinematicSnapshot::new();
/// let body = snapshot.add_body(BodyId::GROUND, 1, 1).unwrap();
/// snapshot
///     .set_pose(body, Pose::from_position(Point3::new(0.0, 0.0, 1.0)))
///     .unwrap();
/// snapshot.set_stage(Stage::Position);
///
/// assert_eq!(snapshot.num_bodies(), 2);
/// assert_eq!(snapshot.parent(body), Some(BodyId::GROUND));
/// assert_eq!(snapshot.q().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct KinematicSnapshot {
    stage: Stage,
    bodies: Vec<BodyRecord>,
    q: Vec<f64>,
    u: Vec<f64>,
    qdot: Vec<f64>,
    qdotdot: Vec<f64>,
    udot: Vec<f64>,
    qerr: Vec<f64>,
    uerr: Vec<f64>,
    udoterr: Vec<f64>,
    multipliers: Vec<f64>,
}

impl Default for KinematicSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl KinematicSnapshot {
    /// Create a snapshot containing only Ground, at [`Stage::Empty`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: Stage::Empty,
            bodies: vec![BodyRecord {
                parent: None,
                layout: MobilizerLayout::default(),
                pose: Pose::identity(),
                velocity: Twist::zero(),
                acceleration: SpatialAcceleration::zero(),
            }],
            q: Vec::new(),
            u: Vec::new(),
            qdot: Vec::new(),
            qdotdot: Vec::new(),
            udot: Vec::new(),
            qerr: Vec::new(),
            uerr: Vec::new(),
            udoterr: Vec::new(),
            multipliers: Vec::new(),
        }
    }

    /// Add a body whose mobilizer has `nq` coordinates and `nu` speeds,
    /// returning its id. The body starts at rest at the Ground origin.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::BodyNotInTree`] if `parent` is unknown.
    pub fn add_body(&mut self, parent: BodyId, nq: usize, nu: usize) -> Result<BodyId> {
        self.record(parent)?;
        let id = BodyId::new(self.bodies.len() as u64);
        let layout = MobilizerLayout::new(self.q.len(), nq, self.u.len(), nu);
        self.q.resize(self.q.len() + nq, 0.0);
        self.qdot.resize(self.q.len(), 0.0);
        self.qdotdot.resize(self.q.len(), 0.0);
        self.u.resize(self.u.len() + nu, 0.0);
        self.udot.resize(self.u.len(), 0.0);
        self.bodies.push(BodyRecord {
            parent: Some(parent),
            layout,
            pose: Pose::identity(),
            velocity: Twist::zero(),
            acceleration: SpatialAcceleration::zero(),
        });
        Ok(id)
    }

    fn record(&self, body: BodyId) -> Result<&BodyRecord> {
        usize::try_from(body.raw())
            .ok()
            .and_then(|i| self.bodies.get(i))
            .ok_or(ConstraintError::BodyNotInTree(body))
    }

    fn record_mut(&mut self, body: BodyId) -> Result<&mut BodyRecord> {
        if body.is_ground() {
            // Ground is immobile.
            return Err(ConstraintError::BodyNotInTree(body));
        }
        usize::try_from(body.raw())
            .ok()
            .and_then(|i| self.bodies.get_mut(i))
            .ok_or(ConstraintError::BodyNotInTree(body))
    }

    /// Set the realized stage.
    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Set a body's ground-frame pose.
    ///
    /// # Errors
    ///
    /// Fails for Ground or an unknown body.
    pub fn set_pose(&mut self, body: BodyId, pose: Pose) -> Result<()> {
        self.record_mut(body)?.pose = pose;
        Ok(())
    }

    /// Set a body's ground-frame spatial velocity.
    ///
    /// # Errors
    ///
    /// Fails for Ground or an unknown body.
    pub fn set_velocity(&mut self, body: BodyId, velocity: Twist) -> Result<()> {
        self.record_mut(body)?.velocity = velocity;
        Ok(())
    }

    /// Set a body's ground-frame spatial acceleration.
    ///
    /// # Errors
    ///
    /// Fails for Ground or an unknown body.
    pub fn set_acceleration(&mut self, body: BodyId, acceleration: SpatialAcceleration) -> Result<()> {
        self.record_mut(body)?.acceleration = acceleration;
        Ok(())
    }

    /// Mutable generalized coordinates.
    pub fn q_mut(&mut self) -> &mut [f64] {
        &mut self.q
    }

    /// Mutable generalized speeds.
    pub fn u_mut(&mut self) -> &mut [f64] {
        &mut self.u
    }

    /// Mutable coordinate derivatives.
    pub fn qdot_mut(&mut self) -> &mut [f64] {
        &mut self.qdot
    }

    /// Mutable coordinate second derivatives.
    pub fn qdotdot_mut(&mut self) -> &mut [f64] {
        &mut self.qdotdot
    }

    /// Mutable speed derivatives.
    pub fn udot_mut(&mut self) -> &mut [f64] {
        &mut self.udot
    }

    /// Replace the position-level error array.
    pub fn set_qerr(&mut self, qerr: Vec<f64>) {
        self.qerr = qerr;
    }

    /// Replace the velocity-level error array.
    pub fn set_uerr(&mut self, uerr: Vec<f64>) {
        self.uerr = uerr;
    }

    /// Replace the acceleration-level error array.
    pub fn set_udoterr(&mut self, udoterr: Vec<f64>) {
        self.udoterr = udoterr;
    }

    /// Replace the multiplier array.
    pub fn set_multipliers(&mut self, multipliers: Vec<f64>) {
        self.multipliers = multipliers;
    }
}

impl KinematicTree for KinematicSnapshot {
    fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    fn parent(&self, body: BodyId) -> Option<BodyId> {
        self.record(body).ok().and_then(|r| r.parent)
    }
}

impl MatterState for KinematicSnapshot {
    fn stage(&self) -> Stage {
        self.stage
    }

    fn body_pose(&self, body: BodyId) -> Option<Pose> {
        self.record(body).ok().map(|r| r.pose)
    }

    fn body_velocity(&self, body: BodyId) -> Option<Twist> {
        self.record(body).ok().map(|r| r.velocity)
    }

    fn body_acceleration(&self, body: BodyId) -> Option<SpatialAcceleration> {
        self.record(body).ok().map(|r| r.acceleration)
    }

    fn mobilizer_layout(&self, body: BodyId) -> Option<MobilizerLayout> {
        self.record(body).ok().map(|r| r.layout)
    }

    fn q(&self) -> &[f64] {
        &self.q
    }

    fn u(&self) -> &[f64] {
        &self.u
    }

    fn qdot(&self) -> &[f64] {
        &self.qdot
    }

    fn qdotdot(&self) -> &[f64] {
        &self.qdotdot
    }

    fn udot(&self) -> &[f64] {
        &self.udot
    }

    fn qerr(&self) -> &[f64] {
        &self.qerr
    }

    fn uerr(&self) -> &[f64] {
        &self.uerr
    }

    fn udoterr(&self) -> &[f64] {
        &self.udoterr
    }

    fn multipliers(&self) -> &[f64] {
        &self.multipliers
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_coordinate_layout_is_packed() {
        let mut snap = KinematicSnapshot::new();
        let a = snap.add_body(BodyId::GROUND, 7, 6).unwrap();
        let b = snap.add_body(a, 1, 1).unwrap();

        assert_eq!(snap.mobilizer_layout(a), Some(MobilizerLayout::new(0, 7, 0, 6)));
        assert_eq!(snap.mobilizer_layout(b), Some(MobilizerLayout::new(7, 1, 6, 1)));
        assert_eq!(snap.q().len(), 8);
        assert_eq!(snap.udot().len(), 7);
    }

    #[test]
    fn test_ground_is_fixed() {
        let mut snap = KinematicSnapshot::new();
        assert!(snap
            .set_pose(BodyId::GROUND, Pose::from_position(Point3::new(1.0, 0.0, 0.0)))
            .is_err());
        assert_eq!(snap.body_pose(BodyId::GROUND), Some(Pose::identity()));
        assert_eq!(snap.parent(BodyId::GROUND), None);
    }

    #[test]
    fn test_unknown_bodies() {
        let mut snap = KinematicSnapshot::new();
        assert!(snap.add_body(BodyId::new(3), 1, 1).is_err());
        assert!(snap.body_velocity(BodyId::new(1)).is_none());
        assert!(snap
            .set_velocity(BodyId::new(1), Twist::linear(Vector3::x()))
            .is_err());
    }
}
