//! Kinematic query layer.
//!
//! [`ConstraintKinematics`] is a constraint's view of a realized state.
//! Bodies are addressed by their constraint-local index, and every quantity
//! is measured from and expressed in the constraint's ancestor frame `A`.
//!
//! # Frame conventions
//!
//! Names follow the `quantity_FrameFrame` convention: `X_AB` is the pose of
//! body `B` in `A`, `V_AB` its spatial velocity, `A_AB` its spatial
//! acceleration. The underlying state supplies ground-frame quantities; when
//! the ancestor is not Ground they are re-measured here:
//!
//! ```text
//! X_AB = X_GA⁻¹ X_GB
//! w_AB = R_AG (w_GB − w_GA)
//! v_AB = R_AG (v_GB − v_GA − w_GA × r)                    r = p_GB − p_GA
//! b_AB = R_AG (b_GB − b_GA − w_GA × w_GB)
//! a_AB = R_AG (a_GB − a_GA − b_GA × r − w_GA × ṙ − w_GA × (ṙ − w_GA × r))
//! ```
//!
//! Nothing is cached; each query recomputes from the state.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_types::{BodyId, Pose, SpatialAcceleration, Stage, Twist, Wrench};

use crate::error::{require_stage, ConstraintError, Result};
use crate::index::{ConstrainedBodyIndex, ConstrainedMobilizerIndex, ConstraintEquationSet};
use crate::state::MatterState;
use crate::topology::TopologyCache;

/// Body forces and mobility forces produced by one constraint.
///
/// `body_forces` has one entry per constrained body (torque about, and force
/// through, the body origin, both expressed in the ancestor frame).
/// `mobility_forces` has one entry per constrained mobility.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintForces {
    /// Spatial force on each constrained body.
    pub body_forces: Vec<Wrench>,
    /// Generalized force on each constrained mobility.
    pub mobility_forces: Vec<f64>,
}

impl ConstraintForces {
    /// Zero forces for the given numbers of constrained bodies and mobilities.
    #[must_use]
    pub fn zeros(num_bodies: usize, num_mobilities: usize) -> Self {
        Self {
            body_forces: vec![Wrench::zero(); num_bodies],
            mobility_forces: vec![0.0; num_mobilities],
        }
    }
}

/// A constraint's view of a realized state.
#[derive(Clone, Copy)]
pub struct ConstraintKinematics<'a> {
    state: &'a dyn MatterState,
    bodies: &'a [BodyId],
    ancestor: BodyId,
    equations: &'a ConstraintEquationSet,
    cache: &'a TopologyCache,
}

impl std::fmt::Debug for ConstraintKinematics<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintKinematics")
            .field("stage", &self.state.stage())
            .field("bodies", &self.bodies)
            .field("ancestor", &self.ancestor)
            .finish_non_exhaustive()
    }
}

impl<'a> ConstraintKinematics<'a> {
    pub(crate) fn new(
        state: &'a dyn MatterState,
        bodies: &'a [BodyId],
        ancestor: BodyId,
        equations: &'a ConstraintEquationSet,
        cache: &'a TopologyCache,
    ) -> Self {
        Self {
            state,
            bodies,
            ancestor,
            equations,
            cache,
        }
    }

    /// The underlying state.
    #[must_use]
    pub fn state(&self) -> &'a dyn MatterState {
        self.state
    }

    /// The ancestor body whose frame everything is measured in.
    #[must_use]
    pub fn ancestor(&self) -> BodyId {
        self.ancestor
    }

    /// Derived constants computed at topology realization.
    #[must_use]
    pub fn topology_cache(&self) -> &'a TopologyCache {
        self.cache
    }

    /// Equation counts, slots and mobilizer coordinates of the constraint.
    #[must_use]
    pub fn equations(&self) -> &'a ConstraintEquationSet {
        self.equations
    }

    /// Number of constrained bodies.
    #[must_use]
    pub fn num_constrained_bodies(&self) -> usize {
        self.bodies.len()
    }

    /// Number of constrained mobilities.
    #[must_use]
    pub fn num_constrained_u(&self) -> usize {
        self.equations.num_constrained_u()
    }

    fn global(&self, b: ConstrainedBodyIndex) -> Result<BodyId> {
        self.bodies
            .get(b.0)
            .copied()
            .ok_or(ConstraintError::ConstrainedBodyOutOfRange {
                index: b.0,
                count: self.bodies.len(),
            })
    }

    fn ground_pose(&self, body: BodyId) -> Result<Pose> {
        require_stage(self.state.stage(), Stage::Position)?;
        self.state
            .body_pose(body)
            .ok_or(ConstraintError::BodyNotInTree(body))
    }

    fn ground_velocity(&self, body: BodyId) -> Result<Twist> {
        require_stage(self.state.stage(), Stage::Velocity)?;
        self.state
            .body_velocity(body)
            .ok_or(ConstraintError::BodyNotInTree(body))
    }

    fn ground_acceleration(&self, body: BodyId) -> Result<SpatialAcceleration> {
        require_stage(self.state.stage(), Stage::Acceleration)?;
        self.state
            .body_acceleration(body)
            .ok_or(ConstraintError::BodyNotInTree(body))
    }

    // ========================================================================
    // Body kinematics
    // ========================================================================

    /// `X_AB`: pose of constrained body `b` in the ancestor frame.
    ///
    /// # Errors
    ///
    /// Requires [`Stage::Position`]; fails for an out-of-range index.
    pub fn body_transform(&self, b: ConstrainedBodyIndex) -> Result<Pose> {
        let x_gb = self.ground_pose(self.global(b)?)?;
        if self.ancestor.is_ground() {
            return Ok(x_gb);
        }
        let x_ga = self.ground_pose(self.ancestor)?;
        Ok(x_ga.inverse().compose(&x_gb))
    }

    /// `V_AB`: spatial velocity of constrained body `b` in the ancestor frame.
    ///
    /// # Errors
    ///
    /// Requires [`Stage::Velocity`]; fails for an out-of-range index.
    pub fn body_velocity(&self, b: ConstrainedBodyIndex) -> Result<Twist> {
        let body = self.global(b)?;
        let v_gb = self.ground_velocity(body)?;
        if self.ancestor.is_ground() {
            return Ok(v_gb);
        }
        let x_ga = self.ground_pose(self.ancestor)?;
        let x_gb = self.ground_pose(body)?;
        let v_ga = self.ground_velocity(self.ancestor)?;

        let r = x_gb.position - x_ga.position;
        let w = v_gb.angular - v_ga.angular;
        let v = v_gb.linear - v_ga.linear - v_ga.angular.cross(&r);
        Ok(Twist::new(
            x_ga.inverse_transform_vector(&w),
            x_ga.inverse_transform_vector(&v),
        ))
    }

    /// `A_AB`: spatial acceleration of constrained body `b` in the ancestor frame.
    ///
    /// # Errors
    ///
    /// Requires [`Stage::Acceleration`]; fails for an out-of-range index.
    pub fn body_acceleration(&self, b: ConstrainedBodyIndex) -> Result<SpatialAcceleration> {
        let body = self.global(b)?;
        let a_gb = self.ground_acceleration(body)?;
        if self.ancestor.is_ground() {
            return Ok(a_gb);
        }
        let x_ga = self.ground_pose(self.ancestor)?;
        let x_gb = self.ground_pose(body)?;
        let v_ga = self.ground_velocity(self.ancestor)?;
        let v_gb = self.ground_velocity(body)?;
        let a_ga = self.ground_acceleration(self.ancestor)?;

        let w_ga = v_ga.angular;
        let r = x_gb.position - x_ga.position;
        let rdot = v_gb.linear - v_ga.linear;
        let v_rel = rdot - w_ga.cross(&r);

        let b = a_gb.angular - a_ga.angular - w_ga.cross(&v_gb.angular);
        let a = a_gb.linear
            - a_ga.linear
            - a_ga.angular.cross(&r)
            - w_ga.cross(&rdot)
            - w_ga.cross(&v_rel);
        Ok(SpatialAcceleration::new(
            x_ga.inverse_transform_vector(&b),
            x_ga.inverse_transform_vector(&a),
        ))
    }

    /// `R_AB`: orientation of constrained body `b`.
    ///
    /// # Errors
    ///
    /// See [`Self::body_transform`].
    pub fn body_rotation(&self, b: ConstrainedBodyIndex) -> Result<UnitQuaternion<f64>> {
        Ok(self.body_transform(b)?.rotation)
    }

    /// `w_AB`: angular velocity of constrained body `b`.
    ///
    /// # Errors
    ///
    /// See [`Self::body_velocity`].
    pub fn body_angular_velocity(&self, b: ConstrainedBodyIndex) -> Result<Vector3<f64>> {
        Ok(self.body_velocity(b)?.angular)
    }

    /// `b_AB`: angular acceleration of constrained body `b`.
    ///
    /// # Errors
    ///
    /// See [`Self::body_acceleration`].
    pub fn body_angular_acceleration(&self, b: ConstrainedBodyIndex) -> Result<Vector3<f64>> {
        Ok(self.body_acceleration(b)?.angular)
    }

    /// `p_AB`: origin location of constrained body `b`.
    ///
    /// # Errors
    ///
    /// See [`Self::body_transform`].
    pub fn body_origin_location(&self, b: ConstrainedBodyIndex) -> Result<Point3<f64>> {
        Ok(self.body_transform(b)?.position)
    }

    /// `v_AB`: origin velocity of constrained body `b`.
    ///
    /// # Errors
    ///
    /// See [`Self::body_velocity`].
    pub fn body_origin_velocity(&self, b: ConstrainedBodyIndex) -> Result<Vector3<f64>> {
        Ok(self.body_velocity(b)?.linear)
    }

    /// `a_AB`: origin acceleration of constrained body `b`.
    ///
    /// # Errors
    ///
    /// See [`Self::body_acceleration`].
    pub fn body_origin_acceleration(&self, b: ConstrainedBodyIndex) -> Result<Vector3<f64>> {
        Ok(self.body_acceleration(b)?.linear)
    }

    // ========================================================================
    // Stations
    // ========================================================================

    /// Location in `A` of a station `p_B` fixed on constrained body `b`.
    ///
    /// # Errors
    ///
    /// See [`Self::body_transform`].
    pub fn station_location(
        &self,
        b: ConstrainedBodyIndex,
        p_b: &Point3<f64>,
    ) -> Result<Point3<f64>> {
        Ok(self.body_transform(b)?.transform_point(p_b))
    }

    /// Velocity in `A` of a station fixed on constrained body `b`.
    ///
    /// # Errors
    ///
    /// See [`Self::body_velocity`].
    pub fn station_velocity(
        &self,
        b: ConstrainedBodyIndex,
        p_b: &Point3<f64>,
    ) -> Result<Vector3<f64>> {
        // Re-expressed in A but not shifted.
        let p_a = self.body_rotation(b)? * p_b.coords;
        Ok(self.body_velocity(b)?.velocity_at_point(&p_a))
    }

    /// Acceleration in `A` of a station fixed on constrained body `b`.
    ///
    /// # Errors
    ///
    /// See [`Self::body_acceleration`].
    pub fn station_acceleration(
        &self,
        b: ConstrainedBodyIndex,
        p_b: &Point3<f64>,
    ) -> Result<Vector3<f64>> {
        let p_a = self.body_rotation(b)? * p_b.coords;
        let w_ab = self.body_angular_velocity(b)?;
        Ok(self.body_acceleration(b)?.acceleration_at_point(&p_a, &w_ab))
    }

    // ========================================================================
    // Force accumulation
    // ========================================================================

    fn body_force_slot<'f>(
        &self,
        b: ConstrainedBodyIndex,
        body_forces: &'f mut [Wrench],
    ) -> Result<&'f mut Wrench> {
        if body_forces.len() != self.bodies.len() {
            return Err(ConstraintError::buffer_size(
                "body forces",
                self.bodies.len(),
                body_forces.len(),
            ));
        }
        let count = body_forces.len();
        body_forces
            .get_mut(b.0)
            .ok_or(ConstraintError::ConstrainedBodyOutOfRange { index: b.0, count })
    }

    /// Add a force expressed in `A`, applied at station `p_B` of constrained
    /// body `b`, into `body_forces`.
    ///
    /// # Errors
    ///
    /// Fails if `body_forces` is not sized to the constrained-body count or
    /// `b` is out of range. Requires [`Stage::Position`].
    pub fn add_in_station_force(
        &self,
        b: ConstrainedBodyIndex,
        p_b: &Point3<f64>,
        force_in_a: &Vector3<f64>,
        body_forces: &mut [Wrench],
    ) -> Result<()> {
        let r = self.body_rotation(b)? * p_b.coords;
        *self.body_force_slot(b, body_forces)? += Wrench::force_at_point(&r, force_in_a);
        Ok(())
    }

    /// Add a pure torque expressed in `A` on constrained body `b` into `body_forces`.
    ///
    /// # Errors
    ///
    /// Fails if `body_forces` is not sized to the constrained-body count or
    /// `b` is out of range.
    pub fn add_in_body_torque(
        &self,
        b: ConstrainedBodyIndex,
        torque_in_a: &Vector3<f64>,
        body_forces: &mut [Wrench],
    ) -> Result<()> {
        self.body_force_slot(b, body_forces)?.torque += torque_in_a;
        Ok(())
    }

    /// Spatial resultant of `body_forces` about the ancestor origin.
    ///
    /// # Errors
    ///
    /// Requires [`Stage::Position`]; fails if `body_forces` is not sized to
    /// the constrained-body count.
    pub fn resultant(&self, body_forces: &[Wrench]) -> Result<Wrench> {
        if body_forces.len() != self.bodies.len() {
            return Err(ConstraintError::buffer_size(
                "body forces",
                self.bodies.len(),
                body_forces.len(),
            ));
        }
        let mut total = Wrench::zero();
        for (i, w) in body_forces.iter().enumerate() {
            let p = self.body_origin_location(ConstrainedBodyIndex(i))?;
            total.force += w.force;
            total.torque += w.torque + p.coords.cross(&w.force);
        }
        Ok(total)
    }

    // ========================================================================
    // Constrained mobilizers
    // ========================================================================

    fn q_index(&self, m: ConstrainedMobilizerIndex, which: usize) -> Result<usize> {
        let cq = self.equations.constrained_q_index(m, which)?;
        self.equations.q_index_of_constrained_q(cq)
    }

    fn u_index(&self, m: ConstrainedMobilizerIndex, which: usize) -> Result<usize> {
        let cu = self.equations.constrained_u_index(m, which)?;
        self.equations.u_index_of_constrained_u(cu)
    }

    fn read(values: &[f64], name: &'static str, i: usize) -> Result<f64> {
        values
            .get(i)
            .copied()
            .ok_or(ConstraintError::buffer_size(name, i + 1, values.len()))
    }

    /// Coordinate `which` of constrained mobilizer `m`.
    ///
    /// # Errors
    ///
    /// Requires [`Stage::Position`]; fails for out-of-range indices.
    pub fn one_q(&self, m: ConstrainedMobilizerIndex, which: usize) -> Result<f64> {
        require_stage(self.state.stage(), Stage::Position)?;
        Self::read(self.state.q(), "q", self.q_index(m, which)?)
    }

    /// Mobility `which` of constrained mobilizer `m`.
    ///
    /// # Errors
    ///
    /// Requires [`Stage::Velocity`]; fails for out-of-range indices.
    pub fn one_u(&self, m: ConstrainedMobilizerIndex, which: usize) -> Result<f64> {
        require_stage(self.state.stage(), Stage::Velocity)?;
        Self::read(self.state.u(), "u", self.u_index(m, which)?)
    }

    /// Time derivative of coordinate `which` of constrained mobilizer `m`.
    ///
    /// # Errors
    ///
    /// Requires [`Stage::Velocity`]; fails for out-of-range indices.
    pub fn one_qdot(&self, m: ConstrainedMobilizerIndex, which: usize) -> Result<f64> {
        require_stage(self.state.stage(), Stage::Velocity)?;
        Self::read(self.state.qdot(), "qdot", self.q_index(m, which)?)
    }

    /// Second time derivative of coordinate `which` of constrained mobilizer `m`.
    ///
    /// # Errors
    ///
    /// Requires [`Stage::Acceleration`]; fails for out-of-range indices.
    pub fn one_qdotdot(&self, m: ConstrainedMobilizerIndex, which: usize) -> Result<f64> {
        require_stage(self.state.stage(), Stage::Acceleration)?;
        Self::read(self.state.qdotdot(), "qdotdot", self.q_index(m, which)?)
    }

    /// Time derivative of mobility `which` of constrained mobilizer `m`.
    ///
    /// # Errors
    ///
    /// Requires [`Stage::Acceleration`]; fails for out-of-range indices.
    pub fn one_udot(&self, m: ConstrainedMobilizerIndex, which: usize) -> Result<f64> {
        require_stage(self.state.stage(), Stage::Acceleration)?;
        Self::read(self.state.udot(), "udot", self.u_index(m, which)?)
    }

    /// Add a generalized force on mobility `which` of constrained mobilizer
    /// `m` into `mobility_forces`.
    ///
    /// # Errors
    ///
    /// Fails if `mobility_forces` is not sized to the constrained-mobility
    /// count or the indices are out of range.
    pub fn add_in_one_mobility_force(
        &self,
        m: ConstrainedMobilizerIndex,
        which: usize,
        force: f64,
        mobility_forces: &mut [f64],
    ) -> Result<()> {
        let expected = self.equations.num_constrained_u();
        if mobility_forces.len() != expected {
            return Err(ConstraintError::buffer_size(
                "mobility forces",
                expected,
                mobility_forces.len(),
            ));
        }
        let cu = self.equations.constrained_u_index(m, which)?;
        let slot = mobility_forces
            .get_mut(cu.0)
            .ok_or(ConstraintError::MobilityOutOfRange {
                index: cu.0,
                count: expected,
            })?;
        *slot += force;
        Ok(())
    }
}
