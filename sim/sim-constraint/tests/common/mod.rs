//! Shared fixtures: bodies following analytic rigid trajectories.
//!
//! Each body translates with constant acceleration and rotates about an
//! axis fixed in Ground with constant angular acceleration, so its pose,
//! velocity and acceleration are known exactly at any time.

#![allow(dead_code, clippy::expect_used)]

use nalgebra::{Point3, Unit, UnitQuaternion, UnitVector3, Vector3};
use rand::rngs::StdRng;
use rand::Rng;
use sim_constraint::{ConstraintSet, EquationCounts, KinematicSnapshot};
use sim_types::{BodyId, Pose, SpatialAcceleration, Stage, Twist};

/// Random vector with components in `[-scale, scale)`.
pub fn random_vector(rng: &mut StdRng, scale: f64) -> Vector3<f64> {
    Vector3::new(
        rng.gen_range(-scale..scale),
        rng.gen_range(-scale..scale),
        rng.gen_range(-scale..scale),
    )
}

/// Random point with coordinates in `[-scale, scale)`.
pub fn random_point(rng: &mut StdRng, scale: f64) -> Point3<f64> {
    Point3::from(random_vector(rng, scale))
}

/// Random unit vector.
pub fn random_unit(rng: &mut StdRng) -> UnitVector3<f64> {
    Unit::try_new(random_vector(rng, 1.0), 1e-3).unwrap_or_else(Vector3::z_axis)
}

/// Random orientation.
pub fn random_rotation(rng: &mut StdRng) -> UnitQuaternion<f64> {
    UnitQuaternion::from_scaled_axis(random_vector(rng, 3.0))
}

/// `p(t) = p0 + v0 t + a t²/2`, `R(t) = exp(k θ(t)) R0` with
/// `θ(t) = θ0 + θ̇0 t + θ̈ t²/2` and `k` fixed in Ground.
#[derive(Debug, Clone, Copy)]
pub struct RigidTrajectory {
    pub p0: Vector3<f64>,
    pub v0: Vector3<f64>,
    pub a: Vector3<f64>,
    pub r0: UnitQuaternion<f64>,
    pub axis: UnitVector3<f64>,
    pub theta: [f64; 3],
}

impl RigidTrajectory {
    /// A body that never moves.
    pub fn fixed(pose: Pose) -> Self {
        Self {
            p0: pose.position.coords,
            v0: Vector3::zeros(),
            a: Vector3::zeros(),
            r0: pose.rotation,
            axis: Vector3::z_axis(),
            theta: [0.0; 3],
        }
    }

    /// Random translation and rotation.
    pub fn random(rng: &mut StdRng) -> Self {
        Self {
            p0: random_vector(rng, 1.0),
            v0: random_vector(rng, 1.0),
            a: random_vector(rng, 1.0),
            r0: random_rotation(rng),
            axis: random_unit(rng),
            theta: [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ],
        }
    }

    /// Random translation at a fixed random orientation.
    pub fn translating(rng: &mut StdRng) -> Self {
        Self {
            theta: [0.0; 3],
            ..Self::random(rng)
        }
    }

    fn angle(&self, t: f64) -> f64 {
        let [th0, th1, th2] = self.theta;
        th0 + th1 * t + 0.5 * th2 * t * t
    }

    pub fn pose(&self, t: f64) -> Pose {
        let position = self.p0 + self.v0 * t + 0.5 * self.a * t * t;
        let rotation = UnitQuaternion::from_axis_angle(&self.axis, self.angle(t)) * self.r0;
        Pose {
            position: Point3::from(position),
            rotation,
        }
    }

    pub fn twist(&self, t: f64) -> Twist {
        let rate = self.theta[1] + self.theta[2] * t;
        Twist::new(self.axis.into_inner() * rate, self.v0 + self.a * t)
    }

    pub fn acceleration(&self) -> SpatialAcceleration {
        SpatialAcceleration::new(self.axis.into_inner() * self.theta[2], self.a)
    }
}

/// A snapshot whose bodies follow [`RigidTrajectory`]s.
#[derive(Debug, Clone, Default)]
pub struct Mechanism {
    pub snapshot: KinematicSnapshot,
    trajectories: Vec<(BodyId, RigidTrajectory)>,
}

impl Mechanism {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body on a six-dof mobilizer.
    pub fn add_body(&mut self, parent: BodyId, trajectory: RigidTrajectory) -> BodyId {
        let body = self.snapshot.add_body(parent, 7, 6).expect("parent exists");
        self.trajectories.push((body, trajectory));
        body
    }

    /// Move every body to time `t` and mark the state fully realized.
    pub fn set_time(&mut self, t: f64) {
        for (body, trajectory) in &self.trajectories {
            self.snapshot
                .set_pose(*body, trajectory.pose(t))
                .expect("body exists");
            self.snapshot
                .set_velocity(*body, trajectory.twist(t))
                .expect("body exists");
            self.snapshot
                .set_acceleration(*body, trajectory.acceleration())
                .expect("body exists");
        }
        self.snapshot.set_stage(Stage::Acceleration);
    }

    /// Realize topology and model for `set`, leaving the state at `t`.
    pub fn realize(&mut self, set: &mut ConstraintSet, t: f64) -> EquationCounts {
        set.realize_topology(&self.snapshot).expect("topology");
        self.snapshot.set_stage(Stage::Model);
        let totals = set.realize_model(&self.snapshot).expect("model");
        self.set_time(t);
        totals
    }
}
