//! Rigid body kinematic types.
//!
//! This module provides the quantities a body carries through the
//! realization pipeline: its pose, its spatial velocity, its spatial
//! acceleration, and the spatial forces applied to it. All spatial pairs
//! are stored angular-first, following Featherstone's convention.

use nalgebra::{Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a mobilized body in the simulation.
///
/// Every body owns exactly one mobilizer (the joint connecting it to its
/// parent), so the same id also names that mobilizer. Id 0 is Ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub u64);

impl BodyId {
    /// The immobile Ground body.
    pub const GROUND: Self = Self(0);

    /// Create a new body ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this is the Ground body.
    #[must_use]
    pub const fn is_ground(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for BodyId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Position and orientation of a frame measured from and expressed in
/// another frame.
///
/// A `Pose` named `X_AB` maps vectors expressed in B into A and locates B's
/// origin in A.
///
/// # Example
///
/// ```
/// use sim_types::Pose;
/// use nalgebra::{Point3, UnitQuaternion, Vector3};
///
/// // Body frame B turned a quarter turn about z and shifted along x.
/// let x_ab = Pose::from_position_rotation(
///     Point3::new(1.0, 0.0, 0.0),
///     UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
/// );
///
/// // A station one unit along B's x axis sits one unit along A's y axis.
/// let station = x_ab.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert!((station - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
/// assert!((x_ab.inverse_transform_point(&station).x - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Origin location.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create an identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position only (identity rotation).
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from rotation only (origin at zero).
    #[must_use]
    pub fn from_rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self {
            position: Point3::origin(),
            rotation,
        }
    }

    /// Create a pose from position and rotation.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Transform a point from local to outer coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a vector from local to outer coordinates (rotation only).
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Transform a point from outer to local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, outer: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.inverse() * (outer - self.position))
    }

    /// Transform a vector from outer to local coordinates.
    #[must_use]
    pub fn inverse_transform_vector(&self, outer: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse() * outer
    }

    /// Compute the inverse pose.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.inverse();
        Self {
            position: Point3::from(-(inv_rotation * self.position.coords)),
            rotation: inv_rotation,
        }
    }

    /// Compose two poses: `self * other`, i.e. `X_AC = X_AB * X_BC`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            position: self.transform_point(&other.position),
            rotation: self.rotation * other.rotation,
        }
    }

    /// Check if the pose contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Spatial velocity of a body frame: angular velocity and the linear
/// velocity of the frame origin.
///
/// # Example
///
/// ```
/// use sim_types::Twist;
/// use nalgebra::Vector3;
///
/// // A body spinning about z at 2 rad/s.
/// let spin = Twist::angular(Vector3::new(0.0, 0.0, 2.0));
/// let rim = spin.velocity_at_point(&Vector3::new(0.5, 0.0, 0.0));
/// assert_eq!(rim, Vector3::new(0.0, 1.0, 0.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Angular velocity (rad/s).
    pub angular: Vector3<f64>,
    /// Linear velocity of the frame origin (m/s).
    pub linear: Vector3<f64>,
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Twist {
    /// Create a twist from angular and linear parts.
    #[must_use]
    pub const fn new(angular: Vector3<f64>, linear: Vector3<f64>) -> Self {
        Self { angular, linear }
    }

    /// Create a zero twist (at rest).
    #[must_use]
    pub fn zero() -> Self {
        Self {
            angular: Vector3::zeros(),
            linear: Vector3::zeros(),
        }
    }

    /// Create a twist with linear velocity only.
    #[must_use]
    pub fn linear(v: Vector3<f64>) -> Self {
        Self {
            angular: Vector3::zeros(),
            linear: v,
        }
    }

    /// Create a twist with angular velocity only.
    #[must_use]
    pub fn angular(omega: Vector3<f64>) -> Self {
        Self {
            angular: omega,
            linear: Vector3::zeros(),
        }
    }

    /// Velocity of a material point offset `r` from the frame origin.
    ///
    /// `v_point = v + ω × r`
    #[must_use]
    pub fn velocity_at_point(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(offset)
    }

    /// Check if the twist contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.linear.iter().all(|x| x.is_finite()) && self.angular.iter().all(|x| x.is_finite())
    }
}

/// Spatial acceleration of a body frame: angular acceleration and the
/// linear acceleration of the frame origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpatialAcceleration {
    /// Angular acceleration (rad/s²).
    pub angular: Vector3<f64>,
    /// Linear acceleration of the frame origin (m/s²).
    pub linear: Vector3<f64>,
}

impl Default for SpatialAcceleration {
    fn default() -> Self {
        Self::zero()
    }
}

impl SpatialAcceleration {
    /// Create a spatial acceleration from angular and linear parts.
    #[must_use]
    pub const fn new(angular: Vector3<f64>, linear: Vector3<f64>) -> Self {
        Self { angular, linear }
    }

    /// Zero acceleration.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            angular: Vector3::zeros(),
            linear: Vector3::zeros(),
        }
    }

    /// Acceleration of a material point offset `r` from the frame origin,
    /// given the frame's angular velocity `ω`.
    ///
    /// `a_point = a + α × r + ω × (ω × r)`
    #[must_use]
    pub fn acceleration_at_point(
        &self,
        offset: &Vector3<f64>,
        angular_velocity: &Vector3<f64>,
    ) -> Vector3<f64> {
        // Cross products are not associative; keep the grouping.
        self.linear
            + self.angular.cross(offset)
            + angular_velocity.cross(&angular_velocity.cross(offset))
    }
}

/// Spatial force: a torque and a force whose line of action passes
/// through the body frame origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Wrench {
    /// Torque about the body origin (N·m).
    pub torque: Vector3<f64>,
    /// Force (N).
    pub force: Vector3<f64>,
}

impl Default for Wrench {
    fn default() -> Self {
        Self::zero()
    }
}

impl Wrench {
    /// Create a wrench from torque and force.
    #[must_use]
    pub const fn new(torque: Vector3<f64>, force: Vector3<f64>) -> Self {
        Self { torque, force }
    }

    /// Zero wrench.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            torque: Vector3::zeros(),
            force: Vector3::zeros(),
        }
    }

    /// Wrench produced by `force` acting at offset `r` from the body origin.
    #[must_use]
    pub fn force_at_point(offset: &Vector3<f64>, force: &Vector3<f64>) -> Self {
        Self {
            torque: offset.cross(force),
            force: *force,
        }
    }
}

impl std::ops::Add for Wrench {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            torque: self.torque + rhs.torque,
            force: self.force + rhs.force,
        }
    }
}

impl std::ops::AddAssign for Wrench {
    fn add_assign(&mut self, rhs: Self) {
        self.torque += rhs.torque;
        self.force += rhs.force;
    }
}

impl std::ops::Neg for Wrench {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            torque: -self.torque,
            force: -self.force,
        }
    }
}
