//! Core kinematic vocabulary for multibody simulation.
//!
//! This crate provides the data types shared between the mechanism that
//! produces body motion and the components that consume it:
//!
//! - [`BodyId`] - Simulation-wide mobilized body identifier ([`BodyId::GROUND`] is 0)
//! - [`Pose`] - Rigid transform (position + orientation)
//! - [`Twist`] - Spatial velocity (angular + linear)
//! - [`SpatialAcceleration`] - Spatial acceleration (angular + linear)
//! - [`Wrench`] - Spatial force (torque + force)
//! - [`Stage`] - Readiness ladder of the realization pipeline
//!
//! # Design Philosophy
//!
//! These types are **pure data** plus the rigid-body algebra needed to move
//! between frames. They carry no physics and no integration.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//!
//! - Headless training loops
//! - Hardware control code
//! - Analysis tools
//! - Other engines
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: forward
//! - Z: up
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use sim_types::{Pose, Twist};
//! use nalgebra::{Point3, Vector3};
//!
//! let pose = Pose::from_position(Point3::new(0.0, 0.0, 1.0));
//! let twist = Twist::angular(Vector3::new(0.0, 0.0, 2.0));
//!
//! // A point one meter out along x spins at 2 m/s along y.
//! let v = twist.velocity_at_point(&Vector3::x());
//! assert!((v.y - 2.0).abs() < 1e-12);
//! assert_eq!(pose.position.z, 1.0);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
// Allow certain clippy lints that are overly pedantic for type definitions
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
)]

mod body;
mod stage;

pub use body::{BodyId, Pose, SpatialAcceleration, Twist, Wrench};
pub use stage::Stage;

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_transform() {
        let pose = Pose::from_position_rotation(
            Point3::new(1.0, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );

        // (1,0,0) rotated 90 degrees about Z is (0,1,0), then shifted by (1,0,0)
        let world = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert!((world.x - 1.0).abs() < 1e-10);
        assert!((world.y - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_body_id() {
        let id = BodyId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(format!("{id}"), "Body(42)");
        assert!(BodyId::GROUND.is_ground());
        assert!(!id.is_ground());
    }

    #[test]
    fn test_twist_velocity_at_point() {
        let twist = Twist::new(Vector3::new(0.0, 0.0, 1.0), Vector3::new(1.0, 0.0, 0.0));
        let v = twist.velocity_at_point(&Vector3::new(0.0, 1.0, 0.0));
        assert!((v.x - 0.0).abs() < 1e-10);
    }
}
