//! Coincident stations (ball-and-socket).

use nalgebra::{Point3, Vector3};
use sim_types::BodyId;
use smallvec::{smallvec, SmallVec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::equations::{expect_count, ConstraintEquations};
use crate::error::Result;
use crate::index::{ConstrainedBodyIndex, EquationCategory, EquationCounts};
use crate::kinematics::{ConstraintForces, ConstraintKinematics};

pub(crate) const BASE: ConstrainedBodyIndex = ConstrainedBodyIndex(0);
pub(crate) const FOLLOWER: ConstrainedBodyIndex = ConstrainedBodyIndex(1);

/// Makes station `S` on follower body F coincide with station `P` on base
/// body B.
///
/// Three holonomic equations. `C` is the material point of B instantaneously
/// located at `S`, so its station `p_BC` changes as the mechanism moves:
///
/// ```text
/// perr  = p_AS − p_AP
/// pverr = v_AS − v_AC
/// paerr = a_AS − a_AC
/// ```
///
/// The multipliers are a force `λ` applied at `S` on F and `−λ` applied at
/// `C` on B.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ball {
    base_body: BodyId,
    follower_body: BodyId,
    base_point: Point3<f64>,
    follower_point: Point3<f64>,
}

impl Ball {
    /// Join the origins of a base and a follower body.
    #[must_use]
    pub fn new(base_body: BodyId, follower_body: BodyId) -> Self {
        Self {
            base_body,
            follower_body,
            base_point: Point3::origin(),
            follower_point: Point3::origin(),
        }
    }

    /// Join stations on each body instead of the origins.
    #[must_use]
    pub fn with_points(mut self, base_point: Point3<f64>, follower_point: Point3<f64>) -> Self {
        self.base_point = base_point;
        self.follower_point = follower_point;
        self
    }

    /// Base body B.
    #[must_use]
    pub fn base_body(&self) -> BodyId {
        self.base_body
    }

    /// Follower body F.
    #[must_use]
    pub fn follower_body(&self) -> BodyId {
        self.follower_body
    }

    /// Station on B.
    #[must_use]
    pub fn base_point(&self) -> Point3<f64> {
        self.base_point
    }

    /// Station on F.
    #[must_use]
    pub fn follower_point(&self) -> Point3<f64> {
        self.follower_point
    }

    /// Move the station on B.
    pub fn set_base_point(&mut self, point: Point3<f64>) {
        self.base_point = point;
    }

    /// Move the station on F.
    pub fn set_follower_point(&mut self, point: Point3<f64>) {
        self.follower_point = point;
    }
}

/// Station on B currently coincident with `p_F` on F.
fn coincident_station(k: &ConstraintKinematics<'_>, p_f: &Point3<f64>) -> Result<Point3<f64>> {
    let p_as = k.station_location(FOLLOWER, p_f)?;
    Ok(k.body_transform(BASE)?.inverse_transform_point(&p_as))
}

pub(crate) fn coincidence_error(
    k: &ConstraintKinematics<'_>,
    p_b: &Point3<f64>,
    p_f: &Point3<f64>,
) -> Result<Vector3<f64>> {
    Ok(k.station_location(FOLLOWER, p_f)? - k.station_location(BASE, p_b)?)
}

pub(crate) fn coincidence_dot_error(
    k: &ConstraintKinematics<'_>,
    p_f: &Point3<f64>,
) -> Result<Vector3<f64>> {
    let p_bc = coincident_station(k, p_f)?;
    Ok(k.station_velocity(FOLLOWER, p_f)? - k.station_velocity(BASE, &p_bc)?)
}

pub(crate) fn coincidence_dot_dot_error(
    k: &ConstraintKinematics<'_>,
    p_f: &Point3<f64>,
) -> Result<Vector3<f64>> {
    let p_bc = coincident_station(k, p_f)?;
    Ok(k.station_acceleration(FOLLOWER, p_f)? - k.station_acceleration(BASE, &p_bc)?)
}

pub(crate) fn apply_coincidence_force(
    k: &ConstraintKinematics<'_>,
    p_f: &Point3<f64>,
    force: &Vector3<f64>,
    forces: &mut ConstraintForces,
) -> Result<()> {
    let p_bc = coincident_station(k, p_f)?;
    k.add_in_station_force(FOLLOWER, p_f, force, &mut forces.body_forces)?;
    k.add_in_station_force(BASE, &p_bc, &-force, &mut forces.body_forces)
}

impl ConstraintEquations for Ball {
    fn kind_name(&self) -> &'static str {
        "Ball"
    }

    fn default_counts(&self) -> EquationCounts {
        EquationCounts::holonomic(3)
    }

    fn constrained_bodies(&self) -> SmallVec<[BodyId; 4]> {
        smallvec![self.base_body, self.follower_body]
    }

    fn position_errors(&self, k: &ConstraintKinematics<'_>, perr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 3, perr.len())?;
        let e = coincidence_error(k, &self.base_point, &self.follower_point)?;
        perr.copy_from_slice(e.as_slice());
        Ok(())
    }

    fn position_dot_errors(&self, k: &ConstraintKinematics<'_>, pverr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 3, pverr.len())?;
        let e = coincidence_dot_error(k, &self.follower_point)?;
        pverr.copy_from_slice(e.as_slice());
        Ok(())
    }

    fn position_dot_dot_errors(
        &self,
        k: &ConstraintKinematics<'_>,
        paerr: &mut [f64],
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 3, paerr.len())?;
        let e = coincidence_dot_dot_error(k, &self.follower_point)?;
        paerr.copy_from_slice(e.as_slice());
        Ok(())
    }

    fn apply_position_forces(
        &self,
        k: &ConstraintKinematics<'_>,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        expect_count(EquationCategory::Holonomic, 3, lambda.len())?;
        let force = Vector3::from_column_slice(lambda);
        apply_coincidence_force(k, &self.follower_point, &force, forces)
    }
}
