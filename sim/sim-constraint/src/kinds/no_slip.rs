//! Rolling without slip along one direction.

use nalgebra::{Point3, UnitVector3, Vector3};
use sim_types::BodyId;
use smallvec::{smallvec, SmallVec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::equations::{expect_count, ConstraintEquations};
use crate::error::Result;
use crate::index::{ConstrainedBodyIndex, EquationCategory, EquationCounts};
use crate::kinematics::{ConstraintForces, ConstraintKinematics};

const CASE: ConstrainedBodyIndex = ConstrainedBodyIndex(0);
const MOVING0: ConstrainedBodyIndex = ConstrainedBodyIndex(1);
const MOVING1: ConstrainedBodyIndex = ConstrainedBodyIndex(2);

/// Forbids relative sliding of two moving bodies along a direction fixed in
/// a third "case" body, at a contact point also fixed in the case.
///
/// One nonholonomic equation. `P` is the contact point, `P0` and `P1` the
/// material points of the moving bodies located at `P`, and `n` the
/// direction, all expressed in A:
///
/// ```text
/// verr  = (v_AP1 − v_AP0)·n
/// vaerr = ((a_AP1 − a_AP0) − w_AC × (v_AP1 − v_AP0))·n
/// ```
///
/// The multiplier is a force `λn` at `P1` on the second moving body and its
/// negative at `P0` on the first.
///
/// # Example
///
/// ```
/// use sim_constraint::NoSlip1D;
/// use sim_types::BodyId;
/// use nalgebra::{Point3, Vector3, UnitVector3};
///
/// // Wheel (body 2) rolling on the ground, contact under its hub along x.
/// let no_slip = NoSlip1D::new(
///     BodyId::GROUND,
///     Point3::origin(),
///     UnitVector3::new_normalize(Vector3::x()),
///     BodyId::GROUND,
///     BodyId::new(2),
/// );
/// assert_eq!(no_slip.moving_body1(), BodyId::new(2));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NoSlip1D {
    case_body: BodyId,
    contact_point: Point3<f64>,
    direction: UnitVector3<f64>,
    moving_body0: BodyId,
    moving_body1: BodyId,
}

impl NoSlip1D {
    /// Create a no-slip condition at `contact_point` along `direction`, both
    /// fixed in `case_body`, between two moving bodies.
    ///
    /// The case body may coincide with one of the moving bodies; the case is
    /// then listed once among the constrained bodies.
    #[must_use]
    pub fn new(
        case_body: BodyId,
        contact_point: Point3<f64>,
        direction: UnitVector3<f64>,
        moving_body0: BodyId,
        moving_body1: BodyId,
    ) -> Self {
        Self {
            case_body,
            contact_point,
            direction,
            moving_body0,
            moving_body1,
        }
    }

    /// Body the contact point and direction are fixed in.
    #[must_use]
    pub fn case_body(&self) -> BodyId {
        self.case_body
    }

    /// First moving body.
    #[must_use]
    pub fn moving_body0(&self) -> BodyId {
        self.moving_body0
    }

    /// Second moving body.
    #[must_use]
    pub fn moving_body1(&self) -> BodyId {
        self.moving_body1
    }

    /// Contact point in the case frame.
    #[must_use]
    pub fn contact_point(&self) -> Point3<f64> {
        self.contact_point
    }

    /// No-slip direction in the case frame.
    #[must_use]
    pub fn direction(&self) -> UnitVector3<f64> {
        self.direction
    }

    /// Move the contact point.
    pub fn set_contact_point(&mut self, point: Point3<f64>) {
        self.contact_point = point;
    }

    /// Change the no-slip direction.
    pub fn set_direction(&mut self, direction: UnitVector3<f64>) {
        self.direction = direction;
    }

    /// Local indices of (case, moving0, moving1) after de-duplication.
    fn locals(&self) -> [ConstrainedBodyIndex; 3] {
        let same = self.moving_body0 == self.moving_body1;
        match (
            self.moving_body0 == self.case_body,
            self.moving_body1 == self.case_body,
        ) {
            (true, true) => [CASE, CASE, CASE],
            (true, false) => [CASE, CASE, MOVING0],
            (false, true) => [CASE, MOVING0, CASE],
            (false, false) if same => [CASE, MOVING0, MOVING0],
            (false, false) => [CASE, MOVING0, MOVING1],
        }
    }

    /// Material stations of the moving bodies at the contact point.
    fn stations(
        &self,
        k: &ConstraintKinematics<'_>,
    ) -> Result<(Point3<f64>, Point3<f64>)> {
        let [case, b0, b1] = self.locals();
        let p_a = k.station_location(case, &self.contact_point)?;
        let p_p0 = k.body_transform(b0)?.inverse_transform_point(&p_a);
        let p_p1 = k.body_transform(b1)?.inverse_transform_point(&p_a);
        Ok((p_p0, p_p1))
    }

    fn direction_in_ancestor(&self, k: &ConstraintKinematics<'_>) -> Result<Vector3<f64>> {
        let [case, ..] = self.locals();
        Ok(k.body_rotation(case)? * self.direction.into_inner())
    }
}

impl ConstraintEquations for NoSlip1D {
    fn kind_name(&self) -> &'static str {
        "NoSlip1D"
    }

    fn default_counts(&self) -> EquationCounts {
        EquationCounts::nonholonomic(1)
    }

    fn constrained_bodies(&self) -> SmallVec<[BodyId; 4]> {
        let mut bodies = smallvec![self.case_body];
        for body in [self.moving_body0, self.moving_body1] {
            if !bodies.contains(&body) {
                bodies.push(body);
            }
        }
        bodies
    }

    fn velocity_errors(&self, k: &ConstraintKinematics<'_>, verr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Nonholonomic, 1, verr.len())?;
        let [_, b0, b1] = self.locals();
        let (p_p0, p_p1) = self.stations(k)?;
        let v0 = k.station_velocity(b0, &p_p0)?;
        let v1 = k.station_velocity(b1, &p_p1)?;
        verr[0] = (v1 - v0).dot(&self.direction_in_ancestor(k)?);
        Ok(())
    }

    fn velocity_dot_errors(&self, k: &ConstraintKinematics<'_>, vaerr: &mut [f64]) -> Result<()> {
        expect_count(EquationCategory::Nonholonomic, 1, vaerr.len())?;
        let [case, b0, b1] = self.locals();
        let (p_p0, p_p1) = self.stations(k)?;
        let v = k.station_velocity(b1, &p_p1)? - k.station_velocity(b0, &p_p0)?;
        let a = k.station_acceleration(b1, &p_p1)? - k.station_acceleration(b0, &p_p0)?;
        let w_ac = k.body_angular_velocity(case)?;
        vaerr[0] = (a - w_ac.cross(&v)).dot(&self.direction_in_ancestor(k)?);
        Ok(())
    }

    fn apply_velocity_forces(
        &self,
        k: &ConstraintKinematics<'_>,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        expect_count(EquationCategory::Nonholonomic, 1, lambda.len())?;
        let [_, b0, b1] = self.locals();
        let (p_p0, p_p1) = self.stations(k)?;
        let force = lambda[0] * self.direction_in_ancestor(k)?;
        k.add_in_station_force(b1, &p_p1, &force, &mut forces.body_forces)?;
        k.add_in_station_force(b0, &p_p0, &-force, &mut forces.body_forces)
    }
}
