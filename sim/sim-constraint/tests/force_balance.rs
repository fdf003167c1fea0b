//! Constraint forces are internal and do the work the multipliers predict.
//!
//! For every kind that acts through body forces, the forces a multiplier
//! vector produces must sum to zero (force and moment about the ancestor
//! origin), and their power on the current body velocities must equal
//! `λ · pverr` for holonomic equations or `λ · verr` for nonholonomic ones.

mod common;

use approx::assert_relative_eq;
use common::{random_point, random_rotation, random_unit, Mechanism, RigidTrajectory};
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sim_constraint::{
    Ball, ConstantAngle, ConstantOrientation, ConstrainedBodyIndex, Constraint, ConstraintKind,
    ConstraintSet, MatterState, NoSlip1D, PointInPlane, PointOnLine, Result, Rod, Weld,
};
use sim_types::{BodyId, Pose};

const TOLERANCE: f64 = 1e-9;

type ErrorFn = fn(&Constraint, &dyn MatterState, usize, &mut [f64]) -> Result<()>;

fn random_frame(rng: &mut StdRng) -> Pose {
    Pose::from_position_rotation(random_point(rng, 0.5), random_rotation(rng))
}

/// Every body-force kind between bodies hanging off a moving carrier.
fn random_constraints(
    rng: &mut StdRng,
    carrier: BodyId,
    b1: BodyId,
    b2: BodyId,
) -> Vec<ConstraintKind> {
    vec![
        Rod::new(b1, b2, rng.gen_range(0.5..2.0))
            .with_points(random_point(rng, 0.5), random_point(rng, 0.5))
            .into(),
        PointInPlane::new(b1, random_unit(rng), 0.3, b2)
            .with_follower_point(random_point(rng, 0.5))
            .into(),
        PointOnLine::new(b2, random_unit(rng), b1)
            .with_point_on_line(random_point(rng, 0.5))
            .with_follower_point(random_point(rng, 0.5))
            .into(),
        ConstantAngle::new(b1, random_unit(rng), b2, random_unit(rng))
            .with_angle(rng.gen_range(0.2..3.0))
            .into(),
        Ball::new(b1, b2)
            .with_points(random_point(rng, 0.5), random_point(rng, 0.5))
            .into(),
        Ball::new(BodyId::GROUND, b2)
            .with_points(random_point(rng, 0.5), random_point(rng, 0.5))
            .into(),
        ConstantOrientation::new(b2, b1)
            .with_frames(random_rotation(rng), random_rotation(rng))
            .into(),
        Weld::new(carrier, b1)
            .with_frames(random_frame(rng), random_frame(rng))
            .into(),
        NoSlip1D::new(carrier, random_point(rng, 0.5), random_unit(rng), b1, b2).into(),
        NoSlip1D::new(b1, random_point(rng, 0.5), random_unit(rng), b1, b2).into(),
    ]
}

fn errors(constraint: &Constraint, mechanism: &Mechanism, count: usize, calc: ErrorFn) -> Vec<f64> {
    let mut out = vec![0.0; count];
    calc(constraint, &mechanism.snapshot, count, &mut out).expect("errors");
    out
}

fn check_balance(constraint: &Constraint, mechanism: &Mechanism, lambda: &[f64]) {
    let counts = constraint.num_constraint_equations().expect("model");
    let lambda = &lambda[..counts.total()];
    let forces = constraint
        .calc_constraint_forces_from_multipliers(
            &mechanism.snapshot,
            counts.mp,
            counts.mv,
            counts.ma,
            lambda,
        )
        .expect("forces");
    assert!(forces.mobility_forces.is_empty());

    let k = constraint.kinematics(&mechanism.snapshot).expect("kinematics");
    let resultant = k.resultant(&forces.body_forces).expect("resultant");
    assert_relative_eq!(resultant.force, Vector3::zeros(), epsilon = TOLERANCE);
    assert_relative_eq!(resultant.torque, Vector3::zeros(), epsilon = TOLERANCE);

    let mut power = 0.0;
    for (i, wrench) in forces.body_forces.iter().enumerate() {
        let twist = k
            .body_velocity(ConstrainedBodyIndex::new(i))
            .expect("velocity");
        power += wrench.torque.dot(&twist.angular) + wrench.force.dot(&twist.linear);
    }

    let pverr = errors(constraint, mechanism, counts.mp, Constraint::calc_position_dot_errors);
    let verr = errors(constraint, mechanism, counts.mv, Constraint::calc_velocity_errors);
    let (holonomic, nonholonomic) = lambda.split_at(counts.mp);
    let expected: f64 = holonomic.iter().zip(&pverr).map(|(l, e)| l * e).sum::<f64>()
        + nonholonomic.iter().zip(&verr).map(|(l, e)| l * e).sum::<f64>();
    assert_relative_eq!(power, expected, epsilon = TOLERANCE);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn constraint_forces_balance(
        seed in any::<u64>(),
        lambda in prop::collection::vec(-10.0..10.0f64, 6),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut mechanism = Mechanism::new();
        let carrier = mechanism.add_body(BodyId::GROUND, RigidTrajectory::random(&mut rng));
        let b1 = mechanism.add_body(carrier, RigidTrajectory::random(&mut rng));
        let b2 = mechanism.add_body(carrier, RigidTrajectory::random(&mut rng));

        let mut set = ConstraintSet::new();
        for kind in random_constraints(&mut rng, carrier, b1, b2) {
            set.add(kind).expect("add");
        }
        mechanism.realize(&mut set, 0.4);

        for constraint in &set {
            check_balance(constraint, &mechanism, &lambda);
        }
    }
}

#[test]
fn rod_force_acts_along_the_rod() {
    let mut mechanism = Mechanism::new();
    let b1 = mechanism.add_body(BodyId::GROUND, RigidTrajectory::fixed(Pose::identity()));
    let b2 = mechanism.add_body(
        BodyId::GROUND,
        RigidTrajectory::fixed(Pose::from_position(Point3::new(0.0, 2.0, 0.0))),
    );

    let mut set = ConstraintSet::new();
    let id = set.add(Rod::new(b1, b2, 1.0)).expect("add");
    mechanism.realize(&mut set, 0.0);
    let rod = set.get(id).expect("rod");

    let forces = rod
        .calc_constraint_forces_from_multipliers(&mechanism.snapshot, 1, 0, 0, &[0.5])
        .expect("forces");
    // λ (p2 − p1) on body 2, the opposite on body 1.
    assert_relative_eq!(forces.body_forces[1].force, Vector3::new(0.0, 1.0, 0.0));
    assert_relative_eq!(forces.body_forces[0].force, Vector3::new(0.0, -1.0, 0.0));
    assert_relative_eq!(forces.body_forces[0].torque, Vector3::zeros());
}
