//! Analytic error derivatives against central finite differences.
//!
//! For every kind, `pverr` must be the time derivative of `perr` and
//! `paerr` that of `pverr` along a rigid trajectory; likewise `vaerr` for
//! `verr`. Kinds whose velocity error is measured at the base body's
//! coincident material point (Ball, the translational block of Weld) and
//! NoSlip1D's moving bodies are only exact derivatives when those bodies do
//! not rotate, so their trajectories are chosen accordingly.

mod common;

use approx::assert_relative_eq;
use common::{random_point, random_rotation, random_unit, Mechanism, RigidTrajectory};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sim_constraint::{
    Ball, ConstantAngle, ConstantOrientation, Constraint, ConstraintId, ConstraintKind,
    ConstraintSet, NoSlip1D, PointInPlane, PointOnLine, Rod, Weld,
};
use sim_types::{BodyId, Pose};

const STEP: f64 = 1e-4;
const TOLERANCE: f64 = 1e-6;
const SEEDS: [u64; 4] = [1, 7, 42, 2024];
const T: f64 = 0.3;

type Errors<'a> = dyn Fn(&Constraint, &Mechanism) -> Vec<f64> + 'a;

fn central_difference(
    mechanism: &mut Mechanism,
    constraint: &Constraint,
    errors: &Errors<'_>,
) -> Vec<f64> {
    mechanism.set_time(T + STEP);
    let ahead = errors(constraint, mechanism);
    mechanism.set_time(T - STEP);
    let behind = errors(constraint, mechanism);
    mechanism.set_time(T);
    ahead
        .iter()
        .zip(&behind)
        .map(|(a, b)| (a - b) / (2.0 * STEP))
        .collect()
}

fn assert_derivative(
    mechanism: &mut Mechanism,
    constraint: &Constraint,
    value: &Errors<'_>,
    derivative: &Errors<'_>,
) {
    let numeric = central_difference(mechanism, constraint, value);
    let analytic = derivative(constraint, mechanism);
    assert_eq!(numeric.len(), analytic.len());
    for (n, a) in numeric.iter().zip(&analytic) {
        assert_relative_eq!(*n, *a, epsilon = TOLERANCE);
    }
}

fn perr(c: &Constraint, m: &Mechanism) -> Vec<f64> {
    let mp = c.num_constraint_equations().expect("model").mp;
    let mut out = vec![0.0; mp];
    c.calc_position_errors(&m.snapshot, mp, &mut out)
        .expect("perr");
    out
}

fn pverr(c: &Constraint, m: &Mechanism) -> Vec<f64> {
    let mp = c.num_constraint_equations().expect("model").mp;
    let mut out = vec![0.0; mp];
    c.calc_position_dot_errors(&m.snapshot, mp, &mut out)
        .expect("pverr");
    out
}

fn paerr(c: &Constraint, m: &Mechanism) -> Vec<f64> {
    let mp = c.num_constraint_equations().expect("model").mp;
    let mut out = vec![0.0; mp];
    c.calc_position_dot_dot_errors(&m.snapshot, mp, &mut out)
        .expect("paerr");
    out
}

fn verr(c: &Constraint, m: &Mechanism) -> Vec<f64> {
    let mv = c.num_constraint_equations().expect("model").mv;
    let mut out = vec![0.0; mv];
    c.calc_velocity_errors(&m.snapshot, mv, &mut out)
        .expect("verr");
    out
}

fn vaerr(c: &Constraint, m: &Mechanism) -> Vec<f64> {
    let mv = c.num_constraint_equations().expect("model").mv;
    let mut out = vec![0.0; mv];
    c.calc_velocity_dot_errors(&m.snapshot, mv, &mut out)
        .expect("vaerr");
    out
}

/// Realize a single constraint and check every derivative it defines,
/// returning the constraint's ancestor.
fn check(mut mechanism: Mechanism, kind: impl Into<ConstraintKind>) -> BodyId {
    let mut set = ConstraintSet::new();
    let id = set.add(kind).expect("add");
    mechanism.realize(&mut set, T);
    let constraint = set.get(id).expect("constraint");
    let counts = constraint.num_constraint_equations().expect("model");

    if counts.mp > 0 {
        assert_derivative(&mut mechanism, constraint, &perr, &pverr);
        assert_derivative(&mut mechanism, constraint, &pverr, &paerr);
    }
    if counts.mv > 0 {
        assert_derivative(&mut mechanism, constraint, &verr, &vaerr);
    }
    constraint.ancestor_body().expect("topology")
}

/// Two freely moving bodies hanging off Ground.
fn free_pair(rng: &mut StdRng) -> (Mechanism, BodyId, BodyId) {
    let mut mechanism = Mechanism::new();
    let b1 = mechanism.add_body(BodyId::GROUND, RigidTrajectory::random(rng));
    let b2 = mechanism.add_body(BodyId::GROUND, RigidTrajectory::random(rng));
    (mechanism, b1, b2)
}

/// A translating base and a freely moving follower.
fn translating_base(rng: &mut StdRng) -> (Mechanism, BodyId, BodyId) {
    let mut mechanism = Mechanism::new();
    let base = mechanism.add_body(BodyId::GROUND, RigidTrajectory::translating(rng));
    let follower = mechanism.add_body(BodyId::GROUND, RigidTrajectory::random(rng));
    (mechanism, base, follower)
}

#[test]
fn rod_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let (mechanism, b1, b2) = free_pair(&mut rng);
        let rod = Rod::new(b1, b2, rng.gen_range(0.5..2.0))
            .with_points(random_point(&mut rng, 0.5), random_point(&mut rng, 0.5));
        check(mechanism, rod);
    }
}

#[test]
fn rod_derivatives_under_moving_ancestor() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut mechanism = Mechanism::new();
        let carrier = mechanism.add_body(BodyId::GROUND, RigidTrajectory::random(&mut rng));
        let b1 = mechanism.add_body(carrier, RigidTrajectory::random(&mut rng));
        let b2 = mechanism.add_body(carrier, RigidTrajectory::random(&mut rng));
        let rod = Rod::new(b1, b2, 1.0)
            .with_points(random_point(&mut rng, 0.5), random_point(&mut rng, 0.5));
        assert_eq!(check(mechanism, rod), carrier);
    }
}

#[test]
fn point_in_plane_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let (mechanism, plane, follower) = free_pair(&mut rng);
        let constraint = PointInPlane::new(plane, random_unit(&mut rng), 0.2, follower)
            .with_follower_point(random_point(&mut rng, 0.5));
        check(mechanism, constraint);
    }
}

#[test]
fn point_on_line_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let (mechanism, line, follower) = free_pair(&mut rng);
        let constraint = PointOnLine::new(line, random_unit(&mut rng), follower)
            .with_point_on_line(random_point(&mut rng, 0.5))
            .with_follower_point(random_point(&mut rng, 0.5));
        check(mechanism, constraint);
    }
}

#[test]
fn constant_angle_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let (mechanism, base, follower) = free_pair(&mut rng);
        let constraint = ConstantAngle::new(
            base,
            random_unit(&mut rng),
            follower,
            random_unit(&mut rng),
        )
        .with_angle(rng.gen_range(0.2..3.0));
        check(mechanism, constraint);
    }
}

#[test]
fn ball_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let (mechanism, base, follower) = translating_base(&mut rng);
        let ball = Ball::new(base, follower)
            .with_points(random_point(&mut rng, 0.5), random_point(&mut rng, 0.5));
        check(mechanism, ball);
    }
}

#[test]
fn ball_to_ground_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut mechanism = Mechanism::new();
        let follower = mechanism.add_body(BodyId::GROUND, RigidTrajectory::random(&mut rng));
        let ball = Ball::new(BodyId::GROUND, follower)
            .with_points(random_point(&mut rng, 0.5), random_point(&mut rng, 0.5));
        check(mechanism, ball);
    }
}

#[test]
fn constant_orientation_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let (mechanism, base, follower) = free_pair(&mut rng);
        let constraint = ConstantOrientation::new(base, follower)
            .with_frames(random_rotation(&mut rng), random_rotation(&mut rng));
        check(mechanism, constraint);
    }
}

#[test]
fn weld_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let (mechanism, base, follower) = translating_base(&mut rng);
        let frame = |rng: &mut StdRng| {
            Pose::from_position_rotation(random_point(rng, 0.5), random_rotation(rng))
        };
        let weld = Weld::new(base, follower).with_frames(frame(&mut rng), frame(&mut rng));
        check(mechanism, weld);
    }
}

#[test]
fn no_slip_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut mechanism = Mechanism::new();
        let case = mechanism.add_body(BodyId::GROUND, RigidTrajectory::random(&mut rng));
        let m0 = mechanism.add_body(BodyId::GROUND, RigidTrajectory::translating(&mut rng));
        let m1 = mechanism.add_body(BodyId::GROUND, RigidTrajectory::translating(&mut rng));
        let no_slip = NoSlip1D::new(
            case,
            random_point(&mut rng, 0.5),
            random_unit(&mut rng),
            m0,
            m1,
        );
        check(mechanism, no_slip);
    }
}

#[test]
fn no_slip_with_case_as_moving_body() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut mechanism = Mechanism::new();
        let case = mechanism.add_body(BodyId::GROUND, RigidTrajectory::translating(&mut rng));
        let wheel = mechanism.add_body(BodyId::GROUND, RigidTrajectory::translating(&mut rng));
        let no_slip = NoSlip1D::new(
            case,
            random_point(&mut rng, 0.5),
            random_unit(&mut rng),
            case,
            wheel,
        );

        let mut set = ConstraintSet::new();
        let id = set.add(no_slip.clone()).expect("add");
        assert_eq!(
            set.get(id).expect("no-slip").index_map().num_constrained_bodies(),
            2
        );
        check(mechanism, no_slip);
    }
}

#[test]
fn static_configuration_has_no_velocity_errors() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut mechanism = Mechanism::new();
    let pose = Pose::from_position_rotation(random_point(&mut rng, 1.0), random_rotation(&mut rng));
    let body = mechanism.add_body(BodyId::GROUND, RigidTrajectory::fixed(pose));

    let mut set = ConstraintSet::new();
    let id: ConstraintId = set
        .add(Rod::new(BodyId::GROUND, body, 0.5).with_points(
            random_point(&mut rng, 0.5),
            random_point(&mut rng, 0.5),
        ))
        .expect("add");
    mechanism.realize(&mut set, 0.0);
    let rod = set.get(id).expect("rod");

    assert_relative_eq!(pverr(rod, &mechanism)[0], 0.0, epsilon = 1e-14);
    assert_relative_eq!(paerr(rod, &mechanism)[0], 0.0, epsilon = 1e-14);
    assert!(perr(rod, &mechanism)[0].is_finite());
}
