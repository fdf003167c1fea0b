//! Stage ordering, slot layout and error reporting across a constraint set.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use sim_constraint::{
    Ball, ConstantSpeed, ConstrainedBodyIndex, ConstraintEquations, ConstraintError,
    ConstraintForces, ConstraintId, ConstraintKind, ConstraintKinematics, ConstraintSet,
    EquationCategory, EquationCounts, KinematicSnapshot, Result, Rod,
};
use sim_types::{BodyId, Pose, SpatialAcceleration, Stage};
use smallvec::{smallvec, SmallVec};

// ============================================================================
// Fixtures
// ============================================================================

/// Holds one body's angular acceleration about Ground z at a target value.
#[derive(Debug)]
struct SpinRate {
    body: BodyId,
    target: f64,
}

const SPINNER: ConstrainedBodyIndex = ConstrainedBodyIndex::new(0);

impl ConstraintEquations for SpinRate {
    fn kind_name(&self) -> &'static str {
        "SpinRate"
    }

    fn default_counts(&self) -> EquationCounts {
        EquationCounts::new(0, 0, 1)
    }

    fn constrained_bodies(&self) -> SmallVec<[BodyId; 4]> {
        smallvec![self.body]
    }

    fn acceleration_errors(&self, k: &ConstraintKinematics<'_>, aerr: &mut [f64]) -> Result<()> {
        aerr[0] = k.body_angular_acceleration(SPINNER)?.z - self.target;
        Ok(())
    }

    fn apply_acceleration_forces(
        &self,
        _k: &ConstraintKinematics<'_>,
        lambda: &[f64],
        forces: &mut ConstraintForces,
    ) -> Result<()> {
        forces.body_forces[0].torque.z += lambda[0];
        Ok(())
    }
}

struct Fixture {
    snapshot: KinematicSnapshot,
    set: ConstraintSet,
    ball: ConstraintId,
    rod: ConstraintId,
    speed: ConstraintId,
    spin: ConstraintId,
    totals: EquationCounts,
}

/// A ball and a rod between two free bodies, a speed-driven wheel and a
/// spin-rate constraint on the wheel, realized through Model.
fn fixture() -> Fixture {
    let mut snapshot = KinematicSnapshot::new();
    let a = snapshot.add_body(BodyId::GROUND, 7, 6).expect("body");
    let b = snapshot.add_body(BodyId::GROUND, 7, 6).expect("body");
    let wheel = snapshot.add_body(BodyId::GROUND, 1, 1).expect("body");
    snapshot
        .set_pose(b, Pose::from_position(Point3::new(0.0, 3.0, 0.0)))
        .expect("pose");

    let mut set = ConstraintSet::new();
    let speed = set.add(ConstantSpeed::new(wheel, 1.0)).expect("speed");
    let spin = set
        .add(ConstraintKind::custom(SpinRate {
            body: wheel,
            target: 0.5,
        }))
        .expect("spin");
    let ball = set.add(Ball::new(a, b)).expect("ball");
    let rod = set.add(Rod::new(a, b, 1.0)).expect("rod");

    set.realize_topology(&snapshot).expect("topology");
    snapshot.set_stage(Stage::Model);
    let totals = set.realize_model(&snapshot).expect("model");

    Fixture {
        snapshot,
        set,
        ball,
        rod,
        speed,
        spin,
        totals,
    }
}

fn numbered(start: f64, len: usize) -> Vec<f64> {
    (0..len).map(|i| start + i as f64).collect()
}

// ============================================================================
// Slot layout
// ============================================================================

#[test]
fn slots_follow_category_then_registration_order() {
    let f = fixture();
    assert_eq!(f.totals, EquationCounts::new(4, 1, 1));

    let model = |id| f.set.get(id).expect("constraint").equation_set().expect("model");
    assert_eq!(model(f.ball).holonomic_offset(), Some(0));
    assert_eq!(model(f.rod).holonomic_offset(), Some(3));
    assert_eq!(model(f.speed).holonomic_offset(), None);
    // Nonholonomic equations follow every holonomic one.
    assert_eq!(model(f.speed).nonholonomic_offset(), Some(4));
    assert_eq!(model(f.spin).acceleration_only_offset(), Some(5));

    let speed = f.set.get(f.speed).expect("speed");
    let relative = speed.constraint_equation_slots().expect("model");
    assert_eq!(relative.nonholo0, Some(0));
    assert_eq!(relative.holo0, None);
}

#[test]
fn accessors_read_the_constraint_block() {
    let mut f = fixture();
    f.snapshot.set_qerr(numbered(0.0, 4));
    f.snapshot.set_uerr(numbered(10.0, 5));
    f.snapshot.set_udoterr(numbered(20.0, 6));
    f.snapshot.set_multipliers(numbered(30.0, 6));
    f.snapshot.set_stage(Stage::Acceleration);

    let ball = f.set.get(f.ball).expect("ball");
    let rod = f.set.get(f.rod).expect("rod");
    let speed = f.set.get(f.speed).expect("speed");
    let spin = f.set.get(f.spin).expect("spin");

    let mut three = [0.0; 3];
    ball.position_errors(&f.snapshot, 3, &mut three)
        .expect("ball qerr");
    assert_eq!(three, [0.0, 1.0, 2.0]);
    ball.multipliers(&f.snapshot, 3, &mut three)
        .expect("ball multipliers");
    assert_eq!(three, [30.0, 31.0, 32.0]);

    let mut one = [0.0; 1];
    rod.position_errors(&f.snapshot, 1, &mut one).expect("rod qerr");
    assert_eq!(one, [3.0]);
    rod.velocity_errors(&f.snapshot, 1, &mut one).expect("rod uerr");
    assert_eq!(one, [13.0]);

    speed
        .velocity_errors(&f.snapshot, 1, &mut one)
        .expect("speed uerr");
    assert_eq!(one, [14.0]);
    speed
        .acceleration_errors(&f.snapshot, 1, &mut one)
        .expect("speed udoterr");
    assert_eq!(one, [24.0]);

    spin.acceleration_errors(&f.snapshot, 1, &mut one)
        .expect("spin udoterr");
    assert_eq!(one, [25.0]);
    spin.multipliers(&f.snapshot, 1, &mut one)
        .expect("spin multipliers");
    assert_eq!(one, [35.0]);
}

#[test]
fn realized_arrays_agree_with_per_constraint_errors() {
    let mut f = fixture();
    let wheel_spin = SpatialAcceleration::new(Vector3::new(0.0, 0.0, 2.0), Vector3::zeros());
    let wheel = BodyId::new(3);
    f.snapshot
        .set_acceleration(wheel, wheel_spin)
        .expect("acceleration");
    f.snapshot.u_mut()[12] = 1.75;
    f.snapshot.set_stage(Stage::Acceleration);

    let mut qerr = vec![0.0; f.totals.mp];
    let mut uerr = vec![0.0; f.totals.velocity_level()];
    let mut udoterr = vec![0.0; f.totals.total()];
    f.set.realize_position(&f.snapshot, &mut qerr).expect("qerr");
    f.set.realize_velocity(&f.snapshot, &mut uerr).expect("uerr");
    f.set
        .realize_acceleration(&f.snapshot, &mut udoterr)
        .expect("udoterr");

    // Ball: the follower origin sits 3 along y from the base origin.
    assert_relative_eq!(qerr[1], 3.0, epsilon = 1e-12);
    // Rod: (3² − 1²) / 2.
    assert_relative_eq!(qerr[3], 4.0, epsilon = 1e-12);
    assert_relative_eq!(uerr[4], 0.75, epsilon = 1e-12);
    assert_relative_eq!(udoterr[5], 1.5, epsilon = 1e-12);

    f.snapshot.set_qerr(qerr.clone());
    let rod = f.set.get(f.rod).expect("rod");
    let mut from_array = [0.0; 1];
    let mut direct = [0.0; 1];
    rod.position_errors(&f.snapshot, 1, &mut from_array)
        .expect("gather");
    rod.calc_position_errors(&f.snapshot, 1, &mut direct)
        .expect("calc");
    assert_relative_eq!(from_array[0], direct[0]);
}

#[test]
fn single_body_constraint_is_measured_from_its_parent() {
    let f = fixture();
    let spin = f.set.get(f.spin).expect("spin");
    assert_eq!(spin.ancestor_body(), Ok(BodyId::GROUND));

    let mut snapshot = KinematicSnapshot::new();
    let hub = snapshot.add_body(BodyId::GROUND, 1, 1).expect("body");
    let rim = snapshot.add_body(hub, 1, 1).expect("body");
    let mut set = ConstraintSet::new();
    let id = set
        .add(ConstraintKind::custom(SpinRate {
            body: rim,
            target: 0.0,
        }))
        .expect("spin");
    set.realize_topology(&snapshot).expect("topology");

    // The rim spins with the hub: zero relative to its parent.
    let hub_spin = SpatialAcceleration::new(Vector3::new(0.0, 0.0, 3.0), Vector3::zeros());
    snapshot.set_acceleration(hub, hub_spin).expect("hub");
    snapshot.set_acceleration(rim, hub_spin).expect("rim");
    snapshot.set_stage(Stage::Model);
    set.realize_model(&snapshot).expect("model");
    snapshot.set_stage(Stage::Acceleration);

    let constraint = set.get(id).expect("spin");
    assert_eq!(constraint.ancestor_body(), Ok(hub));
    let mut aerr = [0.0; 1];
    constraint
        .calc_acceleration_errors(&snapshot, 1, &mut aerr)
        .expect("aerr");
    assert_relative_eq!(aerr[0], 0.0, epsilon = 1e-12);
}

#[test]
fn custom_kind_applies_acceleration_forces() {
    let mut f = fixture();
    f.snapshot.set_stage(Stage::Position);
    let spin = f.set.get(f.spin).expect("spin");
    assert_eq!(spin.kind().name(), "SpinRate");

    let forces = spin
        .calc_constraint_forces_from_multipliers(&f.snapshot, 0, 0, 1, &[2.5])
        .expect("forces");
    assert_eq!(forces.body_forces.len(), 1);
    assert_relative_eq!(forces.body_forces[0].torque, Vector3::new(0.0, 0.0, 2.5));
    assert!(forces.mobility_forces.is_empty());
}

// ============================================================================
// Error reporting
// ============================================================================

#[test]
fn count_mismatch_is_a_configuration_error() {
    let mut f = fixture();
    f.snapshot.set_qerr(numbered(0.0, 4));
    f.snapshot.set_stage(Stage::Position);
    let rod = f.set.get(f.rod).expect("rod");

    let mut two = [0.0; 2];
    let err = rod
        .position_errors(&f.snapshot, 2, &mut two)
        .expect_err("rod has one equation");
    assert!(err.is_configuration_error());
    assert_eq!(
        err,
        ConstraintError::EquationCountMismatch {
            category: EquationCategory::Holonomic,
            expected: 2,
            actual: 1,
        }
    );

    let err = rod
        .calc_position_errors(&f.snapshot, 1, &mut two)
        .expect_err("buffer too long");
    assert!(matches!(err, ConstraintError::BufferSizeMismatch { .. }));
}

#[test]
fn stage_preconditions() {
    let mut f = fixture();
    f.snapshot.set_stage(Stage::Position);
    let speed = f.set.get(f.speed).expect("speed");

    let mut one = [0.0; 1];
    let err = speed
        .calc_velocity_errors(&f.snapshot, 1, &mut one)
        .expect_err("velocity not realized");
    assert!(err.is_precondition_error());
    assert_eq!(
        err,
        ConstraintError::StageNotRealized {
            required: Stage::Velocity,
            realized: Stage::Position,
        }
    );

    let mut uerr = vec![0.0; f.totals.velocity_level()];
    assert!(f
        .set
        .realize_velocity(&f.snapshot, &mut uerr)
        .expect_err("velocity not realized")
        .is_precondition_error());

    f.snapshot.set_stage(Stage::Time);
    assert!(f.set.realize_time(&f.snapshot).is_ok());
    let mut qerr = vec![0.0; f.totals.mp];
    assert!(f
        .set
        .realize_position(&f.snapshot, &mut qerr)
        .expect_err("position not realized")
        .is_precondition_error());
}

#[test]
fn queries_before_realization_fail() {
    let mut snapshot = KinematicSnapshot::new();
    let a = snapshot.add_body(BodyId::GROUND, 7, 6).expect("body");
    let b = snapshot.add_body(a, 7, 6).expect("body");

    let mut set = ConstraintSet::new();
    let id = set.add(Rod::new(a, b, 1.0)).expect("add");
    let rod = set.get(id).expect("rod");
    assert_eq!(rod.ancestor_body(), Err(ConstraintError::TopologyNotRealized));
    assert_eq!(
        rod.num_constraint_equations(),
        Err(ConstraintError::ModelNotRealized)
    );

    set.realize_topology(&snapshot).expect("topology");
    // The model stage needs a state realized through Model.
    assert!(set
        .realize_model(&snapshot)
        .expect_err("state at Empty")
        .is_precondition_error());

    let rod = set.get(id).expect("rod");
    assert_eq!(rod.ancestor_body(), Ok(a));
    assert_eq!(
        rod.kinematics(&snapshot).map(|_| ()),
        Err(ConstraintError::ModelNotRealized)
    );
}

#[test]
fn realized_topology_is_frozen_until_invalidated() {
    let mut f = fixture();
    let extra = f.snapshot.add_body(BodyId::GROUND, 0, 0).expect("body");

    let err = f
        .set
        .add_constrained_body(f.rod, extra)
        .expect_err("topology frozen");
    assert!(err.is_configuration_error());
    assert!(matches!(err, ConstraintError::TopologyFrozen { .. }));

    f.set.invalidate_topology(f.rod).expect("invalidate");
    let local = f.set.add_constrained_body(f.rod, extra).expect("add body");
    assert_eq!(local.index(), 2);
    assert!(f.set.total_counts().is_err());

    f.set.realize_topology(&f.snapshot).expect("topology");
    f.snapshot.set_stage(Stage::Model);
    assert_eq!(
        f.set.realize_model(&f.snapshot).expect("model"),
        EquationCounts::new(4, 1, 1)
    );
}

#[test]
fn generalized_force_conversion_is_unimplemented() {
    let mut f = fixture();
    f.snapshot.set_stage(Stage::Position);
    let rod = f.set.get(f.rod).expect("rod");

    let err = rod
        .calc_g_transpose_lambda(&f.snapshot, 1, 0, 0, &[1.0])
        .expect_err("needs the mobility Jacobian");
    assert!(err.is_unimplemented());
    assert!(!err.is_configuration_error());
}
