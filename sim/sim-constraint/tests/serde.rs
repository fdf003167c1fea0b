//! Built-in kinds persist through serde; custom kinds do not.

#![cfg(feature = "serde")]

use nalgebra::{Point3, Quaternion, UnitQuaternion, Vector3};
use sim_constraint::{ConstraintKind, KindVariant, NoSlip1D, Weld};
use sim_types::{BodyId, Pose};

#[test]
fn weld_survives_json() {
    let weld = Weld::new(BodyId::new(1), BodyId::new(2)).with_frames(
        Pose::from_position(Point3::new(0.1, 0.2, 0.3)),
        // Short decimals so the JSON text is exact.
        Pose::from_rotation(UnitQuaternion::new_unchecked(Quaternion::new(
            0.6, 0.0, 0.8, 0.0,
        ))),
    );
    let kind = ConstraintKind::from(weld.clone());

    let json = serde_json::to_string(&kind).expect("serialize");
    let back: ConstraintKind = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.name(), "Weld");
    assert_eq!(Weld::from_kind(&back), Some(&weld));
}

#[test]
fn no_slip_keeps_contact_geometry() {
    let no_slip = NoSlip1D::new(
        BodyId::GROUND,
        Point3::new(1.0, 0.0, 0.0),
        Vector3::y_axis(),
        BodyId::new(1),
        BodyId::new(2),
    );
    let json = serde_json::to_value(ConstraintKind::from(no_slip.clone())).expect("serialize");
    assert!(json.get("NoSlip1D").is_some());

    let back: ConstraintKind = serde_json::from_value(json).expect("deserialize");
    assert_eq!(NoSlip1D::from_kind(&back), Some(&no_slip));
}
