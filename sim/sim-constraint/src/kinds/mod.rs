//! Built-in constraint kinds.
//!
//! | Kind | mp | mv | Bodies |
//! |------|----|----|--------|
//! | [`Rod`] | 1 | 0 | body1, body2 |
//! | [`PointInPlane`] | 1 | 0 | plane, follower |
//! | [`PointOnLine`] | 2 | 0 | line, follower |
//! | [`ConstantAngle`] | 1 | 0 | base, follower |
//! | [`Ball`] | 3 | 0 | base, follower |
//! | [`ConstantOrientation`] | 3 | 0 | base, follower |
//! | [`Weld`] | 6 | 0 | base, follower |
//! | [`NoSlip1D`] | 0 | 1 | case, moving0, moving1 |
//! | [`ConstantSpeed`] | 0 | 1 | one mobilizer |
//!
//! Anything else can be expressed by implementing
//! [`ConstraintEquations`] and wrapping it in [`ConstraintKind::Custom`].

mod ball;
mod constant_angle;
mod constant_orientation;
mod constant_speed;
mod no_slip;
mod point_in_plane;
mod point_on_line;
mod rod;
mod weld;

pub use ball::Ball;
pub use constant_angle::ConstantAngle;
pub use constant_orientation::ConstantOrientation;
pub use constant_speed::ConstantSpeed;
pub use no_slip::NoSlip1D;
pub use point_in_plane::PointInPlane;
pub use point_on_line::PointOnLine;
pub use rod::Rod;
pub use weld::Weld;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::equations::ConstraintEquations;

/// The closed set of constraint kinds, plus one open extension point.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintKind {
    /// Fixed distance between two stations.
    Rod(Rod),
    /// Station confined to a plane.
    PointInPlane(PointInPlane),
    /// Station confined to a line.
    PointOnLine(PointOnLine),
    /// Fixed angle between two axes.
    ConstantAngle(ConstantAngle),
    /// Coincident stations.
    Ball(Ball),
    /// Locked relative orientation.
    ConstantOrientation(ConstantOrientation),
    /// Rigid attachment.
    Weld(Weld),
    /// Rolling without slip along one direction.
    NoSlip1D(NoSlip1D),
    /// Prescribed mobility speed.
    ConstantSpeed(ConstantSpeed),
    /// User-supplied equations.
    #[cfg_attr(feature = "serde", serde(skip))]
    Custom(Box<dyn ConstraintEquations>),
}

impl ConstraintKind {
    /// Wrap user-supplied equations.
    #[must_use]
    pub fn custom(equations: impl ConstraintEquations + 'static) -> Self {
        Self::Custom(Box::new(equations))
    }

    /// The kind's equations.
    #[must_use]
    pub fn equations(&self) -> &dyn ConstraintEquations {
        match self {
            Self::Rod(c) => c,
            Self::PointInPlane(c) => c,
            Self::PointOnLine(c) => c,
            Self::ConstantAngle(c) => c,
            Self::Ball(c) => c,
            Self::ConstantOrientation(c) => c,
            Self::Weld(c) => c,
            Self::NoSlip1D(c) => c,
            Self::ConstantSpeed(c) => c,
            Self::Custom(c) => c.as_ref(),
        }
    }

    /// Short name of the kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.equations().kind_name()
    }
}

/// A built-in kind that can be viewed inside a [`ConstraintKind`].
pub trait KindVariant: ConstraintEquations + Sized {
    /// Kind name, matching [`ConstraintEquations::kind_name`].
    const NAME: &'static str;

    /// Borrow the kind if `kind` holds this variant.
    fn from_kind(kind: &ConstraintKind) -> Option<&Self>;

    /// Mutably borrow the kind if `kind` holds this variant.
    fn from_kind_mut(kind: &mut ConstraintKind) -> Option<&mut Self>;
}

macro_rules! kind_variant {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for ConstraintKind {
                fn from(c: $ty) -> Self {
                    Self::$ty(c)
                }
            }

            impl KindVariant for $ty {
                const NAME: &'static str = stringify!($ty);

                fn from_kind(kind: &ConstraintKind) -> Option<&Self> {
                    match kind {
                        ConstraintKind::$ty(c) => Some(c),
                        _ => None,
                    }
                }

                fn from_kind_mut(kind: &mut ConstraintKind) -> Option<&mut Self> {
                    match kind {
                        ConstraintKind::$ty(c) => Some(c),
                        _ => None,
                    }
                }
            }
        )*
    };
}

kind_variant!(
    Rod,
    PointInPlane,
    PointOnLine,
    ConstantAngle,
    Ball,
    ConstantOrientation,
    Weld,
    NoSlip1D,
    ConstantSpeed,
);

impl From<Box<dyn ConstraintEquations>> for ConstraintKind {
    fn from(equations: Box<dyn ConstraintEquations>) -> Self {
        Self::Custom(equations)
    }
}
