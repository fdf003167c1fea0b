//! Realization stages.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Readiness level of a state in the realization pipeline.
///
/// Stages are strictly ordered; realizing a stage requires every earlier
/// stage to have been realized, and invalidating a stage invalidates every
/// later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Stage {
    /// Nothing realized yet.
    #[default]
    Empty,
    /// Structure frozen; topology caches computed.
    Topology,
    /// Modeling choices resolved; equation counts and slots assigned.
    Model,
    /// Instance parameters fixed.
    Instance,
    /// Time-dependent quantities available.
    Time,
    /// Body transforms available.
    Position,
    /// Body velocities available.
    Velocity,
    /// Body accelerations and multipliers available.
    Acceleration,
}

impl Stage {
    /// All stages in realization order.
    pub const ALL: [Self; 8] = [
        Self::Empty,
        Self::Topology,
        Self::Model,
        Self::Instance,
        Self::Time,
        Self::Position,
        Self::Velocity,
        Self::Acceleration,
    ];

    /// The stage that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let i = self as usize;
        Self::ALL.get(i + 1).copied()
    }

    /// The stage that precedes this one, if any.
    #[must_use]
    pub fn prev(self) -> Option<Self> {
        let i = self as usize;
        i.checked_sub(1).map(|j| Self::ALL[j])
    }

    /// Stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Topology => "Topology",
            Self::Model => "Model",
            Self::Instance => "Instance",
            Self::Time => "Time",
            Self::Position => "Position",
            Self::Velocity => "Velocity",
            Self::Acceleration => "Acceleration",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Topology < Stage::Model);
        assert!(Stage::Velocity < Stage::Acceleration);
        assert_eq!(Stage::Empty.next(), Some(Stage::Topology));
        assert_eq!(Stage::Acceleration.next(), None);
        assert_eq!(Stage::Empty.prev(), None);
        assert_eq!(Stage::Position.prev(), Some(Stage::Time));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Instance.to_string(), "Instance");
    }
}
