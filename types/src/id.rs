//! Identity newtypes for participants and sessions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of an actor capable of engaging in combat sessions.
///
/// The host environment owns the mapping between these ids and its own
/// notion of a connected user or entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "participant:{}", self.0)
    }
}

/// Unique id of one combat session.
///
/// Never reused for the lifetime of the process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(ParticipantId(7).to_string(), "participant:7");
        assert_eq!(SessionId(42).to_string(), "session:42");
    }
}
