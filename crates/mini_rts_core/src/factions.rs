//! Faction identifiers.

use serde::{Deserialize, Serialize};

/// The two sides of a skirmish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    /// The human-controlled side.
    Player,
    /// The AI-controlled side.
    Enemy,
}

impl Faction {
    /// Both factions, in a stable order.
    pub const ALL: [Self; 2] = [Self::Player, Self::Enemy];

    /// The faction this one fights against.
    #[must_use]
    pub const fn opposing(self) -> Self {
        match self {
            Self::Player => Self::Enemy,
            Self::Enemy => Self::Player,
        }
    }

    /// Get the display name for this faction.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Player => "Player",
            Self::Enemy => "Enemy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposing_is_symmetric() {
        for faction in Faction::ALL {
            assert_ne!(faction, faction.opposing());
            assert_eq!(faction, faction.opposing().opposing());
        }
    }
}
