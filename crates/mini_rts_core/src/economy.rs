//! Faction resource ledgers and base income.

use serde::{Deserialize, Serialize};

use crate::entity::BuildingKind;
use crate::events::SimEvent;
use crate::factions::Faction;
use crate::world::WorldState;

/// A faction's resource counter.
///
/// An unlimited ledger (the AI side) always affords, and credits and
/// debits leave it unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Ledger {
    balance: u32,
    unlimited: bool,
}

impl Ledger {
    /// Create a ledger with a starting balance.
    #[must_use]
    pub const fn new(balance: u32) -> Self {
        Self {
            balance,
            unlimited: false,
        }
    }

    /// Create an unlimited ledger.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            balance: 0,
            unlimited: true,
        }
    }

    /// Current balance (always 0 for unlimited ledgers).
    #[must_use]
    pub const fn balance(&self) -> u32 {
        self.balance
    }

    /// Whether this ledger never runs out.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.unlimited
    }

    /// What can be spent right now.
    #[must_use]
    pub const fn available(&self) -> u32 {
        if self.unlimited {
            u32::MAX
        } else {
            self.balance
        }
    }

    /// Check if the ledger can cover a cost.
    #[must_use]
    pub const fn can_afford(&self, cost: u32) -> bool {
        self.unlimited || self.balance >= cost
    }

    /// Add resources, returning the amount actually credited.
    pub fn credit(&mut self, amount: u32) -> u32 {
        if self.unlimited {
            return 0;
        }
        let before = self.balance;
        self.balance = self.balance.saturating_add(amount);
        self.balance - before
    }

    /// Spend resources if available.
    ///
    /// Returns true if the transaction succeeded.
    pub fn debit(&mut self, cost: u32) -> bool {
        if self.unlimited {
            return true;
        }
        if self.balance >= cost {
            self.balance -= cost;
            true
        } else {
            false
        }
    }
}

/// Ledgers for both factions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ledgers {
    /// The player's ledger.
    pub player: Ledger,
    /// The AI's ledger.
    pub enemy: Ledger,
}

impl Ledgers {
    /// Player starts with `starting_resources`; the AI side is unlimited.
    #[must_use]
    pub const fn new(starting_resources: u32) -> Self {
        Self {
            player: Ledger::new(starting_resources),
            enemy: Ledger::unlimited(),
        }
    }

    /// Ledger for a faction.
    #[must_use]
    pub const fn get(&self, faction: Faction) -> &Ledger {
        match faction {
            Faction::Player => &self.player,
            Faction::Enemy => &self.enemy,
        }
    }

    /// Mutable ledger for a faction.
    pub fn get_mut(&mut self, faction: Faction) -> &mut Ledger {
        match faction {
            Faction::Player => &mut self.player,
            Faction::Enemy => &mut self.enemy,
        }
    }
}

/// Credit the periodic income: `base_income` per constructed base.
pub fn apply_base_income(world: &mut WorldState) {
    let per_base = world.config().base_income;
    if per_base == 0 {
        return;
    }

    for faction in Faction::ALL {
        let bases = world
            .buildings(faction)
            .iter()
            .filter_map(|id| world.entities().building(*id))
            .filter(|b| b.kind == BuildingKind::Base && b.is_built())
            .count();
        if bases == 0 {
            continue;
        }

        let amount = per_base.saturating_mul(u32::try_from(bases).unwrap_or(u32::MAX));
        let credited = world.ledger_mut(faction).credit(amount);
        if credited > 0 {
            tracing::trace!(faction = faction.display_name(), credited, "Base income");
            world.push_event(SimEvent::IncomeCredited {
                faction,
                amount: credited,
            });
        }
    }
}
