//! JSON protocol for headless game communication.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** Responses and events
//!
//! Commands act for the player faction, exactly as pointer input would.
//! Positions are world coordinates in decimals.
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. Controller sends commands as JSON lines
//! 3. Orders are answered with `ack` or `rejected`; `tick` answers with
//!    the events it produced
//! 4. `quit` (or end of input) ends the session with `bye`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"select","id":3}
//! <- {"type":"ack","cmd":"select","units":1}
//! -> {"cmd":"harvest","node":1}
//! <- {"type":"ack","cmd":"harvest","units":1}
//! -> {"cmd":"tick","dt":0.5,"count":4}
//! <- {"type":"events","tick":4,"events":[{"event":"harvest_tick",...}]}
//! -> {"cmd":"produce","building":2,"unit":"soldier"}
//! <- {"type":"rejected","cmd":"produce","code":"cannot_produce_unit","message":"..."}
//! -> {"cmd":"quit"}
//! <- {"type":"bye"}
//! ```

use mini_rts_core::entity::{BuildingKind, EntityId, UnitKind};
use mini_rts_core::error::CommandError;
use mini_rts_core::events::SimEvent;
use mini_rts_core::factions::Faction;
use mini_rts_core::input::InputEvent;
use mini_rts_core::math::{fixed_serde, Fixed, Vec2Fixed};
use mini_rts_core::snapshot::WorldSnapshot;
use serde::{Deserialize, Serialize};

/// Protocol version announced in [`Response::Ready`].
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance the simulation `count` times by `dt` seconds each.
    Tick {
        /// Frame time; the runner default when absent.
        #[serde(default)]
        dt: Option<f64>,
        /// Number of ticks.
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Select one owned unit.
    Select {
        /// Unit to select.
        id: EntityId,
        /// Add to the selection instead of replacing it.
        #[serde(default)]
        additive: bool,
    },

    /// Box-select owned units.
    SelectArea {
        /// One corner.
        from: Vec2Fixed,
        /// Opposite corner.
        to: Vec2Fixed,
        /// Add to the selection instead of replacing it.
        #[serde(default)]
        additive: bool,
    },

    /// Move the selection.
    Move {
        /// Destination x.
        #[serde(with = "fixed_serde")]
        x: Fixed,
        /// Destination y.
        #[serde(with = "fixed_serde")]
        y: Fixed,
    },

    /// Attack with the selection.
    Attack {
        /// Entity to attack.
        target: EntityId,
    },

    /// Harvest with the selected workers.
    Harvest {
        /// Resource node.
        node: EntityId,
    },

    /// Enter placement mode.
    BeginBuild {
        /// Building to place.
        kind: BuildingKind,
    },

    /// Place the pending building.
    ConfirmBuild {
        /// Site x.
        #[serde(with = "fixed_serde")]
        x: Fixed,
        /// Site y.
        #[serde(with = "fixed_serde")]
        y: Fixed,
    },

    /// Leave placement mode, or clear the selection.
    Cancel,

    /// Start production at an owned building.
    Produce {
        /// Producing building.
        building: EntityId,
        /// Unit to produce.
        unit: UnitKind,
    },

    /// Raw pointer or keyboard input, routed like a mouse would be.
    Input {
        /// The event.
        event: InputEvent,
    },

    /// Query current game state without advancing time.
    Query,

    /// Report the current state hash (for determinism verification).
    Hash,

    /// End the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Protocol version.
        version: String,
        /// Current tick.
        tick: u64,
    },

    /// A command was carried out.
    Ack {
        /// Command name.
        cmd: String,
        /// Units affected (selections and orders).
        #[serde(skip_serializing_if = "Option::is_none")]
        units: Option<usize>,
        /// Entity created (placements).
        #[serde(skip_serializing_if = "Option::is_none")]
        entity: Option<EntityId>,
    },

    /// A command was refused; nothing changed.
    Rejected {
        /// Command name.
        cmd: String,
        /// Machine-readable reason.
        code: String,
        /// Human-readable reason.
        message: String,
    },

    /// Events produced by one or more ticks.
    Events {
        /// Tick after the last advance.
        tick: u64,
        /// Events in emission order.
        events: Vec<SimEvent>,
    },

    /// Current game state.
    State {
        /// Presentation snapshot.
        snapshot: WorldSnapshot,
        /// Faction left standing, if any.
        winner: Option<Faction>,
        /// State hash.
        hash: u64,
    },

    /// State hash for determinism verification.
    StateHash {
        /// Current tick.
        tick: u64,
        /// Hash.
        hash: u64,
    },

    /// One side has been eliminated.
    GameOver {
        /// Surviving faction.
        winner: Faction,
        /// Tick of the elimination.
        tick: u64,
    },

    /// Error processing a command.
    Error {
        /// What went wrong.
        message: String,
        /// Command name, when the line parsed.
        #[serde(skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create a plain acknowledgment.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
            units: None,
            entity: None,
        }
    }

    /// Acknowledge an order that reached `units` units.
    #[must_use]
    pub fn ack_units(cmd: &str, units: usize) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
            units: Some(units),
            entity: None,
        }
    }

    /// Acknowledge a command that created `entity`.
    #[must_use]
    pub fn ack_entity(cmd: &str, entity: EntityId) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
            units: None,
            entity: Some(entity),
        }
    }

    /// Report a refused command.
    #[must_use]
    pub fn rejected(cmd: &str, err: &CommandError) -> Self {
        Self::Rejected {
            cmd: cmd.to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Select { .. } => "select",
            Self::SelectArea { .. } => "select_area",
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::Harvest { .. } => "harvest",
            Self::BeginBuild { .. } => "begin_build",
            Self::ConfirmBuild { .. } => "confirm_build",
            Self::Cancel => "cancel",
            Self::Produce { .. } => "produce",
            Self::Input { .. } => "input",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}
