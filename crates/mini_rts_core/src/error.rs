//! Error types for the game simulation.
//!
//! [`GameError`] covers setup failures (bad configuration or scenario
//! data). [`CommandError`] is the structured refusal returned when an
//! order cannot be carried out; refusals never mutate the world.

use thiserror::Error;

use crate::entity::EntityId;
use crate::production::ProductionError;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for simulation setup.
#[derive(Debug, Error)]
pub enum GameError {
    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or label) of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// A spawn referenced a kind with no registered blueprint.
    #[error("No blueprint registered for {0}")]
    UnknownBlueprint(String),

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),
}

/// Reasons a player or AI command is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The issuing ledger cannot cover the cost.
    #[error("Insufficient resources: need {required}, have {available}")]
    InsufficientResources {
        /// Amount required.
        required: u32,
        /// Amount available.
        available: u32,
    },

    /// Attack ordered against the issuing faction's own entity.
    #[error("Cannot attack a friendly target")]
    FriendlyTarget,

    /// Target exists but cannot be attacked (e.g. a resource node or a wreck).
    #[error("Entity {0} cannot be attacked")]
    InvalidTarget(EntityId),

    /// Harvest ordered without any worker in the selection.
    #[error("Workers required")]
    NoWorkersSelected,

    /// Order needs at least one selected unit.
    #[error("No units selected")]
    NoUnitsSelected,

    /// Ordered unit is not a worker.
    #[error("Unit {0} is not a worker")]
    NotAWorker(EntityId),

    /// Building site out of bounds or too close to another building.
    #[error("Cannot place building here")]
    InvalidPlacement,

    /// Entity belongs to another faction.
    #[error("Entity {0} is not owned by the issuing faction")]
    NotOwned(EntityId),

    /// Referenced entity does not exist (anymore).
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Harvest target is not a resource node.
    #[error("Entity {0} is not a resource node")]
    NotAResource(EntityId),

    /// Harvest target has nothing left.
    #[error("Resource node {0} is depleted")]
    ResourceDepleted(EntityId),

    /// Placement confirmed without an active placement.
    #[error("No building placement in progress")]
    NoPlacementInProgress,

    /// Production request refused by the building.
    #[error(transparent)]
    Production(#[from] ProductionError),
}

impl CommandError {
    /// Stable machine-readable reason code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InsufficientResources { .. } => "insufficient_resources",
            Self::FriendlyTarget => "friendly_target",
            Self::InvalidTarget(_) => "invalid_target",
            Self::NoWorkersSelected => "no_workers_selected",
            Self::NoUnitsSelected => "no_units_selected",
            Self::NotAWorker(_) => "not_a_worker",
            Self::InvalidPlacement => "invalid_placement",
            Self::NotOwned(_) => "not_owned",
            Self::EntityNotFound(_) => "entity_not_found",
            Self::NotAResource(_) => "not_a_resource",
            Self::ResourceDepleted(_) => "resource_depleted",
            Self::NoPlacementInProgress => "no_placement_in_progress",
            Self::Production(err) => err.code(),
        }
    }
}
