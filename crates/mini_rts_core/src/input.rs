//! Pointer and keyboard input, normalized into dispatcher operations.
//!
//! The host forwards raw events in world coordinates. A primary press
//! and release closer than the drag threshold is a click; anything
//! larger is a box selection.

use serde::{Deserialize, Serialize};

use crate::dispatcher::CommandDispatcher;
use crate::entity::{BuildingKind, Entity, EntityId, UnitKind};
use crate::error::CommandError;
use crate::math::{Fixed, Rect, Vec2Fixed};
use crate::world::WorldState;

/// Pointer buttons the router distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    /// Select, place, or context order.
    Primary,
    /// Context order only; never changes the selection.
    Secondary,
}

/// Raw input from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum InputEvent {
    /// Button pressed at a world position.
    PointerDown {
        /// World position.
        position: Vec2Fixed,
        /// Button.
        button: PointerButton,
    },
    /// Pointer moved.
    PointerMove {
        /// World position.
        position: Vec2Fixed,
    },
    /// Button released.
    PointerUp {
        /// World position.
        position: Vec2Fixed,
        /// Button.
        button: PointerButton,
        /// Add to the selection instead of replacing it.
        #[serde(default)]
        additive: bool,
    },
    /// Cancel placement, or clear the selection.
    Escape,
    /// Build button pressed.
    BuildRequested {
        /// Building to place.
        kind: BuildingKind,
    },
    /// Production button pressed.
    ProduceRequested {
        /// Producing building.
        building: EntityId,
        /// Unit to produce.
        unit: UnitKind,
    },
}

/// What an input event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Nothing happened.
    None,
    /// The selection changed; holds its new size.
    Selection(usize),
    /// An order went out to this many units.
    Order(usize),
    /// A building was placed.
    Placed(EntityId),
    /// Placement mode was entered.
    PlacementStarted(BuildingKind),
    /// Placement or selection was cancelled.
    Cancelled,
    /// A production job started.
    ProductionStarted,
    /// The command was refused.
    Rejected(CommandError),
}

/// Turns input events into dispatcher calls for one controller.
#[derive(Debug, Clone)]
pub struct InputRouter {
    dispatcher: CommandDispatcher,
    drag_start: Option<Vec2Fixed>,
    drag_current: Option<Vec2Fixed>,
    drag_threshold: Fixed,
}

impl InputRouter {
    /// Default pointer travel that turns a click into a drag.
    pub const DEFAULT_DRAG_THRESHOLD: i32 = 5;

    /// Create a router around a dispatcher.
    #[must_use]
    pub fn new(dispatcher: CommandDispatcher) -> Self {
        Self {
            dispatcher,
            drag_start: None,
            drag_current: None,
            drag_threshold: Fixed::from_num(Self::DEFAULT_DRAG_THRESHOLD),
        }
    }

    /// The wrapped dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Mutable access to the wrapped dispatcher.
    pub fn dispatcher_mut(&mut self) -> &mut CommandDispatcher {
        &mut self.dispatcher
    }

    /// Current drag box, for drawing.
    #[must_use]
    pub fn drag_box(&self) -> Option<Rect> {
        let start = self.drag_start?;
        let current = self.drag_current?;
        self.is_drag(start, current)
            .then(|| Rect::from_corners(start, current))
    }

    /// Route one input event.
    pub fn handle(&mut self, world: &mut WorldState, event: InputEvent) -> InputOutcome {
        match event {
            InputEvent::PointerDown {
                position,
                button: PointerButton::Primary,
            } => {
                self.drag_start = Some(position);
                self.drag_current = Some(position);
                InputOutcome::None
            }
            InputEvent::PointerDown { .. } => InputOutcome::None,
            InputEvent::PointerMove { position } => {
                if self.drag_start.is_some() {
                    self.drag_current = Some(position);
                }
                InputOutcome::None
            }
            InputEvent::PointerUp {
                position,
                button: PointerButton::Primary,
                additive,
            } => {
                let start = self.drag_start.take().unwrap_or(position);
                self.drag_current = None;
                self.primary_release(world, start, position, additive)
            }
            InputEvent::PointerUp {
                position,
                button: PointerButton::Secondary,
                ..
            } => self.context_order(world, position),
            InputEvent::Escape => {
                self.drag_start = None;
                self.drag_current = None;
                if !self.dispatcher.cancel() {
                    self.dispatcher.clear_selection();
                }
                InputOutcome::Cancelled
            }
            InputEvent::BuildRequested { kind } => self
                .dispatcher
                .begin_build_placement(world, kind)
                .map_or_else(InputOutcome::Rejected, |()| {
                    InputOutcome::PlacementStarted(kind)
                }),
            InputEvent::ProduceRequested { building, unit } => self
                .dispatcher
                .request_production(world, building, unit)
                .map_or_else(InputOutcome::Rejected, |()| {
                    InputOutcome::ProductionStarted
                }),
        }
    }

    fn is_drag(&self, start: Vec2Fixed, end: Vec2Fixed) -> bool {
        !start.within(end, self.drag_threshold)
    }

    fn primary_release(
        &mut self,
        world: &mut WorldState,
        start: Vec2Fixed,
        end: Vec2Fixed,
        additive: bool,
    ) -> InputOutcome {
        if self.dispatcher.placement().is_some() {
            return self
                .dispatcher
                .confirm_build_placement(world, end)
                .map_or_else(InputOutcome::Rejected, InputOutcome::Placed);
        }
        if self.is_drag(start, end) {
            let count = self
                .dispatcher
                .select_area(world, Rect::from_corners(start, end), additive);
            return InputOutcome::Selection(count);
        }

        let faction = self.dispatcher.faction();
        match world.entity_at(end) {
            Some(id) if world.entities().get(id).and_then(Entity::faction) == Some(faction) => {
                match self.dispatcher.select(world, id, additive) {
                    Ok(()) => InputOutcome::Selection(self.dispatcher.selection().len()),
                    Err(err) => InputOutcome::Rejected(err),
                }
            }
            _ => self.context_order(world, end),
        }
    }

    /// Click on a non-owned spot: harvest, attack or move, depending on
    /// what is under the pointer. Without a selection nothing happens.
    fn context_order(&mut self, world: &mut WorldState, point: Vec2Fixed) -> InputOutcome {
        if self.dispatcher.selection().is_empty() {
            return InputOutcome::None;
        }
        let faction = self.dispatcher.faction();
        let under = world
            .entity_at(point)
            .and_then(|id| world.entities().get(id))
            .map(|e| (e.id(), e.faction()));
        let result = match under {
            Some((node, None)) => self.dispatcher.issue_harvest(world, node),
            Some((_, Some(owner))) if owner == faction => return InputOutcome::None,
            Some((target, Some(_))) => self.dispatcher.issue_attack(world, target),
            None => self.dispatcher.issue_move(world, point),
        };
        result.map_or_else(InputOutcome::Rejected, InputOutcome::Order)
    }
}
