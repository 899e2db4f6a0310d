//! Headless game runner implementation.
//!
//! Owns one [`Simulation`] and the player's [`InputRouter`], and turns
//! protocol commands into dispatcher calls. The loop itself is generic
//! over reader and writer so sessions can be scripted in tests.

use std::io::{BufRead, Write};

use mini_rts_core::dispatcher::CommandDispatcher;
use mini_rts_core::error::CommandError;
use mini_rts_core::input::{InputOutcome, InputRouter};
use mini_rts_core::math::{Fixed, Rect, Vec2Fixed};
use mini_rts_core::simulation::Simulation;

use crate::error::Result;
use crate::protocol::{Command, Response};

/// Headless runner configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessConfig {
    /// Frame time used when a `tick` command gives none.
    pub default_dt: Fixed,
    /// Output state after every `tick` command (vs only on query).
    pub auto_state_output: bool,
    /// Most ticks one `tick` command may request.
    pub max_ticks_per_command: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            default_dt: Fixed::from_num(0.05),
            auto_state_output: false,
            max_ticks_per_command: 10_000,
        }
    }
}

/// Headless runner for controller-driven gameplay.
#[derive(Debug, Clone)]
pub struct HeadlessRunner {
    sim: Simulation,
    router: InputRouter,
    config: HeadlessConfig,
    game_over_sent: bool,
    finished: bool,
}

impl HeadlessRunner {
    /// Create a runner with default config.
    #[must_use]
    pub fn new(sim: Simulation) -> Self {
        Self::with_config(sim, HeadlessConfig::default())
    }

    /// Create a runner with custom configuration.
    #[must_use]
    pub fn with_config(sim: Simulation, config: HeadlessConfig) -> Self {
        Self {
            sim,
            router: InputRouter::new(CommandDispatcher::player()),
            config,
            game_over_sent: false,
            finished: false,
        }
    }

    /// The simulation being played.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Whether `quit` has been received.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run a session: announce readiness, answer every line, stop on
    /// `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<()> {
        tracing::info!(tick = self.sim.get_tick(), "Headless session started");
        write_response(&mut output, &Response::ready(self.sim.get_tick()))?;

        for line in input.lines() {
            let line = line?;
            for response in self.handle_line(&line) {
                write_response(&mut output, &response)?;
            }
            if self.finished {
                break;
            }
        }

        if !self.finished {
            tracing::info!("Input closed");
            self.finished = true;
            write_response(&mut output, &Response::Bye)?;
        }
        tracing::info!(
            tick = self.sim.get_tick(),
            hash = self.sim.state_hash(),
            "Headless session ended"
        );
        Ok(())
    }

    /// Parse and handle one input line. Blank lines produce nothing.
    pub fn handle_line(&mut self, line: &str) -> Vec<Response> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        match Command::from_json(line) {
            Ok(command) => self.handle(command),
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable command");
                vec![Response::error(format!("Parse error: {e}"), None)]
            }
        }
    }

    /// Handle one command.
    pub fn handle(&mut self, command: Command) -> Vec<Response> {
        let name = command.name();
        tracing::debug!(cmd = name, "Command received");

        let response = match command {
            Command::Tick { dt, count } => return self.tick(dt, count),
            Command::Input { event } => {
                outcome(name, self.router.handle(self.sim.world_mut(), event))
            }
            Command::Query => self.state(),
            Command::Hash => Response::StateHash {
                tick: self.sim.get_tick(),
                hash: self.sim.state_hash(),
            },
            Command::Quit => {
                self.finished = true;
                Response::Bye
            }
            other => self.dispatch(name, other),
        };
        vec![response]
    }

    /// Selection, orders, placement and production.
    fn dispatch(&mut self, name: &str, command: Command) -> Response {
        let world = self.sim.world_mut();
        let dispatcher = self.router.dispatcher_mut();
        match command {
            Command::Select { id, additive } => match dispatcher.select(world, id, additive) {
                Ok(()) => Response::ack_units(name, dispatcher.selection().len()),
                Err(e) => Response::rejected(name, &e),
            },
            Command::SelectArea { from, to, additive } => {
                let count = dispatcher.select_area(world, Rect::from_corners(from, to), additive);
                Response::ack_units(name, count)
            }
            Command::Move { x, y } => {
                order(name, dispatcher.issue_move(world, Vec2Fixed::new(x, y)))
            }
            Command::Attack { target } => order(name, dispatcher.issue_attack(world, target)),
            Command::Harvest { node } => order(name, dispatcher.issue_harvest(world, node)),
            Command::BeginBuild { kind } => dispatcher
                .begin_build_placement(world, kind)
                .map_or_else(|e| Response::rejected(name, &e), |()| Response::ack(name)),
            Command::ConfirmBuild { x, y } => dispatcher
                .confirm_build_placement(world, Vec2Fixed::new(x, y))
                .map_or_else(
                    |e| Response::rejected(name, &e),
                    |id| Response::ack_entity(name, id),
                ),
            Command::Cancel => {
                if !dispatcher.cancel() {
                    dispatcher.clear_selection();
                }
                Response::ack(name)
            }
            Command::Produce { building, unit } => dispatcher
                .request_production(world, building, unit)
                .map_or_else(|e| Response::rejected(name, &e), |()| Response::ack(name)),
            other => Response::error("Not a dispatcher command", Some(other.name())),
        }
    }

    fn tick(&mut self, dt: Option<f64>, count: u32) -> Vec<Response> {
        let max_dt = self.sim.world().config().max_tick_dt;
        let dt = match dt {
            None => self.config.default_dt,
            Some(seconds) => match Fixed::checked_from_num(seconds).filter(|dt| *dt <= max_dt) {
                Some(dt) => dt,
                None => {
                    return vec![Response::error(
                        format!("dt {seconds} is out of range (max {max_dt})"),
                        Some("tick"),
                    )]
                }
            },
        };
        if count > self.config.max_ticks_per_command {
            return vec![Response::error(
                format!(
                    "count {count} exceeds {} ticks per command",
                    self.config.max_ticks_per_command
                ),
                Some("tick"),
            )];
        }

        let mut events = Vec::new();
        for _ in 0..count {
            events.extend(self.sim.tick(dt).events);
        }
        let mut responses = vec![Response::Events {
            tick: self.sim.get_tick(),
            events,
        }];

        if self.config.auto_state_output {
            responses.push(self.state());
        }
        if !self.game_over_sent {
            if let Some(winner) = self.sim.winner() {
                tracing::info!(?winner, tick = self.sim.get_tick(), "Game over");
                self.game_over_sent = true;
                responses.push(Response::GameOver {
                    winner,
                    tick: self.sim.get_tick(),
                });
            }
        }
        responses
    }

    fn state(&self) -> Response {
        Response::State {
            snapshot: self.sim.snapshot(),
            winner: self.sim.winner(),
            hash: self.sim.state_hash(),
        }
    }
}

fn order(name: &str, result: std::result::Result<usize, CommandError>) -> Response {
    result.map_or_else(
        |e| Response::rejected(name, &e),
        |units| Response::ack_units(name, units),
    )
}

fn outcome(name: &str, outcome: InputOutcome) -> Response {
    match outcome {
        InputOutcome::None
        | InputOutcome::Cancelled
        | InputOutcome::ProductionStarted
        | InputOutcome::PlacementStarted(_) => Response::ack(name),
        InputOutcome::Selection(units) | InputOutcome::Order(units) => {
            Response::ack_units(name, units)
        }
        InputOutcome::Placed(id) => Response::ack_entity(name, id),
        InputOutcome::Rejected(err) => Response::rejected(name, &err),
    }
}

fn write_response<W: Write>(output: &mut W, response: &Response) -> Result<()> {
    output.write_all(response.to_json_line().as_bytes())?;
    output.flush()?;
    Ok(())
}
