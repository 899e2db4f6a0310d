//! Headless host for the mini RTS simulation.
//!
//! The simulation core has no rendering and no clock of its own. This
//! crate drives it without graphics:
//!
//! - **Interactive sessions**: a controller plays the player side over
//!   JSON lines on stdin/stdout ([`runner`], [`protocol`])
//! - **Batch runs**: AI-versus-AI games in parallel for balance numbers
//!   ([`batch`], [`metrics`])
//! - **Determinism checks**: one seed replayed several times must end in
//!   the same state hash
//!
//! Logs go to stderr so stdout stays a clean protocol stream.
//!
//! # Example
//!
//! ```bash
//! # Play interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p mini_rts_headless
//!
//! # A hundred AI-vs-AI games from seed 7
//! cargo run -p mini_rts_headless -- batch --count 100 --seed 7
//!
//! # Verify determinism with a custom scenario
//! cargo run -p mini_rts_headless -- --scenario duel.ron verify --runs 5
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod batch;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod protocol;
pub mod runner;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, DeterminismReport};
pub use error::{HeadlessError, Result};
pub use loader::GameSetup;
pub use metrics::{BatchSummary, GameMetrics, MetricsCollector};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
