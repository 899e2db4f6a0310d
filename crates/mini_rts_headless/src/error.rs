//! Errors raised by the headless host.
//!
//! Protocol-level problems (a malformed line, a refused order) are
//! answered on the wire and never end the session. These errors cover
//! what does: unreadable files, bad game data and broken pipes.

use std::path::PathBuf;

use mini_rts_core::error::GameError;
use thiserror::Error;

/// Result alias for the headless crate.
pub type Result<T> = std::result::Result<T, HeadlessError>;

/// Host-side failures.
#[derive(Debug, Error)]
pub enum HeadlessError {
    /// A file named on the command line does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A file exists but could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A configuration or scenario file is malformed or invalid.
    #[error("Invalid game data in {}: {source}", path.display())]
    Data {
        /// The file.
        path: PathBuf,
        /// What the core rejected.
        source: GameError,
    },

    /// Setting up the simulation failed.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Writing output failed.
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding a response or report failed.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Rendering a RON document failed.
    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    /// Runs of the same seed ended in different states.
    #[error("Seed {seed} diverged across {runs} runs")]
    Diverged {
        /// Seed under test.
        seed: u64,
        /// Number of runs compared.
        runs: u32,
    },

    /// A batch or verification run was asked to do nothing.
    #[error("Invalid run parameters: {0}")]
    InvalidRun(String),
}
