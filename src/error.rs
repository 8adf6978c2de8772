//! errors returned by the comparison engine
//!
//!

use thiserror::Error;

/// fault inside chunk computation. The positional scorer itself cannot fail,
/// but the scorer seam is fallible so a job can reach the Failed state on
/// corrupt data.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("corrupt sequence data for '{0}'")]
    CorruptSequence(String),
}

/// errors rejecting a comparison request before any job starts
#[derive(Error, Debug)]
pub enum CompareError {
    /// requested target name absent from the store
    #[error("target sequence '{0}' not found in store")]
    InvalidTarget(String),
    /// range with min > max
    #[error("invalid score range : min {min} > max {max}")]
    InvalidRange { min: f32, max: f32 },
    ///
    #[error("engine failure : {0}")]
    Engine(#[from] EngineError),
}
