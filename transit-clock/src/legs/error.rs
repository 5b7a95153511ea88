//! Leg error types.

use crate::domain::StopId;
use crate::realtime::FeedError;
use crate::schedule::ScheduleError;

/// Errors raised by a leg estimator.
#[derive(Debug, thiserror::Error)]
pub enum LegError {
    /// The two stops share no trip, so the leg cannot be travelled
    #[error("stops {from} and {to} are on different transit lines")]
    NotOnSameLine { from: StopId, to: StopId },

    /// Schedule or live data contradict what the leg expects
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Feed(#[from] FeedError),
}

/// Errors raised while loading the table of tracked legs.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The leg table could not be read or parsed
    #[error("failed to read leg table: {0}")]
    Csv(#[from] csv::Error),

    /// Two rows share an id
    #[error("duplicate leg id {0}")]
    DuplicateId(u32),

    /// A row describes an invalid leg
    #[error("leg {id}: {source}")]
    Leg {
        id: u32,
        #[source]
        source: LegError,
    },
}
