//! Tracked origin/destination legs.
//!
//! A leg ties two stops on one line to the schedule and the live feeds, and
//! answers "when is the next vehicle, when will it arrive, and is anything
//! wrong on the line".

mod error;
mod estimator;
mod registry;

pub use error::{LegError, RegistryError};
pub use estimator::{DEFAULT_ESTIMATE_COUNT, Estimate, Leg, LegEstimator};
pub use registry::{LegRegistry, LegRow};
