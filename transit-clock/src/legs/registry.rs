//! The table of tracked legs.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::domain::StopId;
use crate::realtime::Feeds;
use crate::schedule::ScheduleIndex;

use super::error::RegistryError;
use super::estimator::LegEstimator;

/// One row of the leg table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegRow {
    pub id: u32,
    pub from_stop_id: StopId,
    pub to_stop_id: StopId,
}

/// Tracked legs, in leg table order, with an index by id.
pub struct LegRegistry {
    legs: Vec<Arc<LegEstimator>>,
    by_id: HashMap<u32, usize>,
}

impl LegRegistry {
    /// Read the CSV leg table at `path` and build an estimator per row.
    pub fn load(
        path: impl AsRef<Path>,
        schedule: Arc<ScheduleIndex>,
        feeds: &Feeds,
    ) -> Result<Self, RegistryError> {
        let reader = csv::Reader::from_path(path.as_ref())?;
        let registry = Self::from_csv(reader, schedule, feeds)?;
        info!(path = %path.as_ref().display(), legs = registry.len(), "leg table loaded");
        Ok(registry)
    }

    /// Build from any CSV source with an `id,from_stop_id,to_stop_id` header.
    pub fn from_csv<R: Read>(
        mut reader: csv::Reader<R>,
        schedule: Arc<ScheduleIndex>,
        feeds: &Feeds,
    ) -> Result<Self, RegistryError> {
        let rows = reader
            .deserialize::<LegRow>()
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_rows(rows, schedule, feeds)
    }

    pub fn from_rows(
        rows: Vec<LegRow>,
        schedule: Arc<ScheduleIndex>,
        feeds: &Feeds,
    ) -> Result<Self, RegistryError> {
        let mut legs = Vec::with_capacity(rows.len());
        let mut by_id = HashMap::with_capacity(rows.len());

        for row in rows {
            if by_id.contains_key(&row.id) {
                return Err(RegistryError::DuplicateId(row.id));
            }
            let estimator = LegEstimator::new(
                row.id,
                row.from_stop_id,
                row.to_stop_id,
                schedule.clone(),
                feeds,
            )
            .map_err(|source| RegistryError::Leg { id: row.id, source })?;
            by_id.insert(row.id, legs.len());
            legs.push(Arc::new(estimator));
        }

        Ok(Self { legs, by_id })
    }

    pub fn get(&self, id: u32) -> Option<&Arc<LegEstimator>> {
        self.by_id.get(&id).and_then(|&i| self.legs.get(i))
    }

    /// Legs in the order they appear in the leg table.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<LegEstimator>> {
        self.legs.iter()
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}
