//! Engagement counters on tracks.

use super::{decode, CatalogError, Track, TrackStats};
use crate::storage::{Collection, GuardedBackend};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Views,
    Downloads,
    WavClicks,
    Plays,
}

impl CounterKind {
    pub const ALL: [CounterKind; 4] = [
        CounterKind::Views,
        CounterKind::Downloads,
        CounterKind::WavClicks,
        CounterKind::Plays,
    ];

    /// Name of the field under `stats`.
    pub fn field(&self) -> &'static str {
        match self {
            CounterKind::Views => "views",
            CounterKind::Downloads => "downloads",
            CounterKind::WavClicks => "wavClicks",
            CounterKind::Plays => "plays",
        }
    }

    /// Event name clients send.
    pub fn event(&self) -> &'static str {
        match self {
            CounterKind::Views => "view",
            CounterKind::Downloads => "download",
            CounterKind::WavClicks => "wav",
            CounterKind::Plays => "play",
        }
    }

    pub fn read(&self, stats: &TrackStats) -> i64 {
        match self {
            CounterKind::Views => stats.views,
            CounterKind::Downloads => stats.downloads,
            CounterKind::WavClicks => stats.wav_clicks,
            CounterKind::Plays => stats.plays,
        }
    }
}

impl FromStr for CounterKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CounterKind::ALL
            .into_iter()
            .find(|kind| kind.event() == s || kind.field() == s)
            .ok_or_else(|| CatalogError::Validation(format!("Invalid stat type: {}", s)))
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event())
    }
}

#[derive(Clone)]
pub struct StatsCounter {
    backend: GuardedBackend,
}

impl StatsCounter {
    pub fn new(backend: GuardedBackend) -> Self {
        StatsCounter { backend }
    }

    /// Adds one to a counter of a track and returns all its counters.
    pub fn increment(
        &self,
        catalog: Collection,
        id: i64,
        kind: CounterKind,
    ) -> Result<TrackStats, CatalogError> {
        if !catalog.has_stats() {
            return Err(CatalogError::Validation(format!(
                "{} entries have no stats",
                catalog
            )));
        }
        match self.backend.increment(catalog, id, kind.field())? {
            Some(record) => Ok(decode::<Track>(record)?.stats),
            None => Err(CatalogError::NotFound {
                collection: catalog,
                id,
            }),
        }
    }
}
