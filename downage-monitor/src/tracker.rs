//! Outage state tracker
//!
//! Turns a stream of up/down samples into outage episodes:
//! - a down sample while up opens a new episode (duration 0)
//! - further down samples extend it in place
//! - the first up sample closes it
//!
//! Pure state machine, no I/O. The caller owns the clock.

use chrono::{DateTime, Duration, Utc};

use crate::models::Episode;

/// Link state as seen by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Up,
    Down {
        since: DateTime<Utc>,
        elapsed: Duration,
    },
}

/// What the tracker emitted for one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// New outage, to be appended
    Opened(Episode),
    /// Outage still in progress, update the last record
    Extended(Episode),
    /// Recovery observed, final update of the last record
    Closed(Episode),
}

impl Transition {
    pub fn episode(&self) -> &Episode {
        match self {
            Transition::Opened(e) | Transition::Extended(e) | Transition::Closed(e) => e,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Transition::Opened(_) => "opened",
            Transition::Extended(_) => "extended",
            Transition::Closed(_) => "closed",
        }
    }
}

/// Tracker state, owned by the poll loop
#[derive(Debug, Clone)]
pub struct OutageTracker {
    state: LinkState,
}

impl OutageTracker {
    /// Starts with no outage in progress
    pub fn new() -> Self {
        Self { state: LinkState::Up }
    }

    pub fn is_continuing(&self) -> bool {
        matches!(self.state, LinkState::Down { .. })
    }

    /// Episode currently open, if any
    pub fn open_episode(&self) -> Option<Episode> {
        match self.state {
            LinkState::Up => None,
            LinkState::Down { since, elapsed } => Some(Episode {
                id: None,
                start_time: since,
                duration_ms: elapsed.num_milliseconds(),
                continuing: true,
            }),
        }
    }

    /// Feed one sample taken at `now`.
    ///
    /// Duration is recomputed from the episode start on every sample, never
    /// accumulated. It never goes below the last emitted value, so a wall
    /// clock stepping backwards cannot shrink an episode.
    pub fn observe(&mut self, sample_up: bool, now: DateTime<Utc>) -> Option<Transition> {
        match (self.state, sample_up) {
            (LinkState::Down { since, elapsed }, true) => {
                let elapsed = elapsed_since(since, now, elapsed);
                self.state = LinkState::Up;
                Some(Transition::Closed(Episode {
                    id: None,
                    start_time: since,
                    duration_ms: elapsed.num_milliseconds(),
                    continuing: false,
                }))
            }
            (LinkState::Up, true) => None,
            (LinkState::Down { since, elapsed }, false) => {
                let elapsed = elapsed_since(since, now, elapsed);
                self.state = LinkState::Down { since, elapsed };
                Some(Transition::Extended(Episode {
                    id: None,
                    start_time: since,
                    duration_ms: elapsed.num_milliseconds(),
                    continuing: true,
                }))
            }
            (LinkState::Up, false) => {
                self.state = LinkState::Down {
                    since: now,
                    elapsed: Duration::zero(),
                };
                Some(Transition::Opened(Episode::opened_at(now)))
            }
        }
    }
}

impl Default for OutageTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_since(since: DateTime<Utc>, now: DateTime<Utc>, previous: Duration) -> Duration {
    (now - since).max(previous).max(Duration::zero())
}
