//! Status timelines rebuilt from a ticket's change history, and sampling of
//! those timelines at calendar dates.

use chrono::{DateTime, FixedOffset, NaiveDate};
use thiserror::Error;
use tracing::warn;

use crate::model::history::ChangeHistory;

const STATUS_FIELD: &str = "status";

/// At `at`, the ticket's status became `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub at: DateTime<FixedOffset>,
    pub status: String,
}

impl Transition {
    pub fn new(at: DateTime<FixedOffset>, status: impl Into<String>) -> Self {
        Self {
            at,
            status: status.into(),
        }
    }

    /// Calendar date of the transition in the tracker's own offset.
    pub fn date(&self) -> NaiveDate {
        self.at.date_naive()
    }
}

/// Status transitions of one ticket, oldest first. Never empty: the first
/// entry is the ticket's creation with its original status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    transitions: Vec<Transition>,
}

impl Timeline {
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn created(&self) -> &Transition {
        &self.transitions[0]
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    #[cfg(test)]
    pub fn from_transitions(transitions: Vec<Transition>) -> Self {
        assert!(!transitions.is_empty());
        Self { transitions }
    }
}

/// Build the status timeline of a ticket.
///
/// The original status is the `from` value of the oldest status change, or the
/// current status when the status never changed. It is placed at the creation
/// timestamp ahead of every recorded change, or at the earliest change when
/// that predates creation.
pub fn reconstruct(history: &ChangeHistory) -> Timeline {
    if history.is_truncated() {
        warn!(
            key = %history.key,
            delivered = history.events.len(),
            total = history.reported_total,
            "change history is truncated; original status inferred from oldest delivered event"
        );
    }

    let mut original = None;
    let mut changes = Vec::new();
    for event in &history.events {
        for delta in event.deltas.iter().filter(|d| d.field == STATUS_FIELD) {
            if original.is_none() {
                original = Some(delta.from.clone().unwrap_or_default());
            }
            changes.push(Transition::new(event.at, delta.to.clone().unwrap_or_default()));
        }
    }
    // stable: same-instant changes keep delivery order
    changes.sort_by_key(|t| t.at);

    let original = original.unwrap_or_else(|| history.current_status.clone());
    // imported tickets can carry changes dated before their creation
    let start = changes
        .first()
        .map_or(history.created, |first| first.at.min(history.created));
    let mut transitions = Vec::with_capacity(changes.len() + 1);
    transitions.push(Transition::new(start, original));
    transitions.extend(changes);
    Timeline { transitions }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sample dates must be ascending: {next} requested after {previous}")]
pub struct SampleOrderError {
    pub previous: NaiveDate,
    pub next: NaiveDate,
}

/// Forward-only reader over a timeline.
///
/// Each date must be on or after the previous one; the cursor never rewinds
/// and rejects an earlier date instead of answering it wrongly.
pub struct StatusCursor<'a> {
    transitions: &'a [Transition],
    current: Option<usize>,
    last_sampled: Option<NaiveDate>,
}

impl<'a> StatusCursor<'a> {
    pub fn new(timeline: &'a Timeline) -> Self {
        Self {
            transitions: timeline.transitions(),
            current: None,
            last_sampled: None,
        }
    }

    /// Status as of the start of `date`: the latest transition dated strictly
    /// before `date`, or `""` if the ticket had no status yet. Transitions on
    /// `date` itself become visible from the next day.
    pub fn status_at(&mut self, date: NaiveDate) -> Result<&'a str, SampleOrderError> {
        if let Some(previous) = self.last_sampled {
            if date < previous {
                return Err(SampleOrderError {
                    previous,
                    next: date,
                });
            }
        }
        self.last_sampled = Some(date);

        let mut next = self.current.map_or(0, |i| i + 1);
        while next < self.transitions.len() && self.transitions[next].date() < date {
            self.current = Some(next);
            next += 1;
        }
        Ok(self
            .current
            .map_or("", |i| self.transitions[i].status.as_str()))
    }
}

/// One status per date; `dates` must be ascending.
pub fn sample_at(timeline: &Timeline, dates: &[NaiveDate]) -> Result<Vec<String>, SampleOrderError> {
    let mut cursor = StatusCursor::new(timeline);
    dates
        .iter()
        .map(|&d| cursor.status_at(d).map(str::to_string))
        .collect()
}
