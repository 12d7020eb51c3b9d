//! Race-relative event scheduling.
//!
//! The scheduler is plain data driven by the caller's tick: no timer threads
//! and no I/O. Events live in an unordered append-only list which is swept on
//! every [`EventScheduler::collect_due`] call; at the scale of a race (a few
//! dozen pending cues) the linear sweep is cheaper than keeping a heap.

mod clock;

pub use clock::{ManualStopwatch, MonotonicStopwatch, RaceClock, Stopwatch};

use crate::AudioClip;

/// Closed set of things the race timeline can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    EngineStartPending,
    RaceStart,
    RaceFinish,
    PlayClip,
    PlayRadioClip,
    FinalizeRaceTime,
    ReleaseInfoGate,
    ReleaseStatusGate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub kind: EventKind,
    /// Race-relative seconds at which the event becomes due.
    pub due_time: f64,
    /// Insertion order, used to break ties between equal due times.
    pub sequence: u64,
    pub payload: Option<AudioClip>,
}

#[derive(Debug, Default)]
pub struct EventScheduler {
    events: Vec<ScheduledEvent>,
    // f64 so that summing thousands of frame deltas does not drift.
    now: f64,
    next_sequence: u64,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Race-relative time the scheduler was last advanced to.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Moves the scheduler clock forward. Time never runs backwards.
    pub fn advance(&mut self, elapsed: f32) {
        if elapsed > 0.0 {
            self.now += f64::from(elapsed);
        }
    }

    /// Schedules `kind` to fire `delay` seconds from now.
    pub fn schedule(&mut self, kind: EventKind, delay: f32, payload: Option<AudioClip>) -> u64 {
        self.schedule_at(kind, self.now + f64::from(delay.max(0.0)), payload)
    }

    /// Schedules `kind` at an absolute race-relative time. Times in the past
    /// are pulled forward to now so that `due_time >= now` always holds.
    pub fn schedule_at(&mut self, kind: EventKind, due_time: f64, payload: Option<AudioClip>) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.events.push(ScheduledEvent {
            kind,
            due_time: due_time.max(self.now),
            sequence,
            payload,
        });
        sequence
    }

    /// Removes and returns every event with `due_time <= now`, ordered by
    /// `(due_time, sequence)`.
    pub fn collect_due(&mut self, now: f64) -> Vec<ScheduledEvent> {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|event| event.due_time <= now);
        self.events = pending;

        due.sort_by(|a, b| {
            a.due_time
                .total_cmp(&b.due_time)
                .then(a.sequence.cmp(&b.sequence))
        });
        due
    }

    /// Advances by `elapsed` and collects whatever became due.
    pub fn tick(&mut self, elapsed: f32) -> Vec<ScheduledEvent> {
        self.advance(elapsed);
        self.collect_due(self.now)
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }

    pub fn has_pending(&self, kind: EventKind) -> bool {
        self.events.iter().any(|event| event.kind == kind)
    }

    /// Drops every pending event. Used on mode teardown.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
