use serde::{Deserialize, Serialize};

/// Result of feeding one distance sample to the [`LapTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LapTransition {
    NoChange,
    LapAdvanced(u32),
    RaceFinished,
}

/// Turns distance travelled into lap numbers.
///
/// Lap 0 means the race has not started; the first sample moves to lap 1.
/// Laps only ever increase and the finish is reported once.
#[derive(Debug, Clone, PartialEq)]
pub struct LapTracker {
    track_length: f32,
    current_lap: u32,
    total_laps: u32,
    last_announced_lap: u32,
    finished: bool,
}

impl LapTracker {
    pub fn new(track_length: f32, total_laps: u32) -> Self {
        Self {
            track_length: track_length.max(f32::EPSILON),
            current_lap: 0,
            total_laps: total_laps.max(1),
            last_announced_lap: 0,
            finished: false,
        }
    }

    pub fn reset(&mut self) {
        self.current_lap = 0;
        self.last_announced_lap = 0;
        self.finished = false;
    }

    pub fn current_lap(&self) -> u32 {
        self.current_lap
    }

    pub fn total_laps(&self) -> u32 {
        self.total_laps
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Laps left including the one being driven.
    pub fn laps_remaining(&self) -> u32 {
        (self.total_laps + 1).saturating_sub(self.current_lap)
    }

    /// Lap number a given distance falls on.
    pub fn lap_for(&self, distance: f32) -> u32 {
        (distance.max(0.0) / self.track_length).floor() as u32 + 1
    }

    pub fn update(&mut self, distance: f32) -> LapTransition {
        if self.finished {
            return LapTransition::NoChange;
        }

        let lap = self.lap_for(distance);
        if lap <= self.last_announced_lap {
            return LapTransition::NoChange;
        }

        self.current_lap = lap;
        self.last_announced_lap = lap;
        if lap > self.total_laps {
            self.finished = true;
            LapTransition::RaceFinished
        } else {
            LapTransition::LapAdvanced(lap)
        }
    }
}
