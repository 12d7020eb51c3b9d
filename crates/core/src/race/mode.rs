use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::highscore::{HighscoreOutcome, HighscoreStore};
use crate::net::NetSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    TimeTrial,
    SingleRace,
    Multiplayer,
}

/// Delays, in seconds after mode start, of the engine-start and race-start
/// cues.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeTimings {
    pub engine_start: f32,
    pub race_start: f32,
}

impl ModeKind {
    pub fn timings(self) -> ModeTimings {
        match self {
            // Extra time for the grid to form over the network.
            ModeKind::Multiplayer => ModeTimings {
                engine_start: 3.0,
                race_start: 6.5,
            },
            ModeKind::TimeTrial | ModeKind::SingleRace => ModeTimings {
                engine_start: 1.5,
                race_start: 5.0,
            },
        }
    }

    pub fn allows_pause(self) -> bool {
        !matches!(self, ModeKind::Multiplayer)
    }
}

#[derive(Debug)]
pub struct TimeTrial {
    pub(crate) highscores: HighscoreStore,
    pub(crate) outcome: Option<HighscoreOutcome>,
}

impl TimeTrial {
    pub fn new(highscore_path: impl Into<PathBuf>) -> Self {
        Self {
            highscores: HighscoreStore::open(highscore_path),
            outcome: None,
        }
    }

    pub fn highscores(&self) -> &HighscoreStore {
        &self.highscores
    }
}

/// Computer opponent reduced to what the announcer needs: how far it is and
/// whether it has finished.
#[derive(Debug, Clone, PartialEq)]
pub struct Opponent {
    pub slot: u8,
    pub distance: f32,
    /// m/s.
    pub speed: f32,
    pub finished: bool,
}

impl Opponent {
    pub fn advance(&mut self, elapsed: f32, race_distance: f32) -> bool {
        if self.finished {
            return false;
        }
        self.distance += self.speed * elapsed;
        if self.distance >= race_distance {
            self.finished = true;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone)]
pub struct SingleRace {
    pub(crate) opponent_count: u8,
    pub(crate) opponents: Vec<Opponent>,
}

impl SingleRace {
    pub fn new(opponent_count: u8) -> Self {
        Self {
            opponent_count,
            opponents: Vec::new(),
        }
    }

    /// Uses the given opponents instead of generating a field.
    pub fn with_opponents(opponents: Vec<Opponent>) -> Self {
        Self {
            opponent_count: opponents.len() as u8,
            opponents,
        }
    }

    pub fn opponents(&self) -> &[Opponent] {
        &self.opponents
    }

    /// Fills the grid from the race RNG when no field was supplied. Slot 0
    /// is the local player.
    pub(crate) fn populate<R: Rng>(&mut self, rng: &mut R) {
        if !self.opponents.is_empty() {
            return;
        }
        self.opponents = (1..=self.opponent_count)
            .map(|slot| Opponent {
                slot,
                distance: 0.0,
                speed: rng.gen_range(30.0..45.0),
                finished: false,
            })
            .collect();
    }
}

#[derive(Debug)]
pub struct Multiplayer {
    pub(crate) session: NetSession,
}

impl Multiplayer {
    pub fn new(session: NetSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &NetSession {
        &self.session
    }
}

/// Mode-specific state carried by the race driver.
#[derive(Debug)]
pub enum RaceMode {
    TimeTrial(TimeTrial),
    SingleRace(SingleRace),
    Multiplayer(Multiplayer),
}

impl RaceMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            RaceMode::TimeTrial(_) => ModeKind::TimeTrial,
            RaceMode::SingleRace(_) => ModeKind::SingleRace,
            RaceMode::Multiplayer(_) => ModeKind::Multiplayer,
        }
    }
}
