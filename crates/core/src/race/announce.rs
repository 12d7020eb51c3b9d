//! Phrase chains spoken by the race announcer.

use crate::highscore::HighscoreOutcome;
use crate::speech::Composition;
use crate::AssetStore;

pub const COUNTDOWN: &str = "race/countdown";
pub const GO: &str = "race/go";
pub const FINISH: &str = "race/finish";
pub const YOUR_TIME: &str = "race/your_time";
pub const NEW_HIGHSCORE: &str = "race/highscore/new";
pub const CURRENT_HIGHSCORE: &str = "race/highscore/current";
pub const FINAL_LAP: &str = "race/laps/final";
pub const INFO_POSITION: &str = "race/info/position";
pub const INFO_LAP: &str = "race/info/lap";
pub const INFO_TIME: &str = "race/info/time";
pub const INFO_FINISHED: &str = "race/info/finished";
pub const INFO_JOINED: &str = "race/info/joined";

pub fn player_key(slot: u8) -> String {
    format!("race/player/{slot}")
}

pub fn position_key(position: u32) -> String {
    format!("race/position/{position}")
}

/// "N laps to go" clip for a lap that just started, or `None` on the first
/// lap and past the last one.
pub fn laps_to_go_key(lap: u32, total_laps: u32) -> Option<String> {
    if lap <= 1 || lap > total_laps {
        return None;
    }
    match total_laps - lap + 1 {
        1 => Some(FINAL_LAP.to_string()),
        remaining => Some(format!("race/laps/{remaining}")),
    }
}

/// Who crossed the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishSubject {
    Local,
    Slot(u8),
}

/// Facts known about a finish when its chain is composed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FinishDetails {
    pub race_time_ms: Option<u64>,
    pub detailed: bool,
    pub position: Option<u32>,
    pub highscore: Option<HighscoreOutcome>,
}

/// Builds the finish chain. The local player hears the finish clip, their
/// time, then either the highscore comparison or their position; any other
/// slot is announced as "player N finished".
pub fn finish_chain(assets: &mut AssetStore, subject: FinishSubject, details: FinishDetails) -> Composition {
    let mut chain = Composition::new();

    match subject {
        FinishSubject::Local => {
            chain.push_key(assets, FINISH);
            if let Some(ms) = details.race_time_ms {
                chain.push_key(assets, YOUR_TIME);
                chain.push_time(assets, ms, details.detailed);
            }
            match details.highscore {
                Some(HighscoreOutcome::FirstRecord) | Some(HighscoreOutcome::NewRecord { .. }) => {
                    chain.push_key(assets, NEW_HIGHSCORE);
                }
                Some(HighscoreOutcome::NotBeaten { best }) => {
                    chain.push_key(assets, CURRENT_HIGHSCORE);
                    chain.push_time(assets, best, details.detailed);
                }
                None => {}
            }
            if let Some(position) = details.position {
                chain.push_key(assets, &position_key(position));
            }
        }
        FinishSubject::Slot(slot) => {
            chain.push_key(assets, &player_key(slot));
            chain.push_key(assets, INFO_FINISHED);
        }
    }
    chain
}

/// Position (when racing others) followed by the current lap.
pub fn info_chain(assets: &mut AssetStore, position: Option<u32>, lap: u32) -> Composition {
    let mut chain = Composition::new();
    if let Some(position) = position {
        chain.push_key(assets, INFO_POSITION);
        chain.push_number(assets, u64::from(position));
    }
    chain.push_key(assets, INFO_LAP);
    chain.push_number(assets, u64::from(lap));
    chain
}

pub fn status_chain(assets: &mut AssetStore, race_time_ms: u64, detailed: bool) -> Composition {
    let mut chain = Composition::new();
    chain.push_key(assets, INFO_TIME);
    chain.push_time(assets, race_time_ms, detailed);
    chain
}

pub fn joined_chain(assets: &mut AssetStore, slot: u8) -> Composition {
    let mut chain = Composition::new();
    chain.push_key(assets, &player_key(slot));
    chain.push_key(assets, INFO_JOINED);
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn keys(chain: &Composition) -> Vec<&str> {
        chain.cues().iter().map(|cue| cue.clip.key()).collect()
    }

    #[test]
    fn laps_to_go_skips_first_and_past_final_lap() {
        assert_eq!(laps_to_go_key(1, 3), None);
        assert_eq!(laps_to_go_key(2, 3).as_deref(), Some("race/laps/2"));
        assert_eq!(laps_to_go_key(3, 3).as_deref(), Some(FINAL_LAP));
        assert_eq!(laps_to_go_key(4, 3), None);
    }

    #[test]
    fn local_finish_with_unbeaten_record_reads_both_times() {
        let mut assets = testing::assets();
        let chain = finish_chain(
            &mut assets,
            FinishSubject::Local,
            FinishDetails {
                race_time_ms: Some(61_000),
                detailed: false,
                position: None,
                highscore: Some(HighscoreOutcome::NotBeaten { best: 59_000 }),
            },
        );

        assert_eq!(
            keys(&chain),
            vec![
                FINISH,
                YOUR_TIME,
                "race/numbers/1",
                "race/time/minute",
                "race/numbers/1",
                "race/time/second",
                CURRENT_HIGHSCORE,
                "race/numbers/59",
                "race/time/seconds",
            ]
        );
    }

    #[test]
    fn local_finish_in_a_field_announces_position() {
        let mut assets = testing::assets();
        let chain = finish_chain(
            &mut assets,
            FinishSubject::Local,
            FinishDetails {
                race_time_ms: Some(2_000),
                position: Some(3),
                ..FinishDetails::default()
            },
        );
        assert_eq!(keys(&chain).last(), Some(&"race/position/3"));
    }

    #[test]
    fn slot_finish_names_the_player() {
        let mut assets = testing::assets();
        let chain = finish_chain(&mut assets, FinishSubject::Slot(2), FinishDetails::default());
        assert_eq!(keys(&chain), vec!["race/player/2", INFO_FINISHED]);
    }

    #[test]
    fn info_chain_omits_position_in_time_trial() {
        let mut assets = testing::assets();
        assert_eq!(
            keys(&info_chain(&mut assets, None, 2)),
            vec![INFO_LAP, "race/numbers/2"]
        );
        assert_eq!(
            keys(&info_chain(&mut assets, Some(4), 2)),
            vec![INFO_POSITION, "race/numbers/4", INFO_LAP, "race/numbers/2"]
        );
    }
}
