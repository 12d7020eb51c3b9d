//! Gapless chains of recorded speech.
//!
//! A [`Composition`] keeps a cursor in seconds. Every clip pushed onto it is
//! placed at the cursor, and the cursor moves on by the clip's length, so
//! scheduling each cue at `base + offset` plays the chain back-to-back.

use crate::timeline::{EventKind, EventScheduler};
use crate::{AssetStore, AudioClip};

pub const POINT_KEY: &str = "race/time/point";

/// Key of the recorded number `n`.
pub fn number_key(n: u64) -> String {
    format!("race/numbers/{n}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedCue {
    pub clip: AudioClip,
    /// Seconds after the start of the composition.
    pub offset: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    cues: Vec<ComposedCue>,
    cursor: f32,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clip: AudioClip) -> &mut Self {
        let length = clip.length_seconds();
        self.cues.push(ComposedCue {
            clip,
            offset: self.cursor,
        });
        self.cursor += length;
        self
    }

    pub fn push_key(&mut self, assets: &mut AssetStore, key: &str) -> &mut Self {
        self.push(assets.clip(key))
    }

    pub fn push_number(&mut self, assets: &mut AssetStore, n: u64) -> &mut Self {
        self.push_key(assets, &number_key(n))
    }

    /// Appends a spoken duration.
    ///
    /// Minutes are left out entirely when zero. With `detailed` the
    /// milliseconds are read as "point" followed by the tenths, hundredths
    /// and thousandths digits.
    pub fn push_time(&mut self, assets: &mut AssetStore, ms: u64, detailed: bool) -> &mut Self {
        let minutes = ms / 60_000;
        let seconds = (ms / 1_000) % 60;
        let millis = ms % 1_000;

        if minutes > 0 {
            self.push_number(assets, minutes);
            self.push_key(assets, minute_key(minutes));
        }

        self.push_number(assets, seconds);
        if detailed {
            self.push_key(assets, POINT_KEY);
            for digit in [millis / 100, (millis / 10) % 10, millis % 10] {
                self.push_number(assets, digit);
            }
        }
        self.push_key(assets, second_key(seconds));
        self
    }

    pub fn cues(&self) -> &[ComposedCue] {
        &self.cues
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Total spoken length in seconds.
    pub fn length(&self) -> f32 {
        self.cursor
    }

    /// Schedules every cue as `kind` at `base + offset` and returns the
    /// race-relative time right after the last clip.
    pub fn schedule(&self, scheduler: &mut EventScheduler, kind: EventKind, base: f64) -> f64 {
        for cue in &self.cues {
            scheduler.schedule_at(kind, base + f64::from(cue.offset), Some(cue.clip.clone()));
        }
        base + f64::from(self.cursor)
    }

    /// Books the chain on a serial channel whose earlier bookings end at
    /// `*free_at`. The chain starts at `earliest` or when the channel frees
    /// up, whichever is later, so two chains never interleave. Moves
    /// `*free_at` to the end of this chain and returns it.
    pub fn schedule_after(
        &self,
        scheduler: &mut EventScheduler,
        kind: EventKind,
        earliest: f64,
        free_at: &mut f64,
    ) -> f64 {
        let end = self.schedule(scheduler, kind, earliest.max(*free_at));
        *free_at = end;
        end
    }
}

/// Builds the spoken form of a race time.
pub fn compose_time(assets: &mut AssetStore, ms: u64, detailed: bool) -> Composition {
    let mut composition = Composition::new();
    composition.push_time(assets, ms, detailed);
    composition
}

/// Builds a chain from fixed clip keys.
pub fn compose_keys<S: AsRef<str>>(assets: &mut AssetStore, keys: &[S]) -> Composition {
    let mut composition = Composition::new();
    for key in keys {
        composition.push_key(assets, key.as_ref());
    }
    composition
}

fn minute_key(count: u64) -> &'static str {
    if count == 1 {
        "race/time/minute"
    } else {
        "race/time/minutes"
    }
}

fn second_key(count: u64) -> &'static str {
    if count == 1 {
        "race/time/second"
    } else {
        "race/time/seconds"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn keys(composition: &Composition) -> Vec<&str> {
        composition.cues().iter().map(|cue| cue.clip.key()).collect()
    }

    #[test]
    fn zero_reads_as_plural_seconds() {
        let mut assets = testing::assets();
        let time = compose_time(&mut assets, 0, false);
        assert_eq!(keys(&time), vec!["race/numbers/0", "race/time/seconds"]);
    }

    #[test]
    fn one_minute_is_singular() {
        let mut assets = testing::assets();
        let time = compose_time(&mut assets, 60_000, false);
        assert_eq!(
            keys(&time),
            vec![
                "race/numbers/1",
                "race/time/minute",
                "race/numbers/0",
                "race/time/seconds"
            ]
        );
    }

    #[test]
    fn detailed_time_reads_each_decimal_digit() {
        let mut assets = testing::assets();
        let time = compose_time(&mut assets, 125_001, true);
        assert_eq!(
            keys(&time),
            vec![
                "race/numbers/2",
                "race/time/minutes",
                "race/numbers/5",
                "race/time/point",
                "race/numbers/0",
                "race/numbers/0",
                "race/numbers/1",
                "race/time/seconds"
            ]
        );
    }

    #[test]
    fn one_second_is_singular() {
        let mut assets = testing::assets();
        let time = compose_time(&mut assets, 1_400, false);
        assert_eq!(keys(&time), vec!["race/numbers/1", "race/time/second"]);
    }

    #[test]
    fn offsets_are_running_sums_of_lengths() {
        let mut assets = testing::assets();
        let time = compose_time(&mut assets, 754_321, true);

        let mut expected = 0.0;
        for cue in time.cues() {
            assert_eq!(cue.offset, expected);
            expected += cue.clip.length_seconds();
        }
        assert_eq!(time.length(), expected);
    }

    #[test]
    fn composition_is_deterministic() {
        let mut assets = testing::assets();
        let first = compose_time(&mut assets, 83_907, true);
        let second = compose_time(&mut assets, 83_907, true);
        assert_eq!(first, second);
    }

    #[test]
    fn scheduled_chain_plays_back_to_back() {
        let mut assets = testing::assets();
        let mut chain = compose_keys(&mut assets, &["race/finish", "race/your_time"]);
        chain.push_time(&mut assets, 61_000, false);

        let mut scheduler = EventScheduler::new();
        scheduler.advance(10.0);
        let base = scheduler.now();
        let end = chain.schedule(&mut scheduler, EventKind::PlayClip, base);
        assert_eq!(end, 10.0 + f64::from(chain.length()));

        let due = scheduler.collect_due(end);
        assert_eq!(due.len(), chain.cues().len());
        for (event, cue) in due.iter().zip(chain.cues()) {
            assert_eq!(event.due_time, 10.0 + f64::from(cue.offset));
            assert_eq!(event.payload.as_ref(), Some(&cue.clip));
        }
    }

    #[test]
    fn chains_booked_on_one_channel_stay_contiguous() {
        let mut assets = testing::assets();
        let first = compose_time(&mut assets, 3_250, true);
        let second = compose_keys(&mut assets, &["race/info/lap", "race/numbers/2"]);

        let mut scheduler = EventScheduler::new();
        let mut free_at = 0.0;
        let first_end = first.schedule_after(&mut scheduler, EventKind::PlayClip, 0.0, &mut free_at);
        let second_end =
            second.schedule_after(&mut scheduler, EventKind::PlayClip, 0.5, &mut free_at);

        assert_eq!(first_end, f64::from(first.length()));
        assert_eq!(second_end, first_end + f64::from(second.length()));
        assert_eq!(free_at, second_end);

        let played: Vec<String> = scheduler
            .collect_due(second_end)
            .iter()
            .filter_map(|event| event.payload.as_ref())
            .map(|clip| clip.key().to_string())
            .collect();
        let expected: Vec<&str> = keys(&first).into_iter().chain(keys(&second)).collect();
        assert_eq!(played, expected);
    }

    #[test]
    fn idle_channel_books_at_the_requested_time() {
        let mut assets = testing::assets();
        let chain = compose_keys(&mut assets, &["race/go"]);
        let mut scheduler = EventScheduler::new();
        scheduler.advance(2.0);

        let mut free_at = 1.0;
        let end = chain.schedule_after(&mut scheduler, EventKind::PlayRadioClip, 3.0, &mut free_at);
        assert_eq!(end, 3.0 + f64::from(chain.length()));
        assert_eq!(scheduler.collect_due(3.0).len(), 1);
    }
}
