//! Per-frame race orchestration shared by every mode.
//!
//! The driver owns the scheduler, race clock, lap tracker and copilot and
//! feeds them from a single cooperative tick: [`RaceModeDriver::run`].
//! Nothing in here blocks. Audio completions are drained from the queues'
//! inboxes at the top of each tick, due events are dispatched in
//! `(due_time, sequence)` order, and every clip they carry is enqueued in
//! that same order, so what the player hears is a pure function of what was
//! scheduled.

mod announce;
mod mode;

pub use announce::{
    finish_chain, info_chain, laps_to_go_key, player_key, position_key, status_chain,
    FinishDetails, FinishSubject,
};
pub use mode::{ModeKind, ModeTimings, Multiplayer, Opponent, RaceMode, SingleRace, TimeTrial};

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::audio::{AnnouncementQueue, AudioOutput, Channel, MusicFade};
use crate::config::{RaceSettings, SettingsChange};
use crate::copilot::{CopilotAnnouncer, SURFACE_CUE_DELAY};
use crate::highscore::HighscoreOutcome;
use crate::laps::{LapTracker, LapTransition};
use crate::net::{Packet, PlayerState, SessionEvent};
use crate::speech::{compose_keys, Composition};
use crate::timeline::{EventKind, EventScheduler, RaceClock, ScheduledEvent, Stopwatch};
use crate::world::{InputSource, Track, Vehicle, VehicleState};
use crate::{AssetStore, RaceError, Result};

/// Automatic position/lap commentary period, in race seconds.
pub const AUTO_INFO_INTERVAL: f32 = 30.0;
/// Minimum gap between a manual info request and the previous comment.
pub const MANUAL_INFO_COOLDOWN: f32 = 2.0;

const COPILOT_LOOKAHEAD_SECONDS: f32 = 3.0;
const COPILOT_MIN_LOOKAHEAD: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacePhase {
    NotStarted,
    CountdownPending,
    Racing,
    Paused,
    Finished,
    Exiting,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSummary {
    pub mode: ModeKind,
    pub aborted: bool,
    pub race_time_ms: Option<u64>,
    pub position: Option<u32>,
    pub highscore: Option<HighscoreOutcome>,
    /// Opponent or remote slots in the order they crossed the line.
    pub finish_order: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverStatus {
    Running,
    Exit(RaceSummary),
}

/// Everything a race mode is built from.
pub struct RaceSetup {
    pub settings: RaceSettings,
    pub mode: RaceMode,
    pub total_laps: u32,
    pub vehicle: Box<dyn Vehicle>,
    pub track: Box<dyn Track>,
    pub input: Box<dyn InputSource>,
    pub output: Arc<dyn AudioOutput>,
    pub assets: AssetStore,
    pub stopwatch: Box<dyn Stopwatch>,
}

/// Turns a held key into a single press.
#[derive(Debug, Default)]
struct KeyEdge {
    down: bool,
}

impl KeyEdge {
    fn rising(&mut self, held: bool) -> bool {
        let rising = held && !self.down;
        self.down = held;
        rising
    }
}

pub struct RaceModeDriver {
    settings: RaceSettings,
    mode: RaceMode,
    phase: RacePhase,
    started: bool,
    aborted: bool,

    vehicle: Box<dyn Vehicle>,
    track: Box<dyn Track>,
    input: Box<dyn InputSource>,
    output: Arc<dyn AudioOutput>,
    assets: AssetStore,

    scheduler: EventScheduler,
    clock: RaceClock,
    laps: LapTracker,
    copilot: CopilotAnnouncer,
    announcer: AnnouncementQueue,
    radio: AnnouncementQueue,
    // Scheduler time at which everything booked on each channel has played.
    announcer_free_at: f64,
    radio_free_at: f64,
    rng: StdRng,

    pause_key: KeyEdge,
    info_key: KeyEdge,
    status_key: KeyEdge,
    info_gate_open: bool,
    status_gate_open: bool,
    since_comment: f32,
    road_ahead: Option<usize>,
    vehicle_state: VehicleState,

    race_time_ms: Option<u64>,
    position: Option<u32>,
    finalized: bool,
    finished_slots: HashSet<u8>,
    finish_order: Vec<u8>,
}

impl RaceModeDriver {
    /// Loads the mode's audio, fills the grid and schedules the countdown.
    pub fn new(setup: RaceSetup) -> Result<Self> {
        let RaceSetup {
            settings,
            mut mode,
            total_laps,
            vehicle,
            track,
            input,
            output,
            mut assets,
            stopwatch,
        } = setup;

        if total_laps == 0 {
            return Err(RaceError::InvalidInput("a race needs at least one lap"));
        }

        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let copilot = CopilotAnnouncer::load(&mut assets)?;
        if let RaceMode::SingleRace(race) = &mut mode {
            race.populate(&mut rng);
        }

        let laps = LapTracker::new(track.length(), total_laps);
        let vehicle_state = vehicle.state();
        let announcer = AnnouncementQueue::new(Channel::Announcer, output.clone());
        let radio = AnnouncementQueue::new(Channel::Radio, output.clone());

        let mut driver = Self {
            settings,
            mode,
            phase: RacePhase::NotStarted,
            started: false,
            aborted: false,
            vehicle,
            track,
            input,
            output,
            assets,
            scheduler: EventScheduler::new(),
            clock: RaceClock::new(stopwatch),
            laps,
            copilot,
            announcer,
            radio,
            announcer_free_at: 0.0,
            radio_free_at: 0.0,
            rng,
            pause_key: KeyEdge::default(),
            info_key: KeyEdge::default(),
            status_key: KeyEdge::default(),
            info_gate_open: true,
            status_gate_open: true,
            since_comment: 0.0,
            road_ahead: None,
            vehicle_state,
            race_time_ms: None,
            position: None,
            finalized: false,
            finished_slots: HashSet::new(),
            finish_order: Vec::new(),
        };
        driver.begin_countdown();
        Ok(driver)
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn mode(&self) -> &RaceMode {
        &self.mode
    }

    pub fn settings(&self) -> &RaceSettings {
        &self.settings
    }

    pub fn vehicle(&self) -> &dyn Vehicle {
        self.vehicle.as_ref()
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    pub fn announcer(&self) -> &AnnouncementQueue {
        &self.announcer
    }

    pub fn current_lap(&self) -> u32 {
        self.laps.current_lap()
    }

    /// Live race time; the captured final time once finished.
    pub fn race_time_ms(&self) -> u64 {
        match self.race_time_ms {
            Some(ms) => ms,
            None if self.started => self.clock.elapsed_race_ms().max(0) as u64,
            None => 0,
        }
    }

    pub fn apply_settings_change(&mut self, change: SettingsChange) {
        self.settings.apply(change);
        match change {
            SettingsChange::MusicVolume(_) => {
                self.output.set_music_volume(self.settings.music_volume)
            }
        }
    }

    /// Advances the race by `elapsed` host seconds.
    pub fn run(&mut self, elapsed: f32) -> Result<DriverStatus> {
        let elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };

        self.announcer.pump()?;
        self.radio.pump()?;
        if self.phase == RacePhase::Exiting {
            return Ok(DriverStatus::Exit(self.summary()));
        }

        let input = self.input.poll(elapsed);
        if input.abort {
            return self.abort();
        }
        let pause_pressed = self.pause_key.rising(input.pause);
        let info_pressed = self.info_key.rising(input.info);
        let status_pressed = self.status_key.rising(input.status);

        if pause_pressed {
            self.toggle_pause();
        }
        if self.phase == RacePhase::Paused {
            return Ok(DriverStatus::Running);
        }

        self.scheduler.advance(elapsed);
        if matches!(self.phase, RacePhase::Racing | RacePhase::Finished) {
            self.vehicle.advance(elapsed);
        }
        self.watch_vehicle_state();

        if self.phase == RacePhase::Racing {
            self.update_laps();
        }
        if self.phase == RacePhase::Racing {
            self.update_copilot();
            self.update_commentary(elapsed, info_pressed, status_pressed);
        }
        self.update_rivals(elapsed);

        for event in self.scheduler.collect_due(self.scheduler.now()) {
            self.dispatch(event)?;
        }

        if self.phase == RacePhase::Finished && self.finalized && self.announcer.is_idle()? {
            tracing::info!(race_time_ms = ?self.race_time_ms, "finish announcements done, leaving race");
            self.phase = RacePhase::Exiting;
            return Ok(DriverStatus::Exit(self.summary()));
        }
        Ok(DriverStatus::Running)
    }

    fn begin_countdown(&mut self) {
        let timings = self.mode.kind().timings();
        self.scheduler
            .schedule(EventKind::EngineStartPending, timings.engine_start, None);
        self.scheduler
            .schedule(EventKind::RaceStart, timings.race_start, None);
        self.phase = RacePhase::CountdownPending;
        tracing::info!(mode = ?self.mode.kind(), track = self.track.name(), laps = self.laps.total_laps(), "countdown pending");
    }

    fn dispatch(&mut self, event: ScheduledEvent) -> Result<()> {
        tracing::debug!(kind = ?event.kind, due = event.due_time, seq = event.sequence, "event due");
        match event.kind {
            EventKind::EngineStartPending => {
                self.vehicle.start_engine();
                let countdown = self.assets.clip(announce::COUNTDOWN);
                self.hold_announcer(countdown.length_seconds());
                self.announcer.enqueue(countdown)?;
            }
            EventKind::RaceStart => self.start_race()?,
            EventKind::RaceFinish => self.announce_local_finish(),
            EventKind::PlayClip => {
                if let Some(clip) = event.payload {
                    self.announcer.enqueue(clip)?;
                }
            }
            EventKind::PlayRadioClip => {
                if let Some(clip) = event.payload {
                    self.radio.enqueue(clip)?;
                }
            }
            EventKind::FinalizeRaceTime => self.finalize(),
            EventKind::ReleaseInfoGate => self.info_gate_open = true,
            EventKind::ReleaseStatusGate => self.status_gate_open = true,
        }
        Ok(())
    }

    fn start_race(&mut self) -> Result<()> {
        if self.phase != RacePhase::CountdownPending {
            return Ok(());
        }
        self.clock.reset();
        self.laps.reset();
        self.started = true;
        self.since_comment = 0.0;
        self.road_ahead = None;
        self.phase = RacePhase::Racing;
        tracing::info!("race started");

        let go = self.assets.clip(announce::GO);
        self.hold_announcer(go.length_seconds());
        self.announcer.enqueue(go)
    }

    /// Books `chain` on `channel` no earlier than `delay` seconds from now
    /// and after everything already booked there. Returns the time right
    /// after its last clip.
    fn book(&mut self, chain: &Composition, channel: Channel, delay: f32) -> f64 {
        let earliest = self.scheduler.now() + f64::from(delay.max(0.0));
        match channel {
            Channel::Announcer => chain.schedule_after(
                &mut self.scheduler,
                EventKind::PlayClip,
                earliest,
                &mut self.announcer_free_at,
            ),
            Channel::Radio => chain.schedule_after(
                &mut self.scheduler,
                EventKind::PlayRadioClip,
                earliest,
                &mut self.radio_free_at,
            ),
        }
    }

    /// Accounts for a clip enqueued straight onto the announcer.
    fn hold_announcer(&mut self, length: f32) {
        let start = self.announcer_free_at.max(self.scheduler.now());
        self.announcer_free_at = start + f64::from(length);
    }

    fn toggle_pause(&mut self) {
        match self.phase {
            RacePhase::Racing if self.mode.kind().allows_pause() => {
                self.clock.start_pause_window();
                self.vehicle.set_paused(true);
                self.output
                    .fade_music(MusicFade::In, self.settings.music_volume);
                self.phase = RacePhase::Paused;
                tracing::info!(race_time_ms = self.clock.elapsed_race_ms(), "paused");
            }
            RacePhase::Paused => {
                self.clock.end_pause_window();
                self.vehicle.set_paused(false);
                self.output
                    .fade_music(MusicFade::Out, self.settings.music_volume);
                self.phase = RacePhase::Racing;
                tracing::info!(race_time_ms = self.clock.elapsed_race_ms(), "resumed");
            }
            phase => tracing::debug!(?phase, "pause ignored"),
        }
    }

    fn abort(&mut self) -> Result<DriverStatus> {
        self.announcer.clear()?;
        self.radio.clear()?;
        self.scheduler.clear();
        if self.phase == RacePhase::Paused {
            self.clock.end_pause_window();
            self.vehicle.set_paused(false);
            self.output
                .fade_music(MusicFade::Out, self.settings.music_volume);
        }
        self.aborted = true;
        self.phase = RacePhase::Exiting;
        tracing::info!("race aborted");
        Ok(DriverStatus::Exit(self.summary()))
    }

    fn watch_vehicle_state(&mut self) {
        let state = self.vehicle.state();
        if state == self.vehicle_state {
            return;
        }
        tracing::info!(?state, distance = self.vehicle.distance(), "vehicle state changed");
        // Back on the road: call the road ahead again.
        if self.vehicle_state == VehicleState::Crashed && state == VehicleState::Running {
            self.road_ahead = None;
        }
        self.vehicle_state = state;
    }

    fn update_laps(&mut self) {
        match self.laps.update(self.vehicle.distance()) {
            LapTransition::NoChange => {}
            LapTransition::LapAdvanced(lap) => {
                tracing::info!(lap, total = self.laps.total_laps(), "lap");
                if !self.settings.auto_lap_announcements {
                    return;
                }
                if let Some(key) = laps_to_go_key(lap, self.laps.total_laps()) {
                    let chain = compose_keys(&mut self.assets, &[key]);
                    self.book(&chain, Channel::Announcer, 0.0);
                }
            }
            LapTransition::RaceFinished => self.finish_local(),
        }
    }

    fn finish_local(&mut self) {
        self.vehicle.disable_manual_transmission();
        self.vehicle.silence_engine();
        self.vehicle.stop();
        if self.mode.kind() != ModeKind::TimeTrial {
            self.position = Some(self.finish_order.len() as u32 + 1);
        }
        self.phase = RacePhase::Finished;
        self.scheduler.schedule(EventKind::RaceFinish, 0.0, None);
    }

    fn announce_local_finish(&mut self) {
        let ms = self.clock.elapsed_race_ms().max(0) as u64;
        self.race_time_ms = Some(ms);
        tracing::info!(race_time_ms = ms, position = ?self.position, "finished");

        let laps = self.laps.total_laps();
        let highscore = match &mut self.mode {
            RaceMode::TimeTrial(trial) => {
                trial.highscores.reload();
                let outcome = trial.highscores.compare(self.track.name(), laps, ms);
                trial.outcome = Some(outcome);
                Some(outcome)
            }
            RaceMode::Multiplayer(multiplayer) => {
                let player_number = multiplayer.session.local_player();
                multiplayer
                    .session
                    .send(&Packet::PlayerFinished { player_number });
                None
            }
            RaceMode::SingleRace(_) => None,
        };

        let details = FinishDetails {
            race_time_ms: Some(ms),
            detailed: self.settings.detailed_time,
            position: self.position,
            highscore,
        };
        let chain = finish_chain(&mut self.assets, FinishSubject::Local, details);
        let end = self.book(&chain, Channel::Announcer, 0.0);
        self.scheduler
            .schedule_at(EventKind::FinalizeRaceTime, end, None);
    }

    fn finalize(&mut self) {
        self.finalized = true;
        let laps = self.laps.total_laps();
        if let (RaceMode::TimeTrial(trial), Some(ms)) = (&mut self.mode, self.race_time_ms) {
            let outcome = trial.highscores.submit(self.track.name(), laps, ms);
            tracing::info!(?outcome, path = %trial.highscores.path().display(), "highscore checked");
        }
    }

    fn update_copilot(&mut self) {
        if self.vehicle.state() == VehicleState::Crashed {
            return;
        }

        let distance = self.vehicle.distance();
        let lookahead =
            (self.vehicle.speed() / 3.6 * COPILOT_LOOKAHEAD_SECONDS).max(COPILOT_MIN_LOOKAHEAD);
        let (index, next) = self.track.segment_at(distance + lookahead);
        if self.road_ahead == Some(index) {
            return;
        }
        self.road_ahead = Some(index);

        let (_, current) = self.track.segment_at(distance);
        let cues = self
            .copilot
            .on_road_ahead(&next, &current, self.settings.copilot, &mut self.rng);
        if let Some(clip) = cues.curve {
            let mut chain = Composition::new();
            chain.push(clip);
            self.book(&chain, Channel::Radio, 0.0);
        }
        if let Some(clip) = cues.surface {
            let mut chain = Composition::new();
            chain.push(clip);
            self.book(&chain, Channel::Radio, SURFACE_CUE_DELAY);
        }
    }

    // A manual request restarts the automatic period, so the two never
    // stack up back to back.
    fn update_commentary(&mut self, elapsed: f32, info_pressed: bool, status_pressed: bool) {
        self.since_comment += elapsed;

        let manual = info_pressed && self.since_comment >= MANUAL_INFO_COOLDOWN;
        let automatic = self.settings.auto_info && self.since_comment >= AUTO_INFO_INTERVAL;
        if (manual || automatic) && self.info_gate_open {
            self.announce_info();
            self.since_comment = 0.0;
        }

        if status_pressed && self.status_gate_open {
            self.announce_status();
        }
    }

    fn announce_info(&mut self) {
        let position = match self.mode.kind() {
            ModeKind::TimeTrial => None,
            _ => Some(self.live_position()),
        };
        let chain = info_chain(&mut self.assets, position, self.laps.current_lap());
        let end = self.book(&chain, Channel::Announcer, 0.0);
        self.info_gate_open = false;
        self.scheduler
            .schedule_at(EventKind::ReleaseInfoGate, end, None);
    }

    fn announce_status(&mut self) {
        let ms = self.clock.elapsed_race_ms().max(0) as u64;
        let chain = status_chain(&mut self.assets, ms, self.settings.detailed_time);
        let end = self.book(&chain, Channel::Announcer, 0.0);
        self.status_gate_open = false;
        self.scheduler
            .schedule_at(EventKind::ReleaseStatusGate, end, None);
    }

    /// 1 + every rival that is finished or further along.
    fn live_position(&self) -> u32 {
        let local = self.vehicle.distance();
        let ahead = match &self.mode {
            RaceMode::TimeTrial(_) => 0,
            RaceMode::SingleRace(race) => race
                .opponents
                .iter()
                .filter(|o| o.finished || o.distance > local)
                .count(),
            RaceMode::Multiplayer(multiplayer) => multiplayer
                .session
                .remotes()
                .filter(|r| r.is_finished() || r.distance() > local)
                .count(),
        };
        ahead as u32 + 1
    }

    fn update_rivals(&mut self, elapsed: f32) {
        let race_distance = self.track.length() * self.laps.total_laps() as f32;
        let moving = matches!(self.phase, RacePhase::Racing | RacePhase::Finished);
        let mut finished = Vec::new();
        let mut session_event = None;

        match &mut self.mode {
            RaceMode::TimeTrial(_) => {}
            RaceMode::SingleRace(race) => {
                if moving {
                    for opponent in &mut race.opponents {
                        if opponent.advance(elapsed, race_distance) {
                            finished.push(opponent.slot);
                        }
                    }
                }
            }
            RaceMode::Multiplayer(multiplayer) => {
                if self.phase == RacePhase::Racing {
                    let state = match self.vehicle.state() {
                        VehicleState::Running => PlayerState::Racing,
                        VehicleState::Crashed => PlayerState::Crashed,
                    };
                    multiplayer
                        .session
                        .broadcast(elapsed, &self.vehicle.snapshot(), state);
                }
                multiplayer.session.extrapolate(elapsed);
                if let Some(packet) = multiplayer.session.receive() {
                    session_event = multiplayer.session.apply(packet);
                }
            }
        }

        for slot in finished {
            self.announce_rival_finish(slot);
        }
        match session_event {
            Some(SessionEvent::Finished { player_number }) => self.announce_rival_finish(player_number),
            Some(SessionEvent::Joined {
                player_number,
                name,
            }) => {
                tracing::info!(player_number, %name, "player joined");
                let chain = announce::joined_chain(&mut self.assets, player_number);
                self.book(&chain, Channel::Radio, 0.0);
            }
            Some(SessionEvent::LocalBumped {
                bump_x,
                bump_y,
                bump_speed,
            }) => self.vehicle.bump(bump_x, bump_y, bump_speed),
            None => {}
        }
    }

    fn announce_rival_finish(&mut self, slot: u8) {
        if !self.finished_slots.insert(slot) {
            return;
        }
        self.finish_order.push(slot);
        tracing::info!(slot, place = self.finish_order.len(), "rival finished");

        let chain = finish_chain(&mut self.assets, FinishSubject::Slot(slot), FinishDetails::default());
        self.book(&chain, Channel::Announcer, 0.0);
    }

    fn summary(&self) -> RaceSummary {
        let highscore = match &self.mode {
            RaceMode::TimeTrial(trial) => trial.outcome,
            _ => None,
        };
        RaceSummary {
            mode: self.mode.kind(),
            aborted: self.aborted,
            race_time_ms: self.race_time_ms,
            position: self.position,
            highscore,
            finish_order: self.finish_order.clone(),
        }
    }
}

impl std::fmt::Debug for RaceModeDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceModeDriver")
            .field("mode", &self.mode.kind())
            .field("phase", &self.phase)
            .field("lap", &self.laps.current_lap())
            .field("clock", &self.clock)
            .field("pending_events", &self.scheduler.pending())
            .finish()
    }
}
