//! Collaborators the race engine drives but does not own the internals of:
//! the player's vehicle, the track layout and the input devices.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Easy,
    Normal,
    Hard,
    Hairpin,
}

impl Severity {
    pub fn name(self) -> &'static str {
        match self {
            Severity::Easy => "easy",
            Severity::Normal => "normal",
            Severity::Hard => "hard",
            Severity::Hairpin => "hairpin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadKind {
    Straight,
    Left(Severity),
    Right(Severity),
}

impl RoadKind {
    pub fn is_turn(self) -> bool {
        !matches!(self, RoadKind::Straight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    #[default]
    Asphalt,
    Gravel,
    Water,
    Sand,
    Snow,
}

impl Surface {
    pub const ALL: [Surface; 5] = [
        Surface::Asphalt,
        Surface::Gravel,
        Surface::Water,
        Surface::Sand,
        Surface::Snow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Surface::Asphalt => "asphalt",
            Surface::Gravel => "gravel",
            Surface::Water => "water",
            Surface::Sand => "sand",
            Surface::Snow => "snow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub kind: RoadKind,
    #[serde(default)]
    pub surface: Surface,
    pub length: f32,
}

pub trait Track {
    fn name(&self) -> &str;
    /// Length of one lap in metres.
    fn length(&self) -> f32;
    /// Index and shape of the segment under `distance`. Distances past one
    /// lap wrap around.
    fn segment_at(&self, distance: f32) -> (usize, RoadSegment);
}

/// Track described as a loop of consecutive segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentTrack {
    name: String,
    segments: Vec<RoadSegment>,
}

impl SegmentTrack {
    pub fn new(name: impl Into<String>, segments: Vec<RoadSegment>) -> crate::Result<Self> {
        if segments.is_empty() || segments.iter().any(|segment| segment.length <= 0.0) {
            return Err(crate::RaceError::InvalidInput(
                "a track needs at least one segment and every segment a positive length",
            ));
        }
        Ok(Self {
            name: name.into(),
            segments,
        })
    }

    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }
}

impl Track for SegmentTrack {
    fn name(&self) -> &str {
        &self.name
    }

    fn length(&self) -> f32 {
        self.segments.iter().map(|segment| segment.length).sum()
    }

    fn segment_at(&self, distance: f32) -> (usize, RoadSegment) {
        let mut remaining = distance.max(0.0) % self.length();
        for (index, segment) in self.segments.iter().enumerate() {
            if remaining < segment.length {
                return (index, *segment);
            }
            remaining -= segment.length;
        }
        let last = self.segments.len() - 1;
        (last, self.segments[last])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleState {
    Running,
    Crashed,
}

/// Everything other players need to hear this vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    /// Lateral position on the road.
    pub position_x: f32,
    /// Distance travelled along the track.
    pub position_y: f32,
    /// km/h.
    pub speed: f32,
    /// Engine sample frequency.
    pub frequency: u32,
    pub engine_running: bool,
    pub braking: bool,
    pub horning: bool,
    pub backfiring: bool,
}

pub trait Vehicle {
    fn advance(&mut self, elapsed: f32);
    fn distance(&self) -> f32;
    /// km/h.
    fn speed(&self) -> f32;
    fn state(&self) -> VehicleState;
    fn snapshot(&self) -> VehicleSnapshot;
    fn start_engine(&mut self);
    fn silence_engine(&mut self);
    fn stop(&mut self);
    fn disable_manual_transmission(&mut self);
    fn set_paused(&mut self, paused: bool);
    fn bump(&mut self, bump_x: f32, bump_y: f32, bump_speed: f32);
}

/// Vehicle that accelerates at a fixed rate up to a cruising speed. Enough
/// to drive the race engine without a physics model.
#[derive(Debug, Clone)]
pub struct CruiseVehicle {
    distance: f32,
    lateral: f32,
    speed: f32,
    cruise_speed: f32,
    acceleration: f32,
    engine_running: bool,
    stopped: bool,
    paused: bool,
    manual_transmission: bool,
    crashed_for: f32,
}

impl CruiseVehicle {
    /// `cruise_speed` in km/h, `acceleration` in km/h per second.
    pub fn new(cruise_speed: f32, acceleration: f32) -> Self {
        Self {
            distance: 0.0,
            lateral: 0.0,
            speed: 0.0,
            cruise_speed,
            acceleration,
            engine_running: false,
            stopped: false,
            paused: false,
            manual_transmission: true,
            crashed_for: 0.0,
        }
    }

    /// Puts the car off the road for `seconds`.
    pub fn crash(&mut self, seconds: f32) {
        self.crashed_for = seconds.max(0.0);
        self.speed = 0.0;
    }

    pub fn engine_running(&self) -> bool {
        self.engine_running
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn manual_transmission(&self) -> bool {
        self.manual_transmission
    }
}

impl Vehicle for CruiseVehicle {
    fn advance(&mut self, elapsed: f32) {
        if self.paused || self.stopped || !self.engine_running {
            return;
        }
        if self.crashed_for > 0.0 {
            self.crashed_for = (self.crashed_for - elapsed).max(0.0);
            return;
        }
        self.speed = (self.speed + self.acceleration * elapsed).min(self.cruise_speed);
        self.distance += self.speed / 3.6 * elapsed;
    }

    fn distance(&self) -> f32 {
        self.distance
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn state(&self) -> VehicleState {
        if self.crashed_for > 0.0 {
            VehicleState::Crashed
        } else {
            VehicleState::Running
        }
    }

    fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            position_x: self.lateral,
            position_y: self.distance,
            speed: self.speed,
            frequency: 22_050 + (self.speed * 100.0) as u32,
            engine_running: self.engine_running,
            braking: false,
            horning: false,
            backfiring: false,
        }
    }

    fn start_engine(&mut self) {
        self.engine_running = true;
    }

    fn silence_engine(&mut self) {
        self.engine_running = false;
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.speed = 0.0;
    }

    fn disable_manual_transmission(&mut self) {
        self.manual_transmission = false;
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn bump(&mut self, bump_x: f32, bump_y: f32, bump_speed: f32) {
        self.lateral += bump_x;
        self.distance = (self.distance + bump_y).max(0.0);
        self.speed = (self.speed + bump_speed).max(0.0);
    }
}

/// Keys the race screen listens to in a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputState {
    pub pause: bool,
    /// Position / lap report.
    pub info: bool,
    /// Current race time report.
    pub status: bool,
    pub abort: bool,
}

pub trait InputSource {
    /// Returns the keys held after `elapsed` host seconds.
    fn poll(&mut self, elapsed: f32) -> InputState;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Pause,
    Info,
    Status,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPress {
    pub key: Key,
    /// Host seconds at which the key goes down.
    pub at: f32,
    pub held_for: f32,
}

/// Plays back a fixed list of key presses against host time.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    presses: Vec<KeyPress>,
    time: f32,
}

impl ScriptedInput {
    pub fn new(presses: Vec<KeyPress>) -> Self {
        Self { presses, time: 0.0 }
    }

    pub fn press(mut self, key: Key, at: f32, held_for: f32) -> Self {
        self.presses.push(KeyPress { key, at, held_for });
        self
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self, elapsed: f32) -> InputState {
        self.time += elapsed.max(0.0);
        let mut state = InputState::default();
        for press in &self.presses {
            if self.time >= press.at && self.time < press.at + press.held_for {
                match press.key {
                    Key::Pause => state.pause = true,
                    Key::Info => state.info = true,
                    Key::Status => state.status = true,
                    Key::Abort => state.abort = true,
                }
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight(length: f32) -> RoadSegment {
        RoadSegment {
            kind: RoadKind::Straight,
            surface: Surface::Asphalt,
            length,
        }
    }

    #[test]
    fn segment_lookup_wraps_per_lap() {
        let track = SegmentTrack::new(
            "oval",
            vec![
                straight(100.0),
                RoadSegment {
                    kind: RoadKind::Left(Severity::Hard),
                    surface: Surface::Gravel,
                    length: 50.0,
                },
            ],
        )
        .unwrap();

        assert_eq!(track.length(), 150.0);
        assert_eq!(track.segment_at(99.0).0, 0);
        assert_eq!(track.segment_at(120.0).0, 1);
        assert_eq!(track.segment_at(160.0).0, 0);
        assert_eq!(track.segment_at(260.0).1.surface, Surface::Gravel);
    }

    #[test]
    fn rejects_degenerate_tracks() {
        assert!(SegmentTrack::new("empty", Vec::new()).is_err());
        assert!(SegmentTrack::new("flat", vec![straight(0.0)]).is_err());
    }

    #[test]
    fn cruise_vehicle_only_moves_with_engine_running() {
        let mut car = CruiseVehicle::new(72.0, 36.0);
        car.advance(1.0);
        assert_eq!(car.distance(), 0.0);

        car.start_engine();
        car.advance(1.0);
        assert_eq!(car.speed(), 36.0);
        assert!((car.distance() - 10.0).abs() < 1e-4);

        car.crash(2.0);
        assert_eq!(car.state(), VehicleState::Crashed);
        car.advance(2.0);
        assert_eq!(car.state(), VehicleState::Running);
        assert!((car.distance() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn scripted_input_holds_keys_for_their_duration() {
        let mut input = ScriptedInput::default().press(Key::Pause, 1.0, 0.5);
        assert!(!input.poll(0.9).pause);
        assert!(input.poll(0.2).pause);
        assert!(input.poll(0.2).pause);
        assert!(!input.poll(0.3).pause);
    }
}
