//! Fixtures shared by the unit tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::assets::ERROR_CLIP_KEY;
use crate::audio::VirtualMixer;
use crate::config::RaceSettings;
use crate::race::{DriverStatus, RaceMode, RaceModeDriver, RaceSetup, RaceSummary};
use crate::timeline::ManualStopwatch;
use crate::world::{
    CruiseVehicle, InputSource, RoadKind, RoadSegment, SegmentTrack, Surface, Vehicle,
};
use crate::{AssetStore, ClipManifest};

/// English catalogue with every clip the race engine asks for. Lengths are
/// exact binary fractions so offsets add up without rounding.
pub(crate) fn manifest() -> ClipManifest {
    let mut manifest = ClipManifest::default();
    let mut add = |key: &str, length: f32| manifest.insert("en", key, length);

    add(ERROR_CLIP_KEY, 0.25);
    for n in 0..=99 {
        add(&format!("race/numbers/{n}"), 0.5);
    }
    for key in ["minute", "minutes", "second", "seconds", "point"] {
        add(&format!("race/time/{key}"), 0.5);
    }

    add("race/countdown", 3.0);
    add("race/go", 0.5);
    add("race/finish", 1.0);
    add("race/your_time", 0.75);
    add("race/highscore/new", 1.25);
    add("race/highscore/current", 1.0);
    add("race/laps/final", 1.0);
    for remaining in 2..=9 {
        add(&format!("race/laps/{remaining}"), 1.0);
    }
    for key in ["position", "lap", "time", "finished", "joined"] {
        add(&format!("race/info/{key}"), 0.75);
    }
    for slot in 0..=8 {
        add(&format!("race/player/{slot}"), 0.5);
    }
    for position in 1..=8 {
        add(&format!("race/position/{position}"), 0.75);
    }

    for side in ["left", "right"] {
        for severity in ["easy", "normal", "hard", "hairpin"] {
            add(&format!("copilot/{side}_{severity}1"), 0.5);
        }
    }
    add("copilot/left_easy2", 0.5);
    add("copilot/left_easy3", 0.5);
    for surface in Surface::ALL {
        add(&format!("copilot/surface_{}1", surface.name()), 0.75);
    }
    add("copilot/surface_gravel2", 0.75);

    manifest
}

pub(crate) fn assets() -> AssetStore {
    AssetStore::new(manifest(), "en", "en").unwrap()
}

/// Unique scratch path under the system temp directory.
pub(crate) fn temp_path(name: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("audio-racer-{}-{n}-{name}", std::process::id()))
}

pub(crate) fn straight(length: f32) -> RoadSegment {
    RoadSegment {
        kind: RoadKind::Straight,
        surface: Surface::Asphalt,
        length,
    }
}

pub(crate) fn settings() -> RaceSettings {
    RaceSettings {
        seed: Some(7),
        ..RaceSettings::default()
    }
}

/// A race driver wired to a virtual mixer and a hand-driven stopwatch.
pub(crate) struct Harness {
    pub driver: RaceModeDriver,
    pub mixer: Arc<VirtualMixer>,
    pub watch: ManualStopwatch,
    pub time: f32,
}

impl Harness {
    /// 72 km/h cruiser reaching top speed in one second.
    pub fn new(
        settings: RaceSettings,
        mode: RaceMode,
        total_laps: u32,
        segments: Vec<RoadSegment>,
        input: impl InputSource + 'static,
    ) -> Self {
        let vehicle = Box::new(CruiseVehicle::new(72.0, 72.0));
        Self::with_vehicle(vehicle, settings, mode, total_laps, segments, input)
    }

    pub fn with_vehicle(
        vehicle: Box<dyn Vehicle>,
        settings: RaceSettings,
        mode: RaceMode,
        total_laps: u32,
        segments: Vec<RoadSegment>,
        input: impl InputSource + 'static,
    ) -> Self {
        let mixer = Arc::new(VirtualMixer::new());
        let watch = ManualStopwatch::new();
        let driver = RaceModeDriver::new(RaceSetup {
            settings,
            mode,
            total_laps,
            vehicle,
            track: Box::new(SegmentTrack::new("test", segments).unwrap()),
            input: Box::new(input),
            output: mixer.clone(),
            assets: assets(),
            stopwatch: Box::new(watch.clone()),
        })
        .unwrap();

        Self {
            driver,
            mixer,
            watch,
            time: 0.0,
        }
    }

    pub fn step(&mut self, dt: f32) -> DriverStatus {
        self.time += dt;
        self.watch.advance_secs(dt);
        self.mixer.advance(dt);
        self.driver.run(dt).unwrap()
    }

    /// Steps until `time` host seconds have passed or the driver exits.
    pub fn run_until(&mut self, time: f32) -> Option<RaceSummary> {
        while self.time < time {
            if let DriverStatus::Exit(summary) = self.step(0.05) {
                return Some(summary);
            }
        }
        None
    }

    pub fn run_to_exit(&mut self) -> RaceSummary {
        self.run_until(600.0).expect("race never exited")
    }
}
