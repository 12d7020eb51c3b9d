//! Core library for the Audio Racer game.
//!
//! The crate holds the race timeline engine of an audio-first racing game.
//! A race is experienced entirely through sound, so the engine's job is to
//! decide *what* is said and *when*: countdown, copilot calls, lap and
//! position reports, finish and highscore announcements. Each module owns a
//! distinct subsystem (clip catalogue, serial playback queues, scheduling,
//! lap tracking, networking) and [`race::RaceModeDriver`] ties them together
//! behind one cooperative per-frame tick.

pub mod assets;
pub mod audio;
pub mod config;
pub mod copilot;
pub mod error;
pub mod highscore;
pub mod laps;
pub mod net;
pub mod race;
pub mod speech;
pub mod timeline;
pub mod world;

#[cfg(test)]
pub(crate) mod testing;

pub use assets::{AssetStore, AudioClip, ClipId, ClipManifest};
pub use audio::{AnnouncementQueue, AudioOutput, Channel, VirtualMixer};
pub use config::{AppConfig, CopilotLevel, RaceSettings, SettingsChange};
pub use error::{RaceError, Result};
pub use highscore::{HighscoreOutcome, HighscoreStore};
pub use race::{DriverStatus, RaceMode, RaceModeDriver, RaceSetup, RaceSummary};
pub use timeline::{EventKind, EventScheduler, RaceClock, ScheduledEvent};
