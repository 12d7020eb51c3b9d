use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub race: RaceSettings,
    pub assets: AssetConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Where clip catalogues live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub manifest_path: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from("sounds/clips.json"),
        }
    }
}

/// How much of the upcoming road the copilot narrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopilotLevel {
    Off,
    Curves,
    #[default]
    CurvesAndSurfaces,
}

impl CopilotLevel {
    pub fn announces_curves(self) -> bool {
        !matches!(self, CopilotLevel::Off)
    }

    pub fn announces_surfaces(self) -> bool {
        matches!(self, CopilotLevel::CurvesAndSurfaces)
    }
}

/// Immutable snapshot of the settings a race mode needs. Handed to the
/// driver at construction; the only live-updated value arrives through
/// [`SettingsChange`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceSettings {
    pub language: String,
    pub default_language: String,
    pub copilot: CopilotLevel,
    pub auto_lap_announcements: bool,
    pub auto_info: bool,
    /// Speak thousandths when reading out race times.
    pub detailed_time: bool,
    pub music_volume: f32,
    /// Fixed seed for copilot variant picks and opponent generation.
    pub seed: Option<u64>,
    pub highscore_path: PathBuf,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            default_language: "en".to_string(),
            copilot: CopilotLevel::default(),
            auto_lap_announcements: true,
            auto_info: true,
            detailed_time: true,
            music_volume: 0.6,
            seed: None,
            highscore_path: PathBuf::from("highscore.cfg"),
        }
    }
}

/// Live settings edits the driver accepts mid-race.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingsChange {
    MusicVolume(f32),
}

impl RaceSettings {
    pub fn apply(&mut self, change: SettingsChange) {
        match change {
            SettingsChange::MusicVolume(volume) => self.music_volume = volume.clamp(0.0, 1.0),
        }
    }
}
