use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{RaceError, Result};

/// Key of the shared clip played when nothing better can be resolved.
pub const ERROR_CLIP_KEY: &str = "error";

/// Stable identifier of a resolved clip within one [`AssetStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub u32);

/// Handle to a loaded audio asset with a known duration. Cloning is cheap.
#[derive(Clone, PartialEq)]
pub struct AudioClip {
    id: ClipId,
    key: Arc<str>,
    length_seconds: f32,
}

impl AudioClip {
    pub fn new(id: ClipId, key: impl Into<Arc<str>>, length_seconds: f32) -> Self {
        Self {
            id,
            key: key.into(),
            length_seconds: length_seconds.max(0.0),
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    /// Logical key the clip was requested under.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn length_seconds(&self) -> f32 {
        self.length_seconds
    }
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClip")
            .field("id", &self.id.0)
            .field("key", &self.key)
            .field("length_seconds", &self.length_seconds)
            .finish()
    }
}

/// On-disk catalogue of every clip per language with its duration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipManifest {
    pub languages: HashMap<String, HashMap<String, f32>>,
}

impl ClipManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn insert(&mut self, language: &str, key: &str, length_seconds: f32) {
        self.languages
            .entry(language.to_string())
            .or_default()
            .insert(key.to_string(), length_seconds);
    }

    fn length_of(&self, language: &str, key: &str) -> Option<f32> {
        self.languages.get(language)?.get(key).copied()
    }
}

/// Resolves logical clip keys against a language-specific catalogue with a
/// fallback to the default language and finally the shared error clip.
#[derive(Debug)]
pub struct AssetStore {
    manifest: ClipManifest,
    language: String,
    default_language: String,
    error_clip: AudioClip,
    resolved: HashMap<String, AudioClip>,
    next_id: u32,
}

impl AssetStore {
    /// Builds a store. Fails when the error clip itself is unavailable,
    /// since every other fallback ends there.
    pub fn new(
        manifest: ClipManifest,
        language: impl Into<String>,
        default_language: impl Into<String>,
    ) -> Result<Self> {
        let language = language.into();
        let default_language = default_language.into();
        let error_length = manifest
            .length_of(&default_language, ERROR_CLIP_KEY)
            .or_else(|| manifest.length_of(&language, ERROR_CLIP_KEY))
            .ok_or_else(|| RaceError::MissingMandatoryAsset(ERROR_CLIP_KEY.to_string()))?;

        Ok(Self {
            manifest,
            language,
            default_language,
            error_clip: AudioClip::new(ClipId(0), ERROR_CLIP_KEY, error_length),
            resolved: HashMap::new(),
            next_id: 1,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn error_clip(&self) -> &AudioClip {
        &self.error_clip
    }

    /// Returns the clip for `key`, never failing. Repeated lookups of the
    /// same key yield the same handle.
    pub fn clip(&mut self, key: &str) -> AudioClip {
        match self.try_clip(key) {
            Some(clip) => clip,
            None => {
                tracing::warn!(key, language = %self.language, "clip missing, using error clip");
                self.error_clip.clone()
            }
        }
    }

    /// Like [`AssetStore::clip`] but reports a miss instead of substituting
    /// the error clip.
    pub fn try_clip(&mut self, key: &str) -> Option<AudioClip> {
        if let Some(clip) = self.resolved.get(key) {
            return Some(clip.clone());
        }

        let length = match self.manifest.length_of(&self.language, key) {
            Some(length) => length,
            None => {
                let length = self.manifest.length_of(&self.default_language, key)?;
                tracing::debug!(key, language = %self.language, "clip resolved from default language");
                length
            }
        };

        let clip = AudioClip::new(ClipId(self.next_id), key, length);
        self.next_id += 1;
        self.resolved.insert(key.to_string(), clip.clone());
        Some(clip)
    }

    /// Probes `prefix1`, `prefix2`, … until one is missing and returns the
    /// loaded variants. The first variant is mandatory.
    pub fn probe_pool(&mut self, prefix: &str) -> Result<Vec<AudioClip>> {
        let mut pool = Vec::new();
        let mut index = 1;
        while let Some(clip) = self.try_clip(&format!("{prefix}{index}")) {
            pool.push(clip);
            index += 1;
        }

        if pool.is_empty() {
            return Err(RaceError::MissingMandatoryAsset(format!("{prefix}1")));
        }
        Ok(pool)
    }
}
