use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{AudioOutput, Channel, CompletionHandle, MusicFade, PlaybackToken};
use crate::AudioClip;

/// Record of one playback started on the mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayedClip {
    pub key: String,
    pub channel: Channel,
    pub started_at: f32,
}

#[derive(Debug)]
struct Voice {
    channel: Channel,
    remaining: f32,
    done: CompletionHandle,
}

#[derive(Debug, Default)]
struct MixerState {
    time: f32,
    voices: Vec<Voice>,
    played: Vec<PlayedClip>,
    max_concurrent: HashMap<Channel, usize>,
    music_volume: f32,
    music_playing: bool,
}

/// In-process audio output that plays clips by counting down their length.
///
/// Completions are posted through each clip's [`CompletionHandle`] from the
/// thread that calls [`VirtualMixer::advance`], the same way a real backend
/// reports from its audio thread.
#[derive(Debug, Default)]
pub struct VirtualMixer {
    state: Mutex<MixerState>,
}

impl VirtualMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves playback forward and notifies every clip that ran out.
    pub fn advance(&self, elapsed: f32) {
        let finished: Vec<CompletionHandle> = {
            let mut state = self.lock();
            state.time += elapsed.max(0.0);
            let mut finished = Vec::new();
            state.voices.retain_mut(|voice| {
                voice.remaining -= elapsed.max(0.0);
                if voice.remaining <= 0.0 {
                    finished.push(voice.done.clone());
                    false
                } else {
                    true
                }
            });
            finished
        };

        for done in finished {
            done.notify();
        }
    }

    pub fn played(&self) -> Vec<PlayedClip> {
        self.lock().played.clone()
    }

    pub fn played_keys(&self, channel: Channel) -> Vec<String> {
        self.lock()
            .played
            .iter()
            .filter(|played| played.channel == channel)
            .map(|played| played.key.clone())
            .collect()
    }

    pub fn active_tokens(&self) -> Vec<PlaybackToken> {
        self.lock().voices.iter().map(|voice| voice.done.token()).collect()
    }

    /// Highest number of clips that ever overlapped on `channel`.
    pub fn max_concurrent(&self, channel: Channel) -> usize {
        self.lock().max_concurrent.get(&channel).copied().unwrap_or(0)
    }

    pub fn music_playing(&self) -> bool {
        self.lock().music_playing
    }

    pub fn music_volume(&self) -> f32 {
        self.lock().music_volume
    }

    fn lock(&self) -> MutexGuard<'_, MixerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AudioOutput for VirtualMixer {
    fn play(&self, clip: &AudioClip, channel: Channel, done: CompletionHandle) {
        let mut state = self.lock();
        tracing::info!(clip = clip.key(), ?channel, at = state.time, "playing");
        let started_at = state.time;
        state.played.push(PlayedClip {
            key: clip.key().to_string(),
            channel,
            started_at,
        });
        state.voices.push(Voice {
            channel,
            remaining: clip.length_seconds(),
            done,
        });

        let active = state
            .voices
            .iter()
            .filter(|voice| voice.channel == channel)
            .count();
        let peak = state.max_concurrent.entry(channel).or_insert(0);
        *peak = (*peak).max(active);
    }

    fn stop(&self, token: PlaybackToken) {
        self.lock().voices.retain(|voice| voice.done.token() != token);
    }

    fn fade_music(&self, fade: MusicFade, volume: f32) {
        let mut state = self.lock();
        state.music_playing = fade == MusicFade::In;
        state.music_volume = volume;
    }

    fn set_music_volume(&self, volume: f32) {
        self.lock().music_volume = volume;
    }
}
