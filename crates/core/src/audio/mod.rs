use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

mod mixer;

pub use mixer::{PlayedClip, VirtualMixer};

use crate::{AudioClip, RaceError, Result};

/// Logical output lane a clip is played on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Race announcer: countdown, laps, times, finish chains.
    Announcer,
    /// Copilot radio: road cues and network chatter.
    Radio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicFade {
    In,
    Out,
}

/// Identifies one playback so that late completions can be told apart from
/// the clip currently playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackToken(pub u64);

/// Message posted by the audio backend when a playback ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipFinished {
    pub token: PlaybackToken,
}

/// Handed to the backend with every playback; the backend calls
/// [`CompletionHandle::notify`] from whatever thread observes the end.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    token: PlaybackToken,
    inbox: flume::Sender<ClipFinished>,
}

impl CompletionHandle {
    pub fn token(&self) -> PlaybackToken {
        self.token
    }

    pub fn notify(&self) {
        // The queue may already be gone at teardown; nothing to wake then.
        let _ = self.inbox.send(ClipFinished { token: self.token });
    }
}

/// Playback backend. Implementations start every clip from its beginning.
pub trait AudioOutput: Send + Sync {
    fn play(&self, clip: &AudioClip, channel: Channel, done: CompletionHandle);
    fn stop(&self, token: PlaybackToken);
    fn fade_music(&self, fade: MusicFade, volume: f32);
    fn set_music_volume(&self, volume: f32);
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<AudioClip>,
    current: Option<(AudioClip, PlaybackToken)>,
    next_token: u64,
}

/// Strictly serial clip queue: one clip plays at a time, in FIFO order.
///
/// `pending` and `current` sit behind a single mutex because completion
/// may be observed off the tick thread. Completions normally travel through
/// the inbox and are applied on the tick thread by [`AnnouncementQueue::pump`].
#[derive(Clone)]
pub struct AnnouncementQueue {
    channel: Channel,
    output: Arc<dyn AudioOutput>,
    state: Arc<Mutex<QueueState>>,
    inbox_tx: flume::Sender<ClipFinished>,
    inbox_rx: flume::Receiver<ClipFinished>,
}

impl AnnouncementQueue {
    pub fn new(channel: Channel, output: Arc<dyn AudioOutput>) -> Self {
        let (inbox_tx, inbox_rx) = flume::unbounded();
        Self {
            channel,
            output,
            state: Arc::new(Mutex::new(QueueState::default())),
            inbox_tx,
            inbox_rx,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Appends `clip`, starting it right away when nothing is playing.
    pub fn enqueue(&self, clip: AudioClip) -> Result<()> {
        let mut state = self.lock()?;
        state.pending.push_back(clip);
        if state.current.is_none() {
            self.promote_next(&mut state);
        }
        Ok(())
    }

    /// Applies a completion. Returns `false` for stale tokens, which leave
    /// the queue untouched.
    pub fn finish(&self, token: PlaybackToken) -> Result<bool> {
        let mut state = self.lock()?;
        match &state.current {
            Some((_, current)) if *current == token => {
                state.current = None;
                self.promote_next(&mut state);
                Ok(true)
            }
            _ => {
                tracing::debug!(?token, channel = ?self.channel, "ignoring stale completion");
                Ok(false)
            }
        }
    }

    /// Drains the completion inbox. Returns how many clips actually ended.
    pub fn pump(&self) -> Result<usize> {
        let mut finished = 0;
        for message in self.inbox_rx.try_iter() {
            if self.finish(message.token)? {
                finished += 1;
            }
        }
        Ok(finished)
    }

    /// Stops the playing clip and forgets everything pending.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.pending.clear();
        if let Some((clip, token)) = state.current.take() {
            tracing::debug!(clip = clip.key(), channel = ?self.channel, "clearing queue");
            self.output.stop(token);
        }
        Ok(())
    }

    pub fn is_idle(&self) -> Result<bool> {
        let state = self.lock()?;
        Ok(state.current.is_none() && state.pending.is_empty())
    }

    pub fn current(&self) -> Result<Option<AudioClip>> {
        let state = self.lock()?;
        Ok(state.current.as_ref().map(|(clip, _)| clip.clone()))
    }

    pub fn pending_len(&self) -> Result<usize> {
        Ok(self.lock()?.pending.len())
    }

    fn promote_next(&self, state: &mut QueueState) {
        let Some(clip) = state.pending.pop_front() else {
            return;
        };
        let token = PlaybackToken(state.next_token);
        state.next_token += 1;

        let done = CompletionHandle {
            token,
            inbox: self.inbox_tx.clone(),
        };
        self.output.play(&clip, self.channel, done);
        state.current = Some((clip, token));
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| RaceError::Poisoned("announcement queue"))
    }
}

impl std::fmt::Debug for AnnouncementQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnouncementQueue")
            .field("channel", &self.channel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClipId;

    fn clip(id: u32, key: &str, length: f32) -> AudioClip {
        AudioClip::new(ClipId(id), key, length)
    }

    fn queue() -> (Arc<VirtualMixer>, AnnouncementQueue) {
        let mixer = Arc::new(VirtualMixer::new());
        let queue = AnnouncementQueue::new(Channel::Announcer, mixer.clone());
        (mixer, queue)
    }

    #[test]
    fn plays_clips_one_at_a_time_in_fifo_order() {
        let (mixer, queue) = queue();
        queue.enqueue(clip(1, "a", 0.5)).unwrap();
        queue.enqueue(clip(2, "b", 0.25)).unwrap();
        queue.enqueue(clip(3, "c", 1.0)).unwrap();

        assert_eq!(queue.current().unwrap().unwrap().key(), "a");
        assert_eq!(queue.pending_len().unwrap(), 2);

        for _ in 0..40 {
            mixer.advance(0.1);
            queue.pump().unwrap();
        }

        assert_eq!(mixer.played_keys(Channel::Announcer), vec!["a", "b", "c"]);
        assert_eq!(mixer.max_concurrent(Channel::Announcer), 1);
        assert!(queue.is_idle().unwrap());
    }

    #[test]
    fn stale_completion_after_clear_never_resumes() {
        let (mixer, queue) = queue();
        queue.enqueue(clip(1, "finish", 1.0)).unwrap();
        queue.enqueue(clip(2, "your_time", 1.0)).unwrap();

        let stale = mixer.active_tokens()[0];
        queue.clear().unwrap();
        assert!(queue.is_idle().unwrap());
        assert!(mixer.active_tokens().is_empty());

        assert!(!queue.finish(stale).unwrap());
        assert!(queue.is_idle().unwrap());
        assert_eq!(mixer.played_keys(Channel::Announcer), vec!["finish"]);
    }

    #[test]
    fn completion_posted_from_another_thread_is_applied_on_pump() {
        let (mixer, queue) = queue();
        queue.enqueue(clip(1, "a", 0.1)).unwrap();
        queue.enqueue(clip(2, "b", 0.1)).unwrap();

        let background = mixer.clone();
        std::thread::spawn(move || background.advance(0.2))
            .join()
            .unwrap();

        assert_eq!(queue.current().unwrap().unwrap().key(), "a");
        assert_eq!(queue.pump().unwrap(), 1);
        assert_eq!(queue.current().unwrap().unwrap().key(), "b");
    }

    #[test]
    fn idle_only_when_nothing_current_or_pending() {
        let (mixer, queue) = queue();
        assert!(queue.is_idle().unwrap());

        queue.enqueue(clip(1, "a", 0.3)).unwrap();
        assert!(!queue.is_idle().unwrap());

        mixer.advance(0.3);
        queue.pump().unwrap();
        assert!(queue.is_idle().unwrap());
    }
}
